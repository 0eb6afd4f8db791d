//! Collaborator traits through which a run reads its inputs and emits its
//! results.
//!
//! The numerical core never touches a file format. Hosts implement these
//! traits over whatever storage they use; `Grid` itself implements
//! [`CostSurfaceProvider`] for in-memory surfaces.

use std::path::Path;

use crate::error::{ArtifactError, SinkError};
use crate::feature::FeatureRecord;
use crate::geometry::{Extent, GridGeometry};
use crate::grid::{Grid, GridStats};
use crate::id::{CellIndex, FeatureId};

/// Read-only friction raster.
///
/// `sample` returns `None` for NoData cells and for cells outside the
/// geometry. Implementations must be safe to share across worker threads.
pub trait CostSurfaceProvider: Send + Sync {
    /// Raster layout.
    fn geometry(&self) -> &GridGeometry;

    /// NoData sentinel to use for grids derived from this surface.
    fn no_data(&self) -> f64;

    /// Friction at `cell`, `None` for NoData.
    fn sample(&self, cell: CellIndex) -> Option<f64>;

    /// `(min, max)` over valid cells, `None` if there are none.
    fn value_range(&self) -> Option<(f64, f64)>;

    /// Side length of one cell in map units.
    fn cell_size(&self) -> f64 {
        self.geometry().cell_size()
    }

    /// Bounding rectangle in map units.
    fn extent(&self) -> Extent {
        self.geometry().extent()
    }

    /// Read the whole surface into a dense grid.
    ///
    /// The default samples every cell of [`geometry`](Self::geometry).
    /// Providers backed by a native raster may return it directly; callers
    /// check the result against the declared geometry.
    fn materialize(&self) -> Grid {
        let geometry = *self.geometry();
        let mut grid = Grid::no_data_like(geometry, self.no_data());
        for (i, v) in grid.values_mut().iter_mut().enumerate() {
            if let Some(friction) = self.sample(geometry.cell_of(i)) {
                *v = friction;
            }
        }
        grid
    }
}

impl CostSurfaceProvider for Grid {
    fn geometry(&self) -> &GridGeometry {
        Grid::geometry(self)
    }

    fn no_data(&self) -> f64 {
        Grid::no_data(self)
    }

    fn sample(&self, cell: CellIndex) -> Option<f64> {
        self.get(cell)
    }

    fn value_range(&self) -> Option<(f64, f64)> {
        let stats = self.stats();
        stats.min.zip(stats.max)
    }

    fn materialize(&self) -> Grid {
        self.clone()
    }
}

/// Ordered source of influence features.
///
/// The order of [`records`](Self::records) is the order in which features
/// are summed.
pub trait FeatureProvider: Send + Sync {
    /// Number of features, available without materializing them.
    fn feature_count(&self) -> usize;

    /// All feature records, in provider order.
    fn records(&self) -> Vec<FeatureRecord>;
}

/// Receiver of the final influence grid.
pub trait OutputSink: Send {
    /// Accept the finished grid. Called at most once per run, and only on
    /// success.
    fn accept(&mut self, path: &Path, grid: Grid, stats: GridStats) -> Result<(), SinkError>;
}

/// What happens to per-feature intermediate rasters after a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ArtifactPolicy {
    /// Keep the intermediates and archive them into one bundle.
    #[default]
    Zip,
    /// Keep the intermediates as they are.
    Retain,
    /// Do not keep intermediates.
    Delete,
}

impl ArtifactPolicy {
    /// Whether intermediates are handed to the store at all.
    pub fn keeps_artifacts(self) -> bool {
        !matches!(self, Self::Delete)
    }
}

/// Which stage produced an intermediate raster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Pass 1 output (capped cost distance).
    CostDistance,
    /// Pass 2 output (weighted influence).
    Influence,
}

/// Storage area for intermediate rasters.
///
/// A run either [`commit`](Self::commit)s the store once after the output
/// sink accepted the result, or [`discard`](Self::discard)s it on any other
/// exit path. Persistence never affects computed values.
pub trait ArtifactStore: Send {
    /// Persist one intermediate raster of `feature`.
    fn store(
        &mut self,
        kind: ArtifactKind,
        feature: FeatureId,
        grid: &Grid,
    ) -> Result<(), ArtifactError>;

    /// Finish a successful run according to `policy`.
    fn commit(&mut self, policy: ArtifactPolicy) -> Result<(), ArtifactError>;

    /// Drop everything stored so far. Must not fail.
    fn discard(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_is_a_surface() {
        let geom = GridGeometry::new(2, 2, 30.0, (0.0, 60.0)).unwrap();
        let g = Grid::new(geom, -1.0, vec![1.0, 2.0, -1.0, 4.0]).unwrap();
        let s: &dyn CostSurfaceProvider = &g;
        assert_eq!(s.cell_size(), 30.0);
        assert_eq!(s.value_range(), Some((1.0, 4.0)));
        assert_eq!(s.sample(CellIndex::new(1, 0)), None);
        assert_eq!(s.sample(CellIndex::new(1, 1)), Some(4.0));
        assert_eq!(s.extent().min_y, 0.0);
        assert_eq!(&s.materialize(), &g);
    }

    struct Sampled(Grid);

    impl CostSurfaceProvider for Sampled {
        fn geometry(&self) -> &GridGeometry {
            self.0.geometry()
        }
        fn no_data(&self) -> f64 {
            self.0.no_data()
        }
        fn sample(&self, cell: CellIndex) -> Option<f64> {
            self.0.get(cell)
        }
        fn value_range(&self) -> Option<(f64, f64)> {
            None
        }
    }

    #[test]
    fn default_materialize_samples_every_cell() {
        let geom = GridGeometry::new(2, 3, 1.0, (0.0, 2.0)).unwrap();
        let g = Grid::new(geom, -1.0, vec![1.0, -1.0, 3.0, 4.0, 5.0, -1.0]).unwrap();
        let m = Sampled(g.clone()).materialize();
        assert_eq!(m, g);
    }

    #[test]
    fn default_policy_is_zip() {
        assert_eq!(ArtifactPolicy::default(), ArtifactPolicy::Zip);
        assert!(ArtifactPolicy::Retain.keeps_artifacts());
        assert!(!ArtifactPolicy::Delete.keeps_artifacts());
    }
}
