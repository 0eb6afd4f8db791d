//! Accumulated-cost distance from a feature's source cells.
//!
//! The friction grid is treated as a graph with one node per valid cell and
//! edges to the 8 neighbours. Moving from `a` to `b` costs
//!
//! ```text
//! step(a, b) = cell_size * (√2 if diagonal else 1) * (friction(a) + friction(b)) / 2
//! ```
//!
//! and the cost distance of a cell is the cheapest sum of steps from any
//! source cell. All sources are seeded at cost 0 and expanded together
//! (multi-source Dijkstra). Cells that no path reaches stay NoData.
//!
//! Ties between equal tentative costs are broken by insertion order, so a
//! run is deterministic. Only the minimum cost is meaningful, not the path.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::f64::consts::SQRT_2;

use spi_core::{derived_no_data, CellIndex, ComputationError, Feature, FeatureId, Grid};

/// Cost-distance raster for one feature, with its largest finite value.
#[derive(Clone, Debug, PartialEq)]
pub struct CostDistanceRaster {
    feature: FeatureId,
    grid: Grid,
    finite_max: f64,
}

impl CostDistanceRaster {
    /// The feature this raster belongs to.
    pub fn feature(&self) -> FeatureId {
        self.feature
    }

    /// The accumulated-cost values. Unreachable and NoData cells are NoData,
    /// under a sentinel no cost can equal.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Largest finite cost after capping. Zero when only the sources are
    /// reachable.
    pub fn finite_max(&self) -> f64 {
        self.finite_max
    }

    /// Consume the raster, returning its grid.
    pub fn into_grid(self) -> Grid {
        self.grid
    }
}

/// Computes [`CostDistanceRaster`]s over one friction grid.
///
/// The friction values must already be in cost per unit distance.
#[derive(Clone, Copy, Debug)]
pub struct CostDistanceEngine<'a> {
    friction: &'a Grid,
    cap: f64,
}

impl<'a> CostDistanceEngine<'a> {
    /// An engine over `friction`. A positive `cap` clamps every finite
    /// result to at most `cap`; `0` leaves costs unlimited.
    pub fn new(friction: &'a Grid, cap: f64) -> Self {
        Self { friction, cap }
    }

    /// The friction grid.
    pub fn friction(&self) -> &'a Grid {
        self.friction
    }

    /// Cost distance from every source cell of `feature`.
    pub fn compute_for(&self, feature: &Feature) -> Result<CostDistanceRaster, ComputationError> {
        self.compute(feature.id(), feature.cells())
    }

    /// Cost distance from `sources`, reported under `feature`.
    pub fn compute(
        &self,
        feature: FeatureId,
        sources: &[CellIndex],
    ) -> Result<CostDistanceRaster, ComputationError> {
        let friction = self.friction;
        let geom = friction.geometry();
        let n = geom.cell_count();

        // Sources cost 0, so the friction sentinel may not be usable here.
        let no_data = derived_no_data(friction.no_data());
        let mut out = Grid::filled(*geom, no_data, f64::INFINITY);
        let dist = out.values_mut();
        let mut settled = vec![false; n];
        let mut heap = BinaryHeap::new();
        let mut seq = 0u64;

        for &cell in sources {
            let idx = geom
                .flat_index(cell)
                .ok_or(ComputationError::SourceOutOfBounds { id: feature, cell })?;
            if friction.is_no_data(idx) {
                return Err(ComputationError::SourceOnNoData { id: feature, cell });
            }
            if dist[idx] > 0.0 {
                dist[idx] = 0.0;
                heap.push(HeapEntry { cost: 0.0, seq, idx });
                seq += 1;
            }
        }

        let straight = geom.cell_size();
        let diagonal = straight * SQRT_2;
        let values = friction.values();

        while let Some(HeapEntry { cost, idx, .. }) = heap.pop() {
            if settled[idx] || cost > dist[idx] {
                continue;
            }
            settled[idx] = true;
            let here = values[idx];

            for nb in geom.neighbours(idx) {
                if settled[nb.index] {
                    continue;
                }
                let Some(there) = friction.value_at(nb.index) else {
                    continue;
                };
                let length = if nb.diagonal { diagonal } else { straight };
                let next = cost + length * 0.5 * (here + there);
                if next < dist[nb.index] {
                    dist[nb.index] = next;
                    heap.push(HeapEntry {
                        cost: next,
                        seq,
                        idx: nb.index,
                    });
                    seq += 1;
                }
            }
        }

        // Clamp only after the traversal: capped values must not feed back
        // into path costs through the capped cells.
        let cap = (self.cap > 0.0).then_some(self.cap);
        let mut finite_max = 0.0f64;
        for d in dist.iter_mut() {
            if d.is_finite() {
                if let Some(cap) = cap {
                    *d = d.min(cap);
                }
                finite_max = finite_max.max(*d);
            } else {
                *d = no_data;
            }
        }

        Ok(CostDistanceRaster {
            feature,
            grid: out,
            finite_max,
        })
    }
}

/// Min-heap entry: smallest cost first, then earliest insertion.
#[derive(Debug)]
struct HeapEntry {
    cost: f64,
    seq: u64,
    idx: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}
