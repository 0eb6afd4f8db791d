//! Benchmark profiles for summed point influence runs.
//!
//! Provides pre-built inputs for benchmarking:
//!
//! - [`reference_profile`]: 100x100 surface (10K cells), 50 features
//! - [`stress_profile`]: 316x316 surface (~100K cells), 500 features
//! - [`feature_cells`]: deterministic feature placement via seed

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::Path;

use spi_core::{
    CellIndex, FeatureId, FeatureRecord, FeatureProvider, Grid, GridGeometry, GridStats,
    OutputSink, SinkError, DEFAULT_NO_DATA,
};
use spi_engine::{Orchestrator, SpiConfig};

/// Inputs of one benchmark run.
#[derive(Clone, Debug)]
pub struct BenchProfile {
    /// Friction surface.
    pub surface: Grid,
    /// Features in batch order.
    pub records: Vec<FeatureRecord>,
    /// Run configuration.
    pub config: SpiConfig,
}

impl BenchProfile {
    /// An orchestrator over this profile that discards its output.
    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            self.config.clone(),
            Box::new(self.surface.clone()),
            Box::new(Records(self.records.clone())),
            Box::new(NullSink),
        )
    }
}

/// Build a reference profile: 100x100 surface (10K cells), 50 features,
/// cap 0, batch size 50.
pub fn reference_profile(seed: u64) -> BenchProfile {
    profile(100, 50, seed)
}

/// Build a stress profile: 316x316 surface (~100K cells), 500 features.
///
/// Same layout as [`reference_profile`] at 10x the cell count.
pub fn stress_profile(seed: u64) -> BenchProfile {
    profile(316, 500, seed)
}

fn profile(side: u32, features: usize, seed: u64) -> BenchProfile {
    let surface = friction_surface(side, side, seed);
    let cells = feature_cells(&surface, features, seed);
    let records = cells
        .into_iter()
        .enumerate()
        .map(|(i, cell)| FeatureRecord::new(FeatureId(i as u64), [cell]))
        .collect();
    BenchProfile {
        surface,
        records,
        config: SpiConfig::new("bench.tif"),
    }
}

/// A friction surface with values in `[1, 9]` and a NoData river along the
/// main diagonal broken every 10 cells.
pub fn friction_surface(rows: u32, cols: u32, seed: u64) -> Grid {
    let geometry = GridGeometry::new(rows, cols, 30.0, (0.0, 30.0 * rows as f64))
        .expect("benchmark geometry is valid");
    let mut grid = Grid::filled(geometry, DEFAULT_NO_DATA, 1.0);
    for (i, v) in grid.values_mut().iter_mut().enumerate() {
        let (r, c) = (i as u32 / cols, i as u32 % cols);
        *v = if r == c && r % 10 != 0 {
            DEFAULT_NO_DATA
        } else {
            1.0 + (mix(seed, i as u64) % 9) as f64
        };
    }
    grid
}

/// Deterministic feature cells on valid cells of `surface`.
///
/// Spreads `n` cells with a simple hash of the seed, probing forward past
/// NoData cells.
pub fn feature_cells(surface: &Grid, n: usize, seed: u64) -> Vec<CellIndex> {
    let len = surface.len();
    (0..n as u64)
        .map(|i| {
            let mut pos = (mix(seed, i) % len as u64) as usize;
            while surface.is_no_data(pos) {
                pos = (pos + 1) % len;
            }
            surface.geometry().cell_of(pos)
        })
        .collect()
}

fn mix(seed: u64, i: u64) -> u64 {
    seed.wrapping_mul(6364136223846793005)
        .wrapping_add(i.wrapping_mul(1442695040888963407))
        >> 17
}

struct Records(Vec<FeatureRecord>);

impl FeatureProvider for Records {
    fn feature_count(&self) -> usize {
        self.0.len()
    }

    fn records(&self) -> Vec<FeatureRecord> {
        self.0.clone()
    }
}

struct NullSink;

impl OutputSink for NullSink {
    fn accept(&mut self, _path: &Path, _grid: Grid, _stats: GridStats) -> Result<(), SinkError> {
        Ok(())
    }
}
