//! Test utilities and in-memory collaborators for SPI development.
//!
//! Provides in-memory implementations of the collaborator traits
//! ([`CostSurfaceProvider`], [`FeatureProvider`], [`OutputSink`],
//! [`ArtifactStore`]) that record what the engine does to them, plus
//! surface fixtures in [`fixtures`].

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

pub use fixtures::{
    first_valid_cell, point_records, random_rasters, random_surface, spread_records,
    surface_from_rows, uniform_surface, unit_geometry, ND,
};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use spi_core::{
    ArtifactError, ArtifactKind, ArtifactPolicy, ArtifactStore, CellIndex, CostSurfaceProvider,
    FeatureId, FeatureProvider, FeatureRecord, Grid, GridGeometry, GridStats, OutputSink,
    SinkError,
};

// ── Surfaces ──────────────────────────────────────────────────────

/// A surface whose declared geometry can disagree with the raster it
/// materializes. Behaves like the wrapped grid otherwise.
pub struct MemorySurface {
    grid: Grid,
    declared: GridGeometry,
}

impl MemorySurface {
    pub fn new(grid: Grid) -> Self {
        let declared = *grid.geometry();
        Self { grid, declared }
    }

    /// Declare `geometry` while still materializing the wrapped grid.
    pub fn declaring(mut self, geometry: GridGeometry) -> Self {
        self.declared = geometry;
        self
    }
}

impl CostSurfaceProvider for MemorySurface {
    fn geometry(&self) -> &GridGeometry {
        &self.declared
    }

    fn no_data(&self) -> f64 {
        self.grid.no_data()
    }

    fn sample(&self, cell: CellIndex) -> Option<f64> {
        self.grid.get(cell)
    }

    fn value_range(&self) -> Option<(f64, f64)> {
        CostSurfaceProvider::value_range(&self.grid)
    }

    fn materialize(&self) -> Grid {
        self.grid.clone()
    }
}

// ── Features ──────────────────────────────────────────────────────

/// Feature provider over a vector of records.
///
/// Counts calls to [`records`](FeatureProvider::records) so tests can
/// assert that ceilings are checked before any record is read.
pub struct VecFeatureProvider {
    records: Vec<FeatureRecord>,
    reads: Arc<AtomicUsize>,
}

impl VecFeatureProvider {
    pub fn new(records: Vec<FeatureRecord>) -> Self {
        Self {
            records,
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Single-cell features with weight 1, ids `0..n`.
    pub fn points(cells: &[(u32, u32)]) -> Self {
        Self::new(
            cells
                .iter()
                .enumerate()
                .map(|(i, &(r, c))| FeatureRecord::new(FeatureId(i as u64), [CellIndex::new(r, c)]))
                .collect(),
        )
    }

    /// Handle reporting how many times the records were read.
    pub fn read_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.reads)
    }
}

impl FeatureProvider for VecFeatureProvider {
    fn feature_count(&self) -> usize {
        self.records.len()
    }

    fn records(&self) -> Vec<FeatureRecord> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.records.clone()
    }
}

// ── Sinks ─────────────────────────────────────────────────────────

/// One accepted output.
#[derive(Clone, Debug)]
pub struct SinkOutput {
    pub path: PathBuf,
    pub grid: Grid,
    pub stats: GridStats,
}

/// Shared view of what a [`MemorySink`] received.
#[derive(Clone, Default)]
pub struct SinkLog(Arc<Mutex<Vec<SinkOutput>>>);

impl SinkLog {
    /// Every accepted output, in call order.
    pub fn outputs(&self) -> Vec<SinkOutput> {
        self.0.lock().unwrap().clone()
    }

    /// Number of `accept` calls.
    pub fn accept_count(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    /// The only accepted output. Panics unless exactly one was accepted.
    pub fn single(&self) -> SinkOutput {
        let outputs = self.outputs();
        assert_eq!(outputs.len(), 1, "expected exactly one output");
        outputs.into_iter().next().unwrap()
    }
}

/// Sink that keeps every grid in memory.
#[derive(Default)]
pub struct MemorySink {
    log: SinkLog,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> SinkLog {
        self.log.clone()
    }
}

impl OutputSink for MemorySink {
    fn accept(&mut self, path: &Path, grid: Grid, stats: GridStats) -> Result<(), SinkError> {
        self.log.0.lock().unwrap().push(SinkOutput {
            path: path.to_path_buf(),
            grid,
            stats,
        });
        Ok(())
    }
}

/// Sink that rejects every output.
pub struct FailingSink {
    pub reason: String,
}

impl FailingSink {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl OutputSink for FailingSink {
    fn accept(&mut self, _path: &Path, _grid: Grid, _stats: GridStats) -> Result<(), SinkError> {
        Err(SinkError {
            reason: self.reason.clone(),
        })
    }
}

// ── Artifact store ────────────────────────────────────────────────

/// Recorded lifecycle of a [`MemoryArtifactStore`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ArtifactLog {
    /// `(kind, feature)` of every stored raster, in call order.
    pub stored: Vec<(ArtifactKind, FeatureId)>,
    /// Copies of the stored rasters, parallel to `stored`.
    pub grids: Vec<Grid>,
    /// Policy passed to `commit`, if it was called.
    pub committed: Option<ArtifactPolicy>,
    /// Whether `discard` was called.
    pub discarded: bool,
}

/// Artifact store that records calls instead of persisting rasters.
#[derive(Default)]
pub struct MemoryArtifactStore {
    log: Arc<Mutex<ArtifactLog>>,
    fail_after: Option<usize>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every `store` call after the first `n` succeed.
    pub fn failing_after(n: usize) -> Self {
        Self {
            fail_after: Some(n),
            ..Self::default()
        }
    }

    /// Shared handle to the recorded lifecycle.
    pub fn log(&self) -> Arc<Mutex<ArtifactLog>> {
        Arc::clone(&self.log)
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn store(
        &mut self,
        kind: ArtifactKind,
        feature: FeatureId,
        grid: &Grid,
    ) -> Result<(), ArtifactError> {
        let mut log = self.log.lock().unwrap();
        if self.fail_after.is_some_and(|n| log.stored.len() >= n) {
            return Err(ArtifactError {
                reason: format!("store full at feature {feature}"),
            });
        }
        log.stored.push((kind, feature));
        log.grids.push(grid.clone());
        Ok(())
    }

    fn commit(&mut self, policy: ArtifactPolicy) -> Result<(), ArtifactError> {
        self.log.lock().unwrap().committed = Some(policy);
        Ok(())
    }

    fn discard(&mut self) {
        let mut log = self.log.lock().unwrap();
        log.stored.clear();
        log.grids.clear();
        log.discarded = true;
    }
}
