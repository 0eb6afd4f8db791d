//! Two-pass pipeline driving one summed point influence run.
//!
//! [`Orchestrator`] owns the configuration and the collaborators and runs
//! the pipeline on [`run()`](Orchestrator::run):
//!
//! 1. **Init**: validate the configuration, read and check the inputs.
//! 2. **Pass1**: cost distance per feature on the worker pool, then fold the
//!    global maximum after the join.
//! 3. **Pass2**: normalize every cost raster against that maximum and
//!    weight it.
//! 4. **Aggregate**: batched summation of the influence rasters.
//! 5. **Finalize**: fill unreachable valid cells with 0, quantize if asked,
//!    emit to the sink, commit the working area.
//!
//! # Atomicity
//!
//! The sink is called at most once, as the last computing step. Any error
//! before it leaves the sink untouched, discards the working area, and puts
//! the orchestrator in [`RunState::Failed`].

use std::time::Instant;

use spi_core::{
    ArtifactKind, ArtifactStore, ComputationError, CostSurfaceProvider, Feature, FeatureProvider,
    Grid, OutputSink, RunError,
};
use tracing::{debug, error, info, warn};

use crate::config::SpiConfig;
use crate::cost_distance::{CostDistanceEngine, CostDistanceRaster};
use crate::influence::{normalize_and_weight, InfluenceRaster, InfluenceScale};
use crate::metrics::{micros_since, RunReport};
use crate::pool::WorkerPool;
use crate::preflight::{self, Prepared};
use crate::quantize::quantize;
use crate::state::RunState;
use crate::summation::{BatchedSummation, Summation};
use crate::working_area::WorkingArea;

// Compile-time assertion: Orchestrator is Send.
const _: () = {
    #[allow(dead_code)]
    fn assert_send<T: Send>() {}
    #[allow(dead_code)]
    fn check() {
        assert_send::<Orchestrator>();
    }
};

// ── Orchestrator ─────────────────────────────────────────────────

/// Runs the summed point influence pipeline over a set of collaborators.
///
/// # Example
///
/// ```
/// use spi_core::CellIndex;
/// use spi_engine::{Orchestrator, RunState, SpiConfig};
/// use spi_test_utils::{
///     point_records, uniform_surface, MemoryArtifactStore, MemorySink, VecFeatureProvider,
/// };
///
/// let sink = MemorySink::new();
/// let output = sink.log();
/// let mut orchestrator = Orchestrator::new(
///     SpiConfig::new("spi.tif"),
///     Box::new(uniform_surface(5, 5, 1.0)),
///     Box::new(VecFeatureProvider::new(point_records(&[(2, 2)], &[1.0]))),
///     Box::new(sink),
/// )
/// .with_artifact_store(Box::new(MemoryArtifactStore::new()));
///
/// let report = orchestrator.run()?;
/// assert_eq!(orchestrator.state(), RunState::Done);
/// assert_eq!(report.feature_count, 1);
/// assert_eq!(output.single().grid.get(CellIndex::new(2, 2)), Some(1.0));
/// # Ok::<(), spi_core::RunError>(())
/// ```
pub struct Orchestrator {
    config: SpiConfig,
    surface: Box<dyn CostSurfaceProvider>,
    features: Box<dyn FeatureProvider>,
    sink: Box<dyn OutputSink>,
    artifacts: Option<Box<dyn ArtifactStore>>,
    state: RunState,
    history: Vec<RunState>,
}

impl Orchestrator {
    /// Bind a configuration to its collaborators. Nothing is read until
    /// [`run()`](Self::run).
    pub fn new(
        config: SpiConfig,
        surface: Box<dyn CostSurfaceProvider>,
        features: Box<dyn FeatureProvider>,
        sink: Box<dyn OutputSink>,
    ) -> Self {
        Self {
            config,
            surface,
            features,
            sink,
            artifacts: None,
            state: RunState::Init,
            history: Vec::new(),
        }
    }

    /// Hand intermediate rasters to `store` according to the configured
    /// [`ArtifactPolicy`](spi_core::ArtifactPolicy).
    pub fn with_artifact_store(mut self, store: Box<dyn ArtifactStore>) -> Self {
        self.artifacts = Some(store);
        self
    }

    /// The run configuration.
    pub fn config(&self) -> &SpiConfig {
        &self.config
    }

    /// State at the end of the last run, `Init` before the first.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// States entered during the last run, in order.
    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    /// Execute the pipeline once.
    ///
    /// Every call starts from `Init` and reads the collaborators afresh;
    /// identical inputs give bit-for-bit identical output whatever the
    /// worker count.
    ///
    /// # Errors
    ///
    /// Returns the first [`RunError`] encountered. The sink has then not
    /// been called, intermediates are discarded, and [`state()`](Self::state)
    /// is `Failed` with the error's kind.
    pub fn run(&mut self) -> Result<RunReport, RunError> {
        let started = Instant::now();
        let mut tracker = Tracker::new();
        let mut report = RunReport::default();
        info!(output = %self.config.output_path.display(), "run started");

        let store = match self.artifacts.as_mut() {
            Some(store) => Some(&mut **store as &mut dyn ArtifactStore),
            None => None,
        };
        let area = WorkingArea::new(store, self.config.intermediate_artifact_policy);
        let outcome = execute(
            &self.config,
            self.surface.as_ref(),
            self.features.as_ref(),
            self.sink.as_mut(),
            area,
            &mut tracker,
            &mut report,
        );

        let result = match outcome {
            Ok(()) => {
                report.total_us = micros_since(started);
                report.states = tracker.history.clone();
                info!(
                    features = report.feature_count,
                    total_us = report.total_us,
                    "run complete"
                );
                Ok(report)
            }
            Err(e) => {
                let during = tracker.state;
                tracker.fail(e.kind());
                error!(state = %during, kind = %e.kind(), error = %e, "run failed");
                Err(e)
            }
        };
        self.state = tracker.state;
        self.history = tracker.history;
        result
    }
}

// ── Pipeline ─────────────────────────────────────────────────────

/// Current state plus the states entered so far.
struct Tracker {
    state: RunState,
    history: Vec<RunState>,
}

impl Tracker {
    fn new() -> Self {
        Self {
            state: RunState::Init,
            history: vec![RunState::Init],
        }
    }

    fn advance(&mut self, next: RunState) -> Result<(), ComputationError> {
        self.state.transition(next)?;
        self.history.push(next);
        info!(state = %next, "state entered");
        Ok(())
    }

    fn fail(&mut self, kind: spi_core::ErrorKind) {
        let failed = RunState::Failed(kind);
        if self.state.transition(failed).is_ok() {
            self.history.push(failed);
        }
    }
}

fn execute(
    config: &SpiConfig,
    surface: &dyn CostSurfaceProvider,
    provider: &dyn FeatureProvider,
    sink: &mut dyn OutputSink,
    mut area: WorkingArea<'_>,
    tracker: &mut Tracker,
    report: &mut RunReport,
) -> Result<(), RunError> {
    // Init
    let stage = Instant::now();
    config.validate()?;
    let Prepared { friction, features } = preflight::prepare(config, surface, provider)?;
    let n = features.len();
    let workers = config.resolved_worker_count().min(n);
    let pool = WorkerPool::new(workers);
    report.feature_count = n;
    report.workers = workers;
    report.init_us = micros_since(stage);
    info!(
        features = n,
        workers,
        policy = ?area.policy(),
        elapsed_us = report.init_us,
        "inputs validated"
    );

    // Pass 1
    tracker.advance(RunState::Pass1)?;
    let stage = Instant::now();
    let engine = CostDistanceEngine::new(&friction, config.max_cost_distance);
    let ordered: Vec<&Feature> = features.iter().collect();
    let costs = pool.map(ordered, |_, feature| {
        let raster = engine.compute_for(feature)?;
        debug!(
            feature = %feature.id(),
            finite_max = raster.finite_max(),
            "cost distance computed"
        );
        Ok(raster)
    })?;
    for cost in &costs {
        area.keep(ArtifactKind::CostDistance, cost.feature(), cost.grid())?;
    }
    let scale = InfluenceScale::from_maxima(costs.iter().map(CostDistanceRaster::finite_max));
    if !scale.global_max().is_finite() {
        return Err(ComputationError::NonFiniteResult {
            what: "global maximum cost distance",
            value: scale.global_max(),
        }
        .into());
    }
    report.global_max = scale.global_max();
    report.degenerate_scale = scale.is_degenerate();
    report.pass1_us = micros_since(stage);
    info!(
        features = n,
        global_max = scale.global_max(),
        elapsed_us = report.pass1_us,
        "pass 1 complete"
    );
    if scale.is_degenerate() {
        warn!("global maximum cost distance is 0; every influence equals its weight");
    }

    // Pass 2
    tracker.advance(RunState::Pass2)?;
    let stage = Instant::now();
    let weighted: Vec<(CostDistanceRaster, f64)> = costs
        .into_iter()
        .zip(features.iter().map(Feature::weight))
        .collect();
    let influences = pool.map(weighted, |_, (cost, weight)| {
        Ok(normalize_and_weight(cost, scale, weight))
    })?;
    for influence in &influences {
        area.keep(ArtifactKind::Influence, influence.feature(), influence.grid())?;
    }
    report.pass2_us = micros_since(stage);
    info!(features = n, elapsed_us = report.pass2_us, "pass 2 complete");

    // Aggregate
    tracker.advance(RunState::Aggregate)?;
    let stage = Instant::now();
    let summation = BatchedSummation::new(config.batch_size, config.limits.max_fan_in);
    let grids: Vec<Grid> = influences
        .into_iter()
        .map(InfluenceRaster::into_grid)
        .collect();
    let Summation {
        total,
        batch_count,
        levels,
    } = summation.sum_with(grids, &pool)?;
    report.batch_count = batch_count;
    report.summation_levels = levels;
    report.aggregate_us = micros_since(stage);
    info!(
        batch_count,
        levels,
        elapsed_us = report.aggregate_us,
        "aggregation complete"
    );

    // Finalize
    tracker.advance(RunState::Finalize)?;
    let stage = Instant::now();
    let (mut total, filled) = fill_unreachable(total, &friction);
    if filled > 0 {
        warn!(cells = filled, "valid cells unreachable from every feature set to 0");
    }
    report.unreachable_filled = filled;
    if config.convert_to_integer {
        total = quantize(total);
    }
    let stats = total.stats();
    report.output = Some(stats);
    sink.accept(&config.output_path, total, stats)?;
    area.commit()?;
    report.finalize_us = micros_since(stage);
    info!(
        min = ?stats.min,
        max = ?stats.max,
        mean = ?stats.mean,
        elapsed_us = report.finalize_us,
        "output emitted"
    );

    tracker.advance(RunState::Done)?;
    Ok(())
}

/// Set every cell that is valid in `friction` but NoData in `total` to 0.
/// Returns the grid and the number of cells filled.
fn fill_unreachable(mut total: Grid, friction: &Grid) -> (Grid, usize) {
    let mut filled = 0;
    for i in 0..total.len() {
        if total.is_no_data(i) && !friction.is_no_data(i) {
            total.values_mut()[i] = 0.0;
            filled += 1;
        }
    }
    (total, filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use spi_core::{ErrorKind, PreconditionError};
    use spi_test_utils::{surface_from_rows, uniform_surface, MemorySink, VecFeatureProvider, ND};

    fn orchestrator(surface: Grid, cells: &[(u32, u32)]) -> (Orchestrator, spi_test_utils::SinkLog) {
        let sink = MemorySink::new();
        let log = sink.log();
        let o = Orchestrator::new(
            SpiConfig::new("spi.tif"),
            Box::new(surface),
            Box::new(VecFeatureProvider::points(cells)),
            Box::new(sink),
        );
        (o, log)
    }

    #[test]
    fn fresh_orchestrator_is_in_init() {
        let (o, _) = orchestrator(uniform_surface(2, 2, 1.0), &[(0, 0)]);
        assert_eq!(o.state(), RunState::Init);
        assert!(o.history().is_empty());
    }

    #[test]
    fn successful_run_visits_every_state() {
        let (mut o, log) = orchestrator(uniform_surface(3, 3, 1.0), &[(1, 1)]);
        let report = o.run().unwrap();
        assert_eq!(o.state(), RunState::Done);
        assert_eq!(
            report.states,
            vec![
                RunState::Init,
                RunState::Pass1,
                RunState::Pass2,
                RunState::Aggregate,
                RunState::Finalize,
                RunState::Done,
            ]
        );
        assert_eq!(o.history(), report.states.as_slice());
        assert_eq!(log.accept_count(), 1);
        assert_eq!(report.feature_count, 1);
        assert_eq!(report.batch_count, 1);
    }

    #[test]
    fn failure_records_kind_and_state() {
        let (mut o, log) = orchestrator(surface_from_rows(&[&[ND, 1.0]]), &[(0, 0)]);
        let err = o.run().unwrap_err();
        assert_eq!(
            err,
            RunError::Precondition(PreconditionError::FeaturesOnNoData {
                ids: vec![spi_core::FeatureId(0)]
            })
        );
        assert_eq!(o.state(), RunState::Failed(ErrorKind::Precondition));
        assert_eq!(
            o.history(),
            &[RunState::Init, RunState::Failed(ErrorKind::Precondition)]
        );
        assert_eq!(log.accept_count(), 0);
    }

    #[test]
    fn fill_unreachable_only_touches_valid_friction() {
        let friction = surface_from_rows(&[&[1.0, ND, 1.0]]);
        let total = surface_from_rows(&[&[0.5, ND, ND]]);
        let (filled_grid, filled) = fill_unreachable(total, &friction);
        assert_eq!(filled, 1);
        assert_eq!(filled_grid.values(), &[0.5, ND, 0.0]);
    }

    #[test]
    fn rerun_is_idempotent() {
        let (mut o, log) = orchestrator(uniform_surface(4, 4, 2.0), &[(0, 0), (3, 3)]);
        o.run().unwrap();
        o.run().unwrap();
        let outputs = log.outputs();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].grid, outputs[1].grid);
    }
}
