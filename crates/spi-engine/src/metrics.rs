//! Per-run metrics.
//!
//! [`RunReport`] captures timing and shape data for one successful run.

use spi_core::GridStats;

use crate::state::RunState;

/// Timing and summary data collected during one run.
///
/// All durations are in microseconds.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunReport {
    /// Wall-clock time for the whole run, in microseconds.
    pub total_us: u64,
    /// Time spent validating inputs, in microseconds.
    pub init_us: u64,
    /// Time spent computing cost distance, in microseconds.
    pub pass1_us: u64,
    /// Time spent computing influence, in microseconds.
    pub pass2_us: u64,
    /// Time spent summing, in microseconds.
    pub aggregate_us: u64,
    /// Time spent filling, quantizing, and emitting, in microseconds.
    pub finalize_us: u64,
    /// Number of features processed.
    pub feature_count: usize,
    /// Number of first-level summation batches.
    pub batch_count: usize,
    /// Number of summation levels.
    pub summation_levels: usize,
    /// Largest capped finite cost distance over all features.
    pub global_max: f64,
    /// Whether `global_max` was 0, making every influence equal its weight.
    pub degenerate_scale: bool,
    /// Valid friction cells no feature could reach, written as 0.
    pub unreachable_filled: usize,
    /// Worker threads used.
    pub workers: usize,
    /// States entered, in order.
    pub states: Vec<RunState>,
    /// Statistics of the emitted grid.
    pub output: Option<GridStats>,
}

/// Microseconds elapsed since `start`.
pub(crate) fn micros_since(start: std::time::Instant) -> u64 {
    start.elapsed().as_micros() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_report_is_empty() {
        let r = RunReport::default();
        assert_eq!(r.total_us, 0);
        assert_eq!(r.feature_count, 0);
        assert!(!r.degenerate_scale);
        assert!(r.states.is_empty());
        assert!(r.output.is_none());
    }
}
