//! Run configuration and validation.
//!
//! [`SpiConfig`] is the explicit replacement for the host environment a run
//! used to read its settings from. [`validate()`](SpiConfig::validate)
//! checks structural invariants before any input is touched; the
//! data-dependent checks live in [`preflight`](crate::preflight).

use std::path::PathBuf;

use spi_core::{ArtifactPolicy, PreconditionError};

// ── FrictionUnits ─────────────────────────────────────────────────

/// How the values of the cost surface are to be read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FrictionUnits {
    /// Cost per map unit of distance. Used as-is.
    #[default]
    PerUnitDistance,
    /// Total cost to cross one cell. Divided by the cell size before the
    /// cost-distance pass.
    PerCell,
}

// ── RunLimits ─────────────────────────────────────────────────────

/// Hard ceilings and accepted value ranges for one run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunLimits {
    /// Maximum number of features in one run. Default: 1000.
    pub max_features: usize,
    /// Maximum number of rasters a summation accepts. Default: 2500.
    pub max_fan_in: usize,
    /// Maximum number of cells in the cost surface. Default: 100 000 000.
    pub max_cells: usize,
    /// Friction must be strictly greater than this. Default: 0.
    pub min_friction_exclusive: f64,
    /// Friction must not exceed this. Default: 10 000.
    pub max_friction: f64,
    /// Mean feature weight must not exceed this. Default: 100 000.
    pub max_mean_weight: f64,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            max_features: 1000,
            max_fan_in: 2500,
            max_cells: 100_000_000,
            min_friction_exclusive: 0.0,
            max_friction: 10_000.0,
            max_mean_weight: 100_000.0,
        }
    }
}

// ── SpiConfig ─────────────────────────────────────────────────────

/// Complete configuration for one summed point influence run.
///
/// The cost surface, the features, and the output sink are collaborators
/// handed to the [`Orchestrator`](crate::Orchestrator) alongside this value.
#[derive(Clone, Debug, PartialEq)]
pub struct SpiConfig {
    /// Upper limit on cost distance; larger values are clamped to it.
    /// `0` means unlimited. Default: 0.
    pub max_cost_distance: f64,
    /// Name of the feature attribute holding the weight. `None` or empty
    /// gives every feature weight 1. Default: `None`.
    pub weight_field: Option<String>,
    /// Where the sink should write the result. Required.
    pub output_path: PathBuf,
    /// Round the result half-up to integers. Default: `false`.
    pub convert_to_integer: bool,
    /// What to do with intermediate rasters. Default: [`ArtifactPolicy::Zip`].
    pub intermediate_artifact_policy: ArtifactPolicy,
    /// Unit of the cost surface values. Default: per unit distance.
    pub friction_units: FrictionUnits,
    /// Summation branching factor. Default: 50.
    pub batch_size: usize,
    /// Worker threads. `None` = available parallelism.
    pub worker_count: Option<usize>,
    /// Ceilings and accepted ranges.
    pub limits: RunLimits,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            max_cost_distance: 0.0,
            weight_field: None,
            output_path: PathBuf::new(),
            convert_to_integer: false,
            intermediate_artifact_policy: ArtifactPolicy::default(),
            friction_units: FrictionUnits::default(),
            batch_size: 50,
            worker_count: None,
            limits: RunLimits::default(),
        }
    }
}

impl SpiConfig {
    /// Default configuration writing to `output_path`.
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            ..Self::default()
        }
    }

    /// The cost cap, or `None` when unlimited.
    pub fn cap(&self) -> Option<f64> {
        (self.max_cost_distance > 0.0).then_some(self.max_cost_distance)
    }

    /// The weight attribute, or `None` for equal weights.
    pub fn weight_field(&self) -> Option<&str> {
        self.weight_field.as_deref().filter(|f| !f.is_empty())
    }

    /// Resolve the actual worker count, applying auto-detection if `None`.
    ///
    /// Explicit values are clamped to `[1, 64]`.
    pub fn resolved_worker_count(&self) -> usize {
        match self.worker_count {
            Some(n) => n.clamp(1, 64),
            None => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
                .clamp(1, 64),
        }
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<(), PreconditionError> {
        let invalid = |reason: String| Err(PreconditionError::InvalidConfig { reason });

        if !(self.max_cost_distance.is_finite() && self.max_cost_distance >= 0.0) {
            return invalid(format!(
                "max_cost_distance must be finite and >= 0, got {}",
                self.max_cost_distance
            ));
        }
        if self.output_path.as_os_str().is_empty() {
            return invalid("output_path is required".into());
        }
        if self.batch_size == 0 {
            return invalid("batch_size must be at least 1".into());
        }
        let l = &self.limits;
        if l.max_features == 0 {
            return invalid("limits.max_features must be at least 1".into());
        }
        if l.max_fan_in == 0 {
            return invalid("limits.max_fan_in must be at least 1".into());
        }
        if l.max_cells == 0 {
            return invalid("limits.max_cells must be at least 1".into());
        }
        if !(l.min_friction_exclusive.is_finite()
            && l.max_friction.is_finite()
            && l.min_friction_exclusive < l.max_friction)
        {
            return invalid(format!(
                "friction range ({}, {}] is empty or not finite",
                l.min_friction_exclusive, l.max_friction
            ));
        }
        if !(l.max_mean_weight.is_finite() && l.max_mean_weight >= 0.0) {
            return invalid(format!(
                "limits.max_mean_weight must be finite and >= 0, got {}",
                l.max_mean_weight
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reason(cfg: &SpiConfig) -> String {
        match cfg.validate() {
            Err(PreconditionError::InvalidConfig { reason }) => reason,
            other => panic!("expected InvalidConfig, got {other:?}"),
        }
    }

    #[test]
    fn defaults_match_tool_defaults() {
        let cfg = SpiConfig::new("out/spi");
        assert_eq!(cfg.batch_size, 50);
        assert_eq!(cfg.limits.max_features, 1000);
        assert_eq!(cfg.limits.max_fan_in, 2500);
        assert_eq!(cfg.intermediate_artifact_policy, ArtifactPolicy::Zip);
        assert!(!cfg.convert_to_integer);
        assert!(cfg.cap().is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn missing_output_path_rejected() {
        assert!(reason(&SpiConfig::default()).contains("output_path"));
    }

    #[test]
    fn bad_cap_rejected() {
        for bad in [-1.0, f64::NAN, f64::INFINITY] {
            let cfg = SpiConfig {
                max_cost_distance: bad,
                ..SpiConfig::new("out")
            };
            assert!(reason(&cfg).contains("max_cost_distance"));
        }
    }

    #[test]
    fn zero_batch_size_rejected() {
        let cfg = SpiConfig {
            batch_size: 0,
            ..SpiConfig::new("out")
        };
        assert!(reason(&cfg).contains("batch_size"));
    }

    #[test]
    fn empty_friction_range_rejected() {
        let mut cfg = SpiConfig::new("out");
        cfg.limits.max_friction = 0.0;
        assert!(reason(&cfg).contains("friction range"));
    }

    #[test]
    fn cap_zero_means_unlimited() {
        let mut cfg = SpiConfig::new("out");
        assert_eq!(cfg.cap(), None);
        cfg.max_cost_distance = 10.0;
        assert_eq!(cfg.cap(), Some(10.0));
    }

    #[test]
    fn empty_weight_field_means_equal_weights() {
        let mut cfg = SpiConfig::new("out");
        cfg.weight_field = Some(String::new());
        assert_eq!(cfg.weight_field(), None);
        cfg.weight_field = Some("pop".into());
        assert_eq!(cfg.weight_field(), Some("pop"));
    }

    #[test]
    fn worker_count_clamped() {
        let mut cfg = SpiConfig::new("out");
        cfg.worker_count = Some(0);
        assert_eq!(cfg.resolved_worker_count(), 1);
        cfg.worker_count = Some(1000);
        assert_eq!(cfg.resolved_worker_count(), 64);
        cfg.worker_count = None;
        assert!(cfg.resolved_worker_count() >= 1);
    }
}
