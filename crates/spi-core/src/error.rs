//! Error types for summed point influence runs.
//!
//! Failures are grouped by where they are detected: [`PreconditionError`]
//! before any computation, [`ResourceLimitError`] at the run and fan-in
//! ceilings, and [`ComputationError`] for internal inconsistencies during
//! the passes. [`RunError`] wraps all of them, and [`ErrorKind`] is the
//! payload-free discriminant recorded by the orchestrator's `Failed` state.

use crate::id::{CellIndex, FeatureId};
use crate::geometry::GridGeometry;

/// Errors from [`GridGeometry`] construction.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum GeometryError {
    /// Attempted to construct a grid with zero rows or columns.
    #[error("grid must have at least one row and one column")]
    EmptyGrid,
    /// An axis exceeds the supported maximum.
    #[error("{name} = {value} exceeds maximum {max}")]
    DimensionTooLarge {
        /// Which axis (`"rows"` or `"cols"`).
        name: &'static str,
        /// The requested size.
        value: u32,
        /// The largest supported size.
        max: u32,
    },
    /// Cell size is zero, negative, or not finite.
    #[error("cell size must be finite and positive, got {value}")]
    InvalidCellSize {
        /// The rejected cell size.
        value: f64,
    },
    /// Origin coordinates are not finite.
    #[error("origin ({x}, {y}) is not finite")]
    InvalidOrigin {
        /// Origin x.
        x: f64,
        /// Origin y.
        y: f64,
    },
    /// `rows * cols` does not fit in `usize`.
    #[error("{rows} x {cols} cells overflows the address space")]
    CellCountOverflow {
        /// Requested rows.
        rows: u32,
        /// Requested columns.
        cols: u32,
    },
    /// A value buffer does not match the geometry's cell count.
    #[error("value buffer has {actual} cells, geometry needs {expected}")]
    BufferSizeMismatch {
        /// `rows * cols`.
        expected: usize,
        /// Length of the supplied buffer.
        actual: usize,
    },
}

/// Input that violates a precondition of the run. Detected before any
/// cost-distance computation starts.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum PreconditionError {
    /// Two grids that must share a layout do not.
    #[error("grid misaligned: expected {expected:?}, found {found:?}")]
    Misaligned {
        /// The reference geometry.
        expected: GridGeometry,
        /// The offending geometry.
        found: GridGeometry,
    },
    /// A grid geometry could not be constructed.
    #[error("invalid geometry: {0}")]
    Geometry(#[from] GeometryError),
    /// Configuration failed validation.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with the configuration.
        reason: String,
    },
    /// A summation was asked to add zero rasters.
    #[error("no rasters to sum")]
    NoRasters,
    /// The feature provider yielded no features.
    #[error("feature set is empty")]
    EmptyFeatureSet,
    /// Two features share one id.
    #[error("duplicate feature id {id}")]
    DuplicateFeature {
        /// The repeated id.
        id: FeatureId,
    },
    /// A feature has an empty footprint.
    #[error("feature {id} has no source cells")]
    NoSourceCells {
        /// The feature.
        id: FeatureId,
    },
    /// A weight attribute was requested but a feature lacks it.
    #[error("feature {id} has no value for weight field '{field}'")]
    MissingWeight {
        /// The feature.
        id: FeatureId,
        /// Name of the weight attribute.
        field: String,
    },
    /// A weight is negative or not finite.
    #[error("feature {id} has invalid weight {value}")]
    InvalidWeight {
        /// The feature.
        id: FeatureId,
        /// The rejected weight.
        value: f64,
    },
    /// The mean feature weight exceeds the configured ceiling.
    #[error("mean weight {mean} exceeds {max}; rescale weights to a narrower range")]
    WeightMeanTooLarge {
        /// The observed mean.
        mean: f64,
        /// The ceiling.
        max: f64,
    },
    /// The friction surface has more cells than allowed.
    #[error("cost surface has {cells} cells, limit is {max}")]
    SurfaceTooLarge {
        /// Observed cell count.
        cells: usize,
        /// The ceiling.
        max: usize,
    },
    /// The friction surface has no valid (non-NoData) cell.
    #[error("cost surface has no valid cells")]
    NoValidCells,
    /// Friction values fall outside the accepted range.
    #[error("friction range [{min}, {max}] outside ({lower_exclusive}, {upper}]")]
    FrictionOutOfRange {
        /// Smallest observed friction.
        min: f64,
        /// Largest observed friction.
        max: f64,
        /// Friction must be strictly greater than this.
        lower_exclusive: f64,
        /// Friction must be at most this.
        upper: f64,
    },
    /// A feature's source cell is outside the grid.
    #[error("feature {id} source cell {cell} is outside the grid")]
    FeatureOutOfBounds {
        /// The feature.
        id: FeatureId,
        /// The offending cell.
        cell: CellIndex,
    },
    /// One or more features sit on NoData friction cells.
    #[error("features located on NoData cells: {ids:?}")]
    FeaturesOnNoData {
        /// Every offending feature, in provider order.
        ids: Vec<FeatureId>,
    },
}

/// A run exceeds one of its hard resource ceilings.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ResourceLimitError {
    /// More features than a single run accepts.
    #[error("{count} features requested, a run accepts at most {max}")]
    TooManyFeatures {
        /// Requested feature count.
        count: usize,
        /// The ceiling.
        max: usize,
    },
    /// More rasters than the summation accepts.
    #[error("{count} rasters to sum, fan-in limit is {max}")]
    FanInExceeded {
        /// Requested raster count.
        count: usize,
        /// The ceiling.
        max: usize,
    },
}

/// Internal inconsistency detected while computing. Always fatal.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ComputationError {
    /// A source cell resolved to NoData during traversal.
    #[error("feature {id} source cell {cell} is NoData")]
    SourceOnNoData {
        /// The feature.
        id: FeatureId,
        /// The offending cell.
        cell: CellIndex,
    },
    /// A source cell lies outside the friction grid.
    #[error("feature {id} source cell {cell} is outside the grid")]
    SourceOutOfBounds {
        /// The feature.
        id: FeatureId,
        /// The offending cell.
        cell: CellIndex,
    },
    /// A computed value is NaN or infinite where a finite value is required.
    #[error("non-finite {what}: {value}")]
    NonFiniteResult {
        /// What was being computed.
        what: &'static str,
        /// The offending value.
        value: f64,
    },
    /// A pooled task finished without reporting a result.
    #[error("task {index} produced no result")]
    TaskLost {
        /// Position of the task in its batch.
        index: usize,
    },
    /// A worker thread panicked.
    #[error("worker panicked: {reason}")]
    WorkerPanicked {
        /// Panic payload, if it was a string.
        reason: String,
    },
    /// The orchestrator was asked to make an illegal state transition.
    #[error("illegal transition {from} -> {to}")]
    IllegalTransition {
        /// Current state name.
        from: String,
        /// Requested state name.
        to: String,
    },
}

/// Failure reported by an [`OutputSink`](crate::traits::OutputSink).
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("output sink failed: {reason}")]
pub struct SinkError {
    /// Human-readable description of the failure.
    pub reason: String,
}

/// Failure reported by an [`ArtifactStore`](crate::traits::ArtifactStore).
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("artifact store failed: {reason}")]
pub struct ArtifactError {
    /// Human-readable description of the failure.
    pub reason: String,
}

/// Any failure that aborts a run.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum RunError {
    /// Invalid input, rejected before computation.
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
    /// A hard ceiling was exceeded.
    #[error(transparent)]
    ResourceLimit(#[from] ResourceLimitError),
    /// Internal inconsistency during computation.
    #[error(transparent)]
    Computation(#[from] ComputationError),
    /// The output sink rejected the result.
    #[error(transparent)]
    Output(#[from] SinkError),
    /// The artifact store failed.
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

impl From<GeometryError> for RunError {
    fn from(e: GeometryError) -> Self {
        Self::Precondition(PreconditionError::Geometry(e))
    }
}

impl RunError {
    /// The payload-free kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Precondition(_) => ErrorKind::Precondition,
            Self::ResourceLimit(_) => ErrorKind::ResourceLimit,
            Self::Computation(_) => ErrorKind::Computation,
            Self::Output(_) => ErrorKind::Output,
            Self::Artifact(_) => ErrorKind::Artifact,
        }
    }
}

/// Discriminant of [`RunError`], carried by the orchestrator's failed state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`RunError::Precondition`].
    Precondition,
    /// See [`RunError::ResourceLimit`].
    ResourceLimit,
    /// See [`RunError::Computation`].
    Computation,
    /// See [`RunError::Output`].
    Output,
    /// See [`RunError::Artifact`].
    Artifact,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Precondition => "precondition",
            Self::ResourceLimit => "resource-limit",
            Self::Computation => "computation",
            Self::Output => "output",
            Self::Artifact => "artifact",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_error_kind_matches_variant() {
        let e: RunError = ResourceLimitError::TooManyFeatures {
            count: 1200,
            max: 1000,
        }
        .into();
        assert_eq!(e.kind(), ErrorKind::ResourceLimit);

        let e: RunError = PreconditionError::EmptyFeatureSet.into();
        assert_eq!(e.kind(), ErrorKind::Precondition);

        let e: RunError = GeometryError::EmptyGrid.into();
        assert_eq!(e.kind(), ErrorKind::Precondition);
    }

    #[test]
    fn messages_carry_payload() {
        let e = ResourceLimitError::FanInExceeded {
            count: 2600,
            max: 2500,
        };
        assert_eq!(e.to_string(), "2600 rasters to sum, fan-in limit is 2500");

        let e = PreconditionError::FeaturesOnNoData {
            ids: vec![FeatureId(3), FeatureId(9)],
        };
        assert!(e.to_string().contains("FeatureId(3)"));
    }

    #[test]
    fn run_error_is_transparent() {
        let inner = ComputationError::SourceOnNoData {
            id: FeatureId(7),
            cell: CellIndex::new(1, 2),
        };
        let outer = RunError::from(inner.clone());
        assert_eq!(outer.to_string(), inner.to_string());
    }
}
