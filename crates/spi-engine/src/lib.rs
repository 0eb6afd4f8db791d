//! Engine computing summed point influence surfaces.
//!
//! Provides the [`Orchestrator`] that runs the two-pass pipeline (cost
//! distance per feature, global normalization and weighting, batched
//! summation) over the collaborators defined in `spi-core`, plus the
//! individual stages for callers that want to compose them directly.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod cost_distance;
pub mod influence;
pub mod metrics;
pub mod orchestrator;
pub mod pool;
pub mod preflight;
pub mod quantize;
pub mod state;
pub mod summation;
pub mod working_area;

pub use config::{FrictionUnits, RunLimits, SpiConfig};
pub use cost_distance::{CostDistanceEngine, CostDistanceRaster};
pub use influence::{normalize_and_weight, InfluenceRaster, InfluenceScale};
pub use metrics::RunReport;
pub use orchestrator::Orchestrator;
pub use pool::WorkerPool;
pub use preflight::{prepare, Prepared};
pub use quantize::quantize;
pub use state::RunState;
pub use summation::{BatchedSummation, Summation};
pub use working_area::WorkingArea;
