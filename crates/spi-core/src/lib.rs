//! Core types and traits for summed point influence surfaces.
//!
//! This is the leaf crate with no internal dependencies. It defines raster
//! geometry and values ([`GridGeometry`], [`Grid`]), influence features
//! ([`Feature`], [`FeatureSet`]), the collaborator traits a host implements
//! to feed a run and receive its output, and the closed error enums shared
//! by the whole workspace.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod feature;
pub mod geometry;
pub mod grid;
pub mod id;
pub mod traits;

pub use error::{
    ArtifactError, ComputationError, ErrorKind, GeometryError, PreconditionError,
    ResourceLimitError, RunError, SinkError,
};
pub use feature::{Feature, FeatureRecord, FeatureSet};
pub use geometry::{Extent, GridGeometry, Neighbour};
pub use grid::{derived_no_data, Grid, GridStats, DEFAULT_NO_DATA};
pub use id::{CellIndex, FeatureId};
pub use traits::{
    ArtifactKind, ArtifactPolicy, ArtifactStore, CostSurfaceProvider, FeatureProvider,
    OutputSink,
};
