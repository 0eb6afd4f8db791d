//! SPI: summed point influence surfaces.
//!
//! This is the top-level facade crate that re-exports the public API from
//! the SPI sub-crates. For most users, adding `spi` as a single dependency
//! is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use spi::prelude::*;
//! use std::path::Path;
//!
//! // A sink that keeps the result.
//! struct Keep(Option<Grid>);
//! impl OutputSink for Keep {
//!     fn accept(&mut self, _: &Path, grid: Grid, _: GridStats) -> Result<(), SinkError> {
//!         self.0 = Some(grid);
//!         Ok(())
//!     }
//! }
//!
//! // Two weighted towns on a uniform 20x20 friction surface.
//! struct Towns(Vec<FeatureRecord>);
//! impl FeatureProvider for Towns {
//!     fn feature_count(&self) -> usize { self.0.len() }
//!     fn records(&self) -> Vec<FeatureRecord> { self.0.clone() }
//! }
//!
//! let geometry = GridGeometry::new(20, 20, 30.0, (0.0, 600.0)).unwrap();
//! let surface = Grid::filled(geometry, DEFAULT_NO_DATA, 1.0);
//! let towns = Towns(vec![
//!     FeatureRecord::at_point(FeatureId(1), &geometry, 45.0, 555.0)
//!         .unwrap()
//!         .with_attribute("pop", 120.0),
//!     FeatureRecord::at_point(FeatureId(2), &geometry, 500.0, 100.0)
//!         .unwrap()
//!         .with_attribute("pop", 40.0),
//! ]);
//!
//! let config = SpiConfig {
//!     weight_field: Some("pop".into()),
//!     max_cost_distance: 300.0,
//!     ..SpiConfig::new("spi.tif")
//! };
//! let mut orchestrator = Orchestrator::new(
//!     config,
//!     Box::new(surface),
//!     Box::new(towns),
//!     Box::new(Keep(None)),
//! );
//! let report = orchestrator.run().unwrap();
//! assert_eq!(orchestrator.state(), RunState::Done);
//! assert_eq!(report.global_max, 300.0);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `spi-core` | Ids, geometry, grids, features, collaborator traits, errors |
//! | [`engine`] | `spi-engine` | Cost distance, influence, summation, orchestrator |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, traits, and ids (`spi-core`).
///
/// Contains [`types::Grid`], [`types::GridGeometry`], the feature types,
/// the collaborator traits ([`types::CostSurfaceProvider`],
/// [`types::FeatureProvider`], [`types::OutputSink`],
/// [`types::ArtifactStore`]), and the error enums.
pub use spi_core as types;

/// Pipeline stages and the orchestrator (`spi-engine`).
///
/// [`engine::Orchestrator`] runs a whole job; [`engine::CostDistanceEngine`],
/// [`engine::normalize_and_weight`], and [`engine::BatchedSummation`] are
/// available for composing the stages directly.
pub use spi_engine as engine;

/// Common imports for typical SPI usage.
///
/// ```rust
/// use spi::prelude::*;
/// ```
pub mod prelude {
    // Geometry and values
    pub use spi_core::{CellIndex, Grid, GridGeometry, GridStats, DEFAULT_NO_DATA};

    // Features
    pub use spi_core::{Feature, FeatureId, FeatureRecord, FeatureSet};

    // Collaborators
    pub use spi_core::{
        ArtifactKind, ArtifactPolicy, ArtifactStore, CostSurfaceProvider, FeatureProvider,
        OutputSink,
    };

    // Errors
    pub use spi_core::{ArtifactError, ErrorKind, RunError, SinkError};

    // Engine
    pub use spi_engine::{
        FrictionUnits, Orchestrator, RunLimits, RunReport, RunState, SpiConfig,
    };
}
