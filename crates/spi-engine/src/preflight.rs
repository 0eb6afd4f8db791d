//! Input validation performed before any cost distance is computed.
//!
//! [`prepare`] reads the collaborators once, checks every data-dependent
//! precondition of a run, and returns the friction grid (in cost per unit
//! distance) and the resolved [`FeatureSet`]. Cheap checks come first: the
//! feature count is compared with the ceiling before a single record is
//! read, and the surface size before it is materialized.

use spi_core::{
    CostSurfaceProvider, FeatureProvider, FeatureSet, Grid, PreconditionError,
    ResourceLimitError, RunError,
};
use tracing::debug;

use crate::config::{FrictionUnits, SpiConfig};

/// Validated inputs of one run.
#[derive(Clone, Debug)]
pub struct Prepared {
    /// Friction in cost per unit distance.
    pub friction: Grid,
    /// Features in provider order with resolved weights.
    pub features: FeatureSet,
}

/// Fail unless `count` features are within `(0, max]`.
pub fn check_feature_count(count: usize, max: usize) -> Result<(), RunError> {
    if count == 0 {
        return Err(PreconditionError::EmptyFeatureSet.into());
    }
    if count > max {
        return Err(ResourceLimitError::TooManyFeatures { count, max }.into());
    }
    Ok(())
}

/// Run every preflight check and materialize the inputs.
pub fn prepare(
    config: &SpiConfig,
    surface: &dyn CostSurfaceProvider,
    features: &dyn FeatureProvider,
) -> Result<Prepared, RunError> {
    let limits = &config.limits;
    check_feature_count(features.feature_count(), limits.max_features)?;

    let declared = *surface.geometry();
    let cells = declared.cell_count();
    if cells > limits.max_cells {
        return Err(PreconditionError::SurfaceTooLarge {
            cells,
            max: limits.max_cells,
        }
        .into());
    }

    let mut friction = surface.materialize();
    friction.ensure_aligned(&declared)?;
    check_friction_range(&friction, config)?;
    if config.friction_units == FrictionUnits::PerCell {
        let cell_size = declared.cell_size();
        friction.map_valid(|f| f / cell_size);
    }
    debug!(
        rows = declared.rows(),
        cols = declared.cols(),
        cell_size = declared.cell_size(),
        "cost surface loaded"
    );

    let set = resolve_features(config, features)?;
    check_placement(&friction, &set)?;
    debug!(features = set.len(), "features resolved");

    Ok(Prepared {
        friction,
        features: set,
    })
}

/// Raw friction must lie in `(min_friction_exclusive, max_friction]`.
fn check_friction_range(friction: &Grid, config: &SpiConfig) -> Result<(), PreconditionError> {
    let stats = friction.stats();
    let (Some(min), Some(max)) = (stats.min, stats.max) else {
        return Err(PreconditionError::NoValidCells);
    };
    let limits = &config.limits;
    if min <= limits.min_friction_exclusive || max > limits.max_friction {
        return Err(PreconditionError::FrictionOutOfRange {
            min,
            max,
            lower_exclusive: limits.min_friction_exclusive,
            upper: limits.max_friction,
        });
    }
    Ok(())
}

fn resolve_features(
    config: &SpiConfig,
    provider: &dyn FeatureProvider,
) -> Result<FeatureSet, RunError> {
    let records = provider.records();
    check_feature_count(records.len(), config.limits.max_features)?;

    let weight_field = config.weight_field();
    let mut set = FeatureSet::new();
    for record in records {
        if set.get(record.id).is_some() {
            return Err(PreconditionError::DuplicateFeature { id: record.id }.into());
        }
        set.insert(record.resolve(weight_field)?)?;
    }

    if let Some(mean) = set.mean_weight() {
        let max = config.limits.max_mean_weight;
        if mean > max {
            return Err(PreconditionError::WeightMeanTooLarge { mean, max }.into());
        }
    }
    Ok(set)
}

/// Every source cell must be inside the grid; features touching NoData are
/// collected and reported together.
fn check_placement(friction: &Grid, set: &FeatureSet) -> Result<(), PreconditionError> {
    let geom = friction.geometry();
    let mut on_no_data = Vec::new();
    for feature in set {
        let mut touches_no_data = false;
        for &cell in feature.cells() {
            let Some(idx) = geom.flat_index(cell) else {
                return Err(PreconditionError::FeatureOutOfBounds {
                    id: feature.id(),
                    cell,
                });
            };
            touches_no_data |= friction.is_no_data(idx);
        }
        if touches_no_data {
            on_no_data.push(feature.id());
        }
    }
    if !on_no_data.is_empty() {
        return Err(PreconditionError::FeaturesOnNoData { ids: on_no_data });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spi_core::{CellIndex, FeatureId, FeatureRecord, GridGeometry};
    use spi_test_utils::{
        surface_from_rows, uniform_surface, MemorySurface, VecFeatureProvider, ND,
    };
    use std::sync::atomic::Ordering;

    fn config() -> SpiConfig {
        SpiConfig::new("out.tif")
    }

    fn record(id: u64, r: u32, c: u32) -> FeatureRecord {
        FeatureRecord::new(FeatureId(id), [CellIndex::new(r, c)])
    }

    #[test]
    fn accepts_valid_inputs() {
        let surface = uniform_surface(3, 3, 2.0);
        let features = VecFeatureProvider::points(&[(0, 0), (2, 2)]);
        let p = prepare(&config(), &surface, &features).unwrap();
        assert_eq!(p.features.len(), 2);
        assert_eq!(p.friction, surface);
        assert!(p.features.iter().all(|f| f.weight() == 1.0));
    }

    #[test]
    fn feature_ceiling_checked_before_records_are_read() {
        let surface = uniform_surface(2, 2, 1.0);
        let records = (0..1200).map(|i| record(i, 0, 0)).collect();
        let features = VecFeatureProvider::new(records);
        let reads = features.read_counter();
        let err = prepare(&config(), &surface, &features).unwrap_err();
        assert_eq!(
            err,
            RunError::ResourceLimit(ResourceLimitError::TooManyFeatures {
                count: 1200,
                max: 1000
            })
        );
        assert_eq!(reads.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn empty_feature_set_rejected() {
        let surface = uniform_surface(2, 2, 1.0);
        let features = VecFeatureProvider::new(Vec::new());
        let err = prepare(&config(), &surface, &features).unwrap_err();
        assert_eq!(err, RunError::Precondition(PreconditionError::EmptyFeatureSet));
    }

    #[test]
    fn surface_size_ceiling() {
        let mut cfg = config();
        cfg.limits.max_cells = 8;
        let surface = uniform_surface(3, 3, 1.0);
        let features = VecFeatureProvider::points(&[(0, 0)]);
        let err = prepare(&cfg, &surface, &features).unwrap_err();
        assert_eq!(
            err,
            RunError::Precondition(PreconditionError::SurfaceTooLarge { cells: 9, max: 8 })
        );
    }

    #[test]
    fn friction_must_be_positive_and_bounded() {
        let features = VecFeatureProvider::points(&[(0, 0)]);
        for bad in [0.0, -1.0, 10_000.5] {
            let surface = surface_from_rows(&[&[1.0, bad]]);
            let err = prepare(&config(), &surface, &features).unwrap_err();
            assert!(
                matches!(
                    err,
                    RunError::Precondition(PreconditionError::FrictionOutOfRange { .. })
                ),
                "{bad}: {err:?}"
            );
        }
        let surface = surface_from_rows(&[&[1.0, 10_000.0]]);
        assert!(prepare(&config(), &surface, &features).is_ok());
    }

    #[test]
    fn all_no_data_surface_rejected() {
        let surface = surface_from_rows(&[&[ND, ND]]);
        let features = VecFeatureProvider::points(&[(0, 0)]);
        let err = prepare(&config(), &surface, &features).unwrap_err();
        assert_eq!(err, RunError::Precondition(PreconditionError::NoValidCells));
    }

    #[test]
    fn per_cell_friction_divided_by_cell_size() {
        let geom = GridGeometry::new(1, 2, 30.0, (0.0, 30.0)).unwrap();
        let surface = Grid::new(geom, ND, vec![60.0, 90.0]).unwrap();
        let features = VecFeatureProvider::points(&[(0, 0)]);
        let mut cfg = config();
        cfg.friction_units = FrictionUnits::PerCell;
        let p = prepare(&cfg, &surface, &features).unwrap();
        assert_eq!(p.friction.values(), &[2.0, 3.0]);
    }

    #[test]
    fn duplicate_ids_rejected() {
        let surface = uniform_surface(2, 2, 1.0);
        let features = VecFeatureProvider::new(vec![record(4, 0, 0), record(4, 1, 1)]);
        let err = prepare(&config(), &surface, &features).unwrap_err();
        assert_eq!(
            err,
            RunError::Precondition(PreconditionError::DuplicateFeature { id: FeatureId(4) })
        );
    }

    #[test]
    fn footprint_required() {
        let surface = uniform_surface(2, 2, 1.0);
        let features = VecFeatureProvider::new(vec![FeatureRecord::new(FeatureId(2), Vec::new())]);
        let err = prepare(&config(), &surface, &features).unwrap_err();
        assert_eq!(
            err,
            RunError::Precondition(PreconditionError::NoSourceCells { id: FeatureId(2) })
        );
    }

    #[test]
    fn weight_field_resolution() {
        let surface = uniform_surface(2, 2, 1.0);
        let mut cfg = config();
        cfg.weight_field = Some("pop".into());

        let ok = VecFeatureProvider::new(vec![
            record(0, 0, 0).with_attribute("pop", 3.0),
            record(1, 1, 1).with_attribute("pop", 5.0),
        ]);
        let p = prepare(&cfg, &surface, &ok).unwrap();
        let weights: Vec<f64> = p.features.iter().map(|f| f.weight()).collect();
        assert_eq!(weights, vec![3.0, 5.0]);

        let missing = VecFeatureProvider::new(vec![
            record(0, 0, 0).with_attribute("pop", 3.0),
            record(1, 1, 1),
        ]);
        let err = prepare(&cfg, &surface, &missing).unwrap_err();
        assert_eq!(
            err,
            RunError::Precondition(PreconditionError::MissingWeight {
                id: FeatureId(1),
                field: "pop".into()
            })
        );

        let negative = VecFeatureProvider::new(vec![record(0, 0, 0).with_attribute("pop", -1.0)]);
        let err = prepare(&cfg, &surface, &negative).unwrap_err();
        assert_eq!(
            err,
            RunError::Precondition(PreconditionError::InvalidWeight {
                id: FeatureId(0),
                value: -1.0
            })
        );
    }

    #[test]
    fn empty_weight_field_means_equal_weights() {
        let surface = uniform_surface(2, 2, 1.0);
        let mut cfg = config();
        cfg.weight_field = Some(String::new());
        let features = VecFeatureProvider::new(vec![record(0, 0, 0)]);
        let p = prepare(&cfg, &surface, &features).unwrap();
        assert_eq!(p.features.get(FeatureId(0)).unwrap().weight(), 1.0);
    }

    #[test]
    fn mean_weight_ceiling() {
        let surface = uniform_surface(2, 2, 1.0);
        let mut cfg = config();
        cfg.weight_field = Some("w".into());
        let features = VecFeatureProvider::new(vec![
            record(0, 0, 0).with_attribute("w", 150_000.0),
            record(1, 1, 1).with_attribute("w", 100_000.0),
        ]);
        let err = prepare(&cfg, &surface, &features).unwrap_err();
        assert_eq!(
            err,
            RunError::Precondition(PreconditionError::WeightMeanTooLarge {
                mean: 125_000.0,
                max: 100_000.0
            })
        );
    }

    #[test]
    fn out_of_bounds_source_rejected() {
        let surface = uniform_surface(2, 2, 1.0);
        let features = VecFeatureProvider::new(vec![record(0, 0, 0), record(1, 2, 0)]);
        let err = prepare(&config(), &surface, &features).unwrap_err();
        assert_eq!(
            err,
            RunError::Precondition(PreconditionError::FeatureOutOfBounds {
                id: FeatureId(1),
                cell: CellIndex::new(2, 0)
            })
        );
    }

    #[test]
    fn features_on_no_data_are_collected() {
        let surface = surface_from_rows(&[&[1.0, ND], &[ND, 1.0]]);
        let features = VecFeatureProvider::new(vec![
            record(0, 0, 1),
            record(1, 0, 0),
            FeatureRecord::new(FeatureId(2), [CellIndex::new(1, 1), CellIndex::new(1, 0)]),
        ]);
        let err = prepare(&config(), &surface, &features).unwrap_err();
        assert_eq!(
            err,
            RunError::Precondition(PreconditionError::FeaturesOnNoData {
                ids: vec![FeatureId(0), FeatureId(2)]
            })
        );
    }

    #[test]
    fn declared_geometry_must_match_materialized_grid() {
        let grid = uniform_surface(2, 2, 1.0);
        let other = GridGeometry::new(2, 2, 1.0, (10.0, 2.0)).unwrap();
        let surface = MemorySurface::new(grid).declaring(other);
        let features = VecFeatureProvider::points(&[(0, 0)]);
        let err = prepare(&config(), &surface, &features).unwrap_err();
        assert!(matches!(
            err,
            RunError::Precondition(PreconditionError::Misaligned { .. })
        ));
    }
}
