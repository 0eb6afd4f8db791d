//! Influence features: provider records, weighted features, and the ordered
//! [`FeatureSet`].

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::error::PreconditionError;
use crate::geometry::GridGeometry;
use crate::id::{CellIndex, FeatureId};

/// A feature as delivered by a [`FeatureProvider`](crate::traits::FeatureProvider):
/// an id, a footprint, and named numeric attributes.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureRecord {
    /// Unique, stable id.
    pub id: FeatureId,
    /// Source cells. One cell for a point, the rasterized footprint for a
    /// polygon.
    pub cells: Vec<CellIndex>,
    /// Numeric attributes in provider order (e.g. `"pop" -> 120.0`).
    pub attributes: IndexMap<String, f64>,
}

impl FeatureRecord {
    /// A record with the given footprint and no attributes.
    pub fn new(id: FeatureId, cells: impl IntoIterator<Item = CellIndex>) -> Self {
        Self {
            id,
            cells: cells.into_iter().collect(),
            attributes: IndexMap::new(),
        }
    }

    /// A point record located at map coordinates `(x, y)`.
    ///
    /// Returns `None` if the point falls outside `geometry`.
    pub fn at_point(
        id: FeatureId,
        geometry: &GridGeometry,
        x: f64,
        y: f64,
    ) -> Option<Self> {
        geometry.cell_at(x, y).map(|cell| Self::new(id, [cell]))
    }

    /// Add or replace a numeric attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: f64) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// Resolve the feature's weight and produce a [`Feature`].
    ///
    /// With no weight field (or an empty one) every feature weighs 1.
    pub fn resolve(self, weight_field: Option<&str>) -> Result<Feature, PreconditionError> {
        let weight = match weight_field.filter(|f| !f.is_empty()) {
            None => 1.0,
            Some(field) => *self.attributes.get(field).ok_or_else(|| {
                PreconditionError::MissingWeight {
                    id: self.id,
                    field: field.to_string(),
                }
            })?,
        };
        Feature::new(self.id, weight, self.cells)
    }
}

/// A weighted influence source.
#[derive(Clone, Debug, PartialEq)]
pub struct Feature {
    id: FeatureId,
    weight: f64,
    cells: SmallVec<[CellIndex; 1]>,
}

impl Feature {
    /// Create a feature, validating its weight and footprint.
    pub fn new(
        id: FeatureId,
        weight: f64,
        cells: impl IntoIterator<Item = CellIndex>,
    ) -> Result<Self, PreconditionError> {
        if !(weight.is_finite() && weight >= 0.0) {
            return Err(PreconditionError::InvalidWeight { id, value: weight });
        }
        let mut cells: SmallVec<[CellIndex; 1]> = cells.into_iter().collect();
        if cells.is_empty() {
            return Err(PreconditionError::NoSourceCells { id });
        }
        // Footprints from rasterized polygons may repeat cells.
        cells.sort_unstable();
        cells.dedup();
        Ok(Self { id, weight, cells })
    }

    /// The feature's id.
    pub fn id(&self) -> FeatureId {
        self.id
    }

    /// Non-negative, finite weight.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Source cells, sorted and deduplicated.
    pub fn cells(&self) -> &[CellIndex] {
        &self.cells
    }
}

/// Ordered collection of features with unique ids.
///
/// Iteration order is insertion (provider) order and defines the batch
/// order of the summation downstream.
#[derive(Clone, Debug, Default)]
pub struct FeatureSet {
    features: IndexMap<FeatureId, Feature>,
}

impl FeatureSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set, rejecting duplicate ids.
    pub fn from_features(
        features: impl IntoIterator<Item = Feature>,
    ) -> Result<Self, PreconditionError> {
        let mut set = Self::new();
        for f in features {
            set.insert(f)?;
        }
        Ok(set)
    }

    /// Append a feature. Fails if its id is already present.
    pub fn insert(&mut self, feature: Feature) -> Result<(), PreconditionError> {
        let id = feature.id;
        if self.features.contains_key(&id) {
            return Err(PreconditionError::DuplicateFeature { id });
        }
        self.features.insert(id, feature);
        Ok(())
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the set has no features.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Look up a feature by id.
    pub fn get(&self, id: FeatureId) -> Option<&Feature> {
        self.features.get(&id)
    }

    /// Features in insertion order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Feature> + '_ {
        self.features.values()
    }

    /// Feature ids in insertion order.
    pub fn ids(&self) -> impl ExactSizeIterator<Item = FeatureId> + '_ {
        self.features.keys().copied()
    }

    /// Mean weight, `None` for an empty set.
    pub fn mean_weight(&self) -> Option<f64> {
        if self.features.is_empty() {
            return None;
        }
        let sum: f64 = self.features.values().map(|f| f.weight).sum();
        Some(sum / self.features.len() as f64)
    }
}

impl<'a> IntoIterator for &'a FeatureSet {
    type Item = &'a Feature;
    type IntoIter = indexmap::map::Values<'a, FeatureId, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.values()
    }
}
