//! Cost distance to weighted influence.
//!
//! Every feature is normalized against the same global scale, the largest
//! (capped) finite cost distance of any feature in the run, so that
//! influence values of different features are comparable and can be summed:
//!
//! ```text
//! normalized = cost / global_max          (0 when global_max == 0)
//! influence  = (1 - normalized) * weight
//! ```
//!
//! The feature with the largest reach spans the full `[0, weight]` range;
//! every other feature only reaches down to `(1 - own_max / global_max) * weight`.

use spi_core::{FeatureId, Grid};

use crate::cost_distance::CostDistanceRaster;

/// Weighted influence raster for one feature.
#[derive(Clone, Debug, PartialEq)]
pub struct InfluenceRaster {
    feature: FeatureId,
    weight: f64,
    grid: Grid,
}

impl InfluenceRaster {
    /// The feature this raster belongs to.
    pub fn feature(&self) -> FeatureId {
        self.feature
    }

    /// The weight that was applied.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Influence values. NoData wherever the cost raster was NoData.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Consume the raster, returning its grid.
    pub fn into_grid(self) -> Grid {
        self.grid
    }
}

/// Normalization scale shared by every feature of a run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InfluenceScale {
    global_max: f64,
}

impl InfluenceScale {
    /// Fold per-feature finite maxima into the global scale.
    ///
    /// `max` is commutative and associative, so the result does not depend
    /// on the order in which features finished.
    pub fn from_maxima(maxima: impl IntoIterator<Item = f64>) -> Self {
        let global_max = maxima.into_iter().fold(0.0f64, f64::max);
        Self { global_max }
    }

    /// A scale with an explicit global maximum.
    pub fn new(global_max: f64) -> Self {
        Self { global_max }
    }

    /// The largest finite cost distance of the run.
    pub fn global_max(&self) -> f64 {
        self.global_max
    }

    /// Whether every feature's reach is zero. Normalization then maps every
    /// reachable cell to 0 and influence equals the weight everywhere.
    pub fn is_degenerate(&self) -> bool {
        !(self.global_max > 0.0)
    }

    /// Normalize one cost value into `[0, 1]`.
    #[inline]
    pub fn normalize(&self, cost: f64) -> f64 {
        if self.is_degenerate() {
            0.0
        } else {
            cost / self.global_max
        }
    }
}

/// Transform `cost` into a weighted influence raster, reusing its buffer.
///
/// NoData cells stay NoData. `weight` must be finite and non-negative.
pub fn normalize_and_weight(
    cost: CostDistanceRaster,
    scale: InfluenceScale,
    weight: f64,
) -> InfluenceRaster {
    let feature = cost.feature();
    let mut grid = cost.into_grid();
    grid.map_valid(|c| (1.0 - scale.normalize(c)) * weight);
    InfluenceRaster {
        feature,
        weight,
        grid,
    }
}
