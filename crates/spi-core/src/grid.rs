//! Dense raster values over a [`GridGeometry`].
//!
//! A [`Grid`] stores one `f64` per cell in row-major order. Cells whose value
//! equals the grid's NoData sentinel (or is NaN) are NoData. Rasters computed
//! from a grid take their sentinel from [`derived_no_data`], since the
//! source sentinel may be a value the computation produces.

use crate::error::{GeometryError, PreconditionError};
use crate::geometry::GridGeometry;
use crate::id::CellIndex;

/// The NoData sentinel used when a provider does not specify one.
pub const DEFAULT_NO_DATA: f64 = -9999.0;

/// NoData sentinel for non-negative rasters derived from a grid whose
/// sentinel is `source`.
///
/// A negative or NaN `source` can never collide with a derived value and is
/// kept; anything else is replaced by [`DEFAULT_NO_DATA`].
pub fn derived_no_data(source: f64) -> f64 {
    if source < 0.0 || source.is_nan() {
        source
    } else {
        DEFAULT_NO_DATA
    }
}

/// Summary statistics over the valid cells of a grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridStats {
    /// Smallest valid value, `None` if every cell is NoData.
    pub min: Option<f64>,
    /// Largest valid value, `None` if every cell is NoData.
    pub max: Option<f64>,
    /// Mean of valid values, `None` if every cell is NoData.
    pub mean: Option<f64>,
    /// Number of valid cells.
    pub valid_cells: usize,
    /// Number of NoData cells.
    pub no_data_cells: usize,
}

/// A dense raster.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid {
    geometry: GridGeometry,
    no_data: f64,
    values: Vec<f64>,
}

impl Grid {
    /// Wrap `values` (row-major, `rows * cols` long) as a grid.
    pub fn new(
        geometry: GridGeometry,
        no_data: f64,
        values: Vec<f64>,
    ) -> Result<Self, GeometryError> {
        if values.len() != geometry.cell_count() {
            return Err(GeometryError::BufferSizeMismatch {
                expected: geometry.cell_count(),
                actual: values.len(),
            });
        }
        Ok(Self {
            geometry,
            no_data,
            values,
        })
    }

    /// A grid with every cell set to `value`.
    pub fn filled(geometry: GridGeometry, no_data: f64, value: f64) -> Self {
        Self {
            geometry,
            no_data,
            values: vec![value; geometry.cell_count()],
        }
    }

    /// A grid with every cell NoData.
    pub fn no_data_like(geometry: GridGeometry, no_data: f64) -> Self {
        Self::filled(geometry, no_data, no_data)
    }

    /// Layout of this grid.
    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    /// The NoData sentinel.
    pub fn no_data(&self) -> f64 {
        self.no_data
    }

    /// Row-major cell values, NoData cells included.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Mutable row-major cell values.
    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    /// Consume the grid, returning its value buffer.
    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always `false`: geometries have at least one cell.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether `v` is NoData under this grid's sentinel.
    #[inline]
    pub fn is_no_data_value(&self, v: f64) -> bool {
        v.is_nan() || v == self.no_data
    }

    /// Whether the cell at flat `index` is NoData.
    #[inline]
    pub fn is_no_data(&self, index: usize) -> bool {
        self.is_no_data_value(self.values[index])
    }

    /// Valid value at flat `index`, `None` for NoData.
    #[inline]
    pub fn value_at(&self, index: usize) -> Option<f64> {
        let v = self.values[index];
        (!self.is_no_data_value(v)).then_some(v)
    }

    /// Valid value at `cell`, `None` for NoData or out-of-bounds cells.
    pub fn get(&self, cell: CellIndex) -> Option<f64> {
        self.geometry
            .flat_index(cell)
            .and_then(|i| self.value_at(i))
    }

    /// Set `cell` to `value`. Out-of-bounds cells are ignored and reported
    /// by returning `false`.
    pub fn set(&mut self, cell: CellIndex, value: f64) -> bool {
        match self.geometry.flat_index(cell) {
            Some(i) => {
                self.values[i] = value;
                true
            }
            None => false,
        }
    }

    /// Apply `f` to every valid cell in place. NoData cells are untouched.
    pub fn map_valid(&mut self, mut f: impl FnMut(f64) -> f64) {
        let no_data = self.no_data;
        for v in &mut self.values {
            if !(v.is_nan() || *v == no_data) {
                *v = f(*v);
            }
        }
    }

    /// Largest valid value, `None` if every cell is NoData.
    pub fn finite_max(&self) -> Option<f64> {
        self.valid_values().fold(None, |acc, v| match acc {
            Some(m) if m >= v => Some(m),
            _ => Some(v),
        })
    }

    /// Iterator over the valid values.
    pub fn valid_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.values
            .iter()
            .copied()
            .filter(move |v| !self.is_no_data_value(*v))
    }

    /// Min / max / mean over the valid cells.
    pub fn stats(&self) -> GridStats {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        let mut valid = 0usize;
        for v in self.valid_values() {
            min = min.min(v);
            max = max.max(v);
            sum += v;
            valid += 1;
        }
        let any = valid > 0;
        GridStats {
            min: any.then_some(min),
            max: any.then_some(max),
            mean: any.then(|| sum / valid as f64),
            valid_cells: valid,
            no_data_cells: self.values.len() - valid,
        }
    }

    /// Fail with [`PreconditionError::Misaligned`] unless `other` shares
    /// this grid's layout.
    pub fn ensure_aligned(&self, other: &GridGeometry) -> Result<(), PreconditionError> {
        if self.geometry.is_aligned_with(other) {
            Ok(())
        } else {
            Err(PreconditionError::Misaligned {
                expected: self.geometry,
                found: *other,
            })
        }
    }

    /// Elementwise `self += other`.
    ///
    /// A NoData cell in `other` contributes nothing. A NoData cell in `self`
    /// takes `other`'s value when that is valid. The result is NoData only
    /// where both operands are NoData.
    pub fn accumulate(&mut self, other: &Grid) -> Result<(), PreconditionError> {
        self.ensure_aligned(&other.geometry)?;
        for (i, acc) in self.values.iter_mut().enumerate() {
            let Some(v) = other.value_at(i) else {
                continue;
            };
            if acc.is_nan() || *acc == self.no_data {
                *acc = v;
            } else {
                *acc += v;
            }
        }
        Ok(())
    }
}
