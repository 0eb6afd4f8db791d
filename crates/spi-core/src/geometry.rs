//! Raster geometry: dimensions, cell size, origin, and 8-connected topology.
//!
//! A [`GridGeometry`] is shared by every grid in one run. Two geometries are
//! *aligned* when all of rows, cols, cell size, and origin are identical;
//! elementwise operations refuse to combine misaligned grids.

use crate::error::GeometryError;
use crate::id::CellIndex;
use smallvec::SmallVec;

/// All 8 offsets: N, S, W, E, NW, NE, SW, SE.
const OFFSETS_8: [(i32, i32); 8] = [
    (-1, 0),
    (1, 0),
    (0, -1),
    (0, 1),
    (-1, -1),
    (-1, 1),
    (1, -1),
    (1, 1),
];

/// Axis-aligned bounding rectangle in map units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Extent {
    /// Western edge.
    pub min_x: f64,
    /// Southern edge.
    pub min_y: f64,
    /// Eastern edge.
    pub max_x: f64,
    /// Northern edge.
    pub max_y: f64,
}

impl Extent {
    /// East-west size in map units.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// North-south size in map units.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// A neighbouring cell as seen from some center cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Neighbour {
    /// Flat row-major index of the neighbour.
    pub index: usize,
    /// `true` for the four diagonal neighbours.
    pub diagonal: bool,
}

/// Dimensions and placement of a raster.
///
/// The origin is the upper-left (north-west) corner of cell `(0, 0)`. Rows
/// grow southward, columns eastward. Cells are square.
///
/// Neighbourhoods are 8-connected without wrap-around: edge cells have 5
/// neighbours, corner cells 3.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridGeometry {
    rows: u32,
    cols: u32,
    cell_size: f64,
    origin_x: f64,
    origin_y: f64,
}

impl GridGeometry {
    /// Maximum size of either axis. Neighbour arithmetic uses `i32`.
    pub const MAX_DIM: u32 = i32::MAX as u32;

    /// Create a geometry with `rows * cols` cells of `cell_size` map units,
    /// whose upper-left corner sits at `origin = (x, y)`.
    pub fn new(
        rows: u32,
        cols: u32,
        cell_size: f64,
        origin: (f64, f64),
    ) -> Result<Self, GeometryError> {
        if rows == 0 || cols == 0 {
            return Err(GeometryError::EmptyGrid);
        }
        if rows > Self::MAX_DIM {
            return Err(GeometryError::DimensionTooLarge {
                name: "rows",
                value: rows,
                max: Self::MAX_DIM,
            });
        }
        if cols > Self::MAX_DIM {
            return Err(GeometryError::DimensionTooLarge {
                name: "cols",
                value: cols,
                max: Self::MAX_DIM,
            });
        }
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(GeometryError::InvalidCellSize { value: cell_size });
        }
        if !(origin.0.is_finite() && origin.1.is_finite()) {
            return Err(GeometryError::InvalidOrigin {
                x: origin.0,
                y: origin.1,
            });
        }
        (rows as usize)
            .checked_mul(cols as usize)
            .ok_or(GeometryError::CellCountOverflow { rows, cols })?;
        Ok(Self {
            rows,
            cols,
            cell_size,
            origin_x: origin.0,
            origin_y: origin.1,
        })
    }

    /// Number of rows (grid height).
    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Number of columns (grid width).
    pub fn cols(&self) -> u32 {
        self.cols
    }

    /// Side length of one cell in map units.
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Upper-left corner `(x, y)`.
    pub fn origin(&self) -> (f64, f64) {
        (self.origin_x, self.origin_y)
    }

    /// Total number of cells.
    pub fn cell_count(&self) -> usize {
        self.rows as usize * self.cols as usize
    }

    /// Bounding rectangle of the whole grid.
    pub fn extent(&self) -> Extent {
        Extent {
            min_x: self.origin_x,
            min_y: self.origin_y - self.rows as f64 * self.cell_size,
            max_x: self.origin_x + self.cols as f64 * self.cell_size,
            max_y: self.origin_y,
        }
    }

    /// Whether `other` describes exactly the same raster layout.
    pub fn is_aligned_with(&self, other: &GridGeometry) -> bool {
        self == other
    }

    /// Whether `cell` lies inside the grid.
    pub fn contains(&self, cell: CellIndex) -> bool {
        cell.row < self.rows && cell.col < self.cols
    }

    /// Row-major flat index of `cell`, or `None` if out of bounds.
    pub fn flat_index(&self, cell: CellIndex) -> Option<usize> {
        self.contains(cell)
            .then(|| cell.row as usize * self.cols as usize + cell.col as usize)
    }

    /// Inverse of [`flat_index`](Self::flat_index). `index` must be in range.
    pub fn cell_of(&self, index: usize) -> CellIndex {
        let cols = self.cols as usize;
        CellIndex::new((index / cols) as u32, (index % cols) as u32)
    }

    /// Cell containing the map point `(x, y)`.
    ///
    /// Cells are half-open: the western and northern edges belong to the
    /// cell, the eastern and southern edges to its neighbour. Points outside
    /// the extent return `None`.
    pub fn cell_at(&self, x: f64, y: f64) -> Option<CellIndex> {
        let col = ((x - self.origin_x) / self.cell_size).floor();
        let row = ((self.origin_y - y) / self.cell_size).floor();
        if !(col >= 0.0 && row >= 0.0) {
            return None;
        }
        if col >= self.cols as f64 || row >= self.rows as f64 {
            return None;
        }
        Some(CellIndex::new(row as u32, col as u32))
    }

    /// Map coordinates of the center of `cell`.
    pub fn cell_center(&self, cell: CellIndex) -> (f64, f64) {
        (
            self.origin_x + (cell.col as f64 + 0.5) * self.cell_size,
            self.origin_y - (cell.row as f64 + 0.5) * self.cell_size,
        )
    }

    /// The in-bounds 8-connected neighbours of the cell at flat `index`.
    pub fn neighbours(&self, index: usize) -> SmallVec<[Neighbour; 8]> {
        let rows = self.rows as i64;
        let cols = self.cols as i64;
        let r = (index as i64) / cols;
        let c = (index as i64) % cols;
        let mut result = SmallVec::new();
        for (dr, dc) in OFFSETS_8 {
            let nr = r + dr as i64;
            let nc = c + dc as i64;
            if nr >= 0 && nr < rows && nc >= 0 && nc < cols {
                result.push(Neighbour {
                    index: (nr * cols + nc) as usize,
                    diagonal: dr != 0 && dc != 0,
                });
            }
        }
        result
    }
}
