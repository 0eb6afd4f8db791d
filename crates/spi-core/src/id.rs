//! Strongly-typed identifiers: [`FeatureId`] and [`CellIndex`].

use std::fmt;

/// Identifies an influence feature within a run.
///
/// Ids are assigned by the feature provider and must be unique within one
/// [`FeatureSet`](crate::FeatureSet). They are stable across runs so that
/// retained artifacts can be matched back to their source feature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureId(pub u64);

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for FeatureId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// A `(row, col)` cell position within a grid.
///
/// Row 0 is the top (northern) row, column 0 the leftmost (western) column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellIndex {
    /// Row index, counted from the top edge.
    pub row: u32,
    /// Column index, counted from the left edge.
    pub col: u32,
}

impl CellIndex {
    /// Construct a cell index.
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for CellIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

impl From<(u32, u32)> for CellIndex {
    fn from((row, col): (u32, u32)) -> Self {
        Self { row, col }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_id_display() {
        assert_eq!(FeatureId(42).to_string(), "42");
    }

    #[test]
    fn cell_index_orders_row_major() {
        let mut cells = vec![
            CellIndex::new(1, 0),
            CellIndex::new(0, 3),
            CellIndex::new(0, 1),
        ];
        cells.sort();
        assert_eq!(
            cells,
            vec![
                CellIndex::new(0, 1),
                CellIndex::new(0, 3),
                CellIndex::new(1, 0)
            ]
        );
    }

    #[test]
    fn cell_index_from_tuple() {
        let c: CellIndex = (2, 5).into();
        assert_eq!(c, CellIndex::new(2, 5));
        assert_eq!(c.to_string(), "(2, 5)");
    }
}
