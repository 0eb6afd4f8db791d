//! Optional integer conversion of the final grid.

use spi_core::Grid;

/// Round every valid cell half-up (`floor(x + 0.5)`). NoData is untouched.
///
/// Influence is never negative, so half-up and round-half-away-from-zero
/// agree on every value the pipeline produces.
pub fn quantize(mut grid: Grid) -> Grid {
    grid.map_valid(|x| (x + 0.5).floor());
    grid
}
