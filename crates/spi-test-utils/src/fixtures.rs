//! Reusable cost-surface fixtures.
//!
//! Every fixture uses cell size 1 with the upper-left corner at
//! `(0, rows)`, so cell `(r, c)` covers `[c, c + 1) x (rows - r - 1, rows - r]`
//! in map units.

use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use spi_core::{CellIndex, FeatureId, FeatureRecord, Grid, GridGeometry, DEFAULT_NO_DATA};

/// NoData sentinel used by all fixtures.
pub const ND: f64 = DEFAULT_NO_DATA;

/// Unit-cell geometry of `rows x cols`.
pub fn unit_geometry(rows: u32, cols: u32) -> GridGeometry {
    GridGeometry::new(rows, cols, 1.0, (0.0, rows as f64)).unwrap()
}

/// A `rows x cols` surface with constant friction.
pub fn uniform_surface(rows: u32, cols: u32, friction: f64) -> Grid {
    Grid::filled(unit_geometry(rows, cols), ND, friction)
}

/// A surface from literal rows. Use [`ND`] for NoData cells.
///
/// Panics if the rows are empty or ragged.
pub fn surface_from_rows(rows: &[&[f64]]) -> Grid {
    let cols = rows[0].len();
    assert!(rows.iter().all(|r| r.len() == cols), "ragged rows");
    let values: Vec<f64> = rows.iter().flat_map(|r| r.iter().copied()).collect();
    Grid::new(unit_geometry(rows.len() as u32, cols as u32), ND, values).unwrap()
}

/// Uniform `[0, 1)` from the top 53 bits of the next word.
fn unit(rng: &mut ChaCha8Rng) -> f64 {
    (rng.next_u64() >> 11) as f64 / (1u64 << 53) as f64
}

/// A seeded random surface with friction in `[0.5, 10.5)` and roughly
/// `no_data_fraction` of its cells NoData.
pub fn random_surface(rows: u32, cols: u32, seed: u64, no_data_fraction: f64) -> Grid {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut grid = uniform_surface(rows, cols, 1.0);
    for v in grid.values_mut() {
        *v = if unit(&mut rng) < no_data_fraction {
            ND
        } else {
            0.5 + 10.0 * unit(&mut rng)
        };
    }
    grid
}

/// `count` independent random rasters sharing one geometry, about a tenth
/// of each one NoData.
pub fn random_rasters(count: usize, rows: u32, cols: u32, seed: u64) -> Vec<Grid> {
    (0..count as u64)
        .map(|i| random_surface(rows, cols, seed.wrapping_add(i), 0.1))
        .collect()
}

/// First valid cell in row-major order.
pub fn first_valid_cell(grid: &Grid) -> Option<CellIndex> {
    (0..grid.len())
        .find(|&i| !grid.is_no_data(i))
        .map(|i| grid.geometry().cell_of(i))
}

/// One single-cell record per entry of `cells`, with ids `0..n` and a
/// `"weight"` attribute taken from `weights` (cycled).
pub fn point_records(cells: &[(u32, u32)], weights: &[f64]) -> Vec<FeatureRecord> {
    cells
        .iter()
        .enumerate()
        .map(|(i, &(r, c))| {
            FeatureRecord::new(FeatureId(i as u64), [CellIndex::new(r, c)])
                .with_attribute("weight", weights[i % weights.len()])
        })
        .collect()
}

/// `n` point records spread over the valid cells of `grid`, ids `0..n`,
/// weight 1. Panics if the grid has no valid cell.
pub fn spread_records(grid: &Grid, n: usize, seed: u64) -> Vec<FeatureRecord> {
    let valid: Vec<usize> = (0..grid.len()).filter(|&i| !grid.is_no_data(i)).collect();
    assert!(!valid.is_empty(), "grid has no valid cell");
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n as u64)
        .map(|id| {
            let pick = valid[(rng.next_u64() % valid.len() as u64) as usize];
            FeatureRecord::new(FeatureId(id), [grid.geometry().cell_of(pick)])
        })
        .collect()
}
