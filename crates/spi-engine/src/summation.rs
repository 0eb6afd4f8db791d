//! Bounded fan-in summation of many aligned rasters.
//!
//! Elementwise-sum primitives usually cap how many inputs a single call may
//! take. [`BatchedSummation`] respects such a cap by splitting the ordered
//! input into contiguous batches of `batch_size`, summing each batch into a
//! partial grid, and summing the partials in batch order. When there are
//! more partials than the branching factor allows, they are reduced again
//! level by level until a single combine suffices.
//!
//! The result equals a flat sum over all inputs up to floating-point
//! summation order. For a fixed `batch_size` the order is fixed too, so the
//! output is bit-for-bit reproducible whatever the worker count.
//!
//! NoData cells contribute nothing; a cell is NoData in the result only if
//! it is NoData in every input.

use spi_core::{Grid, PreconditionError, ResourceLimitError, RunError};
use tracing::debug;

use crate::pool::WorkerPool;

/// Outcome of a summation.
#[derive(Clone, Debug, PartialEq)]
pub struct Summation {
    /// The elementwise total.
    pub total: Grid,
    /// Number of first-level batches.
    pub batch_count: usize,
    /// Number of reduction levels above the inputs (1 for a flat sum).
    pub levels: usize,
}

/// Batched elementwise summation with a fan-in ceiling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchedSummation {
    batch_size: usize,
    max_inputs: usize,
}

impl Default for BatchedSummation {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BATCH_SIZE, Self::DEFAULT_MAX_INPUTS)
    }
}

impl BatchedSummation {
    /// Inputs per first-level batch unless configured otherwise.
    pub const DEFAULT_BATCH_SIZE: usize = 50;
    /// Largest accepted number of inputs unless configured otherwise.
    pub const DEFAULT_MAX_INPUTS: usize = 2500;

    /// A summation with the given branching factor (at least 1) and input
    /// ceiling.
    pub fn new(batch_size: usize, max_inputs: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            max_inputs,
        }
    }

    /// Inputs per first-level batch.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of first-level batches for `n` inputs.
    pub fn batch_count(&self, n: usize) -> usize {
        n.div_ceil(self.batch_size)
    }

    /// Fail unless `n` inputs are within the fan-in ceiling.
    pub fn check_fan_in(&self, n: usize) -> Result<(), ResourceLimitError> {
        if n > self.max_inputs {
            return Err(ResourceLimitError::FanInExceeded {
                count: n,
                max: self.max_inputs,
            });
        }
        Ok(())
    }

    /// Sum `rasters` on the calling thread.
    pub fn sum(&self, rasters: Vec<Grid>) -> Result<Summation, RunError> {
        self.sum_with(rasters, &WorkerPool::sequential())
    }

    /// Sum `rasters`, running independent batches on `pool`.
    pub fn sum_with(&self, rasters: Vec<Grid>, pool: &WorkerPool) -> Result<Summation, RunError> {
        let n = rasters.len();
        self.check_fan_in(n)?;
        let first = rasters.first().ok_or(PreconditionError::NoRasters)?;
        let geometry = *first.geometry();
        for g in &rasters[1..] {
            first.ensure_aligned(g.geometry())?;
        }

        let mut level = pool.map(chunk(rasters, self.batch_size), |_, batch| sum_flat(batch))?;
        let batch_count = level.len();
        let mut levels = 1;

        // A batch size of 1 would never shrink the partials.
        let fan_in = self.batch_size.max(2);
        while level.len() > fan_in {
            level = pool.map(chunk(level, fan_in), |_, batch| sum_flat(batch))?;
            levels += 1;
        }
        if level.len() > 1 {
            levels += 1;
        }
        let total = sum_flat(level)?;
        debug!(
            inputs = n,
            batch_count,
            levels,
            rows = geometry.rows(),
            cols = geometry.cols(),
            "summation complete"
        );
        Ok(Summation {
            total,
            batch_count,
            levels,
        })
    }
}

/// Split `items` into contiguous owned chunks of at most `size`.
fn chunk(items: Vec<Grid>, size: usize) -> Vec<Vec<Grid>> {
    let mut chunks = Vec::with_capacity(items.len().div_ceil(size));
    let mut it = items.into_iter().peekable();
    while it.peek().is_some() {
        chunks.push(it.by_ref().take(size).collect());
    }
    chunks
}

/// Left-to-right elementwise sum of one batch, reusing the first buffer.
fn sum_flat(batch: Vec<Grid>) -> Result<Grid, RunError> {
    let mut it = batch.into_iter();
    let mut acc = it.next().ok_or(PreconditionError::NoRasters)?;
    for g in it {
        acc.accumulate(&g)?;
    }
    Ok(acc)
}
