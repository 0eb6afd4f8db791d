//! Bounded worker pool for per-feature and per-batch work.
//!
//! Tasks are queued on a crossbeam channel and pulled by scoped worker
//! threads; results come back on a second channel tagged with their task
//! index, so the output order always equals the input order regardless of
//! which worker finished first. The first failing task raises a shared
//! cancellation flag and the remaining workers stop pulling tasks.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::unbounded;
use spi_core::{ComputationError, RunError};
use tracing::debug;

/// A fixed-size pool of scoped worker threads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    /// A pool with `workers` threads (at least one).
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    /// A pool that runs everything on the calling thread.
    pub fn sequential() -> Self {
        Self::new(1)
    }

    /// Configured thread count.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Apply `f` to every item, returning results in input order.
    ///
    /// `f` receives the item's position and the item by value. On failure
    /// the error of the lowest-indexed failed task that ran is returned and
    /// every other result is dropped. A panicking task is reported as
    /// [`ComputationError::WorkerPanicked`].
    pub fn map<T, R, F>(&self, items: Vec<T>, f: F) -> Result<Vec<R>, RunError>
    where
        T: Send,
        R: Send,
        F: Fn(usize, T) -> Result<R, RunError> + Sync,
    {
        let n = items.len();
        let workers = self.workers.min(n);
        if workers <= 1 {
            let run = || -> Result<Vec<R>, RunError> {
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| f(i, item))
                    .collect()
            };
            return catch_unwind(AssertUnwindSafe(run)).unwrap_or_else(|payload| {
                Err(ComputationError::WorkerPanicked {
                    reason: panic_reason(payload.as_ref()),
                }
                .into())
            });
        }

        let (task_tx, task_rx) = unbounded::<(usize, T)>();
        for task in items.into_iter().enumerate() {
            // The receiver is alive until the scope below ends.
            let _ = task_tx.send(task);
        }
        drop(task_tx);

        let (result_tx, result_rx) = unbounded::<(usize, Result<R, RunError>)>();
        let cancelled = AtomicBool::new(false);
        debug!(workers, tasks = n, "worker pool started");

        let panicked = std::thread::scope(|s| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    let task_rx = task_rx.clone();
                    let result_tx = result_tx.clone();
                    let cancelled = &cancelled;
                    let f = &f;
                    s.spawn(move || {
                        while !cancelled.load(Ordering::Acquire) {
                            let Ok((i, item)) = task_rx.recv() else {
                                break;
                            };
                            let result = f(i, item);
                            if result.is_err() {
                                cancelled.store(true, Ordering::Release);
                            }
                            if result_tx.send((i, result)).is_err() {
                                break;
                            }
                        }
                    })
                })
                .collect();

            let mut panicked = None;
            for handle in handles {
                if let Err(payload) = handle.join() {
                    panicked.get_or_insert_with(|| panic_reason(payload.as_ref()));
                }
            }
            panicked
        });
        drop(result_tx);

        if let Some(reason) = panicked {
            return Err(ComputationError::WorkerPanicked { reason }.into());
        }

        let mut slots: Vec<Option<R>> = (0..n).map(|_| None).collect();
        let mut first_error: Option<(usize, RunError)> = None;
        for (i, result) in result_rx.iter() {
            match result {
                Ok(r) => slots[i] = Some(r),
                Err(e) => {
                    if first_error.as_ref().map_or(true, |(j, _)| i < *j) {
                        first_error = Some((i, e));
                    }
                }
            }
        }
        if let Some((_, e)) = first_error {
            return Err(e);
        }
        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| slot.ok_or(ComputationError::TaskLost { index }.into()))
            .collect()
    }
}

fn panic_reason(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spi_core::{ErrorKind, PreconditionError};
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn preserves_input_order() {
        let pool = WorkerPool::new(4);
        let out = pool
            .map((0..100u64).collect(), |i, x| {
                // Uneven work so completion order differs from input order.
                if x % 7 == 0 {
                    std::thread::sleep(std::time::Duration::from_millis(2));
                }
                Ok((i, x * 2))
            })
            .unwrap();
        for (i, (idx, v)) in out.into_iter().enumerate() {
            assert_eq!(idx, i);
            assert_eq!(v, i as u64 * 2);
        }
    }

    #[test]
    fn sequential_and_parallel_agree() {
        let items: Vec<f64> = (0..37).map(|i| i as f64 * 0.1).collect();
        let seq = WorkerPool::sequential()
            .map(items.clone(), |_, x| Ok(x.sqrt()))
            .unwrap();
        let par = WorkerPool::new(3).map(items, |_, x| Ok(x.sqrt())).unwrap();
        assert_eq!(seq, par);
    }

    #[test]
    fn empty_input_is_empty_output() {
        let out: Vec<u8> = WorkerPool::new(8).map(Vec::<u8>::new(), |_, x| Ok(x)).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn failure_reports_lowest_index_and_cancels() {
        let ran = AtomicUsize::new(0);
        let err = WorkerPool::new(2)
            .map((0..1000usize).collect(), |i, _| {
                ran.fetch_add(1, Ordering::Relaxed);
                if i >= 3 {
                    Err(PreconditionError::EmptyFeatureSet.into())
                } else {
                    Ok(i)
                }
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert!(ran.load(Ordering::Relaxed) < 1000);
    }

    #[test]
    fn panic_on_calling_thread_becomes_computation_error() {
        let ran = AtomicUsize::new(0);
        let err = WorkerPool::sequential()
            .map(vec![1, 2, 3, 4], |_, x| {
                ran.fetch_add(1, Ordering::Relaxed);
                if x == 2 {
                    panic!("boom");
                }
                Ok(x)
            })
            .unwrap_err();
        assert_eq!(
            err,
            RunError::Computation(ComputationError::WorkerPanicked {
                reason: "boom".into()
            })
        );
        assert_eq!(ran.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn panic_becomes_computation_error() {
        let err = WorkerPool::new(2)
            .map(vec![1, 2, 3, 4], |_, x| {
                if x == 3 {
                    panic!("boom");
                }
                Ok(x)
            })
            .unwrap_err();
        assert_eq!(
            err,
            RunError::Computation(ComputationError::WorkerPanicked {
                reason: "boom".into()
            })
        );
    }
}
