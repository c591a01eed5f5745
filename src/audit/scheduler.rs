//! Batch scheduler for page analysis
//!
//! Pages are split into fixed-size batches and batches are grouped. Every
//! batch in a group runs concurrently, and every item in a batch runs
//! concurrently, so at most `batch_size * parallel_batches` tasks are alive
//! at once. The scheduler waits for the whole group, pauses, then starts the
//! next one.

use super::memory_tier::TierPolicy;
use crate::AuditError;
use futures::future::join_all;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Progress reported after each finished group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    pub completed_batches: usize,
    pub total_batches: usize,
}

impl BatchProgress {
    /// Fraction of batches finished, in [0, 1]
    pub fn fraction(&self) -> f64 {
        if self.total_batches == 0 {
            1.0
        } else {
            self.completed_batches as f64 / self.total_batches as f64
        }
    }
}

/// Runs work items in paced groups of concurrent batches
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    batch_size: usize,
    parallel_batches: usize,
    group_delay: Duration,
}

impl BatchScheduler {
    pub fn new(batch_size: usize, parallel_batches: usize, group_delay: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            parallel_batches: parallel_batches.max(1),
            group_delay,
        }
    }

    /// Builds a scheduler with the limits of a memory-tier policy
    pub fn from_policy(policy: &TierPolicy) -> Self {
        Self::new(policy.batch_size, policy.parallel_batches, policy.group_delay)
    }

    /// Number of batches needed for `items` work items
    pub fn total_batches(&self, items: usize) -> usize {
        items.div_ceil(self.batch_size)
    }

    /// Upper bound on tasks running at the same time
    pub fn peak_concurrency(&self) -> usize {
        self.batch_size * self.parallel_batches
    }

    /// Runs `task` over every item and returns the results in input order
    ///
    /// Each item runs on its own tokio task. An item whose task panics or is
    /// aborted is turned into a result by `degrade` and the rest of its batch
    /// carries on. `progress` is called once per finished group.
    ///
    /// # Returns
    ///
    /// * `Ok(results)` - One result per item, in the order given
    /// * `Err(AuditError::Cancelled)` - The token fired; running tasks are aborted
    pub async fn run<T, R, F, Fut, D, P>(
        &self,
        items: Vec<T>,
        cancel: &CancellationToken,
        task: F,
        degrade: D,
        mut progress: P,
    ) -> Result<Vec<R>, AuditError>
    where
        T: Clone + Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut,
        Fut: Future<Output = R> + Send + 'static,
        D: Fn(&T, String) -> R,
        P: FnMut(BatchProgress),
    {
        let total_batches = self.total_batches(items.len());
        let batches: Vec<Vec<T>> = items
            .chunks(self.batch_size)
            .map(|chunk| chunk.to_vec())
            .collect();
        let group_count = batches.len().div_ceil(self.parallel_batches);

        let mut results = Vec::with_capacity(items.len());
        let mut completed_batches = 0;

        for (group_index, group) in batches.chunks(self.parallel_batches).enumerate() {
            if cancel.is_cancelled() {
                return Err(AuditError::Cancelled);
            }
            debug!(
                group = group_index + 1,
                groups = group_count,
                batches = group.len(),
                "Starting batch group"
            );

            let handles: Vec<Vec<(T, JoinHandle<R>)>> = group
                .iter()
                .map(|batch| {
                    batch
                        .iter()
                        .map(|item| (item.clone(), tokio::spawn(task(item.clone()))))
                        .collect()
                })
                .collect();
            let abort_handles: Vec<_> = handles
                .iter()
                .flatten()
                .map(|(_, handle)| handle.abort_handle())
                .collect();

            let degrade = &degrade;
            let group_future = join_all(handles.into_iter().map(|batch| {
                join_all(batch.into_iter().map(|(item, handle)| async move {
                    match handle.await {
                        Ok(result) => result,
                        Err(e) => {
                            warn!(error = %e, "Batch task failed");
                            degrade(&item, format!("analysis task failed: {}", e))
                        }
                    }
                }))
            }));

            let group_results = tokio::select! {
                _ = cancel.cancelled() => {
                    for handle in &abort_handles {
                        handle.abort();
                    }
                    return Err(AuditError::Cancelled);
                }
                finished = group_future => finished,
            };

            completed_batches += group.len();
            results.extend(group_results.into_iter().flatten());
            progress(BatchProgress {
                completed_batches,
                total_batches,
            });

            let is_last = group_index + 1 == group_count;
            if !is_last && !self.group_delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(AuditError::Cancelled),
                    _ = tokio::time::sleep(self.group_delay) => {}
                }
            }
        }

        Ok(results)
    }
}
