//! Queue worker
//!
//! Executes queued audits one at a time. Each audit still fans out its page
//! fetches internally through the batch scheduler.

use super::{AuditJob, AuditOptions, JobRunner, Target};
use crate::AuditError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

/// Submits jobs to a running [`AuditWorker`]
#[derive(Clone)]
pub struct WorkerHandle {
    runner: JobRunner,
    sender: mpsc::UnboundedSender<Uuid>,
}

impl WorkerHandle {
    /// Records a job and hands it to the worker
    pub fn enqueue(&self, target: Target, options: AuditOptions) -> Result<AuditJob, AuditError> {
        let job = self.runner.submit(target, options)?;
        self.sender
            .send(job.audit_id)
            .map_err(|_| AuditError::Stage("audit worker has stopped".to_string()))?;
        Ok(job)
    }

    /// Gets a job, including its current progress
    pub fn job(&self, audit_id: Uuid) -> Result<Option<AuditJob>, AuditError> {
        self.runner.job(audit_id)
    }
}

/// Runs queued audits until cancelled or until every handle is dropped
pub struct AuditWorker {
    runner: JobRunner,
    receiver: mpsc::UnboundedReceiver<Uuid>,
}

impl AuditWorker {
    pub fn new(runner: JobRunner) -> (Self, WorkerHandle) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = WorkerHandle {
            runner: runner.clone(),
            sender,
        };
        (Self { runner, receiver }, handle)
    }

    /// Processes jobs in arrival order
    ///
    /// Returns the number of jobs that reached a terminal state.
    pub async fn run(mut self, cancel: CancellationToken) -> usize {
        info!("Audit worker started");
        let mut processed = 0;

        loop {
            let audit_id = tokio::select! {
                _ = cancel.cancelled() => break,
                next = self.receiver.recv() => match next {
                    Some(id) => id,
                    None => break,
                },
            };

            match self.runner.run_job(audit_id).await {
                Ok(job) => {
                    processed += 1;
                    info!(%audit_id, status = %job.status, "Audit finished");
                }
                Err(e) => {
                    error!(%audit_id, error = %e, "Audit could not be run");
                }
            }
        }

        info!(processed, "Audit worker stopped");
        processed
    }
}
