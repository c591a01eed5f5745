//! Job lifecycle events
//!
//! Events are handed to a [`JobReporter`] so that logging and push
//! notification stay out of the runner itself.

use tokio::sync::mpsc;
use uuid::Uuid;

/// Events emitted while a job moves through its lifecycle
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    /// Job accepted and queued
    Waiting { audit_id: Uuid },
    /// A dispatch started executing
    Active { audit_id: Uuid, attempt: u32 },
    /// Progress reached a new checkpoint
    Progress { audit_id: Uuid, progress: u8 },
    Completed { audit_id: Uuid, score: u8 },
    Failed {
        audit_id: Uuid,
        error: String,
        will_retry: bool,
    },
    /// The execution lock lapsed and the job was re-dispatched
    Stalled { audit_id: Uuid, stalled_count: u32 },
}

impl JobEvent {
    pub fn audit_id(&self) -> Uuid {
        match self {
            Self::Waiting { audit_id }
            | Self::Active { audit_id, .. }
            | Self::Progress { audit_id, .. }
            | Self::Completed { audit_id, .. }
            | Self::Failed { audit_id, .. }
            | Self::Stalled { audit_id, .. } => *audit_id,
        }
    }
}

/// Receives job events
pub trait JobReporter: Send + Sync {
    fn report(&self, event: JobEvent) {
        let _ = event;
    }
}

/// Reporter that discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopJobReporter;

impl JobReporter for NoopJobReporter {}

/// Reporter that uses the `tracing` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingJobReporter;

impl JobReporter for TracingJobReporter {
    fn report(&self, event: JobEvent) {
        match event {
            JobEvent::Waiting { audit_id } => {
                tracing::info!(%audit_id, "Audit queued");
            }
            JobEvent::Active { audit_id, attempt } => {
                tracing::info!(%audit_id, %attempt, "Audit started");
            }
            JobEvent::Progress { audit_id, progress } => {
                tracing::debug!(%audit_id, %progress, "Audit progress");
            }
            JobEvent::Completed { audit_id, score } => {
                tracing::info!(%audit_id, %score, "Audit completed");
            }
            JobEvent::Failed {
                audit_id,
                error,
                will_retry,
            } => {
                tracing::warn!(%audit_id, %error, %will_retry, "Audit failed");
            }
            JobEvent::Stalled {
                audit_id,
                stalled_count,
            } => {
                tracing::warn!(%audit_id, %stalled_count, "Audit stalled, re-dispatching");
            }
        }
    }
}

/// Forwards events to a channel, for push notification to a UI
#[derive(Debug, Clone)]
pub struct ChannelJobReporter {
    sender: mpsc::UnboundedSender<JobEvent>,
}

impl ChannelJobReporter {
    pub fn new(sender: mpsc::UnboundedSender<JobEvent>) -> Self {
        Self { sender }
    }

    /// Creates a reporter together with the receiving end of its channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<JobEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }
}

impl JobReporter for ChannelJobReporter {
    fn report(&self, event: JobEvent) {
        // A dropped receiver only means nobody is listening
        let _ = self.sender.send(event);
    }
}
