/// Audit job state definitions
///
/// This module defines every state an audit job can be in and the legal
/// transitions between them.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the current state of an audit job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    // ===== Active States =====
    /// Job has been created but not yet handed to a worker
    Pending,

    /// Job is waiting for a worker (initial dispatch or retry)
    Queued,

    /// Job is executing the audit pipeline
    Running,

    // ===== Terminal States =====
    /// Audit finished and its result was persisted
    Completed,

    /// Audit failed with no attempts left, or was cancelled
    Failed,
}

impl JobStatus {
    /// Returns true if this is a terminal state (no further processing)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if the transition `self -> next` is legal
    ///
    /// `Running -> Queued` is the retry/stall re-dispatch path; `Queued -> Failed`
    /// ends a job cancelled while it waits for a worker.
    pub fn can_transition(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Queued)
                | (Self::Queued, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
                | (Self::Running, Self::Queued)
                | (Self::Queued, Self::Failed)
        )
    }

    /// Converts the job status to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses a job status from a database string representation
    ///
    /// Returns None if the string doesn't match any known state.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "queued" => Some(Self::Queued),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all possible job states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Pending,
            Self::Queued,
            Self::Running,
            Self::Completed,
            Self::Failed,
        ]
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
