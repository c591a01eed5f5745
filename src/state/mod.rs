//! State module for tracking audit jobs
//!
//! # Components
//!
//! - `JobStatus`: the lifecycle of an audit job (pending, queued, running, completed, failed)

mod job_state;

pub use job_state::JobStatus;
