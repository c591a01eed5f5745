//! Output module for audit reports
//!
//! This module handles:
//! - Rendering audit results as markdown reports
//! - Summarizing a job and its result for the command line

mod markdown;

pub use markdown::{format_markdown_report, write_markdown_report};

use crate::audit::AuditResult;
use crate::job::AuditJob;
use thiserror::Error;

/// Errors that can occur while producing output
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// One-line description of a job, with its score when completed
///
/// # Arguments
///
/// * `job` - The job record
/// * `result` - The audit result, if the job completed
///
/// # Returns
///
/// A line such as `completed 100% score 87/100 (12 issues)`
pub fn job_summary_line(job: &AuditJob, result: Option<&AuditResult>) -> String {
    let mut line = format!("{} {}% ", job.status, job.progress);
    match (result, &job.error) {
        (Some(result), _) => line.push_str(&format!(
            "score {}/100 ({} issues, {} of {} pages analyzed)",
            result.score.overall_score,
            result.score.total_issues,
            result.page_analysis.len() - result.failed_pages.min(result.page_analysis.len()),
            result.page_analysis.len()
        )),
        (None, Some(error)) => line.push_str(&format!("error: {}", error)),
        (None, None) => line.push_str(&format!("target {}", job.target)),
    }
    line
}
