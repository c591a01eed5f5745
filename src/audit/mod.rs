//! Site audit module
//!
//! This module turns discovered pages and their analyses into one
//! `AuditResult`:
//! - `memory_tier` fixes the limits of a run from available memory
//! - `scheduler` runs page analyses in paced groups of concurrent batches
//! - `site_checks` covers robots.txt, sitemap, SSL, schema and broken links
//! - `aggregate` projects per-page issues and scores the site
//! - `coordinator` drives all of the above for one run

pub mod aggregate;
mod coordinator;
mod memory_tier;
mod scheduler;
pub mod site_checks;
mod types;

pub use aggregate::{aggregate, overall_score, project_issues, tally, Projections};
pub use coordinator::{checkpoints, run_audit, AuditPipeline, AuditRequest, ProgressSink};
pub use memory_tier::{parse_mem_available, MemoryTier, TierPolicy};
pub use scheduler::{BatchProgress, BatchScheduler};
pub use site_checks::run_site_checks;
pub use types::{
    AuditIssue, AuditResult, BrokenLink, ExternalPage, OverallScore, PageIssues, RobotsCheck,
    SchemaCoverage, Severity, SiteChecks, SitemapCheck, SslCheck,
};
