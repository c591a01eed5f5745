//! Integration tests for seo-sweep
//!
//! Each module runs audits end-to-end against wiremock servers.

mod audit_tests;
mod job_tests;
