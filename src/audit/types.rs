//! Site-level audit result types

use super::memory_tier::TierPolicy;
use crate::analyzer::PageAnalysis;
use crate::crawler::DiscoveredPage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Severity band of an issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified deficiency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditIssue {
    /// Stable machine identifier, e.g. `missing_title`
    pub kind: String,
    pub message: String,
    pub severity: Severity,
}

impl AuditIssue {
    pub fn new(kind: &str, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            message: message.into(),
            severity,
        }
    }
}

/// The issues of one page in one projection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageIssues {
    pub url: String,
    pub issues: Vec<AuditIssue>,
}

/// An internal link that answered with an error or not at all
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokenLink {
    pub url: String,
    /// Status code, or None when the request failed
    pub status: Option<u16>,
    pub error: Option<String>,
    /// First analyzed page that links to it
    pub found_on: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotsCheck {
    pub present: bool,
    /// Whether `/` may be crawled by any user agent
    pub allows_root: bool,
    pub sitemaps: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitemapCheck {
    pub present: bool,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SslCheck {
    /// The audited URL uses https
    pub https: bool,
    /// Whether the http variant redirects to https; None when not probed
    pub http_redirects_to_https: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaCoverage {
    pub pages_analyzed: usize,
    pub pages_with_schema: usize,
    pub invalid_blocks: usize,
    pub types: Vec<String>,
}

/// Site-wide checks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteChecks {
    /// Empty unless deep analysis ran
    pub broken_links: Vec<BrokenLink>,
    pub robots: RobotsCheck,
    pub sitemap: SitemapCheck,
    pub ssl: SslCheck,
    pub schema: SchemaCoverage,
    /// Site-level deficiencies found by the checks above
    pub issues: Vec<AuditIssue>,
}

/// Severity tally and capped overall score
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallScore {
    pub overall_score: u8,
    pub total_issues: usize,
    pub critical_count: usize,
    pub high_count: usize,
    pub medium_count: usize,
    pub low_count: usize,
}

/// A page supplied by an external content source instead of discovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalPage {
    pub url: String,
    pub title: Option<String>,
    pub word_count: usize,
    /// The source's own record, kept verbatim
    #[serde(default)]
    pub raw_payload: serde_json::Value,
}

/// The complete result of one audit run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditResult {
    pub audit_id: Uuid,
    pub client_id: String,
    pub base_url: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub memory_tier: TierPolicy,
    pub discovered_pages: Vec<DiscoveredPage>,
    pub page_analysis: Vec<PageAnalysis>,
    pub meta_analysis: Vec<PageIssues>,
    pub heading_structure: Vec<PageIssues>,
    pub image_analysis: Vec<PageIssues>,
    pub link_analysis: Vec<PageIssues>,
    pub content_analysis: Vec<PageIssues>,
    pub site_checks: SiteChecks,
    pub score: OverallScore,
    /// Analyses that ended degraded
    pub failed_pages: usize,
    /// Hash of the configuration the audit ran with
    pub config_hash: Option<String>,
}

impl AuditResult {
    /// Creates an empty result for a run that is about to start
    pub fn new(audit_id: Uuid, client_id: &str, base_url: &str, memory_tier: TierPolicy) -> Self {
        Self {
            audit_id,
            client_id: client_id.to_string(),
            base_url: base_url.to_string(),
            started_at: Utc::now(),
            completed_at: None,
            memory_tier,
            discovered_pages: Vec::new(),
            page_analysis: Vec::new(),
            meta_analysis: Vec::new(),
            heading_structure: Vec::new(),
            image_analysis: Vec::new(),
            link_analysis: Vec::new(),
            content_analysis: Vec::new(),
            site_checks: SiteChecks::default(),
            score: OverallScore::default(),
            failed_pages: 0,
            config_hash: None,
        }
    }
}
