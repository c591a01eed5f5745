//! Per-page analysis record types
//!
//! A `PageAnalysis` is built once per analyzed page and never mutated
//! afterwards. It serializes with camelCase keys so stored results read the
//! same as the report consumers expect.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A text field with its length-band flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextField {
    pub content: String,
    /// Length in characters
    pub length: usize,
    pub is_empty: bool,
    pub too_short: bool,
    pub too_long: bool,
}

impl TextField {
    /// Builds a field and flags it against the `[min, max]` character band
    ///
    /// An empty field is neither too short nor too long; emptiness is its own flag.
    pub fn new(content: Option<String>, min: usize, max: usize) -> Self {
        let content = content.unwrap_or_default();
        let length = content.chars().count();
        let is_empty = length == 0;
        Self {
            content,
            length,
            is_empty,
            too_short: !is_empty && length < min,
            too_long: length > max,
        }
    }

    /// Returns true if the field is present and inside its length band
    pub fn in_band(&self) -> bool {
        !self.is_empty && !self.too_short && !self.too_long
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaData {
    pub title: TextField,
    pub description: TextField,
    pub keywords: Option<String>,
    pub canonical: Option<String>,
    /// Number of canonical link elements; more than one is a defect
    pub canonical_count: usize,
    pub robots: Option<String>,
    pub viewport: Option<String>,
    pub charset: Option<String>,
    pub lang: Option<String>,
}

impl MetaData {
    /// Returns true if the robots meta tag forbids indexing
    pub fn is_noindex(&self) -> bool {
        self.robots
            .as_deref()
            .map(|r| r.to_lowercase().contains("noindex"))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialTags {
    /// `og:*` properties keyed without the prefix
    pub open_graph: BTreeMap<String, String>,
    /// `twitter:*` tags keyed without the prefix
    pub twitter: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    pub level: u8,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Headings {
    /// Every heading in document order
    pub structure: Vec<Heading>,
    pub h1_count: usize,
    pub h1_text: Vec<String>,
}

impl Headings {
    /// Returns the first level that is skipped going down the outline, if any
    ///
    /// An `h2` followed directly by an `h4` skips level 3.
    pub fn skipped_level(&self) -> Option<u8> {
        self.structure.windows(2).find_map(|pair| {
            let (prev, next) = (pair[0].level, pair[1].level);
            (next > prev + 1).then_some(prev + 1)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDetail {
    pub src: String,
    pub alt: Option<String>,
    pub has_alt: bool,
    pub is_lazy: bool,
    pub has_dimensions: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSummary {
    pub total: usize,
    pub with_alt: usize,
    pub without_alt: usize,
    pub details: Vec<ImageDetail>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkDetail {
    pub href: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkSummary {
    pub internal: Vec<LinkDetail>,
    pub external: Vec<LinkDetail>,
    pub potentially_broken: Vec<LinkDetail>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredData {
    /// Number of valid JSON-LD blocks
    pub count: usize,
    /// `@type` values found in the valid blocks
    pub types: Vec<String>,
    pub raw: Vec<serde_json::Value>,
    /// JSON-LD blocks that failed to parse and were dropped
    pub invalid_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceCounts {
    pub stylesheets: usize,
    pub scripts: usize,
    pub images: usize,
    pub iframes: usize,
}

/// Static resource footprint of a page
///
/// Real performance is not measured; `measured` is always false.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Performance {
    pub resource_counts: ResourceCounts,
    /// Size of the HTML document in bytes
    pub html_size: usize,
    pub measured: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub tag: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalLink {
    pub url: String,
    pub anchor_text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSummary {
    pub word_count: usize,
    pub blocks: Vec<ContentBlock>,
    pub internal_links: Vec<InternalLink>,
    pub sample_text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeoAnalysis {
    pub critical_issues: Vec<String>,
    pub opportunities: Vec<String>,
    pub recommendations: Vec<String>,
    /// Page score in [0, 100]
    pub seo_score: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    Pass,
    Fail,
    /// The check did not run (skipped tier, or nothing to evaluate)
    Unknown,
}

/// One binary assertion about a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    pub id: String,
    pub category: String,
    pub label: String,
    pub status: CheckStatus,
    pub recommendation: Option<String>,
}

/// The full analysis of one page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageAnalysis {
    pub url: String,
    /// HTTP status, or 0 when the fetch failed
    pub status_code: u16,
    /// Set only on degraded records
    pub error: Option<String>,
    pub meta_data: MetaData,
    pub social_tags: SocialTags,
    pub headings: Headings,
    pub images: ImageSummary,
    pub links: LinkSummary,
    pub structured_data: StructuredData,
    pub performance: Performance,
    pub content: ContentSummary,
    pub seo_analysis: SeoAnalysis,
    pub checks: Vec<Check>,
    pub analyzed_at: DateTime<Utc>,
}

impl PageAnalysis {
    /// Builds a degraded record carrying only the URL, the error and a zero score
    pub fn degraded(url: &str, status_code: u16, reason: &str) -> Self {
        Self {
            url: url.to_string(),
            status_code,
            error: Some(reason.to_string()),
            meta_data: MetaData::default(),
            social_tags: SocialTags::default(),
            headings: Headings::default(),
            images: ImageSummary::default(),
            links: LinkSummary::default(),
            structured_data: StructuredData::default(),
            performance: Performance::default(),
            content: ContentSummary::default(),
            seo_analysis: SeoAnalysis::default(),
            checks: Vec::new(),
            analyzed_at: Utc::now(),
        }
    }

    /// Returns true if this record stands in for a page that failed
    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }

    /// Looks up a check by id
    pub fn check(&self, id: &str) -> Option<&Check> {
        self.checks.iter().find(|c| c.id == id)
    }
}

/// Outcome of analyzing one page
///
/// Both arms carry a `PageAnalysis` so downstream stages handle one shape.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisResult {
    Ok(PageAnalysis),
    Degraded(PageAnalysis, String),
}

impl AnalysisResult {
    /// Builds the degraded arm for a page that could not be analyzed
    pub fn degraded(url: &str, status_code: u16, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::Degraded(PageAnalysis::degraded(url, status_code, &reason), reason)
    }

    pub fn analysis(&self) -> &PageAnalysis {
        match self {
            Self::Ok(analysis) | Self::Degraded(analysis, _) => analysis,
        }
    }

    pub fn into_analysis(self) -> PageAnalysis {
        match self {
            Self::Ok(analysis) | Self::Degraded(analysis, _) => analysis,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(..))
    }

    /// The degradation reason, if any
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Ok(_) => None,
            Self::Degraded(_, reason) => Some(reason),
        }
    }
}
