//! Page analysis module
//!
//! Turns one page into a `PageAnalysis`: the fields extracted from its HTML,
//! rule-based critical issues and opportunities, binary checks, and a
//! point-based score. Analysis never fails outright; anything that prevents
//! it yields `AnalysisResult::Degraded`.

pub mod checks;
mod extract;
mod rules;
mod score;
mod types;

pub use extract::{extract_page, is_potentially_broken, ExtractedPage, PageSignals};
pub use rules::evaluate;
pub use score::{calculate_page_seo_score, PageMetrics};
pub use types::{
    AnalysisResult, Check, CheckStatus, ContentBlock, ContentSummary, Heading, Headings,
    ImageDetail, ImageSummary, InternalLink, LinkDetail, LinkSummary, MetaData, PageAnalysis,
    Performance, ResourceCounts, SeoAnalysis, SocialTags, StructuredData, TextField,
};

use crate::crawler::Fetcher;
use crate::url::normalize_url;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// Analyzes pages of one site
///
/// Cheap to clone; clones share the fetcher.
#[derive(Debug, Clone)]
pub struct PageAnalyzer {
    fetcher: Arc<Fetcher>,
    base_url: Url,
    deep: bool,
}

impl PageAnalyzer {
    /// Creates an analyzer for the site at `base_url`
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Shared fetcher; its identity rotation is used for every request
    /// * `base_url` - The audited site, used to classify links as internal
    /// * `deep` - Whether to run the redirect and link-liveness checks
    pub fn new(fetcher: Arc<Fetcher>, base_url: Url, deep: bool) -> Self {
        Self {
            fetcher,
            base_url,
            deep,
        }
    }

    /// Fetches and analyzes one page
    ///
    /// Fetch failures, error statuses and non-HTML responses produce a
    /// degraded result; this method never returns an error.
    pub async fn analyze(&self, url: &str) -> AnalysisResult {
        let page_url = match normalize_url(url) {
            Ok(u) => u,
            Err(e) => return AnalysisResult::degraded(url, 0, format!("invalid URL: {}", e)),
        };

        let fetched = match self
            .fetcher
            .fetch(page_url.as_str(), self.fetcher.analysis_timeout())
            .await
        {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(url = %page_url, error = %e, "Analysis fetch failed");
                return AnalysisResult::degraded(page_url.as_str(), 0, e.to_string());
            }
        };

        if fetched.status_code >= 400 {
            return AnalysisResult::degraded(
                page_url.as_str(),
                fetched.status_code,
                format!("HTTP {}", fetched.status_code),
            );
        }
        if !fetched.is_html() {
            return AnalysisResult::degraded(
                page_url.as_str(),
                fetched.status_code,
                format!("unsupported content type: {}", fetched.content_type),
            );
        }

        let analysis = self
            .analyze_html(&page_url, fetched.status_code, &fetched.body)
            .await;
        debug!(url = %page_url, score = analysis.seo_analysis.seo_score, "Page analyzed");
        AnalysisResult::Ok(analysis)
    }

    /// Analyzes an already-fetched document
    pub async fn analyze_html(&self, page_url: &Url, status_code: u16, html: &str) -> PageAnalysis {
        let extracted = extract_page(html, page_url, &self.base_url);

        let mut seo_analysis = evaluate(&extracted);
        seo_analysis.seo_score = calculate_page_seo_score(&metrics_for(&extracted));

        let mut checks = checks::static_checks(page_url, &extracted);
        checks.extend(checks::network_checks(&self.fetcher, page_url, &extracted, self.deep).await);

        PageAnalysis {
            url: page_url.to_string(),
            status_code,
            error: None,
            meta_data: extracted.meta_data,
            social_tags: extracted.social_tags,
            headings: extracted.headings,
            images: extracted.images,
            links: extracted.links,
            structured_data: extracted.structured_data,
            performance: extracted.performance,
            content: extracted.content,
            seo_analysis,
            checks,
            analyzed_at: Utc::now(),
        }
    }
}

/// Collects the score inputs from an extracted page
pub fn metrics_for(page: &ExtractedPage) -> PageMetrics {
    let meta = &page.meta_data;
    PageMetrics {
        title_length: (!meta.title.is_empty).then_some(meta.title.length),
        description_length: (!meta.description.is_empty).then_some(meta.description.length),
        h1_count: page.headings.h1_count,
        word_count: page.content.word_count,
        total_images: page.images.total,
        images_with_alt: page.images.with_alt,
        internal_links: page.links.internal.len(),
        has_structured_data: page.structured_data.count > 0,
    }
}
