//! Page normalization module
//!
//! Maps a finished `PageAnalysis` to the `CanonicalPage` stored per
//! (client, slug), or to nothing when the page should not be persisted.

pub mod exclusion;
pub mod keyword;
pub mod slug;

pub use exclusion::{exclusion_reason, Exclusion};
pub use keyword::{infer_focus_keyword, KeywordSources};
pub use slug::{canonical_url, slug_for, slug_words, ROOT_SLUG};

use crate::analyzer::checks::{CHECK_ANALYTICS, CHECK_MIXED_CONTENT};
use crate::analyzer::{CheckStatus, ContentBlock, ImageDetail, InternalLink, PageAnalysis, Performance};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;
use url::Url;

/// SEO fields of a canonical page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeoFields {
    pub canonical: Option<String>,
    pub robots: Option<String>,
    pub focus_keyword: Option<String>,
    pub seo_score: u8,
}

/// Heading counts per level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingCounts {
    pub h1: usize,
    pub h2: usize,
    pub h3: usize,
    pub h4: usize,
    pub h5: usize,
    pub h6: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkCounts {
    pub internal: usize,
    pub external: usize,
    pub potentially_broken: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContent {
    pub word_count: usize,
    pub headings: HeadingCounts,
    pub links: LinkCounts,
    pub blocks: Vec<ContentBlock>,
    pub internal_links: Vec<InternalLink>,
}

/// Technical flags of a canonical page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Technical {
    pub has_ssl: bool,
    pub is_mobile_friendly: bool,
    pub has_structured_data: bool,
    pub is_indexable: bool,
    pub has_mixed_content: bool,
    pub has_analytics: bool,
    pub status_code: u16,
}

/// The long-lived snapshot of one page, unique per (client, slug)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalPage {
    pub client_id: String,
    pub url: String,
    pub slug: String,
    /// Empty when the page has neither a title nor an H1
    pub title: String,
    pub meta_description: String,
    pub h1: String,
    pub seo: SeoFields,
    pub structured_data: Vec<serde_json::Value>,
    pub open_graph: BTreeMap<String, String>,
    pub twitter: BTreeMap<String, String>,
    pub content: PageContent,
    pub images: Vec<ImageDetail>,
    pub performance: Performance,
    pub technical: Technical,
    /// Set by users to hide a page; never changed by an audit
    pub excluded: bool,
    pub updated_at: DateTime<Utc>,
}

/// Builds the canonical record of an analyzed page
///
/// # Arguments
///
/// * `analysis` - A finished analysis
/// * `client_id` - The client the page belongs to
/// * `prior` - The record already stored under the same slug, if any
///
/// # Returns
///
/// * `Some(CanonicalPage)` - The record to upsert
/// * `None` - The page is excluded, unparseable or degraded
pub fn normalize_page(
    analysis: &PageAnalysis,
    client_id: &str,
    prior: Option<&CanonicalPage>,
) -> Option<CanonicalPage> {
    let url = Url::parse(&analysis.url).ok()?;
    if let Some(reason) = exclusion_reason(&url) {
        debug!(url = %url, reason = %reason, "Page not persisted");
        return None;
    }
    if analysis.is_degraded() {
        debug!(url = %url, "Degraded analysis not persisted");
        return None;
    }

    let slug = slug_for(&url);
    let meta = &analysis.meta_data;
    let h1 = analysis.headings.h1_text.first().cloned().unwrap_or_default();
    let title = if !meta.title.is_empty {
        meta.title.content.clone()
    } else {
        h1.clone()
    };

    let focus_keyword = prior
        .and_then(|p| p.seo.focus_keyword.clone())
        .filter(|k| !k.trim().is_empty())
        .or_else(|| {
            infer_focus_keyword(&KeywordSources {
                slug: &slug_words(&slug),
                h1: &h1,
                title: &title,
                description: &meta.description.content,
                content: &analysis.content.sample_text,
            })
        });

    let check_is = |id: &str, status: CheckStatus| {
        analysis.check(id).map(|c| c.status == status).unwrap_or(false)
    };

    Some(CanonicalPage {
        client_id: client_id.to_string(),
        url: canonical_url(&url).to_string(),
        slug,
        title,
        meta_description: meta.description.content.clone(),
        h1,
        seo: SeoFields {
            canonical: meta.canonical.clone(),
            robots: meta.robots.clone(),
            focus_keyword,
            seo_score: analysis.seo_analysis.seo_score,
        },
        structured_data: analysis.structured_data.raw.clone(),
        open_graph: analysis.social_tags.open_graph.clone(),
        twitter: analysis.social_tags.twitter.clone(),
        content: PageContent {
            word_count: analysis.content.word_count,
            headings: heading_counts(analysis),
            links: LinkCounts {
                internal: analysis.links.internal.len(),
                external: analysis.links.external.len(),
                potentially_broken: analysis.links.potentially_broken.len(),
            },
            blocks: analysis.content.blocks.clone(),
            internal_links: analysis.content.internal_links.clone(),
        },
        images: analysis.images.details.clone(),
        performance: analysis.performance.clone(),
        technical: Technical {
            has_ssl: url.scheme() == "https",
            is_mobile_friendly: meta.viewport.is_some(),
            has_structured_data: analysis.structured_data.count > 0,
            is_indexable: !meta.is_noindex(),
            has_mixed_content: check_is(CHECK_MIXED_CONTENT, CheckStatus::Fail),
            has_analytics: check_is(CHECK_ANALYTICS, CheckStatus::Pass),
            status_code: analysis.status_code,
        },
        excluded: prior.map(|p| p.excluded).unwrap_or(false),
        updated_at: Utc::now(),
    })
}

fn heading_counts(analysis: &PageAnalysis) -> HeadingCounts {
    let mut counts = HeadingCounts::default();
    for heading in &analysis.headings.structure {
        match heading.level {
            1 => counts.h1 += 1,
            2 => counts.h2 += 1,
            3 => counts.h3 += 1,
            4 => counts.h4 += 1,
            5 => counts.h5 += 1,
            6 => counts.h6 += 1,
            _ => {}
        }
    }
    counts
}
