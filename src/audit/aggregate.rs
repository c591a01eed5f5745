//! Site-level aggregation of page analyses
//!
//! Everything here is pure: the projections are derived from finished
//! `PageAnalysis` records and the overall score from the issue counts.

use super::types::{AuditIssue, AuditResult, OverallScore, PageIssues, Severity};
use crate::analyzer::PageAnalysis;

/// Word count below which content is thin
pub const THIN_CONTENT_WORDS: usize = 300;

/// Word count below which content is short
pub const SHORT_CONTENT_WORDS: usize = 500;

/// The five per-page issue projections
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projections {
    pub meta: Vec<PageIssues>,
    pub heading: Vec<PageIssues>,
    pub image: Vec<PageIssues>,
    pub link: Vec<PageIssues>,
    pub content: Vec<PageIssues>,
}

/// Builds every projection over the analyses
///
/// Degraded analyses carry no parsed data and are skipped. Pages without
/// issues in a projection are left out of it.
pub fn project_issues(analyses: &[PageAnalysis]) -> Projections {
    Projections {
        meta: project(analyses, meta_issues),
        heading: project(analyses, heading_issues),
        image: project(analyses, image_issues),
        link: project(analyses, link_issues),
        content: project(analyses, content_issues),
    }
}

fn project(analyses: &[PageAnalysis], classify: fn(&PageAnalysis) -> Vec<AuditIssue>) -> Vec<PageIssues> {
    analyses
        .iter()
        .filter(|a| !a.is_degraded())
        .filter_map(|a| {
            let issues = classify(a);
            (!issues.is_empty()).then(|| PageIssues {
                url: a.url.clone(),
                issues,
            })
        })
        .collect()
}

/// Title, description, canonical, viewport and robots issues of one page
pub fn meta_issues(analysis: &PageAnalysis) -> Vec<AuditIssue> {
    let meta = &analysis.meta_data;
    let mut issues = Vec::new();

    if meta.title.is_empty {
        issues.push(AuditIssue::new("missing_title", Severity::Critical, "Page has no title tag"));
    } else if !meta.title.in_band() {
        issues.push(AuditIssue::new(
            "title_length",
            Severity::Medium,
            format!("Title is {} characters (recommended 30-60)", meta.title.length),
        ));
    }

    if meta.description.is_empty {
        issues.push(AuditIssue::new(
            "missing_description",
            Severity::High,
            "Page has no meta description",
        ));
    } else if !meta.description.in_band() {
        issues.push(AuditIssue::new(
            "description_length",
            Severity::Low,
            format!(
                "Meta description is {} characters (recommended 120-160)",
                meta.description.length
            ),
        ));
    }

    if meta.canonical_count == 0 {
        issues.push(AuditIssue::new("missing_canonical", Severity::Low, "No canonical link"));
    } else if meta.canonical_count > 1 {
        issues.push(AuditIssue::new(
            "duplicate_canonical",
            Severity::Medium,
            format!("{} canonical links declared", meta.canonical_count),
        ));
    }

    if meta.viewport.is_none() {
        issues.push(AuditIssue::new(
            "missing_viewport",
            Severity::High,
            "No viewport meta tag",
        ));
    }

    if meta.is_noindex() {
        issues.push(AuditIssue::new(
            "noindex",
            Severity::High,
            "Page is excluded from indexing by its robots meta tag",
        ));
    }

    issues
}

/// H1 and heading hierarchy issues of one page
pub fn heading_issues(analysis: &PageAnalysis) -> Vec<AuditIssue> {
    let headings = &analysis.headings;
    let mut issues = Vec::new();

    match headings.h1_count {
        0 => issues.push(AuditIssue::new("missing_h1", Severity::High, "Page has no H1 heading")),
        1 => {}
        n => issues.push(AuditIssue::new(
            "multiple_h1",
            Severity::Medium,
            format!("Page has {} H1 headings", n),
        )),
    }

    if let Some(level) = headings.skipped_level() {
        issues.push(AuditIssue::new(
            "skipped_heading_level",
            Severity::Low,
            format!("Heading hierarchy skips H{}", level),
        ));
    }

    issues
}

/// Alt text and dimension issues of one page
pub fn image_issues(analysis: &PageAnalysis) -> Vec<AuditIssue> {
    let images = &analysis.images;
    let mut issues = Vec::new();

    if images.without_alt > 0 {
        issues.push(AuditIssue::new(
            "missing_alt",
            Severity::Medium,
            format!("{} of {} images have no alt text", images.without_alt, images.total),
        ));
    }

    let undimensioned = images.details.iter().filter(|i| !i.has_dimensions).count();
    if undimensioned > 0 {
        issues.push(AuditIssue::new(
            "missing_dimensions",
            Severity::Low,
            format!("{} images have no width/height", undimensioned),
        ));
    }

    issues
}

/// Link issues of one page
pub fn link_issues(analysis: &PageAnalysis) -> Vec<AuditIssue> {
    let links = &analysis.links;
    let mut issues = Vec::new();

    if !links.potentially_broken.is_empty() {
        issues.push(AuditIssue::new(
            "potentially_broken_links",
            Severity::Low,
            format!("{} links look broken", links.potentially_broken.len()),
        ));
    }
    if links.internal.len() < 3 {
        issues.push(AuditIssue::new(
            "few_internal_links",
            Severity::Low,
            format!("Only {} internal links", links.internal.len()),
        ));
    }

    issues
}

/// Content length issues of one page
pub fn content_issues(analysis: &PageAnalysis) -> Vec<AuditIssue> {
    let words = analysis.content.word_count;
    if words < THIN_CONTENT_WORDS {
        vec![AuditIssue::new(
            "thin_content",
            Severity::High,
            format!("Thin content ({} words, minimum {})", words, THIN_CONTENT_WORDS),
        )]
    } else if words < SHORT_CONTENT_WORDS {
        vec![AuditIssue::new(
            "short_content",
            Severity::Medium,
            format!("Short content ({} words)", words),
        )]
    } else {
        Vec::new()
    }
}

/// Counts issues by severity across a result
///
/// Scans the nested issues of the meta, heading and image projections, the
/// site-level issues, and every broken link (each a low-severity issue).
/// The link and content projections are left out: their findings restate
/// page checks already counted through the other projections, and counting
/// them again would weigh one defect twice.
pub fn tally(result: &AuditResult) -> OverallScore {
    let mut score = OverallScore::default();

    let projected = result
        .meta_analysis
        .iter()
        .chain(&result.heading_structure)
        .chain(&result.image_analysis)
        .flat_map(|page| page.issues.iter().map(|i| i.severity));
    let site = result.site_checks.issues.iter().map(|i| i.severity);
    let broken = result.site_checks.broken_links.iter().map(|_| Severity::Low);

    for severity in projected.chain(site).chain(broken) {
        match severity {
            Severity::Critical => score.critical_count += 1,
            Severity::High => score.high_count += 1,
            Severity::Medium => score.medium_count += 1,
            Severity::Low => score.low_count += 1,
        }
        score.total_issues += 1;
    }

    score.overall_score = overall_score(
        score.critical_count,
        score.high_count,
        score.medium_count,
        score.low_count,
    );
    score
}

/// Computes the site score from severity counts
///
/// Each band's deduction is capped (critical 20, high 15, medium 10, low 5),
/// so one band alone removes at most its cap from the score.
pub fn overall_score(critical: usize, high: usize, medium: usize, low: usize) -> u8 {
    let deduction = (2.0 * critical as f64).min(20.0)
        + (0.5 * high as f64).min(15.0)
        + (0.2 * medium as f64).min(10.0)
        + (0.1 * low as f64).min(5.0);
    (100.0 - deduction).round().clamp(0.0, 100.0) as u8
}

/// Fills the projections and the score of a result from its analyses
pub fn aggregate(result: &mut AuditResult) {
    let projections = project_issues(&result.page_analysis);
    result.meta_analysis = projections.meta;
    result.heading_structure = projections.heading;
    result.image_analysis = projections.image;
    result.link_analysis = projections.link;
    result.content_analysis = projections.content;
    result.score = tally(result);
}
