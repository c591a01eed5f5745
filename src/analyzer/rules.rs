//! Deficiency and opportunity rules
//!
//! A fixed rule set turns the extracted fields into three message lists.
//! Critical issues block ranking, opportunities are improvements, and
//! recommendations call out what the page already does well.

use super::extract::ExtractedPage;
use super::types::SeoAnalysis;

/// Stylesheets above this count are reported
pub const MAX_STYLESHEETS: usize = 5;
/// Script files above this count are reported
pub const MAX_SCRIPTS: usize = 10;
/// Internal links below this count are reported
pub const MIN_INTERNAL_LINKS: usize = 3;

/// Runs the rule set over an extracted page
///
/// The returned analysis has `seo_score` left at zero; the caller fills it in.
pub fn evaluate(page: &ExtractedPage) -> SeoAnalysis {
    let mut analysis = SeoAnalysis::default();
    critical_rules(page, &mut analysis.critical_issues);
    opportunity_rules(page, &mut analysis.opportunities);
    recommendation_rules(page, &mut analysis.recommendations);
    analysis
}

fn critical_rules(page: &ExtractedPage, out: &mut Vec<String>) {
    let meta = &page.meta_data;

    if meta.title.is_empty {
        out.push("Missing title tag".to_string());
    }
    if meta.description.is_empty {
        out.push("Missing meta description".to_string());
    }
    if page.headings.h1_count == 0 {
        out.push("Missing H1 heading".to_string());
    }
    if meta.viewport.is_none() {
        out.push("Missing viewport meta tag".to_string());
    }
    if page.content.word_count < 300 {
        out.push(format!(
            "Thin content ({} words, minimum 300)",
            page.content.word_count
        ));
    }
}

fn opportunity_rules(page: &ExtractedPage, out: &mut Vec<String>) {
    let meta = &page.meta_data;

    if meta.title.too_short {
        out.push(format!(
            "Title is too short ({} chars, recommend 30-60)",
            meta.title.length
        ));
    } else if meta.title.too_long {
        out.push(format!(
            "Title is too long ({} chars, recommend 30-60)",
            meta.title.length
        ));
    }

    if meta.description.too_short {
        out.push(format!(
            "Meta description is too short ({} chars, recommend 120-160)",
            meta.description.length
        ));
    } else if meta.description.too_long {
        out.push(format!(
            "Meta description is too long ({} chars, recommend 120-160)",
            meta.description.length
        ));
    }

    if meta.canonical.is_none() {
        out.push("Add a canonical link".to_string());
    }
    if meta.charset.is_none() {
        out.push("Declare a character set".to_string());
    }
    if meta.lang.is_none() {
        out.push("Set the lang attribute on <html>".to_string());
    }
    if page.structured_data.count == 0 {
        out.push("Add structured data (JSON-LD)".to_string());
    }
    if page.social_tags.open_graph.is_empty() {
        out.push("Add Open Graph tags".to_string());
    }
    if page.social_tags.twitter.is_empty() {
        out.push("Add Twitter card tags".to_string());
    }

    let resources = &page.performance.resource_counts;
    if resources.stylesheets > MAX_STYLESHEETS {
        out.push(format!(
            "Too many CSS files ({}), consider bundling",
            resources.stylesheets
        ));
    }
    if resources.scripts > MAX_SCRIPTS {
        out.push(format!(
            "Too many JavaScript files ({}), consider bundling",
            resources.scripts
        ));
    }

    if page.links.internal.len() < MIN_INTERNAL_LINKS {
        out.push(format!(
            "Too few internal links ({}), add at least {}",
            page.links.internal.len(),
            MIN_INTERNAL_LINKS
        ));
    }
}

fn recommendation_rules(page: &ExtractedPage, out: &mut Vec<String>) {
    if page.content.word_count > 2000 {
        out.push(format!(
            "Comprehensive content ({} words)",
            page.content.word_count
        ));
    }
    if page.structured_data.count > 0 && !page.structured_data.types.is_empty() {
        out.push(format!(
            "Structured data present: {}",
            page.structured_data.types.join(", ")
        ));
    }
    if page.images.total > 0 && page.images.without_alt == 0 {
        out.push("All images have alt text".to_string());
    }
    if page.meta_data.title.in_band() && page.meta_data.description.in_band() {
        out.push("Title and meta description are well sized".to_string());
    }
}
