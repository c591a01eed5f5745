//! Markdown report generation
//!
//! This module renders an audit result as a human-readable markdown report:
//! the score, severity counts, per-page scores and issues, and the
//! site-wide checks.

use super::OutputResult;
use crate::audit::{AuditResult, PageIssues};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Rows shown in the per-page tables before truncating
const MAX_ROWS: usize = 50;

/// Writes the markdown report of an audit
///
/// # Arguments
///
/// * `result` - The finished audit
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote the report
/// * `Err(OutputError)` - Failed to write the report
pub fn write_markdown_report(result: &AuditResult, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_report(result);

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats an audit result as markdown
pub fn format_markdown_report(result: &AuditResult) -> String {
    let mut md = String::new();
    let score = &result.score;

    md.push_str(&format!("# SEO Audit: {}\n\n", result.base_url));

    // Run metadata
    md.push_str("## Audit Information\n\n");
    md.push_str(&format!("- **Audit ID**: {}\n", result.audit_id));
    md.push_str(&format!("- **Client**: {}\n", result.client_id));
    md.push_str(&format!("- **Started**: {}\n", result.started_at.to_rfc3339()));
    if let Some(completed) = result.completed_at {
        md.push_str(&format!("- **Completed**: {}\n", completed.to_rfc3339()));
        let seconds = (completed - result.started_at).num_seconds();
        md.push_str(&format!("- **Duration**: {} seconds\n", seconds));
    }
    md.push_str(&format!(
        "- **Memory Tier**: {} (deep checks {})\n",
        result.memory_tier.tier,
        if result.memory_tier.deep_analysis { "on" } else { "off" }
    ));
    if let Some(hash) = &result.config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    md.push('\n');

    // Score
    md.push_str("## Overall Score\n\n");
    md.push_str(&format!("**{} / 100**\n\n", score.overall_score));
    md.push_str("| Severity | Issues |\n");
    md.push_str("|----------|--------|\n");
    md.push_str(&format!("| Critical | {} |\n", score.critical_count));
    md.push_str(&format!("| High | {} |\n", score.high_count));
    md.push_str(&format!("| Medium | {} |\n", score.medium_count));
    md.push_str(&format!("| Low | {} |\n", score.low_count));
    md.push_str(&format!("| **Total** | {} |\n\n", score.total_issues));

    // Pages
    md.push_str("## Pages\n\n");
    md.push_str(&format!(
        "- **Discovered**: {}\n- **Analyzed**: {}\n- **Failed**: {}\n\n",
        result.discovered_pages.len(),
        result.page_analysis.len(),
        result.failed_pages
    ));
    if !result.page_analysis.is_empty() {
        md.push_str("| URL | Status | SEO Score | Words | Note |\n");
        md.push_str("|-----|--------|-----------|-------|------|\n");
        for page in result.page_analysis.iter().take(MAX_ROWS) {
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                page.url,
                page.status_code,
                page.seo_analysis.seo_score,
                page.content.word_count,
                escape_cell(page.error.as_deref().unwrap_or(""))
            ));
        }
        push_truncation(&mut md, result.page_analysis.len());
        md.push('\n');
    }

    push_issue_section(&mut md, "Meta Tags", &result.meta_analysis);
    push_issue_section(&mut md, "Heading Structure", &result.heading_structure);
    push_issue_section(&mut md, "Images", &result.image_analysis);
    push_issue_section(&mut md, "Links", &result.link_analysis);
    push_issue_section(&mut md, "Content", &result.content_analysis);

    // Site-wide checks
    let checks = &result.site_checks;
    md.push_str("## Site Checks\n\n");
    md.push_str(&format!(
        "- **robots.txt**: {}\n",
        if checks.robots.present { "present" } else { "missing" }
    ));
    md.push_str(&format!(
        "- **Sitemap**: {}\n",
        checks.sitemap.location.as_deref().unwrap_or("not found")
    ));
    md.push_str(&format!(
        "- **HTTPS**: {}\n",
        if checks.ssl.https { "yes" } else { "no" }
    ));
    if let Some(redirects) = checks.ssl.http_redirects_to_https {
        md.push_str(&format!(
            "- **HTTP redirects to HTTPS**: {}\n",
            if redirects { "yes" } else { "no" }
        ));
    }
    md.push_str(&format!(
        "- **Structured data**: {} of {} pages\n\n",
        checks.schema.pages_with_schema, checks.schema.pages_analyzed
    ));

    if !checks.issues.is_empty() {
        md.push_str("| Severity | Issue |\n");
        md.push_str("|----------|-------|\n");
        for issue in &checks.issues {
            md.push_str(&format!("| {} | {} |\n", issue.severity, escape_cell(&issue.message)));
        }
        md.push('\n');
    }

    if !checks.broken_links.is_empty() {
        md.push_str("### Broken Links\n\n");
        md.push_str("| URL | Status | Found On |\n");
        md.push_str("|-----|--------|----------|\n");
        for link in checks.broken_links.iter().take(MAX_ROWS) {
            let status = match (link.status, &link.error) {
                (Some(code), _) => code.to_string(),
                (None, Some(error)) => escape_cell(error),
                (None, None) => "-".to_string(),
            };
            md.push_str(&format!("| {} | {} | {} |\n", link.url, status, link.found_on));
        }
        push_truncation(&mut md, checks.broken_links.len());
        md.push('\n');
    }

    md
}

fn push_issue_section(md: &mut String, title: &str, pages: &[PageIssues]) {
    if pages.is_empty() {
        return;
    }
    md.push_str(&format!("## {}\n\n", title));
    md.push_str("| URL | Severity | Issue |\n");
    md.push_str("|-----|----------|-------|\n");

    let rows: Vec<_> = pages
        .iter()
        .flat_map(|page| page.issues.iter().map(move |issue| (&page.url, issue)))
        .collect();
    for (url, issue) in rows.iter().take(MAX_ROWS) {
        md.push_str(&format!(
            "| {} | {} | {} |\n",
            url,
            issue.severity,
            escape_cell(&issue.message)
        ));
    }
    push_truncation(md, rows.len());
    md.push('\n');
}

fn push_truncation(md: &mut String, total: usize) {
    if total > MAX_ROWS {
        md.push_str(&format!("\n... and {} more\n", total - MAX_ROWS));
    }
}

/// Keeps free text from breaking a table row
fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::PageAnalysis;
    use crate::audit::{AuditIssue, BrokenLink, MemoryTier, Severity};
    use uuid::Uuid;

    fn create_test_result() -> AuditResult {
        let mut result = AuditResult::new(
            Uuid::new_v4(),
            "acme",
            "https://acme.test/",
            MemoryTier::Medium.policy(),
        );
        result.page_analysis = vec![PageAnalysis::degraded(
            "https://acme.test/gone",
            404,
            "Page Load Error",
        )];
        result.failed_pages = 1;
        result.meta_analysis = vec![PageIssues {
            url: "https://acme.test/".into(),
            issues: vec![AuditIssue::new(
                "missing_title",
                Severity::Critical,
                "Page has no title tag",
            )],
        }];
        result.score.overall_score = 85;
        result.score.critical_count = 1;
        result.score.total_issues = 1;
        result
    }

    #[test]
    fn test_format_markdown_report() {
        let markdown = format_markdown_report(&create_test_result());

        assert!(markdown.contains("# SEO Audit: https://acme.test/"));
        assert!(markdown.contains("**85 / 100**"));
        assert!(markdown.contains("| Critical | 1 |"));
        assert!(markdown.contains("## Meta Tags"));
        assert!(markdown.contains("| https://acme.test/ | critical | Page has no title tag |"));
        assert!(markdown.contains("| https://acme.test/gone | 404 | 0 | 0 | Page Load Error |"));
        assert!(!markdown.contains("## Images"));
    }

    #[test]
    fn test_markdown_with_broken_links() {
        let mut result = create_test_result();
        result.site_checks.broken_links = vec![BrokenLink {
            url: "https://acme.test/old".into(),
            status: Some(404),
            error: None,
            found_on: "https://acme.test/".into(),
        }];

        let markdown = format_markdown_report(&result);

        assert!(markdown.contains("### Broken Links"));
        assert!(markdown.contains("| https://acme.test/old | 404 | https://acme.test/ |"));
    }

    #[test]
    fn test_escape_cell() {
        assert_eq!(escape_cell("a | b\nc"), "a \\| b c");
    }

    #[test]
    fn test_write_markdown_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("audit.md");

        write_markdown_report(&create_test_result(), &path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("# SEO Audit"));
    }
}
