//! Rules deciding which analyzed pages are persisted
//!
//! Rules are evaluated in order. Non-https pages are never kept, the site
//! root is always kept, and any other page is dropped when its path (or
//! query) matches one of the system, archive or utility patterns below.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;
use url::Url;

/// Why a page is not persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    NotHttps,
    CmsSystem,
    Sitemap,
    Template,
    DateArchive,
    Archive,
    FormPlugin,
    Search,
    Attachment,
    Trackback,
    Commerce,
}

impl Exclusion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotHttps => "not-https",
            Self::CmsSystem => "cms-system",
            Self::Sitemap => "sitemap",
            Self::Template => "template",
            Self::DateArchive => "date-archive",
            Self::Archive => "archive",
            Self::FormPlugin => "form-plugin",
            Self::Search => "search",
            Self::Attachment => "attachment",
            Self::Trackback => "trackback",
            Self::Commerce => "commerce",
        }
    }
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Path patterns, matched against the lowercased `path?query`
const RULES: &[(Exclusion, &str)] = &[
    (
        Exclusion::CmsSystem,
        r"^/(wp-admin|wp-json|wp-content|wp-includes)(/|$)|^/(wp-login|xmlrpc|wp-cron)\.php",
    ),
    (Exclusion::Sitemap, r"\.xml(\?|$)|^/sitemap[^/]*/?(\?|$)"),
    (
        Exclusion::Template,
        r"/(elementor_library|elementor-hf|et_pb_layout|fl-builder-template|ct_template|wp_template|wp_block|oxy_user_library)(/|$)|[?&](elementor-preview|fl_builder|et_fb)=?",
    ),
    (Exclusion::DateArchive, r"^/\d{4}/\d{2}(/\d{2})?/?(\?|$)"),
    (
        Exclusion::Archive,
        r"/(category|tag|author|product-category|product-tag|topics?)/|/page/\d+/?(\?|$)|/feed/?(\?|$)|^/comments/feed|[?&](cat|tag|author|paged|feed)=",
    ),
    (
        Exclusion::FormPlugin,
        r"/(wpforms|gravityforms|contact-form-7|wpcf7|formidable|ninja-forms)(/|$)|[?&](gf_page|wpforms_form_id)=",
    ),
    (Exclusion::Search, r"^/search(/|$)|[?&]s="),
    (
        Exclusion::Attachment,
        r"/attachment/|[?&]attachment_id=|\.(jpe?g|png|gif|webp|svg|ico|pdf|zip|mp3|mp4|mov|docx?|xlsx?|pptx?)(\?|$)",
    ),
    (Exclusion::Trackback, r"/(trackback|embed|pingback)/?(\?|$)"),
    (
        Exclusion::Commerce,
        r"^/(cart|basket|checkout|my-account|account|wishlist|order-received)(/|$)|[?&](add-to-cart|remove_item)=",
    ),
];

static COMPILED: OnceLock<Vec<(Exclusion, Regex)>> = OnceLock::new();

fn compiled_rules() -> &'static [(Exclusion, Regex)] {
    COMPILED.get_or_init(|| {
        RULES
            .iter()
            .filter_map(|(kind, pattern)| Regex::new(pattern).ok().map(|re| (*kind, re)))
            .collect()
    })
}

/// Returns true if the URL is the site root
pub fn is_root(url: &Url) -> bool {
    matches!(url.path(), "" | "/")
}

/// Returns the reason a URL is not persisted, or None if it is kept
pub fn exclusion_reason(url: &Url) -> Option<Exclusion> {
    if url.scheme() != "https" {
        return Some(Exclusion::NotHttps);
    }
    if is_root(url) {
        return None;
    }

    let target = match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
    .to_lowercase();

    compiled_rules()
        .iter()
        .find(|(_, re)| re.is_match(&target))
        .map(|(kind, _)| *kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reason(url: &str) -> Option<Exclusion> {
        exclusion_reason(&Url::parse(url).unwrap())
    }

    #[test]
    fn test_every_rule_compiles() {
        assert_eq!(compiled_rules().len(), RULES.len());
    }

    #[test]
    fn test_non_https_excluded_first() {
        assert_eq!(reason("http://ex.com/"), Some(Exclusion::NotHttps));
        assert_eq!(reason("http://ex.com/about"), Some(Exclusion::NotHttps));
    }

    #[test]
    fn test_root_always_kept() {
        assert_eq!(reason("https://ex.com/"), None);
        assert_eq!(reason("https://ex.com/?s=shoes"), None);
        assert_eq!(reason("https://ex.com"), None);
    }

    #[test]
    fn test_system_paths() {
        assert_eq!(reason("https://ex.com/wp-admin/options.php"), Some(Exclusion::CmsSystem));
        assert_eq!(reason("https://ex.com/wp-json/wp/v2/posts"), Some(Exclusion::CmsSystem));
        assert_eq!(reason("https://ex.com/wp-content/uploads/a.css"), Some(Exclusion::CmsSystem));
        assert_eq!(reason("https://ex.com/post-sitemap.xml"), Some(Exclusion::Sitemap));
        assert_eq!(reason("https://ex.com/elementor_library/hero/"), Some(Exclusion::Template));
    }

    #[test]
    fn test_archives() {
        assert_eq!(reason("https://ex.com/2024/03/"), Some(Exclusion::DateArchive));
        assert_eq!(reason("https://ex.com/2024/03/15"), Some(Exclusion::DateArchive));
        assert_eq!(reason("https://ex.com/category/news/"), Some(Exclusion::Archive));
        assert_eq!(reason("https://ex.com/author/jo/"), Some(Exclusion::Archive));
        assert_eq!(reason("https://ex.com/blog/page/2/"), Some(Exclusion::Archive));
        assert_eq!(reason("https://ex.com/feed/"), Some(Exclusion::Archive));
    }

    #[test]
    fn test_dated_post_is_kept() {
        assert_eq!(reason("https://ex.com/2024/03/spring-sale/"), None);
    }

    #[test]
    fn test_utility_pages() {
        assert_eq!(reason("https://ex.com/search/shoes"), Some(Exclusion::Search));
        assert_eq!(reason("https://ex.com/blog?s=shoes"), Some(Exclusion::Search));
        assert_eq!(reason("https://ex.com/brochure.pdf"), Some(Exclusion::Attachment));
        assert_eq!(reason("https://ex.com/post/attachment/photo/"), Some(Exclusion::Attachment));
        assert_eq!(reason("https://ex.com/post/trackback/"), Some(Exclusion::Trackback));
        assert_eq!(reason("https://ex.com/cart/"), Some(Exclusion::Commerce));
        assert_eq!(reason("https://ex.com/my-account/orders"), Some(Exclusion::Commerce));
        assert_eq!(reason("https://ex.com/wpforms/submit"), Some(Exclusion::FormPlugin));
    }

    #[test]
    fn test_content_pages_kept() {
        assert_eq!(reason("https://ex.com/about"), None);
        assert_eq!(reason("https://ex.com/blog/how-to-tie-shoes/"), None);
        assert_eq!(reason("https://ex.com/services/checkout-design"), None);
        assert_eq!(reason("https://ex.com/home"), None);
    }
}
