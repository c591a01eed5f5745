//! Slug and canonical URL derivation

use super::exclusion::is_root;
use crate::url::site_root;
use url::Url;

/// Slug reserved for the site root
///
/// A page whose path is literally `/__root__` gets a trailing `/` instead,
/// which no other path produces.
pub const ROOT_SLUG: &str = "__root__";

/// File extensions dropped from the last path segment
const PAGE_EXTENSIONS: &[&str] = &[".html", ".htm", ".php", ".aspx", ".asp"];

/// Derives the persistence slug of a page URL
///
/// The root maps to `__root__`. Other pages use their lowercased,
/// percent-decoded path without leading or trailing slashes, so
/// `/Blog/My-Post/` becomes `blog/my-post`.
pub fn slug_for(url: &Url) -> String {
    if is_root(url) {
        return ROOT_SLUG.to_string();
    }

    let decoded = percent_decode(url.path()).to_lowercase();
    let mut slug = decoded
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/");

    for ext in PAGE_EXTENSIONS {
        if let Some(stripped) = slug.strip_suffix(ext) {
            if !stripped.is_empty() && !stripped.ends_with('/') {
                slug = stripped.to_string();
            }
            break;
        }
    }

    if slug.is_empty() {
        return ROOT_SLUG.to_string();
    }
    if slug == ROOT_SLUG {
        slug.push('/');
    }
    slug
}

/// The URL stored for a page: query and fragment removed
///
/// The root becomes `scheme://host/`.
pub fn canonical_url(url: &Url) -> Url {
    if is_root(url) {
        return site_root(url);
    }
    let mut canonical = url.clone();
    canonical.set_query(None);
    canonical.set_fragment(None);
    canonical
}

/// The last segment of a slug, with separators turned into spaces
///
/// Used as a keyword source: `blog/organic-dog-food` gives `organic dog food`.
pub fn slug_words(slug: &str) -> String {
    if slug == ROOT_SLUG {
        return String::new();
    }
    slug.rsplit('/')
        .next()
        .unwrap_or_default()
        .replace(['-', '_'], " ")
}

fn percent_decode(input: &str) -> String {
    let escaped = input.replace('+', "%2B").replace('&', "%26");
    url::form_urlencoded::parse(format!("p={}", escaped).as_bytes())
        .next()
        .map(|(_, value)| value.into_owned())
        .unwrap_or_else(|| input.to_string())
}
