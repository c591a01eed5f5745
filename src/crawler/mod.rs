//! Crawler module for page fetching and discovery
//!
//! This module contains the discovery side of an audit, including:
//! - HTTP fetching with per-instance identity rotation
//! - HTML parsing and link extraction
//! - Sitemap seeding
//! - The breadth-first frontier

mod fetcher;
mod frontier;
mod identity;
mod parser;
pub mod sitemap;

pub use fetcher::{FetchedPage, Fetcher};
pub use frontier::{classify_issues, DiscoveredPage, Frontier, FrontierLimits, PAGE_LOAD_ERROR};
pub use identity::{Identity, IdentityRotation};
pub use parser::{parse_html, ParsedPage};

pub(crate) use parser::{
    collapse_whitespace, element_text, first_text, meta_content, resolve_link, select_all,
    visible_text,
};
