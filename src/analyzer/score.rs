//! Point-based page score

/// The page measurements the score is computed from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMetrics {
    /// Title length in characters; None when the title is missing
    pub title_length: Option<usize>,
    /// Meta description length in characters; None when missing
    pub description_length: Option<usize>,
    pub h1_count: usize,
    pub word_count: usize,
    pub total_images: usize,
    pub images_with_alt: usize,
    pub internal_links: usize,
    pub has_structured_data: bool,
}

/// Computes a page score in `[0, 100]`
///
/// Starts at 100 and subtracts:
///
/// | Condition | Deduction |
/// |-----------|-----------|
/// | No title / title outside 30..=60 chars | 20 / 10 |
/// | No description / description outside 120..=160 chars | 20 / 10 |
/// | Not exactly one H1 | 15 |
/// | Fewer than 300 / 500 words | 20 / 10 |
/// | Images without alt text | up to 10, proportional |
/// | No internal links / fewer than 3 | 10 / 5 |
/// | No structured data | 5 |
///
/// # Example
///
/// ```
/// use seo_sweep::analyzer::{calculate_page_seo_score, PageMetrics};
///
/// let metrics = PageMetrics {
///     h1_count: 1,
///     word_count: 250,
///     ..Default::default()
/// };
/// assert_eq!(calculate_page_seo_score(&metrics), 25);
/// ```
pub fn calculate_page_seo_score(metrics: &PageMetrics) -> u8 {
    let mut score = 100.0_f64;

    score -= match metrics.title_length {
        None | Some(0) => 20.0,
        Some(len) if !(30..=60).contains(&len) => 10.0,
        Some(_) => 0.0,
    };

    score -= match metrics.description_length {
        None | Some(0) => 20.0,
        Some(len) if !(120..=160).contains(&len) => 10.0,
        Some(_) => 0.0,
    };

    if metrics.h1_count != 1 {
        score -= 15.0;
    }

    if metrics.word_count < 300 {
        score -= 20.0;
    } else if metrics.word_count < 500 {
        score -= 10.0;
    }

    if metrics.total_images > 0 {
        let alt_ratio = metrics.images_with_alt.min(metrics.total_images) as f64
            / metrics.total_images as f64;
        score -= (1.0 - alt_ratio) * 10.0;
    }

    if metrics.internal_links == 0 {
        score -= 10.0;
    } else if metrics.internal_links < 3 {
        score -= 5.0;
    }

    if !metrics.has_structured_data {
        score -= 5.0;
    }

    score.round().clamp(0.0, 100.0) as u8
}
