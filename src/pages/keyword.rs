//! Focus keyword inference
//!
//! Every source text is tokenized, stop words split it into runs, and each
//! run contributes its unigrams, bigrams and trigrams. A phrase scores the
//! weight of every source it appears in (once per occurrence). Bigrams get a
//! length bonus. The best phrase is suggested only when it clears the
//! confidence threshold.

use std::collections::HashMap;

/// Source weights
pub const SLUG_WEIGHT: f64 = 3.0;
pub const H1_WEIGHT: f64 = 4.0;
pub const TITLE_WEIGHT: f64 = 3.5;
pub const DESCRIPTION_WEIGHT: f64 = 2.0;
pub const CONTENT_WEIGHT: f64 = 1.0;

/// Multiplier applied to two-word phrases
pub const BIGRAM_BONUS: f64 = 1.3;

/// Minimum score for a phrase to be suggested
pub const MIN_SCORE: f64 = 2.0;

/// Characters of body text considered
const CONTENT_SAMPLE_CHARS: usize = 1000;

const STOP_WORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "an", "and", "any", "are", "as", "at", "be", "been",
    "but", "by", "can", "do", "does", "for", "from", "get", "has", "have", "how", "i", "if", "in",
    "into", "is", "it", "its", "just", "me", "more", "most", "my", "no", "not", "of", "on", "or",
    "our", "out", "so", "than", "that", "the", "their", "them", "then", "there", "these", "they",
    "this", "to", "up", "us", "was", "we", "were", "what", "when", "where", "which", "who", "why",
    "will", "with", "you", "your", "home", "page", "welcome", "official", "site", "website",
];

/// Separators between a page title and the site name
const TITLE_SEPARATORS: &[&str] = &[" | ", " - ", " – ", " — ", " :: ", " » ", " · "];

/// The texts a keyword is inferred from
#[derive(Debug, Clone, Default)]
pub struct KeywordSources<'a> {
    pub slug: &'a str,
    pub h1: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub content: &'a str,
}

/// Infers a focus keyword, or None when nothing is confident enough
pub fn infer_focus_keyword(sources: &KeywordSources<'_>) -> Option<String> {
    let content: String = sources.content.chars().take(CONTENT_SAMPLE_CHARS).collect();
    let weighted = [
        (sources.slug, SLUG_WEIGHT),
        (sources.h1, H1_WEIGHT),
        (clean_title(sources.title), TITLE_WEIGHT),
        (sources.description, DESCRIPTION_WEIGHT),
        (content.as_str(), CONTENT_WEIGHT),
    ];

    let mut scores: HashMap<String, f64> = HashMap::new();
    for (text, weight) in weighted {
        for phrase in phrases(text) {
            let bonus = if phrase.split(' ').count() == 2 {
                BIGRAM_BONUS
            } else {
                1.0
            };
            *scores.entry(phrase).or_insert(0.0) += weight * bonus;
        }
    }

    scores
        .into_iter()
        .filter(|(_, score)| *score >= MIN_SCORE)
        .max_by(|(a_phrase, a), (b_phrase, b)| {
            a.total_cmp(b)
                .then_with(|| a_phrase.len().cmp(&b_phrase.len()))
                .then_with(|| b_phrase.cmp(a_phrase))
        })
        .map(|(phrase, _)| phrase)
}

/// Drops a trailing site name from a title
pub fn clean_title(title: &str) -> &str {
    TITLE_SEPARATORS
        .iter()
        .filter_map(|sep| title.find(sep))
        .min()
        .map(|idx| &title[..idx])
        .unwrap_or(title)
        .trim()
}

/// Lowercased word tokens, or None at stop words and numbers
fn tokens(text: &str) -> Vec<Option<String>> {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .map(|raw| raw.trim_matches('\'').to_lowercase())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let is_number = word.chars().all(|c| c.is_ascii_digit());
            if is_number || word.chars().count() < 2 || STOP_WORDS.contains(&word.as_str()) {
                None
            } else {
                Some(word)
            }
        })
        .collect()
}

/// Every 1-3 word phrase inside runs of non-stop words
fn phrases(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let tokens = tokens(text);
    for run in tokens.split(|t| t.is_none()) {
        let words: Vec<&str> = run.iter().flatten().map(String::as_str).collect();
        for n in 1..=3 {
            for window in words.windows(n) {
                out.push(window.join(" "));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_title() {
        assert_eq!(clean_title("Running Shoes | Acme Store"), "Running Shoes");
        assert_eq!(clean_title("Blog - Tips - Acme"), "Blog");
        assert_eq!(clean_title("Plain title"), "Plain title");
    }

    #[test]
    fn test_phrases_respect_stop_words() {
        let p = phrases("Shoes for trail running");
        assert!(p.contains(&"shoes".to_string()));
        assert!(p.contains(&"trail running".to_string()));
        assert!(!p.iter().any(|x| x.contains("for")));
        assert!(!p.contains(&"shoes trail".to_string()));
    }

    #[test]
    fn test_bigram_wins_across_sources() {
        let sources = KeywordSources {
            slug: "running shoes",
            h1: "Best Running Shoes",
            title: "Running Shoes for Trail | Shop",
            description: "",
            content: "",
        };
        assert_eq!(infer_focus_keyword(&sources).as_deref(), Some("running shoes"));
    }

    #[test]
    fn test_low_confidence_yields_none() {
        let sources = KeywordSources {
            content: "hello world",
            ..Default::default()
        };
        assert_eq!(infer_focus_keyword(&sources), None);
    }

    #[test]
    fn test_empty_sources() {
        assert_eq!(infer_focus_keyword(&KeywordSources::default()), None);
    }

    #[test]
    fn test_numbers_and_stop_words_ignored() {
        let sources = KeywordSources {
            h1: "The 2024 guide",
            ..Default::default()
        };
        assert_eq!(infer_focus_keyword(&sources).as_deref(), Some("guide"));
    }
}
