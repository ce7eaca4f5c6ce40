//! Text utilities shared by every strategy
//!
//! All similarity in this crate is lexical: word overlap, substring and
//! word-boundary matching.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Minimum token length kept by keyword extraction
pub const MIN_KEYWORD_LEN: usize = 3;

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "about", "all", "also", "an", "and", "any", "are", "as", "at", "be", "been", "but",
        "by", "can", "co", "company", "corp", "corporation", "do", "for", "from", "had", "has",
        "have", "he", "her", "his", "how", "in", "inc", "into", "is", "it", "its", "llc", "ltd",
        "more", "most", "my", "no", "not", "of", "on", "or", "other", "our", "out", "over", "she",
        "so", "some", "such", "than", "that", "the", "their", "them", "then", "there", "these",
        "they", "this", "those", "to", "up", "us", "was", "we", "were", "what", "when", "which",
        "who", "will", "with", "you", "your",
    ]
    .into_iter()
    .collect()
});

pub fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(token)
}

/// Lowercase, replace non-alphanumerics with spaces, collapse whitespace
pub fn normalize_text(text: &str) -> String {
    let replaced: String = text
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect::<String>()
        .to_lowercase();

    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whitespace tokens of the normalized text (duplicates kept)
pub fn tokenize(text: &str) -> Vec<String> {
    normalize_text(text)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Tokens of at least `MIN_KEYWORD_LEN` chars that are not stop words,
/// deduplicated in first-seen order
pub fn extract_keywords(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    tokenize(text)
        .into_iter()
        .filter(|t| t.chars().count() >= MIN_KEYWORD_LEN && !is_stop_word(t))
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// Occurrence count of each token in the text
pub fn token_frequencies(text: &str) -> HashMap<String, usize> {
    let mut freq = HashMap::new();
    for token in tokenize(text) {
        *freq.entry(token).or_insert(0) += 1;
    }
    freq
}

/// Case-insensitive whole-word containment
///
/// `needle` is matched literally between `\b` boundaries, so
/// `contains_word("architecture design", "design")` holds while
/// `contains_word("redesign", "design")` does not. Compiles the pattern on
/// every call; loops over many haystacks should build a [`WordMatcher`].
pub fn contains_word(haystack: &str, needle: &str) -> bool {
    WordMatcher::new(needle).is_match(haystack)
}

/// Compiled whole-word matcher for one needle
#[derive(Debug, Clone)]
pub struct WordMatcher {
    needle: String,
    regex: Option<Regex>,
}

impl WordMatcher {
    pub fn new(needle: &str) -> Self {
        let needle = needle.trim().to_string();
        let regex = if needle.is_empty() {
            None
        } else {
            let pattern = format!(r"\b{}\b", regex::escape(&needle));
            match RegexBuilder::new(&pattern).case_insensitive(true).build() {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!(needle = %needle, error = %e, "Word pattern rejected, matching by tokens");
                    None
                }
            }
        };
        Self { needle, regex }
    }

    pub fn needle(&self) -> &str {
        &self.needle
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        if self.needle.is_empty() || haystack.is_empty() {
            return false;
        }
        match &self.regex {
            Some(re) => re.is_match(haystack),
            None => contains_token_run(haystack, &self.needle),
        }
    }
}

/// Whether the needle's tokens appear consecutively among the haystack's
fn contains_token_run(haystack: &str, needle: &str) -> bool {
    let needle = tokenize(needle);
    let haystack = tokenize(haystack);
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle.as_slice())
}

/// Jaccard similarity of two token collections (treated as sets)
///
/// Two empty sets have similarity 0.0.
pub fn jaccard_similarity<S: AsRef<str>>(a: &[S], b: &[S]) -> f64 {
    let set_a: HashSet<&str> = a.iter().map(AsRef::as_ref).collect();
    let set_b: HashSet<&str> = b.iter().map(AsRef::as_ref).collect();

    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    intersection as f64 / union as f64
}

/// Whether `candidate` denotes exactly `code`
///
/// Accepts the bare code or the code followed by a one- or two-zero
/// suffix, optionally separated by `-` or a space ("5411", "5411-0",
/// "541100", "5411 00"). Any other trailing text rejects the match.
pub fn is_exact_code_match(code: &str, candidate: &str) -> bool {
    let code = code.trim();
    let candidate = candidate.trim();
    if code.is_empty() || candidate.is_empty() {
        return false;
    }

    let Some(rest) = candidate.strip_prefix(code) else {
        return false;
    };
    if rest.is_empty() {
        return true;
    }

    let suffix = rest
        .strip_prefix('-')
        .or_else(|| rest.strip_prefix(' '))
        .unwrap_or(rest);
    (1..=2).contains(&suffix.len()) && suffix.chars().all(|c| c == '0')
}

/// Token shaped like an industry code (2-6 digits)
pub fn looks_like_code(token: &str) -> bool {
    (2..=6).contains(&token.len()) && token.chars().all(|c| c.is_ascii_digit())
}

/// Clamp any score into [0, 1], mapping NaN to 0
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Joe's  Pizza & Pasta!! "), "joe s pizza pasta");
        assert_eq!(normalize_text("Café-Bar"), "café bar");
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn test_extract_keywords_drops_stop_words_and_short_tokens() {
        let keywords = extract_keywords("The pizza and the pasta at Joe's pizza");
        assert_eq!(keywords, vec!["pizza", "pasta", "joe"]);
    }

    #[test]
    fn test_token_frequencies() {
        let freq = token_frequencies("pizza pasta pizza");
        assert_eq!(freq["pizza"], 2);
        assert_eq!(freq["pasta"], 1);
    }

    #[test]
    fn test_contains_word_boundaries() {
        assert!(contains_word("architecture design", "design"));
        assert!(!contains_word("redesign", "design"));
        assert!(contains_word("Eating Places", "eating"));
        assert!(!contains_word("restaurants", "restaurant"));
        assert!(contains_word("FAMILY restaurant", "Restaurant"));
        assert!(!contains_word("anything", ""));
    }

    #[test]
    fn test_contains_word_escapes_regex_metacharacters() {
        assert!(contains_word("price (usd) list", "usd"));
        assert!(!contains_word("aaa", "a.a"));
    }

    #[test]
    fn test_word_matcher_reused_across_haystacks() {
        let matcher = WordMatcher::new(" Pizza ");
        assert_eq!(matcher.needle(), "Pizza");
        assert!(matcher.is_match("Joe's pizza place"));
        assert!(!matcher.is_match("pizzeria"));
        assert!(!WordMatcher::new("").is_match("pizza"));
    }

    #[test]
    fn test_token_run_matches_whole_words() {
        assert!(contains_token_run("fast food restaurant", "food restaurant"));
        assert!(!contains_token_run("seafood restaurant", "food restaurant"));
    }

    #[test]
    fn test_jaccard_properties() {
        let a = vec!["pizza", "pasta", "italian"];
        let b = vec!["pizza", "burger"];
        let disjoint = vec!["plumbing"];

        assert_eq!(jaccard_similarity(&a, &a), 1.0);
        assert_eq!(jaccard_similarity(&a, &disjoint), 0.0);
        assert_eq!(jaccard_similarity(&a, &b), jaccard_similarity(&b, &a));
        assert!((jaccard_similarity(&a, &b) - 0.25).abs() < 1e-12);

        let empty: Vec<&str> = Vec::new();
        assert_eq!(jaccard_similarity(&empty, &empty), 0.0);
    }

    #[test]
    fn test_exact_code_match_accepts() {
        for candidate in ["5411", "5411-0", "541100", "5411 00", "5411-00"] {
            assert!(is_exact_code_match("5411", candidate), "{candidate}");
        }
    }

    #[test]
    fn test_exact_code_match_rejects() {
        for candidate in ["541", "54111", "5411a", "", "5411-000", "5411-01"] {
            assert!(!is_exact_code_match("5411", candidate), "{candidate}");
        }
    }

    #[test]
    fn test_looks_like_code() {
        assert!(looks_like_code("5812"));
        assert!(looks_like_code("722511"));
        assert!(!looks_like_code("7"));
        assert!(!looks_like_code("58a2"));
    }

    #[test]
    fn test_clamp_unit() {
        assert_eq!(clamp_unit(1.4), 1.0);
        assert_eq!(clamp_unit(-0.1), 0.0);
        assert_eq!(clamp_unit(f64::NAN), 0.0);
    }
}
