//! Case folding and tokenization shared by the scorer and the merger.

use std::collections::BTreeSet;

/// Lower-cased alphanumeric tokens; every other character separates tokens.
///
/// `char::to_lowercase` is locale independent, so identical input always
/// folds the same way.
pub fn tokenize(input: &str) -> impl Iterator<Item = String> + '_ {
    input
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
}

pub fn normalize_text(input: &str) -> String {
    tokenize(input).collect::<Vec<_>>().join(" ")
}

/// Token set over at most `limit` leading tokens.
pub fn token_set(input: &str, limit: Option<usize>) -> BTreeSet<String> {
    match limit {
        Some(limit) => tokenize(input).take(limit).collect(),
        None => tokenize(input).collect(),
    }
}

/// Jaccard index; an empty side scores 0.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// Trimmed, whitespace-collapsed, lower-cased comparison key. Punctuation is kept.
pub fn fold_key(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_splits_on_punctuation_and_lowercases() {
        let tokens: Vec<_> = tokenize("Senior Rust/Go Engineer (Remote)").collect();
        assert_eq!(tokens, vec!["senior", "rust", "go", "engineer", "remote"]);
    }

    #[test]
    fn token_set_respects_limit() {
        let set = token_set("one two three four", Some(2));
        assert_eq!(set.len(), 2);
        assert!(set.contains("one") && set.contains("two"));
    }

    #[test]
    fn jaccard_handles_empty_and_overlap() {
        let empty = BTreeSet::new();
        let ab = token_set("a b", None);
        let bc = token_set("b c", None);
        assert_eq!(jaccard(&empty, &ab), 0.0);
        assert!((jaccard(&ab, &bc) - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn fold_key_collapses_whitespace() {
        assert_eq!(fold_key("  Acme   Corp "), "acme corp");
        assert_eq!(fold_key("ACME, Inc."), "acme, inc.");
    }
}
