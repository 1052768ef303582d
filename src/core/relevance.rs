//! Lexical relevance scoring.
//!
//! The validator scores a snippet by how much of the originating query's
//! rationale it covers. This is deliberately a bag-of-words overlap, not a
//! semantic model, so a round of validation costs microseconds.

use std::collections::BTreeSet;

use unicode_segmentation::UnicodeSegmentation;

/// Words that carry no topical signal.
const STOPWORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "an", "and", "any", "are", "as", "at", "be", "been",
    "but", "by", "can", "could", "did", "do", "does", "for", "from", "had", "has", "have", "how",
    "if", "in", "into", "is", "it", "its", "more", "most", "no", "not", "of", "on", "or", "other",
    "our", "out", "over", "should", "so", "such", "than", "that", "the", "their", "them", "then",
    "there", "these", "they", "this", "those", "to", "up", "was", "we", "were", "what", "when",
    "where", "whether", "which", "while", "who", "why", "will", "with", "would", "you", "your",
];

/// Extracts the set of lowercase content-bearing tokens from `text`.
///
/// Splits on Unicode word boundaries, drops stopwords and single
/// characters (digits excepted, so years and versions survive).
#[must_use]
pub fn content_tokens(text: &str) -> BTreeSet<String> {
    text.unicode_words()
        .map(str::to_lowercase)
        .filter(|w| {
            let long_enough = w.chars().count() > 1 || w.chars().all(|c| c.is_ascii_digit());
            long_enough && !STOPWORDS.contains(&w.as_str())
        })
        .collect()
}

/// Fraction of `reference` tokens that also appear in `candidate`.
///
/// Returns a value in `[0.0, 1.0]`; `0.0` when `reference` has no
/// content tokens.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn lexical_overlap(reference: &BTreeSet<String>, candidate: &BTreeSet<String>) -> f32 {
    if reference.is_empty() {
        return 0.0;
    }
    let shared = reference.intersection(candidate).count();
    (shared as f32 / reference.len() as f32).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_tokens_drop_stopwords() {
        let tokens = content_tokens("What is the latest Rust release in 2025?");
        assert!(tokens.contains("latest"));
        assert!(tokens.contains("rust"));
        assert!(tokens.contains("release"));
        assert!(tokens.contains("2025"));
        assert!(!tokens.contains("the"));
        assert!(!tokens.contains("is"));
    }

    #[test]
    fn test_content_tokens_keeps_single_digits() {
        let tokens = content_tokens("Python 3 vs a b");
        assert!(tokens.contains("3"));
        assert!(!tokens.contains("b"));
    }

    #[test]
    fn test_lexical_overlap_full_and_partial() {
        let reference = content_tokens("tokio runtime scheduler");
        let full = content_tokens("The Tokio runtime uses a work-stealing scheduler.");
        let partial = content_tokens("Tokio is an async runtime.");
        let none = content_tokens("Baking sourdough bread at home.");

        assert!((lexical_overlap(&reference, &full) - 1.0).abs() < f32::EPSILON);
        let p = lexical_overlap(&reference, &partial);
        assert!((p - 2.0 / 3.0).abs() < 1e-6, "got {p}");
        assert!(lexical_overlap(&reference, &none).abs() < f32::EPSILON);
    }

    #[test]
    fn test_lexical_overlap_empty_reference() {
        let reference = content_tokens("the of and");
        let candidate = content_tokens("anything at all");
        assert!(lexical_overlap(&reference, &candidate).abs() < f32::EPSILON);
    }
}
