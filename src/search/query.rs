//! Search queries issued by the review loop.

use serde::{Deserialize, Serialize};

use crate::core::normalize_query_text;

/// Identity of a query within one loop invocation: its round and its
/// position in that round's query sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QueryId {
    /// Round the query was issued in (1-based).
    pub round: u32,
    /// Position within the round (0-based).
    pub index: usize,
}

impl std::fmt::Display for QueryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "r{}q{}", self.round, self.index)
    }
}

/// A search query. Immutable once issued.
///
/// Two queries are the same query when they share a round and their
/// normalized text (case- and whitespace-insensitive) is equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    text: String,
    rationale: String,
    round: u32,
    index: usize,
}

impl Query {
    /// Creates a query. Surrounding whitespace is trimmed from both fields.
    #[must_use]
    pub fn new(
        text: impl Into<String>,
        rationale: impl Into<String>,
        round: u32,
        index: usize,
    ) -> Self {
        Self {
            text: text.into().trim().to_string(),
            rationale: rationale.into().trim().to_string(),
            round,
            index,
        }
    }

    /// Query text sent to the search provider.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Why the query was issued; used as the relevance reference.
    #[must_use]
    pub fn rationale(&self) -> &str {
        &self.rationale
    }

    /// Round the query belongs to.
    #[must_use]
    pub const fn round(&self) -> u32 {
        self.round
    }

    /// Position within the round.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Stable identifier.
    #[must_use]
    pub const fn id(&self) -> QueryId {
        QueryId {
            round: self.round,
            index: self.index,
        }
    }

    /// Case- and whitespace-insensitive form of the text.
    #[must_use]
    pub fn normalized_text(&self) -> String {
        normalize_query_text(&self.text)
    }
}

impl PartialEq for Query {
    fn eq(&self, other: &Self) -> bool {
        self.round == other.round && self.normalized_text() == other.normalized_text()
    }
}

impl Eq for Query {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_trims_and_exposes_fields() {
        let q = Query::new("  Rust 2024 edition ", " find release date ", 2, 1);
        assert_eq!(q.text(), "Rust 2024 edition");
        assert_eq!(q.rationale(), "find release date");
        assert_eq!(q.round(), 2);
        assert_eq!(q.index(), 1);
        assert_eq!(q.id(), QueryId { round: 2, index: 1 });
        assert_eq!(q.id().to_string(), "r2q1");
    }

    #[test]
    fn test_query_identity_is_round_and_normalized_text() {
        let a = Query::new("Tokio  Runtime", "a", 1, 0);
        let b = Query::new("tokio runtime", "b", 1, 3);
        let c = Query::new("tokio runtime", "a", 2, 0);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
