//! Pluggable search provider trait and result types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::query::QueryId;
use crate::error::ProviderError;

/// A raw hit as returned by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Source URL.
    pub url: String,
    /// Page title.
    pub title: String,
    /// Text snippet.
    pub snippet: String,
}

impl SearchHit {
    /// Creates a hit.
    #[must_use]
    pub fn new(url: impl Into<String>, title: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            snippet: snippet.into(),
        }
    }
}

/// A hit stamped with the query that produced it and when it was fetched.
///
/// Created by the search executor and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Source URL as returned by the provider.
    pub source_url: String,
    /// Page title.
    pub title: String,
    /// Text snippet.
    pub snippet: String,
    /// When the provider answered.
    pub fetched_at: DateTime<Utc>,
    /// Query that surfaced this result.
    pub query_id: QueryId,
}

impl SearchResult {
    /// Stamps a provider hit.
    #[must_use]
    pub fn from_hit(hit: SearchHit, query_id: QueryId, fetched_at: DateTime<Utc>) -> Self {
        Self {
            source_url: hit.url,
            title: hit.title,
            snippet: hit.snippet,
            fetched_at,
            query_id,
        }
    }
}

/// Trait for web search backends.
///
/// Implementations handle transport and response decoding for one
/// search API and classify failures into [`ProviderError`] kinds. Retries
/// and timeouts are the executor's job, not the provider's.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Provider name (e.g., `"tavily"`).
    fn name(&self) -> &'static str;

    /// Runs one query.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the provider throttles, the network
    /// fails, or the response cannot be decoded.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ProviderError>;
}

/// Provider that never finds anything. Used when no search backend is
/// configured so the loop degrades to an uncited answer.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSearchProvider;

#[async_trait]
impl SearchProvider for NoopSearchProvider {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn search(&self, query: &str, _max_results: usize) -> Result<Vec<SearchHit>, ProviderError> {
        tracing::warn!(query, "search requested but no search provider is configured");
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_hit_stamps_query() {
        let now = Utc::now();
        let id = QueryId { round: 1, index: 2 };
        let result = SearchResult::from_hit(
            SearchHit::new("https://a.example/x", "A", "snippet"),
            id,
            now,
        );
        assert_eq!(result.source_url, "https://a.example/x");
        assert_eq!(result.title, "A");
        assert_eq!(result.query_id, id);
        assert_eq!(result.fetched_at, now);
    }

    #[tokio::test]
    async fn test_noop_provider_returns_nothing() {
        let hits = NoopSearchProvider.search("anything", 5).await;
        assert_eq!(hits, Ok(Vec::new()));
        assert_eq!(NoopSearchProvider.name(), "none");
    }
}
