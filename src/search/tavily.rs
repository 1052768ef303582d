//! Tavily web search provider.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::{Deserialize, Serialize};

use super::provider::{SearchHit, SearchProvider};
use crate::error::{AgentError, ProviderError};

/// Default Tavily search endpoint.
pub const DEFAULT_TAVILY_URL: &str = "https://api.tavily.com/search";

/// Search depth understood by the Tavily API.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
enum SearchDepth {
    Basic,
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: SearchDepth,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

/// Tavily API client.
pub struct TavilyProvider {
    api_key: String,
    endpoint: String,
    client: reqwest::Client,
}

impl TavilyProvider {
    /// Creates a client for the public Tavily endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidConfig`] if the HTTP client cannot be
    /// built.
    pub fn new(api_key: impl Into<String>) -> Result<Self, AgentError> {
        Self::with_endpoint(api_key, DEFAULT_TAVILY_URL)
    }

    /// Creates a client against a custom endpoint (proxies, tests).
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidConfig`] if the HTTP client cannot be
    /// built.
    pub fn with_endpoint(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Result<Self, AgentError> {
        // The executor owns the per-query deadline; this one only guards
        // against a connection that never closes.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| AgentError::InvalidConfig {
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            client,
        })
    }
}

impl std::fmt::Debug for TavilyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TavilyProvider")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SearchProvider for TavilyProvider {
    fn name(&self) -> &'static str {
        "tavily"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ProviderError> {
        let request = TavilyRequest {
            api_key: &self.api_key,
            query,
            search_depth: SearchDepth::Basic,
            max_results,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Network {
                message: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited {
                retry_after: parse_retry_after(response.headers()),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Network {
                message: format!("Tavily API error {status}: {}", truncate(&body, 200)),
            });
        }

        let body = response.text().await.map_err(|e| ProviderError::Network {
            message: e.to_string(),
        })?;
        parse_body(&body)
    }
}

/// Decodes a Tavily response body into hits, dropping entries without a URL.
fn parse_body(body: &str) -> Result<Vec<SearchHit>, ProviderError> {
    let parsed: TavilyResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::MalformedResponse {
            message: format!("failed to parse Tavily response: {e}"),
        })?;

    Ok(parsed
        .results
        .into_iter()
        .filter(|r| !r.url.trim().is_empty())
        .map(|r| SearchHit::new(r.url, r.title, r.content))
        .collect())
}

/// Reads a delta-seconds `Retry-After` header.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn truncate(s: &str, max_chars: usize) -> &str {
    s.char_indices().nth(max_chars).map_or(s, |(i, _)| &s[..i])
}
