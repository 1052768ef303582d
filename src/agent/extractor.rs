//! Query extraction.
//!
//! Round 1 asks the extractor model for queries. Later rounds reuse the
//! judge's suggested queries directly and only fall back to the model
//! when the judge named gaps without suggesting how to search for them.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, warn};

use super::config::AgentConfig;
use super::judge::Verdict;
use super::prompt::build_extractor_prompt;
use super::provider::LlmProvider;
use super::traits::{Agent, strip_code_fence};
use crate::core::normalize_query_text;
use crate::error::AgentError;
use crate::search::Query;

/// Agent wrapper around the extractor model.
pub struct ExtractorAgent {
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl ExtractorAgent {
    /// Creates an extractor agent.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.extractor_model.clone(),
            max_tokens: config.extractor_max_tokens,
            system_prompt,
        }
    }

    /// Parses `(text, rationale)` pairs from a model response.
    ///
    /// Accepts `{"queries": [{"text", "rationale"}]}`, `{"queries": ["..."]}`
    /// or a bare array of either. Returns `None` when the response is not
    /// JSON of any of those shapes.
    fn parse_candidates(content: &str) -> Option<Vec<(String, String)>> {
        let value: Value = serde_json::from_str(strip_code_fence(content)).ok()?;
        let items = match &value {
            Value::Array(items) => items,
            Value::Object(map) => map.get("queries")?.as_array()?,
            _ => return None,
        };

        Some(
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(text) => Some((text.clone(), String::new())),
                    Value::Object(obj) => {
                        let text = obj
                            .get("text")
                            .or_else(|| obj.get("query"))
                            .and_then(Value::as_str)?;
                        let rationale = obj
                            .get("rationale")
                            .and_then(Value::as_str)
                            .unwrap_or_default();
                        Some((text.to_string(), rationale.to_string()))
                    }
                    _ => None,
                })
                .collect(),
        )
    }
}

#[async_trait]
impl Agent for ExtractorAgent {
    fn name(&self) -> &'static str {
        "extractor"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn json_mode(&self) -> bool {
        true
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

/// Derives the search queries for one round.
pub struct QueryExtractor {
    agent: ExtractorAgent,
    max_queries: usize,
}

impl QueryExtractor {
    /// Creates an extractor emitting at most `max_queries` per round.
    #[must_use]
    pub fn new(agent: ExtractorAgent, max_queries: usize) -> Self {
        Self {
            agent,
            max_queries: max_queries.max(1),
        }
    }

    /// Produces the queries for `round`.
    ///
    /// `refinement` is the previous round's verdict (absent in round 1).
    /// `issued` holds every query from earlier rounds; repeats of those,
    /// and duplicates within the round, are dropped. An empty result means
    /// "no search needed" and is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] only when the extractor model call fails.
    pub async fn extract(
        &self,
        provider: &dyn LlmProvider,
        content: &str,
        round: u32,
        refinement: Option<&Verdict>,
        issued: &[Query],
        today: NaiveDate,
    ) -> Result<Vec<Query>, AgentError> {
        if content.trim().is_empty() {
            debug!(round, "empty content, nothing to search");
            return Ok(Vec::new());
        }

        let candidates = match refinement {
            Some(verdict) if !verdict.new_queries.is_empty() => verdict
                .new_queries
                .iter()
                .enumerate()
                .map(|(i, q)| {
                    let rationale = verdict
                        .gaps
                        .get(i)
                        .or_else(|| verdict.gaps.first())
                        .cloned()
                        .unwrap_or_else(|| verdict.reason.clone());
                    (q.clone(), rationale)
                })
                .collect(),
            Some(verdict) if !verdict.gaps.is_empty() => {
                self.ask_model(provider, content, &verdict.gaps, issued, today)
                    .await?
            }
            Some(_) => Vec::new(),
            None => self.ask_model(provider, content, &[], issued, today).await?,
        };

        let queries = self.finalize(candidates, round, issued);
        debug!(
            round,
            queries = ?queries.iter().map(Query::text).collect::<Vec<_>>(),
            "queries extracted"
        );
        Ok(queries)
    }

    async fn ask_model(
        &self,
        provider: &dyn LlmProvider,
        content: &str,
        gaps: &[String],
        issued: &[Query],
        today: NaiveDate,
    ) -> Result<Vec<(String, String)>, AgentError> {
        let already: Vec<String> = issued.iter().map(|q| q.text().to_string()).collect();
        let prompt = build_extractor_prompt(content, today, self.max_queries, gaps, &already);
        let response = self.agent.execute(provider, &prompt).await?;

        Ok(ExtractorAgent::parse_candidates(&response.content).unwrap_or_else(|| {
            warn!("unreadable extractor response, treating as no queries");
            Vec::new()
        }))
    }

    /// Trims, dedups against the round and history, caps, and numbers.
    fn finalize(&self, candidates: Vec<(String, String)>, round: u32, issued: &[Query]) -> Vec<Query> {
        let mut seen: HashSet<String> = issued.iter().map(Query::normalized_text).collect();
        let mut queries = Vec::new();

        for (text, rationale) in candidates {
            let normalized = normalize_query_text(&text);
            if normalized.is_empty() || !seen.insert(normalized) {
                continue;
            }
            queries.push(Query::new(text, rationale, round, queries.len()));
            if queries.len() == self.max_queries {
                break;
            }
        }

        queries
    }
}
