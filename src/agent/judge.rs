//! Sufficiency judgement for the Deciding phase.
//!
//! The loop asks a [`SufficiencyJudge`] whether the evidence gathered so
//! far is enough. [`ModelJudge`] asks the judge model; tests and callers
//! with their own heuristics plug in other implementations.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::citation::Citation;
use super::config::AgentConfig;
use super::prompt::build_judge_prompt;
use super::provider::LlmProvider;
use super::traits::{Agent, strip_code_fence};
use crate::error::AgentError;

/// The judge's decision for one round.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Verdict {
    /// Evidence covers the claims that matter.
    pub sufficient: bool,
    /// One-line justification.
    pub reason: String,
    /// Claims still unresolved.
    pub gaps: Vec<String>,
    /// Suggested queries for the next round.
    pub new_queries: Vec<String>,
}

impl Verdict {
    /// A "stop searching" verdict.
    #[must_use]
    pub fn sufficient(reason: impl Into<String>) -> Self {
        Self {
            sufficient: true,
            reason: reason.into(),
            ..Self::default()
        }
    }

    /// A "keep searching" verdict.
    #[must_use]
    pub fn insufficient(reason: impl Into<String>, gaps: Vec<String>, new_queries: Vec<String>) -> Self {
        Self {
            sufficient: false,
            reason: reason.into(),
            gaps,
            new_queries,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    #[serde(default, alias = "is_satisfied")]
    sufficient: Option<bool>,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    gaps: Vec<String>,
    #[serde(default)]
    new_queries: Vec<String>,
}

/// What the judge sees.
#[derive(Debug, Clone, Copy)]
pub struct JudgeInput<'a> {
    /// Content under review.
    pub content: &'a str,
    /// Round just completed.
    pub round: u32,
    /// Round budget.
    pub max_rounds: u32,
    /// Every query issued so far.
    pub searched: &'a [String],
    /// Current citations, in ID order.
    pub citations: &'a [&'a Citation],
    /// Today's date.
    pub today: NaiveDate,
}

/// Pluggable sufficiency decision.
#[async_trait]
pub trait SufficiencyJudge: Send + Sync {
    /// Judges the evidence gathered so far.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] when the judgement cannot be obtained at all.
    /// An unreadable answer is not an error.
    async fn judge(&self, input: &JudgeInput<'_>) -> Result<Verdict, AgentError>;
}

/// Agent wrapper around the judge model.
pub struct JudgeAgent {
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl JudgeAgent {
    /// Creates a judge agent.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.judge_model.clone(),
            max_tokens: config.judge_max_tokens,
            system_prompt,
        }
    }

    /// Parses the judge's answer. Anything unreadable counts as sufficient.
    fn parse_verdict(content: &str) -> Verdict {
        match serde_json::from_str::<RawVerdict>(strip_code_fence(content)) {
            Ok(raw) => {
                let clean = |items: Vec<String>| -> Vec<String> {
                    items
                        .into_iter()
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                };
                let gaps = clean(raw.gaps);
                let new_queries = clean(raw.new_queries);
                let sufficient = raw
                    .sufficient
                    .unwrap_or(gaps.is_empty() && new_queries.is_empty());
                Verdict {
                    sufficient,
                    reason: raw.reason.trim().to_string(),
                    gaps,
                    new_queries,
                }
            }
            Err(e) => {
                warn!(error = %e, "unreadable judge verdict, treating evidence as sufficient");
                Verdict::sufficient("judge verdict could not be parsed")
            }
        }
    }
}

#[async_trait]
impl Agent for JudgeAgent {
    fn name(&self) -> &'static str {
        "judge"
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

/// Judge backed by a language model.
pub struct ModelJudge {
    agent: JudgeAgent,
    provider: Arc<dyn LlmProvider>,
}

impl ModelJudge {
    /// Creates a model-backed judge.
    #[must_use]
    pub fn new(agent: JudgeAgent, provider: Arc<dyn LlmProvider>) -> Self {
        Self { agent, provider }
    }
}

#[async_trait]
impl SufficiencyJudge for ModelJudge {
    async fn judge(&self, input: &JudgeInput<'_>) -> Result<Verdict, AgentError> {
        let prompt = build_judge_prompt(
            input.content,
            input.today,
            input.round,
            input.max_rounds,
            input.searched,
            input.citations,
        );
        let response = self.agent.execute(self.provider.as_ref(), &prompt).await?;
        let verdict = JudgeAgent::parse_verdict(&response.content);
        info!(
            round = input.round,
            sufficient = verdict.sufficient,
            reason = %verdict.reason,
            gaps = verdict.gaps.len(),
            "judge verdict"
        );
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::message::{ChatRequest, ChatResponse};
    use crate::agent::provider::TextStream;

    struct FixedProvider(&'static str);

    #[async_trait]
    impl LlmProvider for FixedProvider {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
            assert!(request.json_mode);
            Ok(ChatResponse {
                content: self.0.to_string(),
                ..ChatResponse::default()
            })
        }

        async fn chat_stream(&self, _request: &ChatRequest) -> Result<TextStream, AgentError> {
            Err(AgentError::Stream {
                message: "not supported".to_string(),
            })
        }
    }

    fn judge(answer: &'static str) -> ModelJudge {
        let config = AgentConfig::builder()
            .api_key("k")
            .build()
            .unwrap_or_else(|_| unreachable!());
        ModelJudge::new(
            JudgeAgent::new(&config, "judge".to_string()),
            Arc::new(FixedProvider(answer)),
        )
    }

    fn input<'a>() -> JudgeInput<'a> {
        JudgeInput {
            content: "claim",
            round: 1,
            max_rounds: 3,
            searched: &[],
            citations: &[],
            today: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default(),
        }
    }

    #[test]
    fn test_parse_verdict_full() {
        let v = JudgeAgent::parse_verdict(
            r#"{"sufficient": false, "reason": "stale", "gaps": ["price today", " "], "new_queries": ["TSLA 2025-01-01"]}"#,
        );
        assert!(!v.sufficient);
        assert_eq!(v.reason, "stale");
        assert_eq!(v.gaps, vec!["price today".to_string()]);
        assert_eq!(v.new_queries, vec!["TSLA 2025-01-01".to_string()]);
    }

    #[test]
    fn test_parse_verdict_accepts_legacy_field_and_fences() {
        let v = JudgeAgent::parse_verdict("```json\n{\"is_satisfied\": true, \"reason\": \"ok\"}\n```");
        assert!(v.sufficient);
    }

    #[test]
    fn test_parse_verdict_missing_flag_follows_gaps() {
        assert!(JudgeAgent::parse_verdict(r#"{"reason": "fine"}"#).sufficient);
        assert!(!JudgeAgent::parse_verdict(r#"{"gaps": ["x"]}"#).sufficient);
    }

    #[test]
    fn test_parse_verdict_garbage_is_sufficient() {
        let v = JudgeAgent::parse_verdict("I think we are done here.");
        assert!(v.sufficient);
        assert!(v.gaps.is_empty());
    }

    #[tokio::test]
    async fn test_model_judge() {
        let v = judge(r#"{"sufficient": true, "reason": "covered"}"#)
            .judge(&input())
            .await
            .unwrap_or_default();
        assert_eq!(v, Verdict::sufficient("covered"));
    }
}
