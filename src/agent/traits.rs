//! Agent trait definition.
//!
//! All agents (extractor, judge, reviewer) implement this trait, which
//! provides a uniform interface for the review controller.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use super::message::{ChatRequest, ChatResponse, TokenUsage, system_message, user_message};
use super::provider::{LlmProvider, TextStream};
use crate::error::AgentError;

/// Response from an agent execution.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    /// The agent's text output.
    pub content: String,
    /// Token usage for this call.
    pub usage: TokenUsage,
    /// Why the model stopped generating (e.g. `"stop"`, `"length"`).
    pub finish_reason: Option<String>,
}

/// Trait implemented by all agents in the system.
///
/// Agents encapsulate a specific role (query extraction, sufficiency
/// judging, writing the review) with a fixed system prompt and model
/// configuration.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Agent name for logging and identification.
    fn name(&self) -> &'static str;

    /// Model identifier to use for this agent.
    fn model(&self) -> &str;

    /// System prompt that defines the agent's role and behavior.
    fn system_prompt(&self) -> &str;

    /// Whether to request JSON-formatted output.
    fn json_mode(&self) -> bool {
        false
    }

    /// Sampling temperature (0.0 = deterministic, higher = more creative).
    fn temperature(&self) -> f32 {
        0.0
    }

    /// Maximum tokens for the response.
    fn max_tokens(&self) -> u32 {
        2048
    }

    /// Builds the request for one user message.
    fn request(&self, user_msg: &str, stream: bool) -> ChatRequest {
        ChatRequest {
            model: self.model().to_string(),
            messages: vec![system_message(self.system_prompt()), user_message(user_msg)],
            temperature: Some(self.temperature()),
            max_tokens: Some(self.max_tokens()),
            json_mode: self.json_mode(),
            stream,
        }
    }

    /// Executes the agent with the given user message.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on API failures or response parsing errors.
    async fn execute(
        &self,
        provider: &dyn LlmProvider,
        user_msg: &str,
    ) -> Result<AgentResponse, AgentError> {
        let request = self.request(user_msg, false);
        tracing::debug!(agent = self.name(), model = %request.model, "agent call");

        let response: ChatResponse = provider.chat(&request).await?;

        Ok(AgentResponse {
            content: response.content,
            usage: response.usage,
            finish_reason: response.finish_reason,
        })
    }

    /// Executes the agent as a streaming completion.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if the stream cannot be opened.
    async fn execute_stream(
        &self,
        provider: &dyn LlmProvider,
        user_msg: &str,
    ) -> Result<TextStream, AgentError> {
        let request = self.request(user_msg, true);
        tracing::debug!(agent = self.name(), model = %request.model, "agent stream");
        provider.chat_stream(&request).await
    }
}

/// Fenced block anywhere in a response, optionally tagged `json`.
static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?[ \t]*\n?(.*?)```").unwrap_or_else(|_| unreachable!())
});

/// Returns the body of the first markdown code fence in a model
/// response, or the trimmed response when there is none.
pub(crate) fn strip_code_fence(content: &str) -> &str {
    CODE_FENCE
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map_or_else(|| content.trim(), |body| body.as_str().trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n[]\n```"), "[]");
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
        assert_eq!(
            strip_code_fence("Here you go:\n```json\n{\"b\":2}\n```\nHope that helps."),
            "{\"b\":2}"
        );
    }
}
