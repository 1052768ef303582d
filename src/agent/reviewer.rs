//! Reviewer agent: writes the final, cited answer.

use async_trait::async_trait;

use super::config::AgentConfig;
use super::traits::Agent;

/// Streams the answer. The system prompt depends on the turn's mode and
/// skill, so a reviewer is built per turn.
pub struct ReviewerAgent {
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl ReviewerAgent {
    /// Creates a reviewer agent.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.reviewer_model.clone(),
            max_tokens: config.reviewer_max_tokens,
            system_prompt,
        }
    }
}

#[async_trait]
impl Agent for ReviewerAgent {
    fn name(&self) -> &'static str {
        "reviewer"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn temperature(&self) -> f32 {
        0.3
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}
