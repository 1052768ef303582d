//! Agent configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::core::DomainPolicy;
use crate::error::AgentError;
use crate::search::ExecutorSettings;

/// Default model when nothing more specific is configured.
const DEFAULT_MODEL: &str = "gpt-4o-mini";
/// Default maximum Extract→Search→Validate→Decide rounds.
const DEFAULT_MAX_ROUNDS: u32 = 3;
/// Default maximum simultaneous search calls.
const DEFAULT_FAN_OUT: usize = 5;
/// Default per-query search timeout in seconds.
const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 8;
/// Default minimum lexical relevance for a result to become evidence.
const DEFAULT_MIN_RELEVANCE: f32 = 0.2;
/// Default cap on queries issued per round.
const DEFAULT_MAX_QUERIES_PER_ROUND: usize = 5;
/// Default hits kept per query.
const DEFAULT_MAX_RESULTS_PER_QUERY: usize = 5;
/// Default base delay before a search retry, in milliseconds.
const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;
/// Default extractor max tokens.
const DEFAULT_EXTRACTOR_MAX_TOKENS: u32 = 512;
/// Default judge max tokens.
const DEFAULT_JUDGE_MAX_TOKENS: u32 = 512;
/// Default reviewer max tokens. The final answer carries the whole critique.
const DEFAULT_REVIEWER_MAX_TOKENS: u32 = 4096;

/// Configuration for the review loop and its agents.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// LLM provider name (e.g., "openai").
    pub provider: String,
    /// API key for the provider.
    pub api_key: String,
    /// Optional base URL override (for proxies or compatible APIs).
    pub base_url: Option<String>,
    /// Model that turns content into search queries.
    pub extractor_model: String,
    /// Model that decides whether evidence is sufficient.
    pub judge_model: String,
    /// Model that writes the final answer.
    pub reviewer_model: String,
    /// Search backend name (`"tavily"` or `"none"`).
    pub search_provider: String,
    /// API key for the search backend.
    pub search_api_key: Option<String>,
    /// Maximum rounds per turn.
    pub max_rounds: u32,
    /// Maximum simultaneous search calls.
    pub fan_out_limit: usize,
    /// Deadline for one search call.
    pub query_timeout: Duration,
    /// Minimum relevance score in `[0, 1]`.
    pub min_relevance: f32,
    /// Cap on queries issued per round.
    pub max_queries_per_round: usize,
    /// Hits kept per query.
    pub max_results_per_query: usize,
    /// Base delay before a search retry.
    pub retry_backoff: Duration,
    /// A "sufficient" verdict with fewer citations than this is overruled.
    pub min_citations_for_sufficiency: usize,
    /// Partial text is buffered until at least this many bytes are pending.
    pub stream_flush_bytes: usize,
    /// Extra domains treated as trusted.
    pub trusted_domains: Vec<String>,
    /// Extra domains treated as flagged.
    pub flagged_domains: Vec<String>,
    /// Maximum tokens for extractor responses.
    pub extractor_max_tokens: u32,
    /// Maximum tokens for judge responses.
    pub judge_max_tokens: u32,
    /// Maximum tokens for the final answer.
    pub reviewer_max_tokens: u32,
    /// Directory containing prompt template files.
    ///
    /// When set, prompts are loaded from markdown files in this
    /// directory, falling back to compiled-in defaults for any missing
    /// files.
    pub prompt_dir: Option<PathBuf>,
}

impl AgentConfig {
    /// Creates a new builder for `AgentConfig`.
    #[must_use]
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key is found, or
    /// [`AgentError::InvalidConfig`] if a value is out of range.
    pub fn from_env() -> Result<Self, AgentError> {
        Self::builder().from_env().build()
    }

    /// Search executor settings derived from this configuration.
    #[must_use]
    pub const fn executor_settings(&self) -> ExecutorSettings {
        ExecutorSettings {
            fan_out_limit: self.fan_out_limit,
            per_query_timeout: self.query_timeout,
            retry_backoff: self.retry_backoff,
            max_results: self.max_results_per_query,
        }
    }

    /// Built-in domain lists extended with the configured ones.
    #[must_use]
    pub fn domain_policy(&self) -> DomainPolicy {
        DomainPolicy::default().extended(&self.trusted_domains, &self.flagged_domains)
    }
}

/// Builder for [`AgentConfig`].
#[derive(Debug, Clone, Default)]
pub struct AgentConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    extractor_model: Option<String>,
    judge_model: Option<String>,
    reviewer_model: Option<String>,
    search_provider: Option<String>,
    search_api_key: Option<String>,
    max_rounds: Option<u32>,
    fan_out_limit: Option<usize>,
    query_timeout: Option<Duration>,
    min_relevance: Option<f32>,
    max_queries_per_round: Option<usize>,
    max_results_per_query: Option<usize>,
    retry_backoff: Option<Duration>,
    min_citations_for_sufficiency: Option<usize>,
    stream_flush_bytes: Option<usize>,
    trusted_domains: Vec<String>,
    flagged_domains: Vec<String>,
    extractor_max_tokens: Option<u32>,
    judge_max_tokens: Option<u32>,
    reviewer_max_tokens: Option<u32>,
    prompt_dir: Option<PathBuf>,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_list(key: &str) -> Vec<String> {
    std::env::var(key)
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

impl AgentConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = std::env::var("DEVIL_PROVIDER").ok();
        }
        if self.api_key.is_none() {
            self.api_key = std::env::var("OPENAI_API_KEY")
                .or_else(|_| std::env::var("DEVIL_API_KEY"))
                .ok();
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("OPENAI_BASE_URL")
                .or_else(|_| std::env::var("DEVIL_BASE_URL"))
                .ok();
        }
        if self.model.is_none() {
            self.model = std::env::var("OPENAI_MODEL").ok();
        }
        if self.extractor_model.is_none() {
            self.extractor_model = std::env::var("DEVIL_EXTRACTOR_MODEL").ok();
        }
        if self.judge_model.is_none() {
            self.judge_model = std::env::var("DEVIL_JUDGE_MODEL").ok();
        }
        if self.reviewer_model.is_none() {
            self.reviewer_model = std::env::var("DEVIL_REVIEWER_MODEL").ok();
        }
        if self.search_api_key.is_none() {
            self.search_api_key = std::env::var("TAVILY_API_KEY").ok();
        }
        if self.search_provider.is_none() {
            self.search_provider = std::env::var("DEVIL_SEARCH_PROVIDER").ok();
        }
        if self.max_rounds.is_none() {
            self.max_rounds = env_parse("DEVIL_MAX_ROUNDS");
        }
        if self.fan_out_limit.is_none() {
            self.fan_out_limit = env_parse("DEVIL_FAN_OUT");
        }
        if self.query_timeout.is_none() {
            self.query_timeout = env_parse("DEVIL_QUERY_TIMEOUT_SECS").map(Duration::from_secs);
        }
        if self.min_relevance.is_none() {
            self.min_relevance = env_parse("DEVIL_MIN_RELEVANCE");
        }
        if self.trusted_domains.is_empty() {
            self.trusted_domains = env_list("DEVIL_TRUSTED_DOMAINS");
        }
        if self.flagged_domains.is_empty() {
            self.flagged_domains = env_list("DEVIL_FLAGGED_DOMAINS");
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = std::env::var("DEVIL_PROMPT_DIR").ok().map(PathBuf::from);
        }
        self
    }

    /// Sets the LLM provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the fallback model for every agent without its own override.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the extractor model.
    #[must_use]
    pub fn extractor_model(mut self, model: impl Into<String>) -> Self {
        self.extractor_model = Some(model.into());
        self
    }

    /// Sets the judge model.
    #[must_use]
    pub fn judge_model(mut self, model: impl Into<String>) -> Self {
        self.judge_model = Some(model.into());
        self
    }

    /// Sets the reviewer model.
    #[must_use]
    pub fn reviewer_model(mut self, model: impl Into<String>) -> Self {
        self.reviewer_model = Some(model.into());
        self
    }

    /// Sets the search backend name.
    #[must_use]
    pub fn search_provider(mut self, name: impl Into<String>) -> Self {
        self.search_provider = Some(name.into());
        self
    }

    /// Sets the search backend API key.
    #[must_use]
    pub fn search_api_key(mut self, key: impl Into<String>) -> Self {
        self.search_api_key = Some(key.into());
        self
    }

    /// Sets the maximum rounds.
    #[must_use]
    pub const fn max_rounds(mut self, n: u32) -> Self {
        self.max_rounds = Some(n);
        self
    }

    /// Sets the search fan-out limit.
    #[must_use]
    pub const fn fan_out_limit(mut self, n: usize) -> Self {
        self.fan_out_limit = Some(n);
        self
    }

    /// Sets the per-query search timeout.
    #[must_use]
    pub const fn query_timeout(mut self, duration: Duration) -> Self {
        self.query_timeout = Some(duration);
        self
    }

    /// Sets the minimum relevance threshold.
    #[must_use]
    pub const fn min_relevance(mut self, threshold: f32) -> Self {
        self.min_relevance = Some(threshold);
        self
    }

    /// Sets the cap on queries per round.
    #[must_use]
    pub const fn max_queries_per_round(mut self, n: usize) -> Self {
        self.max_queries_per_round = Some(n);
        self
    }

    /// Sets the hits kept per query.
    #[must_use]
    pub const fn max_results_per_query(mut self, n: usize) -> Self {
        self.max_results_per_query = Some(n);
        self
    }

    /// Sets the base retry backoff.
    #[must_use]
    pub const fn retry_backoff(mut self, delay: Duration) -> Self {
        self.retry_backoff = Some(delay);
        self
    }

    /// Sets the citation floor for a "sufficient" verdict.
    #[must_use]
    pub const fn min_citations_for_sufficiency(mut self, n: usize) -> Self {
        self.min_citations_for_sufficiency = Some(n);
        self
    }

    /// Sets the partial-text coalescing threshold.
    #[must_use]
    pub const fn stream_flush_bytes(mut self, n: usize) -> Self {
        self.stream_flush_bytes = Some(n);
        self
    }

    /// Adds a trusted domain.
    #[must_use]
    pub fn trusted_domain(mut self, domain: impl Into<String>) -> Self {
        self.trusted_domains.push(domain.into());
        self
    }

    /// Adds a flagged domain.
    #[must_use]
    pub fn flagged_domain(mut self, domain: impl Into<String>) -> Self {
        self.flagged_domains.push(domain.into());
        self
    }

    /// Sets the reviewer max tokens.
    #[must_use]
    pub const fn reviewer_max_tokens(mut self, n: u32) -> Self {
        self.reviewer_max_tokens = Some(n);
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Builds the [`AgentConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key was set, or
    /// [`AgentError::InvalidConfig`] if a loop knob is out of range.
    pub fn build(self) -> Result<AgentConfig, AgentError> {
        let api_key = self.api_key.ok_or(AgentError::ApiKeyMissing)?;

        let max_rounds = self.max_rounds.unwrap_or(DEFAULT_MAX_ROUNDS);
        if max_rounds == 0 {
            return Err(AgentError::InvalidConfig {
                message: "max_rounds must be at least 1".to_string(),
            });
        }
        let fan_out_limit = self.fan_out_limit.unwrap_or(DEFAULT_FAN_OUT);
        if fan_out_limit == 0 {
            return Err(AgentError::InvalidConfig {
                message: "fan_out_limit must be at least 1".to_string(),
            });
        }
        let min_relevance = self.min_relevance.unwrap_or(DEFAULT_MIN_RELEVANCE);
        if !(0.0..=1.0).contains(&min_relevance) {
            return Err(AgentError::InvalidConfig {
                message: format!("min_relevance must be within [0, 1], got {min_relevance}"),
            });
        }

        let search_provider = self.search_provider.unwrap_or_else(|| {
            if self.search_api_key.is_some() {
                "tavily".to_string()
            } else {
                "none".to_string()
            }
        });

        let model = self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Ok(AgentConfig {
            provider: self.provider.unwrap_or_else(|| "openai".to_string()),
            api_key,
            base_url: self.base_url,
            extractor_model: self.extractor_model.unwrap_or_else(|| model.clone()),
            judge_model: self.judge_model.unwrap_or_else(|| model.clone()),
            reviewer_model: self.reviewer_model.unwrap_or(model),
            search_provider,
            search_api_key: self.search_api_key,
            max_rounds,
            fan_out_limit,
            query_timeout: self
                .query_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS)),
            min_relevance,
            max_queries_per_round: self
                .max_queries_per_round
                .unwrap_or(DEFAULT_MAX_QUERIES_PER_ROUND),
            max_results_per_query: self
                .max_results_per_query
                .unwrap_or(DEFAULT_MAX_RESULTS_PER_QUERY),
            retry_backoff: self
                .retry_backoff
                .unwrap_or(Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS)),
            min_citations_for_sufficiency: self.min_citations_for_sufficiency.unwrap_or(0),
            stream_flush_bytes: self.stream_flush_bytes.unwrap_or(1),
            trusted_domains: self.trusted_domains,
            flagged_domains: self.flagged_domains,
            extractor_max_tokens: self
                .extractor_max_tokens
                .unwrap_or(DEFAULT_EXTRACTOR_MAX_TOKENS),
            judge_max_tokens: self.judge_max_tokens.unwrap_or(DEFAULT_JUDGE_MAX_TOKENS),
            reviewer_max_tokens: self
                .reviewer_max_tokens
                .unwrap_or(DEFAULT_REVIEWER_MAX_TOKENS),
            prompt_dir: self.prompt_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = AgentConfig::builder()
            .api_key("test-key")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.provider, "openai");
        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.max_rounds, DEFAULT_MAX_ROUNDS);
        assert_eq!(config.fan_out_limit, DEFAULT_FAN_OUT);
        assert_eq!(config.query_timeout, Duration::from_secs(8));
        assert!((config.min_relevance - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.extractor_model, DEFAULT_MODEL);
        assert_eq!(config.reviewer_model, DEFAULT_MODEL);
        assert_eq!(config.search_provider, "none");
        assert_eq!(config.stream_flush_bytes, 1);
    }

    #[test]
    fn test_builder_missing_api_key() {
        let result = AgentConfig::builder().build();
        assert!(matches!(result, Err(AgentError::ApiKeyMissing)));
    }

    #[test]
    fn test_builder_custom_values() {
        let config = AgentConfig::builder()
            .api_key("key")
            .provider("custom")
            .model("shared")
            .judge_model("judge")
            .max_rounds(1)
            .fan_out_limit(2)
            .query_timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.provider, "custom");
        assert_eq!(config.extractor_model, "shared");
        assert_eq!(config.judge_model, "judge");
        assert_eq!(config.max_rounds, 1);
        assert_eq!(config.fan_out_limit, 2);
        assert_eq!(config.query_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_search_provider_defaults_to_tavily_with_key() {
        let config = AgentConfig::builder()
            .api_key("key")
            .search_api_key("tvly-123")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.search_provider, "tavily");
    }

    #[test]
    fn test_builder_rejects_out_of_range_knobs() {
        let zero_rounds = AgentConfig::builder().api_key("k").max_rounds(0).build();
        assert!(matches!(zero_rounds, Err(AgentError::InvalidConfig { .. })));

        let zero_fan_out = AgentConfig::builder().api_key("k").fan_out_limit(0).build();
        assert!(matches!(zero_fan_out, Err(AgentError::InvalidConfig { .. })));

        let relevance = AgentConfig::builder().api_key("k").min_relevance(1.5).build();
        assert!(matches!(relevance, Err(AgentError::InvalidConfig { .. })));
    }

    #[test]
    fn test_executor_settings_and_policy() {
        let config = AgentConfig::builder()
            .api_key("k")
            .fan_out_limit(3)
            .flagged_domain("spam.example")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let settings = config.executor_settings();
        assert_eq!(settings.fan_out_limit, 3);
        assert_eq!(settings.max_results, DEFAULT_MAX_RESULTS_PER_QUERY);
        assert_eq!(
            config.domain_policy().classify("https://spam.example/x"),
            crate::core::Credibility::Flagged
        );
    }
}
