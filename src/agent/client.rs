//! Provider registry and factory.
//!
//! Maps provider names to concrete [`LlmProvider`] and [`SearchProvider`]
//! implementations.

use crate::agent::config::AgentConfig;
use crate::agent::provider::LlmProvider;
use crate::agent::providers::OpenAiProvider;
use crate::error::AgentError;
use crate::search::{NoopSearchProvider, SearchProvider, TavilyProvider};

/// Creates an [`LlmProvider`] based on the configured provider name.
///
/// # Supported Providers
///
/// - `"openai"` (default): OpenAI-compatible APIs via `async-openai`
///
/// # Errors
///
/// Returns [`AgentError::UnsupportedProvider`] for unknown provider names.
pub fn create_provider(config: &AgentConfig) -> Result<Box<dyn LlmProvider>, AgentError> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAiProvider::new(config))),
        other => Err(AgentError::UnsupportedProvider {
            name: other.to_string(),
        }),
    }
}

/// Creates a [`SearchProvider`] based on the configured search backend.
///
/// # Supported Providers
///
/// - `"tavily"`: requires `TAVILY_API_KEY`
/// - `"none"`: finds nothing; answers degrade to uncited
///
/// # Errors
///
/// Returns [`AgentError::InvalidConfig`] when Tavily is selected without
/// a key, or [`AgentError::UnsupportedProvider`] for unknown names.
pub fn create_search_provider(config: &AgentConfig) -> Result<Box<dyn SearchProvider>, AgentError> {
    match config.search_provider.as_str() {
        "tavily" => {
            let key = config
                .search_api_key
                .as_deref()
                .ok_or_else(|| AgentError::InvalidConfig {
                    message: "search provider 'tavily' requires TAVILY_API_KEY".to_string(),
                })?;
            Ok(Box::new(TavilyProvider::new(key)?))
        }
        "none" => Ok(Box::new(NoopSearchProvider)),
        other => Err(AgentError::UnsupportedProvider {
            name: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_openai_provider() {
        let config = AgentConfig::builder()
            .api_key("test")
            .provider("openai")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let provider = create_provider(&config);
        assert!(provider.is_ok());
        assert_eq!(provider.unwrap_or_else(|_| unreachable!()).name(), "openai");
    }

    #[test]
    fn test_create_unknown_provider() {
        let config = AgentConfig::builder()
            .api_key("test")
            .provider("unknown")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let result = create_provider(&config);
        assert!(result.is_err());
    }

    #[test]
    fn test_create_search_providers() {
        let config = AgentConfig::builder()
            .api_key("test")
            .search_api_key("tvly")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let provider = create_search_provider(&config).unwrap_or_else(|_| unreachable!());
        assert_eq!(provider.name(), "tavily");

        let config = AgentConfig::builder()
            .api_key("test")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let provider = create_search_provider(&config).unwrap_or_else(|_| unreachable!());
        assert_eq!(provider.name(), "none");
    }

    #[test]
    fn test_tavily_without_key_is_rejected() {
        let config = AgentConfig::builder()
            .api_key("test")
            .search_provider("tavily")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert!(matches!(
            create_search_provider(&config),
            Err(AgentError::InvalidConfig { .. })
        ));

        let config = AgentConfig::builder()
            .api_key("test")
            .search_provider("bing")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert!(matches!(
            create_search_provider(&config),
            Err(AgentError::UnsupportedProvider { .. })
        ));
    }
}
