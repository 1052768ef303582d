//! Error types for devil-rs.
//!
//! Library code returns the narrow enums ([`AgentError`], [`ProviderError`],
//! [`CommandError`]); the crate-level [`Error`] unifies them for the CLI.

use std::time::Duration;

use thiserror::Error;

/// Crate-level result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Language-model or review-loop failure.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// CLI command failure.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the language model or the review loop itself.
///
/// Any `AgentError` that reaches the controller is fatal for the turn:
/// it is surfaced as a single `error` event and never retried.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No API key was configured for the language model.
    #[error("API key missing: set OPENAI_API_KEY or DEVIL_API_KEY")]
    ApiKeyMissing,

    /// The model API rejected or failed a request.
    #[error("API request failed: {message}")]
    ApiRequest {
        /// Provider error message.
        message: String,
        /// HTTP status, when known.
        status: Option<u16>,
    },

    /// The streaming response broke mid-way.
    #[error("stream error: {message}")]
    Stream {
        /// Provider error message.
        message: String,
    },

    /// A model response could not be parsed into the expected shape.
    #[error("response parse error: {message}")]
    ResponseParse {
        /// What went wrong.
        message: String,
        /// Raw model output.
        content: String,
    },

    /// The configured provider name is unknown.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider {
        /// Provider name as configured.
        name: String,
    },

    /// Configuration values failed validation.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Which value is wrong and why.
        message: String,
    },

    /// The caller went away or cancelled the turn.
    #[error("review cancelled")]
    Cancelled,

    /// Internal coordination failure (task join, closed channel).
    #[error("orchestration error: {message}")]
    Orchestration {
        /// Description.
        message: String,
    },
}

/// Errors raised by a search provider for a single query.
///
/// These never escape the search executor as faults; they are recorded
/// as failure markers next to the query that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The provider throttled us.
    #[error("rate limited{}", retry_after_hint(.retry_after))]
    RateLimited {
        /// Server-suggested wait, when given.
        retry_after: Option<Duration>,
    },

    /// Transport-level failure or non-success HTTP status.
    #[error("network error: {message}")]
    Network {
        /// Description.
        message: String,
    },

    /// The provider answered with something we could not decode.
    #[error("malformed response: {message}")]
    MalformedResponse {
        /// Description.
        message: String,
    },

    /// The per-query deadline elapsed.
    #[error("timed out after {}ms", .after.as_millis())]
    Timeout {
        /// Deadline that was exceeded.
        after: Duration,
    },
}

fn retry_after_hint(retry_after: &Option<Duration>) -> String {
    retry_after.map_or_else(String::new, |d| format!(" (retry after {}s)", d.as_secs()))
}

/// CLI command errors.
#[derive(Debug, Error)]
pub enum CommandError {
    /// A command failed while executing.
    #[error("{0}")]
    ExecutionFailed(String),

    /// A command argument was rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Output could not be rendered.
    #[error("output format error: {0}")]
    OutputFormat(String),
}
