//! Agentic review loop.
//!
//! Reviews user content with a language model, optionally grounding the
//! review in live web evidence gathered over several search rounds.
//! Uses a pluggable provider abstraction backed by OpenAI-compatible APIs.
//!
//! # Architecture
//!
//! ```text
//! ReviewRequest → ReActController
//!   ├── QueryExtractor (extractor model, or the judge's suggested queries)
//!   ├── SearchExecutor (bounded concurrent fan-out, timeout, one retry)
//!   ├── ResultValidator (dedup by URL, lexical relevance, credibility)
//!   ├── CitationAggregator (stable IDs across rounds)
//!   ├── SufficiencyJudge → refine or finalize
//!   └── ReviewerAgent (streamed) → StreamEmitter → ReviewEvent stream
//! ```

pub mod citation;
pub mod client;
pub mod config;
pub mod controller;
pub mod extractor;
pub mod judge;
pub mod message;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod reviewer;
pub mod skill;
pub mod state;
pub mod stream;
pub mod traits;
pub mod validator;

// Re-export key types
pub use citation::{Citation, CitationAggregator};
pub use config::AgentConfig;
pub use controller::{ReActController, ReviewHandle, ReviewOutcome, ReviewRequest, spawn_review};
pub use extractor::{ExtractorAgent, QueryExtractor};
pub use judge::{JudgeAgent, JudgeInput, ModelJudge, SufficiencyJudge, Verdict};
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
pub use prompt::PromptSet;
pub use provider::{LlmProvider, TextStream};
pub use reviewer::ReviewerAgent;
pub use skill::{ReviewMode, Skill};
pub use state::{Decision, LoopEvent, LoopState, Phase, TerminationReason};
pub use stream::{ReviewEvent, StreamEmitter};
pub use traits::{Agent, AgentResponse};
pub use validator::{ResultValidator, ValidatedEvidence, Validation};
