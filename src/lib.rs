//! # devil-rs
//!
//! A devil's-advocate review assistant. Before critiquing content it runs
//! an agentic retrieval loop: extract search queries, search the web
//! concurrently, validate and cite the results, and decide whether to
//! search again. The final review is streamed with numbered references.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use devil_rs::agent::{AgentConfig, ReActController, ReviewEvent, ReviewRequest, spawn_review};
//! use futures_util::StreamExt;
//!
//! # async fn demo() -> Result<(), devil_rs::Error> {
//! let controller = Arc::new(ReActController::from_config(AgentConfig::from_env()?)?);
//! let mut handle = spawn_review(controller, ReviewRequest::new("Rust 2024 stabilized gen blocks."));
//!
//! while let Some(event) = handle.events.next().await {
//!     if let ReviewEvent::PartialText { content } = event {
//!         print!("{content}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod cli;
pub mod core;
pub mod error;
pub mod search;

pub use error::{AgentError, CommandError, Error, ProviderError, Result};
