//! Caller-facing event stream.
//!
//! The controller talks to the caller only through a [`StreamEmitter`],
//! which forwards typed [`ReviewEvent`]s over a bounded channel. Exactly
//! one terminal event (`final` or `error`) is ever sent; anything sent
//! after it is ignored.

use std::fmt::Write;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use super::citation::Citation;
use super::state::{Phase, TerminationReason};
use crate::core::Credibility;
use crate::error::AgentError;

/// Appended to answers written without web search.
pub const OFFLINE_NOTICE: &str =
    "\n\n---\n*Response generated without web search. Information may not be current.*\n";

/// One event on the review stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ReviewEvent {
    /// Controller progress.
    Status {
        round: u32,
        phase: Phase,
        message: String,
    },
    /// A piece of the answer.
    PartialText { content: String },
    /// A source was cited for the first time.
    CitationAdded {
        id: u32,
        url: String,
        title: String,
        credibility: Credibility,
        relevance: f32,
    },
    /// The turn finished. Always last on success.
    Final {
        answer: String,
        citations: Vec<Citation>,
        termination_reason: TerminationReason,
        rounds: u32,
    },
    /// The turn failed. Always last on failure.
    Error { message: String },
}

impl ReviewEvent {
    /// Returns `true` for `final` and `error`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Final { .. } | Self::Error { .. })
    }
}

/// Ordered, append-only event sink.
///
/// Partial text is coalesced until `flush_bytes` bytes are buffered and
/// always flushed before any other event, so text never overtakes a
/// status or citation that was emitted after it.
#[derive(Debug)]
pub struct StreamEmitter {
    tx: mpsc::Sender<ReviewEvent>,
    buffer: String,
    flush_bytes: usize,
    finished: bool,
}

impl StreamEmitter {
    /// Wraps an existing sender.
    #[must_use]
    pub fn new(tx: mpsc::Sender<ReviewEvent>, flush_bytes: usize) -> Self {
        Self {
            tx,
            buffer: String::new(),
            flush_bytes: flush_bytes.max(1),
            finished: false,
        }
    }

    /// Creates an emitter and the receiving end of its channel.
    #[must_use]
    pub fn channel(capacity: usize, flush_bytes: usize) -> (Self, mpsc::Receiver<ReviewEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx, flush_bytes), rx)
    }

    /// `true` once a terminal event was sent.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Emits a status line.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Cancelled`] when the receiver is gone.
    pub async fn status(
        &mut self,
        round: u32,
        phase: Phase,
        message: impl Into<String>,
    ) -> Result<(), AgentError> {
        self.emit(ReviewEvent::Status {
            round,
            phase,
            message: message.into(),
        })
        .await
    }

    /// Announces a new citation.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Cancelled`] when the receiver is gone.
    pub async fn citation_added(&mut self, citation: &Citation) -> Result<(), AgentError> {
        self.emit(ReviewEvent::CitationAdded {
            id: citation.id,
            url: citation.url().to_string(),
            title: citation.title().to_string(),
            credibility: citation.evidence.credibility,
            relevance: citation.evidence.relevance_score,
        })
        .await
    }

    /// Buffers answer text, sending it once enough has accumulated.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Cancelled`] when the receiver is gone.
    pub async fn partial(&mut self, chunk: &str) -> Result<(), AgentError> {
        if self.finished || chunk.is_empty() {
            return Ok(());
        }
        self.buffer.push_str(chunk);
        if self.buffer.len() >= self.flush_bytes {
            self.flush().await?;
        }
        Ok(())
    }

    /// Sends any buffered answer text.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Cancelled`] when the receiver is gone.
    pub async fn flush(&mut self) -> Result<(), AgentError> {
        if self.buffer.is_empty() || self.finished {
            return Ok(());
        }
        let content = std::mem::take(&mut self.buffer);
        self.send(ReviewEvent::PartialText { content }).await
    }

    /// Flushes and sends the `final` event.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Cancelled`] when the receiver is gone.
    pub async fn finish(
        &mut self,
        answer: String,
        citations: Vec<Citation>,
        termination_reason: TerminationReason,
        rounds: u32,
    ) -> Result<(), AgentError> {
        self.emit(ReviewEvent::Final {
            answer,
            citations,
            termination_reason,
            rounds,
        })
        .await
    }

    /// Sends the `error` event, discarding buffered text.
    ///
    /// Never fails: a vanished receiver has nobody left to tell.
    pub async fn fail(&mut self, message: impl Into<String>) {
        if self.finished {
            return;
        }
        self.buffer.clear();
        let _ = self
            .send(ReviewEvent::Error {
                message: message.into(),
            })
            .await;
    }

    async fn emit(&mut self, event: ReviewEvent) -> Result<(), AgentError> {
        self.flush().await?;
        self.send(event).await
    }

    async fn send(&mut self, event: ReviewEvent) -> Result<(), AgentError> {
        if self.finished {
            debug!(?event, "event after terminal event ignored");
            return Ok(());
        }
        if event.is_terminal() {
            self.finished = true;
        }
        self.tx.send(event).await.map_err(|_| AgentError::Cancelled)
    }
}

/// Renders the references section for an answer.
///
/// Empty when nothing was cited.
#[must_use]
pub fn references_footer(citations: &[Citation]) -> String {
    if citations.is_empty() {
        return String::new();
    }
    let mut footer = String::from("\n\n---\n**References:**\n");
    for c in citations {
        let _ = write!(footer, "[{}]: {} — {}", c.id, c.title(), c.url());
        if c.evidence.credibility == Credibility::Flagged {
            footer.push_str(" (unverified)");
        }
        footer.push('\n');
    }
    footer
}
