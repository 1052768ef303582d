//! Output formatting for CLI commands.

use serde::Serialize;

use crate::agent::ReviewEvent;

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// JSON; streamed commands print one event per line.
    Json,
}

impl OutputFormat {
    /// Parses a format string, falling back to text for unknown values.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" | "ndjson" => Self::Json,
            _ => Self::Text,
        }
    }

    /// Serializes a value as pretty JSON followed by a newline.
    #[must_use]
    pub fn to_json<T: Serialize>(self, value: &T) -> String {
        serde_json::to_string_pretty(value).map_or_else(
            |e| format!("{{\"error\": \"serialization failed: {e}\"}}\n"),
            |s| s + "\n",
        )
    }
}

/// Where a rendered event goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    /// Answer text for stdout.
    Stdout(String),
    /// Progress for stderr.
    Stderr(String),
}

/// Renders one stream event.
///
/// Text mode prints answer text as it streams and the rest as short
/// stderr lines; the `final` event becomes a summary line because the
/// answer was already printed. JSON mode prints every event as a single
/// line on stdout.
#[must_use]
pub fn render_event(event: &ReviewEvent, format: OutputFormat) -> Rendered {
    match format {
        OutputFormat::Json => Rendered::Stdout(
            serde_json::to_string(event)
                .map_or_else(|e| format!("{{\"type\":\"error\",\"message\":\"{e}\"}}"), |s| s)
                + "\n",
        ),
        OutputFormat::Text => match event {
            ReviewEvent::Status {
                round,
                phase,
                message,
            } => Rendered::Stderr(format!("[round {round} · {phase}] {message}\n")),
            ReviewEvent::PartialText { content } => Rendered::Stdout(content.clone()),
            ReviewEvent::CitationAdded {
                id,
                url,
                credibility,
                ..
            } => Rendered::Stderr(format!("  [{id}] {url} ({credibility})\n")),
            ReviewEvent::Final {
                termination_reason,
                rounds,
                citations,
                ..
            } => Rendered::Stderr(format!(
                "\n[done] {} after {rounds} round(s), {} source(s)\n",
                termination_reason,
                citations.len()
            )),
            ReviewEvent::Error { message } => Rendered::Stderr(format!("[error] {message}\n")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Phase, TerminationReason};

    #[test]
    fn test_parse_format() {
        assert_eq!(OutputFormat::parse("json"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("text"), OutputFormat::Text);
        assert_eq!(OutputFormat::parse("other"), OutputFormat::Text);
    }

    #[test]
    fn test_render_text() {
        let status = ReviewEvent::Status {
            round: 1,
            phase: Phase::Searching,
            message: "searching: a".to_string(),
        };
        assert_eq!(
            render_event(&status, OutputFormat::Text),
            Rendered::Stderr("[round 1 · searching] searching: a\n".to_string())
        );

        let text = ReviewEvent::PartialText {
            content: "Hello".to_string(),
        };
        assert_eq!(
            render_event(&text, OutputFormat::Text),
            Rendered::Stdout("Hello".to_string())
        );
    }

    #[test]
    fn test_render_json_is_one_line() {
        let event = ReviewEvent::Final {
            answer: "line one\nline two".to_string(),
            citations: Vec::new(),
            termination_reason: TerminationReason::MaxRounds,
            rounds: 2,
        };
        let Rendered::Stdout(line) = render_event(&event, OutputFormat::Json) else {
            panic!("json goes to stdout");
        };
        assert_eq!(line.matches('\n').count(), 1);
        let value: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(value["type"], "final");
        assert_eq!(value["termination_reason"], "max-rounds");
    }
}
