//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// devil-rs: a devil's-advocate reviewer that checks content against live
/// web evidence before critiquing it.
#[derive(Parser, Debug)]
#[command(name = "devil-rs")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose (debug) logging on stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Review content in one turn.
    ///
    /// Status lines go to stderr and the answer to stdout. With
    /// `--format json` every event is printed as one JSON line.
    #[command(after_help = r#"Examples:
  devil-rs review "Rust 1.80 stabilized async closures"
  devil-rs review - < proposal.md                  # Read content from stdin
  devil-rs review --mode normal "What is tokio?"
  devil-rs review --offline "def f(): return 1/0"  # No web search
  devil-rs --format json review "claim" | jq -c 'select(.type == "citation-added")'
"#)]
    Review {
        /// Content to review, or `-` to read stdin.
        content: String,

        #[command(flatten)]
        options: ReviewArgs,
    },

    /// Interactive session; every line is an independent turn.
    ///
    /// Commands: `/devil` toggles the mode, `/search` toggles web search,
    /// `/clear` resets the session, `/quit` exits.
    Chat {
        #[command(flatten)]
        options: ReviewArgs,
    },

    /// Print the review skill detected for content.
    Classify {
        /// Content to classify, or `-` to read stdin.
        content: String,
    },

    /// Write the default prompt templates for customization.
    ///
    /// Existing files are never overwritten.
    InitPrompts {
        /// Target directory (defaults to `~/.config/devil-rs/prompts/`).
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
}

/// Options shared by `review` and `chat`.
#[derive(Args, Debug, Clone, Default)]
pub struct ReviewArgs {
    /// Review mode: devil, normal.
    #[arg(short, long, default_value = "devil")]
    pub mode: String,

    /// Answer without web search.
    #[arg(long)]
    pub offline: bool,

    /// Maximum search rounds.
    #[arg(long)]
    pub max_rounds: Option<u32>,

    /// Maximum simultaneous search calls.
    #[arg(long)]
    pub fan_out: Option<usize>,

    /// Per-query search timeout in seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Minimum relevance (0.0-1.0) for a result to be cited.
    #[arg(long)]
    pub min_relevance: Option<f32>,

    /// Model for every agent (overrides OPENAI_MODEL).
    #[arg(long)]
    pub model: Option<String>,

    /// Directory containing prompt templates.
    #[arg(long)]
    pub prompt_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_review_flags() {
        let cli = Cli::try_parse_from([
            "devil-rs",
            "--format",
            "json",
            "review",
            "--mode",
            "normal",
            "--offline",
            "--max-rounds",
            "2",
            "--fan-out",
            "3",
            "--timeout-secs",
            "4",
            "--min-relevance",
            "0.5",
            "some claim",
        ])
        .unwrap();

        assert_eq!(cli.format, "json");
        let Commands::Review { content, options } = cli.command else {
            panic!("expected review");
        };
        assert_eq!(content, "some claim");
        assert_eq!(options.mode, "normal");
        assert!(options.offline);
        assert_eq!(options.max_rounds, Some(2));
        assert_eq!(options.fan_out, Some(3));
        assert_eq!(options.timeout_secs, Some(4));
        assert_eq!(options.min_relevance, Some(0.5));
    }

    #[test]
    fn test_parse_defaults() {
        let cli = Cli::try_parse_from(["devil-rs", "chat"]).unwrap();
        assert_eq!(cli.format, "text");
        assert!(!cli.verbose);
        let Commands::Chat { options } = cli.command else {
            panic!("expected chat");
        };
        assert_eq!(options.mode, "devil");
        assert!(!options.offline);
        assert!(options.max_rounds.is_none());
    }

    #[test]
    fn test_parse_init_prompts() {
        let cli = Cli::try_parse_from(["devil-rs", "init-prompts", "--dir", "/tmp/p"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::InitPrompts { dir: Some(ref d) } if d == &PathBuf::from("/tmp/p")
        ));
    }

    #[test]
    fn test_review_requires_content() {
        assert!(Cli::try_parse_from(["devil-rs", "review"]).is_err());
    }
}
