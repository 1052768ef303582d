//! CLI command implementations.
//!
//! Contains the business logic for each CLI command.

// Allow certain patterns that improve readability in CLI output formatting
#![allow(clippy::uninlined_format_args)]

use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::agent::prompt::PromptSet;
use crate::agent::{
    AgentConfig, ReActController, ReviewEvent, ReviewMode, ReviewOutcome, ReviewRequest, Skill,
    spawn_review,
};
use crate::cli::output::{OutputFormat, Rendered, render_event};
use crate::cli::parser::{Cli, Commands, ReviewArgs};
use crate::error::{CommandError, Error, Result};

/// Executes the CLI command.
///
/// # Returns
///
/// Result with output string on success. Streaming commands print as
/// they go and return an empty string.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Review { content, options } => cmd_review(content, options, format),
        Commands::Chat { options } => cmd_chat(options, format),
        Commands::Classify { content } => cmd_classify(content, format),
        Commands::InitPrompts { dir } => cmd_init_prompts(dir.as_deref(), format),
    }
}

/// Returns the argument itself, or stdin when it is `-`.
fn read_content(arg: &str) -> Result<String> {
    if arg == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        Ok(arg.to_string())
    }
}

fn parse_mode(mode: &str) -> Result<ReviewMode> {
    mode.parse::<ReviewMode>()
        .map_err(|e| CommandError::InvalidArgument(e).into())
}

/// Builds agent configuration from env + CLI overrides.
fn build_config(options: &ReviewArgs) -> Result<AgentConfig> {
    let mut builder = AgentConfig::builder().from_env();
    if let Some(n) = options.max_rounds {
        builder = builder.max_rounds(n);
    }
    if let Some(n) = options.fan_out {
        builder = builder.fan_out_limit(n);
    }
    if let Some(secs) = options.timeout_secs {
        builder = builder.query_timeout(Duration::from_secs(secs));
    }
    if let Some(threshold) = options.min_relevance {
        builder = builder.min_relevance(threshold);
    }
    if let Some(model) = &options.model {
        builder = builder
            .model(model.clone())
            .extractor_model(model.clone())
            .judge_model(model.clone())
            .reviewer_model(model.clone());
    }
    if let Some(dir) = &options.prompt_dir {
        builder = builder.prompt_dir(dir.clone());
    }

    builder
        .build()
        .map_err(|e| CommandError::ExecutionFailed(format!("Agent configuration error: {e}")).into())
}

fn build_controller(options: &ReviewArgs) -> Result<Arc<ReActController>> {
    let config = build_config(options)?;
    let controller = ReActController::from_config(config)
        .map_err(|e| CommandError::ExecutionFailed(format!("Provider creation failed: {e}")))?;
    Ok(Arc::new(controller))
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create async runtime: {e}")).into()
    })
}

/// Runs one turn, printing events as they arrive. Ctrl-C cancels it.
async fn run_turn(
    controller: Arc<ReActController>,
    request: ReviewRequest,
    format: OutputFormat,
) -> Result<ReviewOutcome> {
    let handle = spawn_review(controller, request);

    let cancel = handle.cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let mut events = handle.events;
    while let Some(event) = events.next().await {
        let answer_done = format == OutputFormat::Text && matches!(event, ReviewEvent::Final { .. });
        match render_event(&event, format) {
            Rendered::Stdout(text) => {
                let mut out = io::stdout().lock();
                let _ = out.write_all(text.as_bytes());
                if answer_done {
                    let _ = out.write_all(b"\n");
                }
                let _ = out.flush();
            }
            Rendered::Stderr(text) => {
                if answer_done {
                    let _ = writeln!(io::stdout());
                }
                let _ = io::stderr().write_all(text.as_bytes());
            }
        }
    }
    interrupt.abort();

    let outcome = handle
        .task
        .await
        .map_err(|e| CommandError::ExecutionFailed(format!("review task failed: {e}")))??;
    Ok(outcome)
}

// ==================== Command Implementations ====================

fn cmd_review(content: &str, options: &ReviewArgs, format: OutputFormat) -> Result<String> {
    let content = read_content(content)?;
    let mode = parse_mode(&options.mode)?;
    let controller = build_controller(options)?;
    let request = ReviewRequest::new(content)
        .with_mode(mode)
        .with_search(!options.offline);

    let rt = runtime()?;
    rt.block_on(run_turn(controller, request, format))?;

    Ok(String::new())
}

fn cmd_chat(options: &ReviewArgs, format: OutputFormat) -> Result<String> {
    let mut mode = parse_mode(&options.mode)?;
    let mut search = !options.offline;
    let controller = build_controller(options)?;
    let rt = runtime()?;

    let turns = rt.block_on(async {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut turns = 0usize;
        note("devil-rs | /devil toggle mode | /search toggle web | /clear reset | /quit exit");

        loop {
            let _ = write!(io::stderr(), "\n[{mode}{}] You: ", if search { "" } else { ", offline" });
            let _ = io::stderr().flush();

            let Some(line) = lines.next_line().await? else {
                break;
            };
            match line.trim() {
                "" => {}
                "/quit" | "/exit" => break,
                "/devil" => {
                    mode = mode.toggled();
                    note(&format!("mode: {mode}"));
                }
                "/search" => {
                    search = !search;
                    note(&format!("web search: {}", if search { "on" } else { "off" }));
                }
                "/clear" => note("session cleared"),
                text => {
                    let request = ReviewRequest::new(text).with_mode(mode).with_search(search);
                    match run_turn(Arc::clone(&controller), request, format).await {
                        Ok(_) => turns += 1,
                        // Already reported through the error event.
                        Err(e) => debug!(error = %e, "turn failed"),
                    }
                }
            }
        }

        Ok::<usize, Error>(turns)
    })?;

    match format {
        OutputFormat::Text => Ok(format!("\n{turns} turn(s)\n")),
        OutputFormat::Json => Ok(format.to_json(&serde_json::json!({ "turns": turns }))),
    }
}

fn note(message: &str) {
    let _ = writeln!(io::stderr(), "{message}");
}

fn cmd_classify(content: &str, format: OutputFormat) -> Result<String> {
    let content = read_content(content)?;
    let skill = Skill::classify(&content);

    match format {
        OutputFormat::Text => Ok(format!("{skill}\n")),
        OutputFormat::Json => Ok(format.to_json(&serde_json::json!({ "skill": skill }))),
    }
}

fn cmd_init_prompts(dir: Option<&Path>, format: OutputFormat) -> Result<String> {
    let target_dir = dir
        .map(std::path::PathBuf::from)
        .or_else(PromptSet::default_dir)
        .ok_or_else(|| {
            CommandError::ExecutionFailed(
                "Could not determine home directory for default prompt path".to_string(),
            )
        })?;

    let written = PromptSet::write_defaults(&target_dir).map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to write prompt templates: {e}"))
    })?;

    match format {
        OutputFormat::Text => {
            if written.is_empty() {
                Ok(format!(
                    "All prompt templates already exist in: {}\n",
                    target_dir.display()
                ))
            } else {
                let mut output = format!(
                    "Wrote {} prompt template(s) to: {}\n",
                    written.len(),
                    target_dir.display()
                );
                for path in &written {
                    let shown = path.strip_prefix(&target_dir).unwrap_or(path);
                    output.push_str(&format!("  {}\n", shown.display()));
                }
                output.push_str("\nEdit these files to customize the reviewer and skill prompts.\n");
                Ok(output)
            }
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "directory": target_dir.to_string_lossy(),
                "written": written.iter().map(|p| p.to_string_lossy().into_owned()).collect::<Vec<_>>(),
                "count": written.len()
            });
            Ok(format.to_json(&json))
        }
    }
}
