//! devil-rs CLI entry point.

use std::io::Write;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use devil_rs::cli::{Cli, execute};

fn main() -> Result<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let output = execute(&cli)?;
    if !output.is_empty() {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(output.as_bytes())?;
        stdout.flush()?;
    }

    Ok(())
}

/// Logs go to stderr; stdout is reserved for answers.
///
/// Filter: `DEVIL_LOG`, then `RUST_LOG`, then `warn`. `--verbose` raises
/// this crate to `debug` on top of either.
fn init_tracing(verbose: bool) -> Result<()> {
    let mut filter = std::env::var("DEVIL_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .map_or_else(|_| EnvFilter::new("warn"), EnvFilter::new);
    if verbose {
        filter = filter.add_directive("devil_rs=debug".parse()?);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}
