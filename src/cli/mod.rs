//! CLI layer for devil-rs.
//!
//! Provides the command-line interface using clap, with commands for
//! reviewing content, chatting, classifying skills, and scaffolding
//! prompt templates.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands, ReviewArgs};
