//! Commands module
//!
//! Defines the CLI commands and routes them to their handlers.

mod check;
mod order;
mod synth;

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;
use topology::{Stack, StackSettings};
use tracing::warn;

/// Top-level CLI commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Render the stack as a CloudFormation template
    Synth {
        /// Write the template to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Emit compact JSON
        #[arg(long)]
        compact: bool,

        /// Template description (defaults to a summary of the stack)
        #[arg(long)]
        description: Option<String>,
    },
    /// Print the order in which resources are created
    Order {
        /// Print the teardown order instead
        #[arg(long)]
        teardown: bool,
    },
    /// Validate the stack and report configuration drift
    Check,
}

/// Builds the stack and runs `command` against it.
pub fn handle_command(command: Commands, settings: &StackSettings) -> Result<()> {
    let stack = Stack::build(settings);
    if let Some(mismatch) = stack.function_scope_mismatch() {
        warn!(%mismatch, "Function-update grant does not cover the configured function");
    }

    match command {
        Commands::Synth {
            output,
            compact,
            description,
        } => synth::handle_synth(&stack, output.as_deref(), compact, description),
        Commands::Order { teardown } => order::handle_order(&stack, teardown),
        Commands::Check => check::handle_check(&stack),
    }
}
