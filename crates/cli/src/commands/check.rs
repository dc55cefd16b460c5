//! `check` command handler

use anyhow::{Context, Result};
use topology::Stack;
use tracing::info;

/// Validates the stack and prints a short report.
///
/// An invalid stack is an error, so the process exits non-zero. A
/// function-scope mismatch is reported but does not fail the check.
pub fn handle_check(stack: &Stack) -> Result<()> {
    stack.validate().context("Stack is invalid")?;

    println!("Stack '{}' is valid", stack.settings.resource_prefix);
    match stack.function_scope_mismatch() {
        Some(mismatch) => println!("warning: {mismatch}"),
        None => println!("Function-update grant matches the configured function"),
    }
    info!("Check complete");
    Ok(())
}
