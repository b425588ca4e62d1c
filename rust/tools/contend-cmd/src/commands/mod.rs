//! Command implementations for contend-cmd

use anyhow::{Context, Result};
use serde::Serialize;

pub mod race;
pub mod skew;

/// Prints `summary` to stdout as pretty JSON.
pub fn print_json<S: Serialize>(summary: &S) -> Result<()> {
    let json = serde_json::to_string_pretty(summary).context("Failed to serialize summary")?;
    println!("{json}");
    Ok(())
}
