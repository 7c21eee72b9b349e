pub mod diagnose;
pub mod login;
pub mod status;
pub mod switch_org;

use anyhow::{Context, Result};
use revere_application::AuthSnapshot;

/// Prints `snapshot` as pretty JSON on stdout.
pub(crate) fn print_snapshot(snapshot: &AuthSnapshot) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshot).context("Failed to serialize snapshot")?;
    println!("{}", json);
    Ok(())
}
