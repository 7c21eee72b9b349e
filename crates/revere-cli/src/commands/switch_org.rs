use anyhow::{Context, Result, bail};
use revere_core::organization::is_displayable_id;

use super::print_snapshot;
use crate::bootstrap::App;

/// Loads memberships first so the result shows whether the new selection
/// resolves to one of them. The switch itself is never refused for that.
pub async fn run(app: &App, org_id: &str) -> Result<()> {
    if !is_displayable_id(org_id) {
        bail!("Organization id must not be empty");
    }

    app.manager.activate(app.mode()).await;
    app.manager
        .switch_org(org_id)
        .await
        .context("Failed to persist organization selection")?;

    let snapshot = app.manager.snapshot();
    match snapshot.active_org() {
        Some(org) => eprintln!("Active organization: {} ({})", org.org_name, org.role),
        None => eprintln!(
            "Active organization set to {}, which is not among the loaded memberships",
            org_id
        ),
    }
    print_snapshot(&snapshot)
}
