use anyhow::{Context, Result, bail};
use revere_core::OperatingMode;

use super::print_snapshot;
use crate::bootstrap::App;

pub async fn run(app: &App, email: &str, password: &str) -> Result<()> {
    if app.mode().is_demo() {
        bail!("Sign-in is only available in live mode (use --mode live)");
    }

    app.manager.activate(OperatingMode::Live).await;
    let identity = app
        .manager
        .sign_in(email, password)
        .await
        .context("Sign-in failed")?;
    eprintln!("Signed in as {}", identity.display_name());

    // The SIGNED_IN event may have started the membership fetch on the
    // listener task instead.
    let mut updates = app.manager.subscribe();
    updates
        .wait_for(|s| !s.memberships_loading)
        .await
        .context("Session manager stopped")?;

    print_snapshot(&app.manager.snapshot())
}

pub async fn logout(app: &App) -> Result<()> {
    app.manager.activate(app.mode()).await;
    app.manager.sign_out().await.context("Sign-out failed")?;
    eprintln!("Signed out");
    Ok(())
}
