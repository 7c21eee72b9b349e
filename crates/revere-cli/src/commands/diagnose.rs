use std::time::Duration;

use anyhow::{Context, Result, bail};
use revere_diagnostics::{DiagnosticEvent, ProbeRunner};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::bootstrap::App;

pub async fn run(
    app: &App,
    json: bool,
    events: Option<&mut UnboundedReceiver<DiagnosticEvent>>,
) -> Result<()> {
    let runner = ProbeRunner::new(
        app.auth.clone(),
        app.orgs.clone(),
        app.config.demo.org_slug.clone(),
        Duration::from_secs(app.config.diagnostics.probe_timeout_secs),
    );
    let report = runner.run().await;

    if json {
        let text = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{}", text);
    } else {
        println!("mode:   {}", app.mode());
        println!("config: {}", app.paths.config_dir().display());
        println!("{}", report.summary());
    }

    if let Some(events) = events {
        while let Ok(event) = events.try_recv() {
            let instance = event.instance.as_deref().unwrap_or("-");
            println!(
                "{} {:<5} [{}] {} {}",
                event.timestamp.format("%H:%M:%S%.3f"),
                event.level,
                instance,
                event.target,
                event.message
            );
        }
    }

    if !report.passed() {
        bail!("Diagnostics failed (report {})", report.id);
    }
    Ok(())
}
