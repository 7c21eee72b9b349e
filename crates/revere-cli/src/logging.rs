//! Subscriber setup: env filter, stderr output, optional daily log file and
//! the diagnostics event layer.

use std::path::Path;

use anyhow::{Context, Result};
use revere_core::config::LoggingSettings;
use revere_diagnostics::{DiagnosticEvent, DiagnosticEventLayer};
use tokio::sync::mpsc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const LOG_FILE_PREFIX: &str = "revere.log";

/// Keeps the file writer alive and exposes captured events.
pub struct Logging {
    _file_guard: Option<WorkerGuard>,
    /// Present only when event capture was requested.
    pub events: Option<mpsc::UnboundedReceiver<DiagnosticEvent>>,
}

/// `RUST_LOG` wins; otherwise the configured level.
fn env_filter(settings: &LoggingSettings) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level))
}

/// Event capture layer and its receiver, or neither when `capture` is off.
fn diagnostics_layer(
    capture: bool,
) -> (
    Option<DiagnosticEventLayer>,
    Option<mpsc::UnboundedReceiver<DiagnosticEvent>>,
) {
    if !capture {
        return (None, None);
    }
    let (layer, events) = DiagnosticEventLayer::channel();
    (Some(layer), Some(events))
}

pub fn init(settings: &LoggingSettings, logs_dir: &Path, capture_events: bool) -> Result<Logging> {
    let (diagnostics, events) = diagnostics_layer(capture_events);

    let (file_layer, file_guard) = if settings.file {
        std::fs::create_dir_all(logs_dir)
            .with_context(|| format!("Failed to create {}", logs_dir.display()))?;
        let appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(writer);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(env_filter(settings))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .with(diagnostics)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(Logging {
        _file_guard: file_guard,
        events,
    })
}
