use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use revere_core::OperatingMode;

mod bootstrap;
mod commands;
mod logging;

#[derive(Parser)]
#[command(name = "revere")]
#[command(about = "Revere - session and organization membership client", long_about = None)]
struct Cli {
    /// Operating mode (overrides config and REVERE_MODE)
    #[arg(long, global = true)]
    mode: Option<OperatingMode>,

    /// Config directory (default: platform config dir + /revere)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bootstrap the session and print the resulting snapshot as JSON
    Status,
    /// Sign in with email and password (live mode)
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Sign out and clear the stored session
    Logout,
    /// Make ORG_ID the active organization
    SwitchOrg {
        /// Organization id
        org_id: String,
    },
    /// Probe the backend and report what works
    Diagnose {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
        /// Also print the captured log events
        #[arg(long)]
        events: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let paths = bootstrap::resolve_paths(cli.config)?;
    let config = bootstrap::load_config(&paths, cli.mode)?;
    let capture_events = matches!(cli.command, Commands::Diagnose { events: true, .. });
    let mut logs = logging::init(&config.logging, &paths.logs_dir(), capture_events)?;

    let app = bootstrap::bootstrap(paths, config).await?;

    let outcome = match cli.command {
        Commands::Status => commands::status::run(&app).await,
        Commands::Login { email, password } => commands::login::run(&app, &email, &password).await,
        Commands::Logout => commands::login::logout(&app).await,
        Commands::SwitchOrg { org_id } => commands::switch_org::run(&app, &org_id).await,
        Commands::Diagnose { json, .. } => {
            commands::diagnose::run(&app, json, logs.events.as_mut()).await
        }
    };

    app.manager.shutdown();
    outcome
}
