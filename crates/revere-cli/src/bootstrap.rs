//! Composition root: wires config, storage, backend clients and the session
//! manager.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use revere_application::AuthSessionManager;
use revere_core::OperatingMode;
use revere_core::config::RevereConfig;
use revere_core::identity::AuthBackend;
use revere_core::organization::OrganizationBackend;
use revere_infrastructure::supabase;
use revere_infrastructure::{ConfigService, OfflineBackend, ReverePaths, TomlActiveOrgStore};

pub struct App {
    pub config: RevereConfig,
    pub paths: ReverePaths,
    pub auth: Arc<dyn AuthBackend>,
    pub orgs: Arc<dyn OrganizationBackend>,
    pub manager: AuthSessionManager,
}

impl App {
    pub fn mode(&self) -> OperatingMode {
        self.config.mode
    }
}

pub fn resolve_paths(root: Option<PathBuf>) -> Result<ReverePaths> {
    ReverePaths::new(root).map_err(|e| anyhow!("Failed to resolve config directory: {}", e))
}

/// Loads `config.toml` (creating it if missing); `mode` from the command
/// line wins over file and environment.
pub fn load_config(paths: &ReverePaths, mode: Option<OperatingMode>) -> Result<RevereConfig> {
    let mut config = ConfigService::new(paths.config_file())
        .get_config()
        .with_context(|| format!("Failed to load {}", paths.config_file().display()))?;
    if let Some(mode) = mode {
        config.mode = mode;
    }
    Ok(config)
}

/// Builds the backend clients and the session manager.
///
/// Without backend settings, demo mode runs on [`OfflineBackend`]; live mode
/// refuses to start.
pub async fn bootstrap(paths: ReverePaths, config: RevereConfig) -> Result<App> {
    let (auth, orgs): (Arc<dyn AuthBackend>, Arc<dyn OrganizationBackend>) =
        if config.backend.is_configured() {
            let (auth, rest) = supabase::connect(&config.backend, Some(paths.session_file()))
                .context("Failed to create backend client")?;
            tracing::info!(url = %config.backend.url, "[Bootstrap] Backend client ready");
            (auth as Arc<dyn AuthBackend>, rest as Arc<dyn OrganizationBackend>)
        } else if config.mode.is_live() {
            return Err(anyhow!(
                "Live mode needs backend.url and backend.anon_key in {} (or REVERE_BACKEND_URL / REVERE_ANON_KEY)",
                paths.config_file().display()
            ));
        } else {
            tracing::info!("[Bootstrap] No backend configured, running demo mode offline");
            let offline = Arc::new(OfflineBackend::new());
            (offline.clone() as Arc<dyn AuthBackend>, offline as Arc<dyn OrganizationBackend>)
        };

    let store = TomlActiveOrgStore::open(paths.state_file())
        .await
        .context("Failed to open state store")?;

    let manager = AuthSessionManager::new(
        Arc::clone(&auth),
        Arc::clone(&orgs),
        Arc::new(store),
        config.demo.clone(),
    )
    .await;
    tracing::info!(
        instance = %manager.instance_id(),
        mode = %config.mode,
        "[Bootstrap] Session manager created"
    );

    Ok(App {
        config,
        paths,
        auth,
        orgs,
        manager,
    })
}
