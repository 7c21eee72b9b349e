//! Durable store for the active organization selection.

use std::path::PathBuf;
use std::sync::Arc;

use revere_core::error::{RevereError, Result};
use revere_core::state::{ActiveOrgStore, ClientState};
use tokio::sync::Mutex;

use crate::storage::AtomicTomlFile;

/// `ActiveOrgStore` backed by `state.toml`.
///
/// The file is read once in [`open`](Self::open) and cached; reads are served
/// from the cache and every write goes through to disk.
#[derive(Clone)]
pub struct TomlActiveOrgStore {
    state: Arc<Mutex<ClientState>>,
    file: Arc<AtomicTomlFile<ClientState>>,
}

impl TomlActiveOrgStore {
    /// Opens the store at `path`.
    ///
    /// A missing file is an empty selection. An unreadable file is logged
    /// and also treated as empty; the next write replaces it.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let file = Arc::new(AtomicTomlFile::<ClientState>::new(path));

        let loader = Arc::clone(&file);
        let loaded = tokio::task::spawn_blocking(move || loader.load())
            .await
            .map_err(|e| RevereError::internal(format!("Failed to join task: {}", e)))?;

        let initial = match loaded {
            Ok(state) => state.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(
                    path = %file.path().display(),
                    "[StateStore] Ignoring unreadable state file: {}",
                    e
                );
                ClientState::default()
            }
        };

        tracing::debug!(
            active_org_id = ?initial.active_org_id,
            "[StateStore] Loaded client state"
        );

        Ok(Self {
            state: Arc::new(Mutex::new(initial)),
            file,
        })
    }

    async fn persist(&self, state: ClientState) -> Result<()> {
        {
            let mut cached = self.state.lock().await;
            *cached = state.clone();
        }

        let file = Arc::clone(&self.file);
        tokio::task::spawn_blocking(move || file.replace(&state))
            .await
            .map_err(|e| RevereError::internal(format!("Failed to join task: {}", e)))??;

        Ok(())
    }
}

#[async_trait::async_trait]
impl ActiveOrgStore for TomlActiveOrgStore {
    async fn get_active_org(&self) -> Option<String> {
        self.state.lock().await.active_org_id.clone()
    }

    async fn set_active_org(&self, org_id: String) -> Result<()> {
        let mut state = self.state.lock().await.clone();
        state.active_org_id = Some(org_id);
        self.persist(state).await
    }

    async fn clear_active_org(&self) -> Result<()> {
        let mut state = self.state.lock().await.clone();
        state.active_org_id = None;
        self.persist(state).await
    }
}
