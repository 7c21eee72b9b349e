//! Persisted client state.

use serde::{Deserialize, Serialize};

/// Client state that survives restarts.
///
/// # File Location
///
/// - macOS: `~/Library/Application Support/revere/state.toml`
/// - Linux: `~/.config/revere/state.toml`
/// - Windows: `%APPDATA%\revere\state.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientState {
    /// Organization the user last worked in. Restored on startup if it is
    /// still among the user's memberships.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_org_id: Option<String>,
}

impl ClientState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_active_org(org_id: impl Into<String>) -> Self {
        Self {
            active_org_id: Some(org_id.into()),
        }
    }

    pub fn active_org_id(&self) -> Option<&str> {
        self.active_org_id.as_deref()
    }
}
