//! Backend stand-in used when no backend is configured.
//!
//! Demo mode runs on it without any network access: there is never a
//! session, and every row query fails as unreachable, which demo mode turns
//! into its placeholder organization.

use revere_core::error::{RevereError, Result};
use revere_core::identity::{AuthBackend, AuthSession, SessionChange};
use revere_core::organization::{MembershipRow, OrganizationBackend, OrganizationRow};
use tokio::sync::broadcast;

const NOT_CONFIGURED: &str = "no backend configured";

pub struct OfflineBackend {
    events: broadcast::Sender<SessionChange>,
}

impl OfflineBackend {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(1);
        Self { events }
    }
}

impl Default for OfflineBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AuthBackend for OfflineBackend {
    async fn get_session(&self) -> Result<Option<AuthSession>> {
        Ok(None)
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.events.subscribe()
    }

    async fn sign_in_with_password(&self, _email: &str, _password: &str) -> Result<AuthSession> {
        Err(RevereError::config(NOT_CONFIGURED))
    }

    async fn sign_out(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl OrganizationBackend for OfflineBackend {
    async fn query_memberships(&self, _user_id: &str) -> Result<Vec<MembershipRow>> {
        Err(RevereError::transport(NOT_CONFIGURED))
    }

    async fn query_orgs_by_ids(&self, _ids: &[String]) -> Result<Vec<OrganizationRow>> {
        Err(RevereError::transport(NOT_CONFIGURED))
    }

    async fn query_org_by_slug(&self, _slug: &str) -> Result<Option<OrganizationRow>> {
        Err(RevereError::transport(NOT_CONFIGURED))
    }
}
