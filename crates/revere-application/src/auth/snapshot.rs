//! Read model published by the session manager.

use revere_core::OperatingMode;
use revere_core::identity::{AuthSession, Identity};
use revere_core::organization::{OrgMembership, OrgRole};
use serde::Serialize;

/// Where the bootstrap sequence currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthPhase {
    Uninitialized,
    CheckingSession,
    AuthReadyNoUser,
    AuthReadyWithUser,
    MembershipsLoading,
    MembershipsLoaded,
}

/// Reachability of the backend as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Unknown,
    Connected,
    Disconnected,
}

/// Consistent view of identity, session and memberships.
///
/// `generation` identifies the mode activation that produced this value.
/// Asynchronous work started under an older generation is never applied.
#[derive(Debug, Clone, Serialize)]
pub struct AuthSnapshot {
    pub generation: u64,
    pub mode: OperatingMode,
    pub phase: AuthPhase,
    pub identity: Option<Identity>,
    #[serde(skip)]
    pub session: Option<AuthSession>,
    pub connection_status: ConnectionStatus,
    pub auth_ready: bool,
    pub memberships: Vec<OrgMembership>,
    pub memberships_loading: bool,
    pub memberships_loaded: bool,
    pub membership_error: Option<String>,
    pub active_org_id: Option<String>,
}

impl AuthSnapshot {
    /// State before any mode has been activated.
    pub fn new(active_org_id: Option<String>) -> Self {
        Self {
            generation: 0,
            mode: OperatingMode::default(),
            phase: AuthPhase::Uninitialized,
            identity: None,
            session: None,
            connection_status: ConnectionStatus::Unknown,
            auth_ready: false,
            memberships: Vec::new(),
            memberships_loading: false,
            memberships_loaded: false,
            membership_error: None,
            active_org_id,
        }
    }

    /// Fresh state for a new mode activation.
    ///
    /// The active org id survives: it mirrors the persisted selection and is
    /// re-validated against the next membership load.
    pub(crate) fn reset(&mut self, generation: u64, mode: OperatingMode) {
        let active_org_id = self.active_org_id.take();
        *self = Self::new(active_org_id);
        self.generation = generation;
        self.mode = mode;
    }

    /// Membership matching `active_org_id`, if any.
    pub fn active_org(&self) -> Option<&OrgMembership> {
        let active = self.active_org_id.as_deref()?;
        self.memberships.iter().find(|m| m.org_id == active)
    }

    pub fn active_role(&self) -> Option<OrgRole> {
        self.active_org().map(|m| m.role)
    }

    pub fn user_id(&self) -> Option<&str> {
        self.identity.as_ref().map(|identity| identity.id.as_str())
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub(crate) fn clear_memberships(&mut self) {
        self.memberships.clear();
        self.memberships_loading = false;
        self.memberships_loaded = false;
        self.membership_error = None;
    }

    /// Installs a new session (or none).
    ///
    /// Memberships belong to a user: they are dropped when the user changes
    /// and kept across token refreshes of the same user.
    pub(crate) fn replace_session(&mut self, session: Option<AuthSession>) {
        let next_user = session.as_ref().map(|s| s.user.id.clone());
        if self.user_id() != next_user.as_deref() {
            self.clear_memberships();
        }

        self.identity = session.as_ref().map(|s| s.user.clone());
        self.session = session;
        self.auth_ready = true;
        self.connection_status = ConnectionStatus::Connected;

        if self.identity.is_none() {
            self.phase = AuthPhase::AuthReadyNoUser;
        } else if !self.memberships_loaded && !self.memberships_loading {
            self.phase = AuthPhase::AuthReadyWithUser;
        }
    }

    pub(crate) fn sign_out(&mut self) {
        self.identity = None;
        self.session = None;
        self.clear_memberships();
        self.phase = AuthPhase::AuthReadyNoUser;
    }
}
