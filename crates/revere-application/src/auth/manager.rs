use std::sync::{Arc, Mutex, PoisonError, Weak};

use rand::Rng;
use rand::distributions::Alphanumeric;
use revere_core::config::DemoSettings;
use revere_core::error::{POLICY_RECURSION_MARKER, RevereError, Result};
use revere_core::identity::{AuthBackend, AuthEvent, AuthSession, Identity, SessionChange};
use revere_core::organization::{
    OrgMembership, OrganizationBackend, distinct_org_ids, is_fetchable_id, merge_memberships,
    select_active_org,
};
use revere_core::state::ActiveOrgStore;
use revere_core::OperatingMode;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use super::fetch_guard::{FetchGuard, FetchRefusal};
use super::snapshot::{AuthPhase, AuthSnapshot, ConnectionStatus};

const INSTANCE_ID_LEN: usize = 7;

/// Result of one membership fetch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Steps A and B ran; `count` memberships were published.
    Loaded { count: usize },
    /// A step failed; an empty set and the error message were published.
    Failed { kind: &'static str },
    /// Nothing was sent to the backend.
    Skipped(SkipReason),
    /// The mode or user changed while the fetch ran; the result was dropped.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoUser,
    DemoUser,
    DemoMode,
    /// User id is not backend-shaped; published as loaded-empty.
    InvalidUserId,
    InFlight,
    AlreadyFetched,
}

impl From<FetchRefusal> for SkipReason {
    fn from(refusal: FetchRefusal) -> Self {
        match refusal {
            FetchRefusal::InFlight => Self::InFlight,
            FetchRefusal::AlreadyFetched => Self::AlreadyFetched,
        }
    }
}

/// Owns identity, session and organization membership state.
///
/// `AuthSessionManager` is responsible for:
/// - Bootstrapping demo or live mode
/// - Tracking backend session changes
/// - Fetching memberships once per user
/// - Choosing and persisting the active organization
///
/// The handle is cheap to clone; all clones share one state. Readers get a
/// [`watch::Receiver`] from [`subscribe`](Self::subscribe).
#[derive(Clone)]
pub struct AuthSessionManager {
    inner: Arc<Inner>,
}

struct Inner {
    instance_id: String,
    auth: Arc<dyn AuthBackend>,
    orgs: Arc<dyn OrganizationBackend>,
    store: Arc<dyn ActiveOrgStore>,
    demo: DemoSettings,
    state: watch::Sender<AuthSnapshot>,
    guard: FetchGuard,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    fn take_listener(&self) -> Option<JoinHandle<()>> {
        self.listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(handle) = self.take_listener() {
            handle.abort();
        }
    }
}

impl AuthSessionManager {
    /// Creates a manager and reads the persisted active org id.
    ///
    /// The store is read exactly once, here. Afterwards the manager only
    /// writes to it.
    pub async fn new(
        auth: Arc<dyn AuthBackend>,
        orgs: Arc<dyn OrganizationBackend>,
        store: Arc<dyn ActiveOrgStore>,
        demo: DemoSettings,
    ) -> Self {
        let persisted = store.get_active_org().await;
        let instance_id = new_instance_id();
        tracing::debug!(
            instance = %instance_id,
            persisted_org = ?persisted,
            "[AuthSession] Created"
        );

        let (state, _) = watch::channel(AuthSnapshot::new(persisted));
        Self {
            inner: Arc::new(Inner {
                instance_id,
                auth,
                orgs,
                store,
                demo,
                state,
                guard: FetchGuard::new(),
                listener: Mutex::new(None),
            }),
        }
    }

    /// Random id tagging this instance's log lines.
    pub fn instance_id(&self) -> &str {
        &self.inner.instance_id
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.inner.state.subscribe()
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.inner.state.borrow().clone()
    }

    /// Switches to `mode`, discarding everything tied to the previous mode,
    /// and runs that mode's bootstrap to completion.
    ///
    /// Work still running from a previous activation is not cancelled, but
    /// its results are ignored.
    pub async fn activate(&self, mode: OperatingMode) {
        let generation = self.begin_generation(mode);
        tracing::info!(
            instance = %self.instance_id(),
            generation,
            %mode,
            "[AuthSession] Activating mode"
        );

        match mode {
            OperatingMode::Demo => self.activate_demo(generation).await,
            OperatingMode::Live => self.activate_live(generation).await,
        }
    }

    /// Fetches memberships for the current user, subject to the guard.
    pub async fn fetch_memberships(&self) -> FetchOutcome {
        let (generation, identity) = {
            let snapshot = self.inner.state.borrow();
            (snapshot.generation, snapshot.identity.clone())
        };
        match identity {
            Some(identity) => self.fetch_for(generation, identity).await,
            None => FetchOutcome::Skipped(SkipReason::NoUser),
        }
    }

    /// Clears the last error and fetches again for the current user, even if
    /// that user was already loaded.
    pub async fn retry_memberships(&self) -> FetchOutcome {
        if !self.inner.guard.release_for_retry() {
            return FetchOutcome::Skipped(SkipReason::InFlight);
        }
        self.inner.state.send_modify(|s| s.membership_error = None);
        tracing::info!(instance = %self.instance_id(), "[AuthSession] Retrying membership fetch");
        self.fetch_memberships().await
    }

    /// Makes `org_id` the active organization and persists it.
    ///
    /// The id is not checked against the membership list.
    pub async fn switch_org(&self, org_id: impl Into<String>) -> Result<()> {
        let org_id = org_id.into();
        self.inner
            .state
            .send_modify(|s| s.active_org_id = Some(org_id.clone()));
        tracing::info!(instance = %self.instance_id(), org_id = %org_id, "[AuthSession] Switched organization");
        self.inner.store.set_active_org(org_id).await
    }

    /// Signs in against the backend and loads the user's memberships.
    ///
    /// Rejected in demo mode, where no backend credential exists.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Identity> {
        let (generation, mode) = self.current();
        if mode.is_demo() {
            return Err(RevereError::auth("sign-in is unavailable in demo mode"));
        }

        let session = match self.inner.auth.sign_in_with_password(email, password).await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(
                    instance = %self.instance_id(),
                    kind = e.kind(),
                    "[AuthSession] Sign-in failed: {}",
                    e
                );
                if e.is_transport() {
                    self.apply(generation, |s| {
                        s.connection_status = ConnectionStatus::Disconnected;
                    });
                }
                return Err(e);
            }
        };

        let identity = session.user.clone();
        if self.apply(generation, |s| s.replace_session(Some(session))) {
            self.fetch_for(generation, identity.clone()).await;
        }
        Ok(identity)
    }

    /// Ends the session and clears memberships. In live mode the backend
    /// session is revoked as well; local state is cleared even if that fails.
    pub async fn sign_out(&self) -> Result<()> {
        let (generation, mode) = self.current();
        let result = if mode.is_live() {
            self.inner.auth.sign_out().await
        } else {
            Ok(())
        };
        self.apply_signed_out(generation);
        result
    }

    /// Stops listening for session changes.
    pub fn shutdown(&self) {
        if let Some(handle) = self.inner.take_listener() {
            handle.abort();
        }
    }

    // ------------------------------------------------------------------
    // Mode bootstrap
    // ------------------------------------------------------------------

    fn begin_generation(&self, mode: OperatingMode) -> u64 {
        self.shutdown();
        self.inner.guard.reset();

        let mut generation = 0;
        self.inner.state.send_modify(|s| {
            generation = s.generation + 1;
            s.reset(generation, mode);
        });
        generation
    }

    async fn activate_demo(&self, generation: u64) {
        // A real session left over from live mode must not leak into demo mode.
        if let Err(e) = self.inner.auth.sign_out().await {
            tracing::debug!(
                instance = %self.instance_id(),
                "[AuthSession] Clearing backend session for demo mode failed: {}",
                e
            );
        }

        let identity = Identity::demo(&self.inner.demo.user_email);
        let session = AuthSession::demo(identity);
        if !self.apply(generation, |s| s.replace_session(Some(session))) {
            return;
        }
        self.apply(generation, |s| {
            s.memberships_loading = true;
            s.phase = AuthPhase::MembershipsLoading;
        });

        let membership = self.resolve_demo_membership().await;
        self.finish_load(generation, None, vec![membership], None).await;
    }

    async fn resolve_demo_membership(&self) -> OrgMembership {
        let demo = &self.inner.demo;
        match self.inner.orgs.query_org_by_slug(&demo.org_slug).await {
            Ok(Some(org)) => {
                tracing::info!(
                    instance = %self.instance_id(),
                    org_id = %org.id,
                    "[AuthSession] Resolved demo organization"
                );
                OrgMembership::demo(org.id, org.name, org.slug)
            }
            Ok(None) => {
                tracing::warn!(
                    instance = %self.instance_id(),
                    slug = %demo.org_slug,
                    "[AuthSession] No demo organization found, using placeholder"
                );
                self.placeholder_demo_membership()
            }
            Err(e) => {
                tracing::warn!(
                    instance = %self.instance_id(),
                    kind = e.kind(),
                    "[AuthSession] Demo organization lookup failed, using placeholder: {}",
                    e
                );
                self.placeholder_demo_membership()
            }
        }
    }

    fn placeholder_demo_membership(&self) -> OrgMembership {
        let demo = &self.inner.demo;
        OrgMembership::demo(&demo.placeholder_org_id, &demo.org_name, &demo.org_slug)
    }

    async fn activate_live(&self, generation: u64) {
        if !self.apply(generation, |s| s.phase = AuthPhase::CheckingSession) {
            return;
        }

        // Subscribe before the check so no change between the two is lost.
        let receiver = self.inner.auth.subscribe();
        self.spawn_listener(generation, receiver);

        let identity = match self.inner.auth.get_session().await {
            Ok(session) => {
                let identity = session.as_ref().map(|s| s.user.clone());
                if !self.apply(generation, |s| s.replace_session(session)) {
                    return;
                }
                identity
            }
            Err(e) => {
                let reachable = !e.is_transport();
                tracing::warn!(
                    instance = %self.instance_id(),
                    kind = e.kind(),
                    "[AuthSession] Session check failed: {}",
                    e
                );
                self.apply(generation, |s| {
                    s.auth_ready = true;
                    s.phase = AuthPhase::AuthReadyNoUser;
                    s.connection_status = if reachable {
                        ConnectionStatus::Connected
                    } else {
                        ConnectionStatus::Disconnected
                    };
                });
                None
            }
        };

        if let Some(identity) = identity {
            self.fetch_for(generation, identity).await;
        }
    }

    fn spawn_listener(&self, generation: u64, mut receiver: broadcast::Receiver<SessionChange>) {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let instance_id = self.inner.instance_id.clone();

        let handle = tokio::spawn(async move {
            loop {
                let change = match receiver.recv().await {
                    Ok(change) => change,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            instance = %instance_id,
                            skipped,
                            "[AuthSession] Session listener lagged"
                        );
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                AuthSessionManager { inner }
                    .handle_session_change(generation, change)
                    .await;
            }
        });

        let previous = self
            .inner
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    async fn handle_session_change(&self, generation: u64, change: SessionChange) {
        tracing::debug!(
            instance = %self.instance_id(),
            event = ?change.event,
            "[AuthSession] Session change"
        );

        if change.event == AuthEvent::SignedOut || change.session.is_none() {
            self.apply_signed_out(generation);
            return;
        }

        let identity = change.session.as_ref().map(|s| s.user.clone());
        if !self.apply(generation, |s| s.replace_session(change.session)) {
            return;
        }
        if let Some(identity) = identity {
            self.fetch_for(generation, identity).await;
        }
    }

    fn apply_signed_out(&self, generation: u64) {
        if self.apply(generation, AuthSnapshot::sign_out) {
            self.inner.guard.reset();
            tracing::info!(instance = %self.instance_id(), "[AuthSession] Signed out");
        }
    }

    // ------------------------------------------------------------------
    // Membership fetch
    // ------------------------------------------------------------------

    /// Fetches for `identity`, then for whoever replaced it mid-flight.
    ///
    /// A user change during a fetch makes the result stale and the new
    /// user's own attempt was refused as in flight, so the caller that held
    /// the guard fetches again on its behalf.
    async fn fetch_for(&self, generation: u64, identity: Identity) -> FetchOutcome {
        let mut fetched = identity.id.clone();
        let outcome = self.fetch_once(generation, identity).await;
        if matches!(outcome, FetchOutcome::Skipped(_)) {
            return outcome;
        }

        while let Some(next) = self.identity_awaiting_fetch(generation, &fetched) {
            tracing::debug!(
                instance = %self.instance_id(),
                user_id = %next.id,
                "[AuthSession] User changed during fetch, fetching for the new user"
            );
            fetched = next.id.clone();
            if matches!(
                self.fetch_once(generation, next).await,
                FetchOutcome::Skipped(_)
            ) {
                break;
            }
        }
        outcome
    }

    /// Current user, if it differs from `fetched` and has no fetch running
    /// or finished under `generation`.
    fn identity_awaiting_fetch(&self, generation: u64, fetched: &str) -> Option<Identity> {
        let snapshot = self.inner.state.borrow();
        if snapshot.generation != generation
            || snapshot.memberships_loading
            || snapshot.memberships_loaded
        {
            return None;
        }
        snapshot
            .identity
            .as_ref()
            .filter(|identity| identity.id != fetched)
            .cloned()
    }

    async fn fetch_once(&self, generation: u64, identity: Identity) -> FetchOutcome {
        // Checked by identity, not by mode: a stale demo user must never
        // reach the backend during a mode switch.
        if identity.is_demo() {
            return FetchOutcome::Skipped(SkipReason::DemoUser);
        }
        if self.inner.state.borrow().mode.is_demo() {
            return FetchOutcome::Skipped(SkipReason::DemoMode);
        }

        let user_id = identity.id;
        if !is_fetchable_id(&user_id) {
            tracing::debug!(
                instance = %self.instance_id(),
                user_id = %user_id,
                "[AuthSession] User id is not backend-shaped, skipping membership fetch"
            );
            self.finish_load(generation, Some(user_id.as_str()), Vec::new(), None)
                .await;
            return FetchOutcome::Skipped(SkipReason::InvalidUserId);
        }

        let ticket = match self.inner.guard.try_begin(&user_id) {
            Ok(ticket) => ticket,
            Err(refusal) => return FetchOutcome::Skipped(refusal.into()),
        };

        let started = self.inner.state.send_if_modified(|s| {
            if s.generation != generation || s.user_id() != Some(user_id.as_str()) {
                return false;
            }
            s.memberships_loading = true;
            s.membership_error = None;
            s.phase = AuthPhase::MembershipsLoading;
            true
        });
        if !started {
            return FetchOutcome::Stale;
        }

        tracing::info!(
            instance = %self.instance_id(),
            user_id = %user_id,
            "[AuthSession] Fetching memberships"
        );

        match self.load_memberships(&user_id).await {
            Ok(memberships) => {
                let count = memberships.len();
                if !self
                    .finish_load(generation, Some(user_id.as_str()), memberships, None)
                    .await
                {
                    // Dropping the ticket leaves the guard idle for the new user.
                    return FetchOutcome::Stale;
                }
                ticket.complete();
                tracing::info!(
                    instance = %self.instance_id(),
                    count,
                    "[AuthSession] Memberships loaded"
                );
                FetchOutcome::Loaded { count }
            }
            Err(e) => {
                let kind = e.kind();
                let message = describe_membership_error(&e);
                if e.is_policy_recursion() {
                    tracing::error!(
                        instance = %self.instance_id(),
                        kind,
                        "[AuthSession] Membership policies recurse; backend configuration defect: {}",
                        e
                    );
                } else {
                    tracing::error!(
                        instance = %self.instance_id(),
                        kind,
                        "[AuthSession] Membership fetch failed: {}",
                        e
                    );
                }
                if !self
                    .finish_load(generation, Some(user_id.as_str()), Vec::new(), Some(message))
                    .await
                {
                    return FetchOutcome::Stale;
                }
                ticket.fail();
                FetchOutcome::Failed { kind }
            }
        }
    }

    /// Step A, then Step B when A returned rows, then the merge.
    async fn load_memberships(&self, user_id: &str) -> Result<Vec<OrgMembership>> {
        let rows = self.inner.orgs.query_memberships(user_id).await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids = distinct_org_ids(&rows);
        let orgs = self.inner.orgs.query_orgs_by_ids(&ids).await?;
        Ok(merge_memberships(&rows, &orgs))
    }

    /// Publishes a terminal membership state and, for a non-empty set,
    /// selects and persists the active organization.
    ///
    /// Returns false when the result was dropped because the generation or
    /// the user changed in the meantime.
    async fn finish_load(
        &self,
        generation: u64,
        expected_user: Option<&str>,
        memberships: Vec<OrgMembership>,
        error: Option<String>,
    ) -> bool {
        let mut selected = None;
        let applied = self.inner.state.send_if_modified(|s| {
            if s.generation != generation {
                return false;
            }
            if let Some(user_id) = expected_user
                && s.user_id() != Some(user_id)
            {
                return false;
            }

            if !memberships.is_empty() {
                selected = select_active_org(&memberships, s.active_org_id.as_deref(), s.mode);
                if selected.is_some() {
                    s.active_org_id = selected.clone();
                }
            }
            s.memberships = memberships;
            s.memberships_loading = false;
            s.memberships_loaded = true;
            s.membership_error = error;
            s.phase = AuthPhase::MembershipsLoaded;
            true
        });

        if applied && let Some(org_id) = selected {
            tracing::debug!(
                instance = %self.instance_id(),
                org_id = %org_id,
                "[AuthSession] Active organization selected"
            );
            if let Err(e) = self.inner.store.set_active_org(org_id).await {
                tracing::warn!(
                    instance = %self.instance_id(),
                    "[AuthSession] Failed to persist active organization: {}",
                    e
                );
            }
        }
        applied
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn current(&self) -> (u64, OperatingMode) {
        let snapshot = self.inner.state.borrow();
        (snapshot.generation, snapshot.mode)
    }

    /// Applies `f` only if `generation` is still current.
    fn apply<F>(&self, generation: u64, f: F) -> bool
    where
        F: FnOnce(&mut AuthSnapshot),
    {
        self.inner.state.send_if_modified(|s| {
            if s.generation != generation {
                return false;
            }
            f(s);
            true
        })
    }
}

fn describe_membership_error(error: &RevereError) -> String {
    if error.is_policy_recursion() {
        format!("{} {}", POLICY_RECURSION_MARKER, error)
    } else {
        error.to_string()
    }
}

fn new_instance_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(INSTANCE_ID_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}
