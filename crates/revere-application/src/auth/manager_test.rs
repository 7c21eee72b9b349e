use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use revere_core::OperatingMode;
use revere_core::config::DemoSettings;
use revere_core::error::{POLICY_RECURSION_MARKER, RevereError, Result};
use revere_core::identity::{
    AuthBackend, AuthEvent, AuthSession, DEMO_USER_ID, Identity, SessionChange,
};
use revere_core::organization::{MembershipRow, OrgRole, OrganizationBackend, OrganizationRow};
use revere_core::state::ActiveOrgStore;
use tokio::sync::{Notify, broadcast};

use super::manager::{AuthSessionManager, FetchOutcome, SkipReason};
use super::snapshot::{AuthPhase, AuthSnapshot, ConnectionStatus};

const USER_A: &str = "11111111-1111-4111-8111-111111111111";
const USER_B: &str = "22222222-2222-4222-8222-222222222222";
const ORG_A: &str = "aaaaaaaa-0000-4000-8000-00000000000a";
const ORG_B: &str = "bbbbbbbb-0000-4000-8000-00000000000b";
const ORG_DEMO: &str = "dddddddd-0000-4000-8000-00000000000d";

// Mock AuthBackend for testing
struct MockAuthBackend {
    session: Mutex<Option<AuthSession>>,
    session_error: Mutex<Option<RevereError>>,
    events: broadcast::Sender<SessionChange>,
    sign_out_calls: AtomicUsize,
}

impl MockAuthBackend {
    fn new(session: Option<AuthSession>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            session: Mutex::new(session),
            session_error: Mutex::new(None),
            events,
            sign_out_calls: AtomicUsize::new(0),
        }
    }

    fn failing(error: RevereError) -> Self {
        let backend = Self::new(None);
        *backend.session_error.lock().unwrap() = Some(error);
        backend
    }

    fn emit(&self, event: AuthEvent, session: Option<AuthSession>) {
        let _ = self.events.send(SessionChange::new(event, session));
    }
}

#[async_trait::async_trait]
impl AuthBackend for MockAuthBackend {
    async fn get_session(&self) -> Result<Option<AuthSession>> {
        if let Some(error) = self.session_error.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(self.session.lock().unwrap().clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.events.subscribe()
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession> {
        if password != "correct horse" {
            return Err(RevereError::auth("Invalid login credentials"));
        }
        let session = session_for(USER_B, Some(email));
        *self.session.lock().unwrap() = Some(session.clone());
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        *self.session.lock().unwrap() = None;
        Ok(())
    }
}

// Mock OrganizationBackend for testing
#[derive(Default)]
struct MockOrgBackend {
    memberships: Mutex<HashMap<String, Result<Vec<MembershipRow>>>>,
    orgs: Mutex<Vec<OrganizationRow>>,
    orgs_error: Mutex<Option<RevereError>>,
    slug_result: Mutex<Option<Result<Option<OrganizationRow>>>>,
    step_a_calls: AtomicUsize,
    step_b_calls: AtomicUsize,
    slug_calls: AtomicUsize,
    gate: Option<Arc<Notify>>,
}

impl MockOrgBackend {
    fn with_rows(user_id: &str, rows: Vec<MembershipRow>, orgs: Vec<OrganizationRow>) -> Self {
        let backend = Self::default();
        backend.set_rows(user_id, Ok(rows));
        *backend.orgs.lock().unwrap() = orgs;
        backend
    }

    fn set_rows(&self, user_id: &str, rows: Result<Vec<MembershipRow>>) {
        self.memberships
            .lock()
            .unwrap()
            .insert(user_id.to_string(), rows);
    }

    fn step_a(&self) -> usize {
        self.step_a_calls.load(Ordering::SeqCst)
    }

    fn step_b(&self) -> usize {
        self.step_b_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl OrganizationBackend for MockOrgBackend {
    async fn query_memberships(&self, user_id: &str) -> Result<Vec<MembershipRow>> {
        self.step_a_calls.fetch_add(1, Ordering::SeqCst);
        // Suspend like a real network call so concurrent callers interleave.
        tokio::task::yield_now().await;
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.memberships
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn query_orgs_by_ids(&self, ids: &[String]) -> Result<Vec<OrganizationRow>> {
        self.step_b_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.orgs_error.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(self
            .orgs
            .lock()
            .unwrap()
            .iter()
            .filter(|org| ids.contains(&org.id))
            .cloned()
            .collect())
    }

    async fn query_org_by_slug(&self, _slug: &str) -> Result<Option<OrganizationRow>> {
        self.slug_calls.fetch_add(1, Ordering::SeqCst);
        self.slug_result
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(Ok(None))
    }
}

// In-memory ActiveOrgStore for testing
#[derive(Default)]
struct MemoryStore {
    value: Mutex<Option<String>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryStore {
    fn with(org_id: &str) -> Self {
        let store = Self::default();
        *store.value.lock().unwrap() = Some(org_id.to_string());
        store
    }

    fn value(&self) -> Option<String> {
        self.value.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ActiveOrgStore for MemoryStore {
    async fn get_active_org(&self) -> Option<String> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.value.lock().unwrap().clone()
    }

    async fn set_active_org(&self, org_id: String) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        *self.value.lock().unwrap() = Some(org_id);
        Ok(())
    }

    async fn clear_active_org(&self) -> Result<()> {
        *self.value.lock().unwrap() = None;
        Ok(())
    }
}

fn session_for(user_id: &str, email: Option<&str>) -> AuthSession {
    AuthSession {
        access_token: format!("token-{user_id}"),
        refresh_token: Some("refresh".to_string()),
        expires_at: None,
        user: Identity::new(user_id, email.map(str::to_string)),
    }
}

fn row(org_id: &str, role: OrgRole) -> MembershipRow {
    MembershipRow {
        org_id: org_id.to_string(),
        role,
        is_active: true,
    }
}

fn org(id: &str, name: &str, is_demo: bool) -> OrganizationRow {
    OrganizationRow {
        id: id.to_string(),
        name: name.to_string(),
        slug: name.to_lowercase().replace(' ', "-"),
        is_demo,
    }
}

struct Harness {
    manager: AuthSessionManager,
    auth: Arc<MockAuthBackend>,
    orgs: Arc<MockOrgBackend>,
    store: Arc<MemoryStore>,
}

async fn harness(auth: MockAuthBackend, orgs: MockOrgBackend, store: MemoryStore) -> Harness {
    let auth = Arc::new(auth);
    let orgs = Arc::new(orgs);
    let store = Arc::new(store);
    let manager = AuthSessionManager::new(
        auth.clone(),
        orgs.clone(),
        store.clone(),
        DemoSettings::default(),
    )
    .await;
    Harness {
        manager,
        auth,
        orgs,
        store,
    }
}

fn two_org_backend() -> MockOrgBackend {
    MockOrgBackend::with_rows(
        USER_A,
        vec![row(ORG_A, OrgRole::Viewer), row(ORG_B, OrgRole::Admin)],
        vec![
            org(ORG_A, "Demo Sandbox", true),
            org(ORG_B, "Capitol Partners", false),
        ],
    )
}

async fn wait_until<F>(manager: &AuthSessionManager, predicate: F) -> AuthSnapshot
where
    F: FnMut(&AuthSnapshot) -> bool,
{
    let mut receiver = manager.subscribe();
    let snapshot = tokio::time::timeout(Duration::from_secs(2), receiver.wait_for(predicate))
        .await
        .expect("state did not converge in time")
        .expect("manager dropped")
        .clone();
    snapshot
}

#[tokio::test]
async fn test_demo_mode_without_backend_org_uses_placeholder() {
    let h = harness(
        MockAuthBackend::new(None),
        MockOrgBackend::default(),
        MemoryStore::default(),
    )
    .await;

    h.manager.activate(OperatingMode::Demo).await;
    let snapshot = h.manager.snapshot();

    assert!(snapshot.auth_ready);
    assert_eq!(snapshot.connection_status, ConnectionStatus::Connected);
    assert!(snapshot.identity.as_ref().unwrap().is_demo());
    assert!(snapshot.has_session());
    assert_eq!(snapshot.phase, AuthPhase::MembershipsLoaded);
    assert_eq!(snapshot.memberships.len(), 1);

    let membership = &snapshot.memberships[0];
    assert_eq!(membership.org_id, "demo-org");
    assert_eq!(membership.role, OrgRole::Admin);
    assert!(membership.is_active);
    assert_eq!(snapshot.active_org_id.as_deref(), Some("demo-org"));
    assert_eq!(snapshot.active_role(), Some(OrgRole::Admin));
    assert_eq!(h.store.value().as_deref(), Some("demo-org"));

    // Backend session cleared, membership tables never queried.
    assert_eq!(h.auth.sign_out_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.orgs.step_a(), 0);
}

#[tokio::test]
async fn test_demo_mode_uses_backend_demo_org_when_found() {
    let orgs = MockOrgBackend::default();
    *orgs.slug_result.lock().unwrap() = Some(Ok(Some(org(ORG_DEMO, "Demo", true))));
    let h = harness(MockAuthBackend::new(None), orgs, MemoryStore::default()).await;

    h.manager.activate(OperatingMode::Demo).await;
    let snapshot = h.manager.snapshot();

    assert_eq!(snapshot.memberships.len(), 1);
    assert_eq!(snapshot.memberships[0].org_id, ORG_DEMO);
    assert_eq!(snapshot.memberships[0].role, OrgRole::Admin);
    assert_eq!(snapshot.active_org().unwrap().org_id, ORG_DEMO);
}

#[tokio::test]
async fn test_demo_mode_lookup_error_falls_back_to_placeholder() {
    let orgs = MockOrgBackend::default();
    *orgs.slug_result.lock().unwrap() = Some(Err(RevereError::transport("offline")));
    let h = harness(MockAuthBackend::new(None), orgs, MemoryStore::default()).await;

    h.manager.activate(OperatingMode::Demo).await;
    let snapshot = h.manager.snapshot();

    assert_eq!(snapshot.memberships.len(), 1);
    assert_eq!(snapshot.memberships[0].org_id, "demo-org");
    assert!(snapshot.membership_error.is_none());
}

#[tokio::test]
async fn test_demo_mode_rejects_sign_in() {
    let h = harness(
        MockAuthBackend::new(None),
        MockOrgBackend::default(),
        MemoryStore::default(),
    )
    .await;
    h.manager.activate(OperatingMode::Demo).await;

    let result = h.manager.sign_in("staff@firm.com", "correct horse").await;
    assert!(matches!(result, Err(RevereError::Auth(_))));
}

#[tokio::test]
async fn test_live_mode_prefers_non_demo_org() {
    let h = harness(
        MockAuthBackend::new(Some(session_for(USER_A, None))),
        two_org_backend(),
        MemoryStore::default(),
    )
    .await;

    h.manager.activate(OperatingMode::Live).await;
    let snapshot = h.manager.snapshot();

    assert_eq!(snapshot.phase, AuthPhase::MembershipsLoaded);
    assert_eq!(snapshot.memberships.len(), 2);
    assert_eq!(snapshot.memberships[0].org_name, "Demo Sandbox");
    assert_eq!(snapshot.memberships[1].org_name, "Capitol Partners");
    assert_eq!(snapshot.active_org_id.as_deref(), Some(ORG_B));
    assert_eq!(snapshot.active_role(), Some(OrgRole::Admin));
    assert_eq!(h.store.value().as_deref(), Some(ORG_B));
    assert_eq!((h.orgs.step_a(), h.orgs.step_b()), (1, 1));
}

#[tokio::test]
async fn test_live_mode_restores_persisted_org() {
    let h = harness(
        MockAuthBackend::new(Some(session_for(USER_A, None))),
        two_org_backend(),
        MemoryStore::with(ORG_A),
    )
    .await;

    h.manager.activate(OperatingMode::Live).await;

    assert_eq!(h.manager.snapshot().active_org_id.as_deref(), Some(ORG_A));
    assert_eq!(h.manager.snapshot().active_role(), Some(OrgRole::Viewer));
    assert_eq!(h.store.reads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_live_mode_stale_persisted_org_is_replaced() {
    let h = harness(
        MockAuthBackend::new(Some(session_for(USER_A, None))),
        two_org_backend(),
        MemoryStore::with("org-that-was-left"),
    )
    .await;

    h.manager.activate(OperatingMode::Live).await;

    assert_eq!(h.manager.snapshot().active_org_id.as_deref(), Some(ORG_B));
    assert_eq!(h.store.value().as_deref(), Some(ORG_B));
}

#[tokio::test]
async fn test_missing_org_record_still_listed() {
    let orgs = MockOrgBackend::with_rows(
        USER_A,
        vec![row(ORG_A, OrgRole::Staff), row(ORG_B, OrgRole::Manager)],
        vec![org(ORG_B, "Capitol Partners", false)],
    );
    let h = harness(
        MockAuthBackend::new(Some(session_for(USER_A, None))),
        orgs,
        MemoryStore::default(),
    )
    .await;

    h.manager.activate(OperatingMode::Live).await;
    let snapshot = h.manager.snapshot();

    assert_eq!(snapshot.memberships.len(), 2);
    assert_eq!(snapshot.memberships[0].org_name, "Unknown Organization");
    assert!(!snapshot.memberships[0].is_demo);
    assert_eq!(snapshot.memberships[1].org_slug, "capitol-partners");
}

#[tokio::test]
async fn test_zero_memberships_are_loaded_and_not_refetched() {
    let h = harness(
        MockAuthBackend::new(Some(session_for(USER_A, None))),
        MockOrgBackend::with_rows(USER_A, Vec::new(), Vec::new()),
        MemoryStore::default(),
    )
    .await;

    h.manager.activate(OperatingMode::Live).await;
    let snapshot = h.manager.snapshot();

    assert!(snapshot.memberships_loaded);
    assert!(!snapshot.memberships_loading);
    assert!(snapshot.memberships.is_empty());
    assert!(snapshot.active_org().is_none());
    assert_eq!(h.orgs.step_b(), 0);

    assert_eq!(
        h.manager.fetch_memberships().await,
        FetchOutcome::Skipped(SkipReason::AlreadyFetched)
    );
    assert_eq!(h.orgs.step_a(), 1);
    assert_eq!(h.store.writes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_rapid_double_fetch_hits_backend_once() {
    let h = harness(
        MockAuthBackend::new(Some(session_for(USER_A, None))),
        two_org_backend(),
        MemoryStore::default(),
    )
    .await;

    let ((), second) = tokio::join!(
        h.manager.activate(OperatingMode::Live),
        h.manager.fetch_memberships()
    );

    assert_eq!(second, FetchOutcome::Skipped(SkipReason::InFlight));
    assert_eq!((h.orgs.step_a(), h.orgs.step_b()), (1, 1));
    assert_eq!(h.manager.snapshot().memberships.len(), 2);
}

#[tokio::test]
async fn test_policy_recursion_is_non_fatal_and_marked() {
    let orgs = MockOrgBackend::default();
    orgs.set_rows(
        USER_A,
        Err(RevereError::query(
            Some("42P17".to_string()),
            "infinite recursion detected in policy for relation \"org_members\"",
        )),
    );
    let h = harness(
        MockAuthBackend::new(Some(session_for(USER_A, None))),
        orgs,
        MemoryStore::default(),
    )
    .await;

    h.manager.activate(OperatingMode::Live).await;
    let snapshot = h.manager.snapshot();

    assert!(snapshot.memberships.is_empty());
    assert!(snapshot.memberships_loaded);
    assert!(!snapshot.memberships_loading);
    let error = snapshot.membership_error.expect("error recorded");
    assert!(error.starts_with(POLICY_RECURSION_MARKER));
    assert_eq!(h.orgs.step_b(), 0);
}

#[tokio::test]
async fn test_step_b_error_is_non_fatal() {
    let orgs = two_org_backend();
    *orgs.orgs_error.lock().unwrap() = Some(RevereError::query(None, "permission denied"));
    let h = harness(
        MockAuthBackend::new(Some(session_for(USER_A, None))),
        orgs,
        MemoryStore::default(),
    )
    .await;

    h.manager.activate(OperatingMode::Live).await;
    let snapshot = h.manager.snapshot();

    assert!(snapshot.memberships.is_empty());
    assert!(snapshot.memberships_loaded);
    let error = snapshot.membership_error.unwrap();
    assert!(error.contains("permission denied"));
    assert!(!error.contains(POLICY_RECURSION_MARKER));
}

#[tokio::test]
async fn test_retry_after_error_refetches() {
    let orgs = two_org_backend();
    orgs.set_rows(USER_A, Err(RevereError::query(None, "statement timeout")));
    let h = harness(
        MockAuthBackend::new(Some(session_for(USER_A, None))),
        orgs,
        MemoryStore::default(),
    )
    .await;

    h.manager.activate(OperatingMode::Live).await;
    assert!(h.manager.snapshot().membership_error.is_some());
    assert_eq!(
        h.manager.fetch_memberships().await,
        FetchOutcome::Skipped(SkipReason::AlreadyFetched)
    );

    h.orgs
        .set_rows(USER_A, Ok(vec![row(ORG_B, OrgRole::Manager)]));
    let outcome = h.manager.retry_memberships().await;

    assert_eq!(outcome, FetchOutcome::Loaded { count: 1 });
    let snapshot = h.manager.snapshot();
    assert!(snapshot.membership_error.is_none());
    assert_eq!(snapshot.active_role(), Some(OrgRole::Manager));
    assert_eq!(h.orgs.step_a(), 2);
}

#[tokio::test]
async fn test_invalid_user_id_skips_fetch() {
    let h = harness(
        MockAuthBackend::new(Some(session_for("not-a-uuid", None))),
        MockOrgBackend::default(),
        MemoryStore::default(),
    )
    .await;

    h.manager.activate(OperatingMode::Live).await;
    let snapshot = h.manager.snapshot();

    assert!(snapshot.memberships_loaded);
    assert!(snapshot.memberships.is_empty());
    assert!(snapshot.membership_error.is_none());
    assert_eq!(h.orgs.step_a(), 0);
}

#[tokio::test]
async fn test_padded_user_id_is_never_sent() {
    let padded = format!(" {USER_A} ");
    let h = harness(
        MockAuthBackend::new(Some(session_for(&padded, None))),
        two_org_backend(),
        MemoryStore::default(),
    )
    .await;

    h.manager.activate(OperatingMode::Live).await;

    assert!(h.manager.snapshot().memberships_loaded);
    assert_eq!(
        h.manager.fetch_memberships().await,
        FetchOutcome::Skipped(SkipReason::InvalidUserId)
    );
    assert_eq!(h.orgs.step_a(), 0);
}

#[tokio::test]
async fn test_demo_user_is_never_fetched_in_live_mode() {
    let h = harness(
        MockAuthBackend::new(None),
        two_org_backend(),
        MemoryStore::default(),
    )
    .await;
    h.manager.activate(OperatingMode::Live).await;

    h.auth
        .emit(AuthEvent::SignedIn, Some(session_for(DEMO_USER_ID, None)));
    wait_until(&h.manager, |s| s.user_id() == Some(DEMO_USER_ID)).await;

    assert_eq!(
        h.manager.fetch_memberships().await,
        FetchOutcome::Skipped(SkipReason::DemoUser)
    );
    assert!(h.manager.snapshot().memberships.is_empty());
    assert_eq!(h.orgs.step_a(), 0);
}

#[tokio::test]
async fn test_user_change_during_fetch_loads_new_user() {
    let gate = Arc::new(Notify::new());
    let mut orgs = two_org_backend();
    orgs.set_rows(USER_B, Ok(vec![row(ORG_B, OrgRole::Staff)]));
    orgs.gate = Some(gate.clone());
    let h = harness(
        MockAuthBackend::new(Some(session_for(USER_A, None))),
        orgs,
        MemoryStore::default(),
    )
    .await;

    let manager = h.manager.clone();
    let live = tokio::spawn(async move { manager.activate(OperatingMode::Live).await });
    while h.orgs.step_a() == 0 {
        tokio::task::yield_now().await;
    }

    // B signs in while A's Step A is still pending.
    h.auth
        .emit(AuthEvent::SignedIn, Some(session_for(USER_B, Some("b@firm.com"))));
    wait_until(&h.manager, |s| s.user_id() == Some(USER_B)).await;

    gate.notify_one();
    while h.orgs.step_a() < 2 {
        tokio::task::yield_now().await;
    }
    gate.notify_one();
    live.await.unwrap();

    let snapshot = h.manager.snapshot();
    assert_eq!(snapshot.user_id(), Some(USER_B));
    assert!(snapshot.memberships_loaded);
    assert!(!snapshot.memberships_loading);
    assert_eq!(snapshot.phase, AuthPhase::MembershipsLoaded);
    assert_eq!(snapshot.memberships.len(), 1);
    assert_eq!(snapshot.active_role(), Some(OrgRole::Staff));

    // A's dropped result did not mark A as fetched.
    h.auth
        .emit(AuthEvent::SignedIn, Some(session_for(USER_A, None)));
    while h.orgs.step_a() < 3 {
        tokio::task::yield_now().await;
    }
    gate.notify_one();
    let snapshot = wait_until(&h.manager, |s| {
        s.user_id() == Some(USER_A) && s.memberships_loaded
    })
    .await;
    assert_eq!(snapshot.memberships.len(), 2);
    assert_eq!(h.orgs.step_a(), 3);
}

#[tokio::test]
async fn test_transport_failure_marks_disconnected_but_ready() {
    let h = harness(
        MockAuthBackend::failing(RevereError::transport("connection refused")),
        MockOrgBackend::default(),
        MemoryStore::default(),
    )
    .await;

    h.manager.activate(OperatingMode::Live).await;
    let snapshot = h.manager.snapshot();

    assert!(snapshot.auth_ready);
    assert_eq!(snapshot.connection_status, ConnectionStatus::Disconnected);
    assert_eq!(snapshot.phase, AuthPhase::AuthReadyNoUser);
}

#[tokio::test]
async fn test_no_session_is_connected() {
    let h = harness(
        MockAuthBackend::new(None),
        MockOrgBackend::default(),
        MemoryStore::default(),
    )
    .await;

    h.manager.activate(OperatingMode::Live).await;
    let snapshot = h.manager.snapshot();

    assert!(snapshot.auth_ready);
    assert_eq!(snapshot.connection_status, ConnectionStatus::Connected);
    assert_eq!(snapshot.phase, AuthPhase::AuthReadyNoUser);
    assert_eq!(
        h.manager.fetch_memberships().await,
        FetchOutcome::Skipped(SkipReason::NoUser)
    );
}

#[tokio::test]
async fn test_mode_switch_fully_resets() {
    let h = harness(
        MockAuthBackend::new(Some(session_for(USER_A, None))),
        two_org_backend(),
        MemoryStore::default(),
    )
    .await;

    h.manager.activate(OperatingMode::Live).await;
    let live = h.manager.snapshot();
    assert_eq!(live.user_id(), Some(USER_A));

    h.manager.activate(OperatingMode::Demo).await;
    let demo = h.manager.snapshot();
    assert!(demo.generation > live.generation);
    assert!(demo.identity.as_ref().unwrap().is_demo());
    assert_eq!(demo.memberships.len(), 1);
    assert!(demo.memberships.iter().all(|m| m.org_id != ORG_A && m.org_id != ORG_B));

    // Demo mode cleared the backend session; sign back in for live mode.
    *h.auth.session.lock().unwrap() = Some(session_for(USER_A, None));
    h.manager.activate(OperatingMode::Live).await;
    let live_again = h.manager.snapshot();

    assert_eq!(live_again.user_id(), Some(USER_A));
    assert_eq!(live_again.memberships.len(), 2);
    assert!(live_again.memberships.iter().all(|m| m.org_id != "demo-org"));
    // The guard was reset, so the same user was fetched again.
    assert_eq!(h.orgs.step_a(), 2);
}

#[tokio::test]
async fn test_switch_to_demo_without_user_leaves_no_identity_behind() {
    let h = harness(
        MockAuthBackend::new(Some(session_for(USER_A, None))),
        two_org_backend(),
        MemoryStore::default(),
    )
    .await;

    h.manager.activate(OperatingMode::Demo).await;
    h.manager.activate(OperatingMode::Live).await;
    let snapshot = h.manager.snapshot();

    // Entering demo mode signed the backend out.
    assert!(snapshot.identity.is_none());
    assert!(snapshot.memberships.is_empty());
    assert!(!snapshot.memberships_loaded);
    assert_eq!(h.orgs.step_a(), 0);
}

#[tokio::test]
async fn test_late_result_from_previous_mode_is_ignored() {
    let gate = Arc::new(Notify::new());
    let mut orgs = two_org_backend();
    orgs.gate = Some(gate.clone());
    let h = harness(
        MockAuthBackend::new(Some(session_for(USER_A, None))),
        orgs,
        MemoryStore::default(),
    )
    .await;

    let manager = h.manager.clone();
    let live = tokio::spawn(async move { manager.activate(OperatingMode::Live).await });
    while h.orgs.step_a() == 0 {
        tokio::task::yield_now().await;
    }

    h.manager.activate(OperatingMode::Demo).await;
    gate.notify_one();
    live.await.unwrap();

    let snapshot = h.manager.snapshot();
    assert!(snapshot.identity.as_ref().unwrap().is_demo());
    assert_eq!(snapshot.memberships.len(), 1);
    assert_eq!(snapshot.memberships[0].org_id, "demo-org");
    assert_eq!(h.store.value().as_deref(), Some("demo-org"));
}

#[tokio::test]
async fn test_signed_out_event_clears_memberships() {
    let h = harness(
        MockAuthBackend::new(Some(session_for(USER_A, None))),
        two_org_backend(),
        MemoryStore::default(),
    )
    .await;
    h.manager.activate(OperatingMode::Live).await;
    assert_eq!(h.manager.snapshot().memberships.len(), 2);

    h.auth.emit(AuthEvent::SignedOut, None);
    let snapshot = wait_until(&h.manager, |s| s.identity.is_none()).await;

    assert!(snapshot.memberships.is_empty());
    assert!(!snapshot.memberships_loaded);
    assert_eq!(snapshot.phase, AuthPhase::AuthReadyNoUser);

    // Guard was reset: signing the same user back in fetches again.
    h.auth
        .emit(AuthEvent::SignedIn, Some(session_for(USER_A, None)));
    let snapshot = wait_until(&h.manager, |s| s.memberships_loaded).await;
    assert_eq!(snapshot.memberships.len(), 2);
    assert_eq!(h.orgs.step_a(), 2);
}

#[tokio::test]
async fn test_token_refresh_does_not_refetch() {
    let h = harness(
        MockAuthBackend::new(Some(session_for(USER_A, None))),
        two_org_backend(),
        MemoryStore::default(),
    )
    .await;
    h.manager.activate(OperatingMode::Live).await;

    let mut refreshed = session_for(USER_A, None);
    refreshed.access_token = "token-refreshed".to_string();
    h.auth.emit(AuthEvent::TokenRefreshed, Some(refreshed));
    let snapshot = wait_until(&h.manager, |s| {
        s.session
            .as_ref()
            .is_some_and(|session| session.access_token == "token-refreshed")
    })
    .await;

    assert_eq!(snapshot.memberships.len(), 2);
    assert_eq!(snapshot.phase, AuthPhase::MembershipsLoaded);
    assert_eq!(h.orgs.step_a(), 1);
}

#[tokio::test]
async fn test_sign_in_loads_new_user() {
    let orgs = MockOrgBackend::with_rows(
        USER_B,
        vec![row(ORG_B, OrgRole::Staff)],
        vec![org(ORG_B, "Capitol Partners", false)],
    );
    let h = harness(MockAuthBackend::new(None), orgs, MemoryStore::default()).await;
    h.manager.activate(OperatingMode::Live).await;

    let wrong = h.manager.sign_in("staff@firm.com", "hunter2").await;
    assert!(matches!(wrong, Err(RevereError::Auth(_))));

    let identity = h
        .manager
        .sign_in("staff@firm.com", "correct horse")
        .await
        .unwrap();
    assert_eq!(identity.id, USER_B);

    let snapshot = h.manager.snapshot();
    assert_eq!(snapshot.active_role(), Some(OrgRole::Staff));
    assert_eq!(h.orgs.step_a(), 1);
}

#[tokio::test]
async fn test_sign_out_clears_local_state() {
    let h = harness(
        MockAuthBackend::new(Some(session_for(USER_A, None))),
        two_org_backend(),
        MemoryStore::default(),
    )
    .await;
    h.manager.activate(OperatingMode::Live).await;

    h.manager.sign_out().await.unwrap();
    let snapshot = h.manager.snapshot();

    assert!(snapshot.identity.is_none());
    assert!(!snapshot.has_session());
    assert!(snapshot.memberships.is_empty());
    assert_eq!(h.auth.sign_out_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_explicit_switch_overwrites_without_validation() {
    let h = harness(
        MockAuthBackend::new(Some(session_for(USER_A, None))),
        two_org_backend(),
        MemoryStore::default(),
    )
    .await;
    h.manager.activate(OperatingMode::Live).await;

    h.manager.switch_org(ORG_A).await.unwrap();
    assert_eq!(h.manager.snapshot().active_role(), Some(OrgRole::Viewer));
    assert_eq!(h.store.value().as_deref(), Some(ORG_A));

    h.manager.switch_org("somewhere-else").await.unwrap();
    let snapshot = h.manager.snapshot();
    assert_eq!(snapshot.active_org_id.as_deref(), Some("somewhere-else"));
    assert!(snapshot.active_org().is_none());
    assert_eq!(h.store.value().as_deref(), Some("somewhere-else"));
}
