//! Read-only connectivity probes against the backend.
//!
//! The runner walks the same path the session manager takes (session,
//! membership rows, organization rows, demo organization) and records how
//! each step went. A failing probe never stops the ones after it; probes
//! that depend on an earlier result are skipped instead.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use revere_core::error::Result;
use revere_core::identity::AuthBackend;
use revere_core::organization::{OrganizationBackend, distinct_org_ids, is_fetchable_id};
use serde::Serialize;
use strum::Display;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProbeName {
    Session,
    Memberships,
    Organizations,
    DemoOrganization,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProbeStatus {
    Pass,
    Fail,
    Timeout,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    pub name: ProbeName,
    pub status: ProbeStatus,
    pub duration_ms: u64,
    pub detail: String,
    /// `RevereError::kind` of a failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

impl ProbeResult {
    fn skipped(name: ProbeName, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: ProbeStatus::Skipped,
            duration_ms: 0,
            detail: detail.into(),
            error_kind: None,
        }
    }

    pub fn is_policy_recursion(&self) -> bool {
        self.error_kind.as_deref() == Some("policy_recursion")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticReport {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub results: Vec<ProbeResult>,
}

impl DiagnosticReport {
    /// True when nothing failed or timed out. Skipped probes do not count.
    pub fn passed(&self) -> bool {
        self.results
            .iter()
            .all(|r| matches!(r.status, ProbeStatus::Pass | ProbeStatus::Skipped))
    }

    pub fn has_policy_recursion(&self) -> bool {
        self.results.iter().any(ProbeResult::is_policy_recursion)
    }

    pub fn result(&self, name: ProbeName) -> Option<&ProbeResult> {
        self.results.iter().find(|r| r.name == name)
    }

    /// One line per probe, for terminal output.
    pub fn summary(&self) -> String {
        let mut lines: Vec<String> = self
            .results
            .iter()
            .map(|r| format!("{:<18} {:<8} {:>6}ms  {}", r.name, r.status, r.duration_ms, r.detail))
            .collect();
        if self.has_policy_recursion() {
            lines.push(
                "membership policies recurse into themselves; fix the backend row-level policies"
                    .to_string(),
            );
        }
        lines.join("\n")
    }
}

/// Runs the fixed probe sequence.
pub struct ProbeRunner {
    auth: Arc<dyn AuthBackend>,
    orgs: Arc<dyn OrganizationBackend>,
    demo_org_slug: String,
    timeout: Duration,
}

impl ProbeRunner {
    pub fn new(
        auth: Arc<dyn AuthBackend>,
        orgs: Arc<dyn OrganizationBackend>,
        demo_org_slug: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            auth,
            orgs,
            demo_org_slug: demo_org_slug.into(),
            timeout,
        }
    }

    pub async fn run(&self) -> DiagnosticReport {
        let id = Uuid::new_v4();
        let started_at = Utc::now();
        tracing::info!(report = %id, "[Diagnostics] Running probes");

        let mut results = Vec::with_capacity(4);

        let (result, session) = self
            .probe(ProbeName::Session, self.auth.get_session(), |session| match session {
                Some(session) => format!("signed in as {}", session.user.id),
                None => "no session".to_string(),
            })
            .await;
        results.push(result);
        let user_id = session
            .flatten()
            .map(|session| session.user.id)
            .filter(|id| is_fetchable_id(id));

        let rows = match user_id {
            Some(user_id) => {
                let (result, rows) = self
                    .probe(
                        ProbeName::Memberships,
                        self.orgs.query_memberships(&user_id),
                        |rows| format!("{} membership row(s)", rows.len()),
                    )
                    .await;
                results.push(result);
                rows
            }
            None => {
                results.push(ProbeResult::skipped(
                    ProbeName::Memberships,
                    "no backend user signed in",
                ));
                None
            }
        };

        match rows.filter(|rows| !rows.is_empty()) {
            Some(rows) => {
                let ids = distinct_org_ids(&rows);
                let (result, _) = self
                    .probe(
                        ProbeName::Organizations,
                        self.orgs.query_orgs_by_ids(&ids),
                        |orgs| format!("{} of {} organization(s) visible", orgs.len(), ids.len()),
                    )
                    .await;
                results.push(result);
            }
            None => results.push(ProbeResult::skipped(
                ProbeName::Organizations,
                "no membership rows to resolve",
            )),
        }

        let slug = self.demo_org_slug.as_str();
        let (result, _) = self
            .probe(
                ProbeName::DemoOrganization,
                self.orgs.query_org_by_slug(slug),
                |org| match org {
                    Some(org) => format!("'{}' resolves to {}", slug, org.id),
                    None => format!("'{}' not found, demo mode uses the placeholder", slug),
                },
            )
            .await;
        results.push(result);

        let report = DiagnosticReport {
            id,
            started_at,
            results,
        };
        tracing::info!(
            report = %id,
            passed = report.passed(),
            policy_recursion = report.has_policy_recursion(),
            "[Diagnostics] Probes finished"
        );
        report
    }

    async fn probe<T, F, D>(&self, name: ProbeName, call: F, describe: D) -> (ProbeResult, Option<T>)
    where
        F: Future<Output = Result<T>>,
        D: FnOnce(&T) -> String,
    {
        let started = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, call).await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let (status, detail, error_kind, value) = match outcome {
            Ok(Ok(value)) => (ProbeStatus::Pass, describe(&value), None, Some(value)),
            Ok(Err(e)) => {
                if e.is_policy_recursion() {
                    tracing::error!(probe = %name, "[Diagnostics] Policy recursion: {}", e);
                } else {
                    tracing::warn!(probe = %name, kind = e.kind(), "[Diagnostics] Probe failed: {}", e);
                }
                (ProbeStatus::Fail, e.to_string(), Some(e.kind().to_string()), None)
            }
            Err(_) => {
                tracing::warn!(probe = %name, "[Diagnostics] Probe timed out");
                (
                    ProbeStatus::Timeout,
                    format!("no answer within {}s", self.timeout.as_secs()),
                    None,
                    None,
                )
            }
        };

        (
            ProbeResult {
                name,
                status,
                duration_ms,
                detail,
                error_kind,
            },
            value,
        )
    }
}
