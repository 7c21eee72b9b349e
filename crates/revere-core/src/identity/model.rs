//! Identity and session domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fixed identifier of the synthetic demo user.
///
/// Never issued by the backend, so the membership fetch refuses it outright.
pub const DEMO_USER_ID: &str = "demo-user";

/// Access token carried by the synthetic demo session.
pub const DEMO_ACCESS_TOKEN: &str = "demo-access-token";

/// The authenticated principal derived from a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Display metadata (full name, avatar, ...) as stored by the backend.
    #[serde(default, rename = "user_metadata")]
    pub metadata: Map<String, Value>,
}

impl Identity {
    /// Creates an identity without metadata.
    pub fn new(id: impl Into<String>, email: Option<String>) -> Self {
        Self {
            id: id.into(),
            email,
            metadata: Map::new(),
        }
    }

    /// The synthetic identity used in demo mode.
    pub fn demo(email: impl Into<String>) -> Self {
        let mut metadata = Map::new();
        metadata.insert("full_name".to_string(), Value::from("Demo User"));
        Self {
            id: DEMO_USER_ID.to_string(),
            email: Some(email.into()),
            metadata,
        }
    }

    /// Returns true for the synthetic demo user, regardless of operating mode.
    pub fn is_demo(&self) -> bool {
        self.id == DEMO_USER_ID
    }

    /// Best display name available: metadata `full_name`, then email, then id.
    pub fn display_name(&self) -> &str {
        self.metadata
            .get("full_name")
            .and_then(Value::as_str)
            .or(self.email.as_deref())
            .unwrap_or(&self.id)
    }
}

/// Credential bundle issued by the identity backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub user: Identity,
}

impl AuthSession {
    /// Builds the in-memory session for demo mode. It carries no refresh
    /// token and never expires.
    pub fn demo(identity: Identity) -> Self {
        Self {
            access_token: DEMO_ACCESS_TOKEN.to_string(),
            refresh_token: None,
            expires_at: None,
            user: identity,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Kind of session change reported by the identity backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
}

/// Notification delivered to session-change subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionChange {
    pub event: AuthEvent,
    pub session: Option<AuthSession>,
}

impl SessionChange {
    pub fn new(event: AuthEvent, session: Option<AuthSession>) -> Self {
        Self { event, session }
    }
}
