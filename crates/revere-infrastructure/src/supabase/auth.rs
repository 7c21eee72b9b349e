use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use reqwest::{Method, StatusCode};
use revere_core::error::{RevereError, Result};
use revere_core::identity::{AuthBackend, AuthEvent, AuthSession, Identity, SessionChange};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{RwLock, broadcast};

use super::error::{auth_error, from_reqwest};
use super::{AUTH_PATH, SupabaseHttp};
use crate::storage::AtomicTomlFile;

const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Body of a successful token grant.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: Identity,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> AuthSession {
        let expires_at = self
            .expires_at
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .or_else(|| self.expires_in.map(|secs| now + Duration::seconds(secs)));
        AuthSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

/// On-disk form of a session. User metadata is not kept; it comes back with
/// the next token grant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StoredSession {
    access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
    user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
}

impl From<&AuthSession> for StoredSession {
    fn from(session: &AuthSession) -> Self {
        Self {
            access_token: session.access_token.clone(),
            refresh_token: session.refresh_token.clone(),
            expires_at: session.expires_at,
            user_id: session.user.id.clone(),
            email: session.user.email.clone(),
        }
    }
}

impl From<StoredSession> for AuthSession {
    fn from(stored: StoredSession) -> Self {
        Self {
            access_token: stored.access_token,
            refresh_token: stored.refresh_token,
            expires_at: stored.expires_at,
            user: Identity::new(stored.user_id, stored.email),
        }
    }
}

/// Password sign-in, token refresh and sign-out against `/auth/v1`.
///
/// Holds the current session in memory and broadcasts every change.
pub struct SupabaseAuthClient {
    http: SupabaseHttp,
    session: RwLock<Option<AuthSession>>,
    events: broadcast::Sender<SessionChange>,
    session_file: Option<Arc<AtomicTomlFile<StoredSession>>>,
}

impl SupabaseAuthClient {
    pub fn new(http: SupabaseHttp, session_file: Option<PathBuf>) -> Self {
        let session_file = session_file.map(|path| Arc::new(AtomicTomlFile::new(path)));
        let restored = session_file.as_ref().and_then(|file| match file.load() {
            Ok(stored) => stored.map(AuthSession::from),
            Err(e) => {
                tracing::warn!(
                    path = %file.path().display(),
                    "[Auth] Ignoring unreadable session file: {}",
                    e
                );
                None
            }
        });
        if let Some(session) = &restored {
            tracing::debug!(user_id = %session.user.id, "[Auth] Restored session");
        }

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            http,
            session: RwLock::new(restored),
            events,
            session_file,
        }
    }

    /// Bearer token of the signed-in user, if any.
    pub async fn access_token(&self) -> Option<String> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|session| session.access_token.clone())
    }

    async fn token_grant(&self, grant_type: &str, body: serde_json::Value) -> Result<AuthSession> {
        let response = self
            .http
            .request(Method::POST, &format!("{}/token", AUTH_PATH), None)
            .query(&[("grant_type", grant_type)])
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(auth_error(status, &text));
        }

        let token: TokenResponse = response.json().await.map_err(from_reqwest)?;
        Ok(token.into_session(Utc::now()))
    }

    /// Replaces the in-memory session, mirrors it to disk and notifies
    /// subscribers.
    async fn install(&self, session: Option<AuthSession>, event: AuthEvent) {
        *self.session.write().await = session.clone();

        if let Some(file) = &self.session_file {
            let file = Arc::clone(file);
            let stored = session.as_ref().map(StoredSession::from);
            let written = tokio::task::spawn_blocking(move || match stored {
                Some(stored) => file.replace(&stored),
                None => file.remove(),
            })
            .await
            .map_err(|e| RevereError::internal(format!("Failed to join task: {}", e)))
            .and_then(|result| result);
            if let Err(e) = written {
                tracing::warn!("[Auth] Failed to persist session: {}", e);
            }
        }

        // No subscribers is fine.
        let _ = self.events.send(SessionChange::new(event, session));
    }
}

#[async_trait::async_trait]
impl AuthBackend for SupabaseAuthClient {
    /// Returns the current session, refreshing it first when it has expired.
    ///
    /// A refresh the backend rejects ends the session; a refresh that cannot
    /// reach the backend is an error and keeps the session.
    async fn get_session(&self) -> Result<Option<AuthSession>> {
        let Some(session) = self.session.read().await.clone() else {
            return Ok(None);
        };
        if !session.is_expired() {
            return Ok(Some(session));
        }

        let Some(refresh_token) = session.refresh_token else {
            tracing::info!("[Auth] Session expired without refresh token");
            self.install(None, AuthEvent::SignedOut).await;
            return Ok(None);
        };

        match self
            .token_grant("refresh_token", json!({ "refresh_token": refresh_token }))
            .await
        {
            Ok(fresh) => {
                tracing::debug!(user_id = %fresh.user.id, "[Auth] Token refreshed");
                self.install(Some(fresh.clone()), AuthEvent::TokenRefreshed)
                    .await;
                Ok(Some(fresh))
            }
            Err(e) if e.is_transport() => Err(e),
            Err(e) => {
                tracing::warn!("[Auth] Token refresh rejected: {}", e);
                self.install(None, AuthEvent::SignedOut).await;
                Ok(None)
            }
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.events.subscribe()
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession> {
        let session = self
            .token_grant("password", json!({ "email": email, "password": password }))
            .await?;
        tracing::info!(user_id = %session.user.id, "[Auth] Signed in");
        self.install(Some(session.clone()), AuthEvent::SignedIn).await;
        Ok(session)
    }

    /// Clears the local session, then revokes it on the backend.
    ///
    /// A token the backend no longer knows counts as signed out.
    async fn sign_out(&self) -> Result<()> {
        let Some(session) = self.session.read().await.clone() else {
            return Ok(());
        };
        self.install(None, AuthEvent::SignedOut).await;

        let response = self
            .http
            .request(
                Method::POST,
                &format!("{}/logout", AUTH_PATH),
                Some(&session.access_token),
            )
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = response.status();
        if status.is_success() || status == StatusCode::UNAUTHORIZED || status == StatusCode::NOT_FOUND
        {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(auth_error(status, &text))
    }
}
