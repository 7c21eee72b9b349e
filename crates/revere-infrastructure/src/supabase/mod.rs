//! HTTP client for the hosted backend (auth + rows endpoints).
//!
//! [`SupabaseAuthClient`] implements `AuthBackend`, [`SupabaseRestClient`]
//! implements `OrganizationBackend`. Both share one [`SupabaseHttp`].

mod auth;
mod error;
mod rest;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder};
use revere_core::config::BackendSettings;
use revere_core::error::{RevereError, Result};

pub use auth::SupabaseAuthClient;
pub use rest::SupabaseRestClient;

pub const AUTH_PATH: &str = "/auth/v1";
pub const REST_PATH: &str = "/rest/v1";

/// Base URL, API key and the underlying `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct SupabaseHttp {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseHttp {
    pub fn new(settings: &BackendSettings) -> Result<Self> {
        if !settings.is_configured() {
            return Err(RevereError::config(
                "backend.url and backend.anon_key must be set for live mode",
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| RevereError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: settings.url.trim().trim_end_matches('/').to_string(),
            anon_key: settings.anon_key.trim().to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Builds a request carrying `apikey` and a bearer token. Without a user
    /// token the anon key is the bearer.
    pub(crate) fn request(&self, method: Method, path: &str, bearer: Option<&str>) -> RequestBuilder {
        let token = bearer.unwrap_or(&self.anon_key);
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", token))
    }
}

/// Builds both backend clients.
///
/// With `session_file`, the auth client restores and persists its session
/// there so a sign-in outlives the process.
pub fn connect(
    settings: &BackendSettings,
    session_file: Option<PathBuf>,
) -> Result<(Arc<SupabaseAuthClient>, Arc<SupabaseRestClient>)> {
    let http = SupabaseHttp::new(settings)?;
    let auth = Arc::new(SupabaseAuthClient::new(http.clone(), session_file));
    let rest = Arc::new(SupabaseRestClient::new(http, Arc::clone(&auth)));
    Ok((auth, rest))
}
