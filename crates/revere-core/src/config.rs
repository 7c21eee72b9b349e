//! Configuration model.
//!
//! Loaded from `config.toml` by the infrastructure layer; every field has a
//! default so a partial or missing file is valid.

use serde::{Deserialize, Serialize};

use crate::mode::OperatingMode;

pub const DEFAULT_DEMO_ORG_SLUG: &str = "demo";
pub const DEFAULT_DEMO_PLACEHOLDER_ORG_ID: &str = "demo-org";
pub const DEFAULT_DEMO_ORG_NAME: &str = "Demo Organization";
pub const DEFAULT_DEMO_USER_EMAIL: &str = "demo@revere.app";

/// Root of `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RevereConfig {
    #[serde(default)]
    pub mode: OperatingMode,
    #[serde(default)]
    pub backend: BackendSettings,
    #[serde(default)]
    pub demo: DemoSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub diagnostics: DiagnosticsSettings,
}

/// Connection settings for the hosted backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Project URL, e.g. `https://xyzcompany.example.co`.
    #[serde(default)]
    pub url: String,
    /// Public (anon) API key sent with every request.
    #[serde(default)]
    pub anon_key: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl BackendSettings {
    /// True once both the URL and the key are set.
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty() && !self.anon_key.trim().is_empty()
    }
}

/// Settings for the synthetic demo context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemoSettings {
    /// Slug of the backend organization that backs demo mode, if any.
    #[serde(default = "default_demo_org_slug")]
    pub org_slug: String,
    /// Id used when no backend organization matches `org_slug`.
    #[serde(default = "default_demo_placeholder_org_id")]
    pub placeholder_org_id: String,
    #[serde(default = "default_demo_org_name")]
    pub org_name: String,
    #[serde(default = "default_demo_user_email")]
    pub user_email: String,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            org_slug: default_demo_org_slug(),
            placeholder_org_id: default_demo_placeholder_org_id(),
            org_name: default_demo_org_name(),
            user_email: default_demo_user_email(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Also write a daily-rolling log file under the config directory.
    #[serde(default)]
    pub file: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticsSettings {
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

impl Default for DiagnosticsSettings {
    fn default() -> Self {
        Self {
            probe_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_probe_timeout_secs() -> u64 {
    10
}

fn default_demo_org_slug() -> String {
    DEFAULT_DEMO_ORG_SLUG.to_string()
}

fn default_demo_placeholder_org_id() -> String {
    DEFAULT_DEMO_PLACEHOLDER_ORG_ID.to_string()
}

fn default_demo_org_name() -> String {
    DEFAULT_DEMO_ORG_NAME.to_string()
}

fn default_demo_user_email() -> String {
    DEFAULT_DEMO_USER_EMAIL.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}
