//! Error types for the Revere session core.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Postgres error code returned when row-level security policies recurse.
pub const POLICY_RECURSION_CODE: &str = "42P17";

/// Marker prepended to membership error messages caused by a policy recursion.
pub const POLICY_RECURSION_MARKER: &str = "[policy-recursion]";

/// A shared error type for the entire Revere workspace.
///
/// Variants separate the three failure classes the session core cares about:
/// the backend could not be reached (`Transport`), the backend answered but
/// rejected the request (`Query`, `Auth`), and local failures.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum RevereError {
    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", etc.
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The backend could not be reached at all.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The backend was reached but rejected the query.
    #[error("Query error{}: {message}", .code.as_ref().map(|c| format!(" ({c})")).unwrap_or_default())]
    Query {
        code: Option<String>,
        message: String,
    },

    /// Authentication was rejected or is unavailable.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RevereError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a Transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Creates a Query error with an optional backend error code
    pub fn query(code: Option<String>, message: impl Into<String>) -> Self {
        Self::Query {
            code,
            message: message.into(),
        }
    }

    /// Creates an Auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if the backend could not be reached.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Check if the backend rejected a query because its row-level policies
    /// recurse into themselves.
    ///
    /// Matches the Postgres code first; older proxies only forward the
    /// message, so the text is checked as a fallback.
    pub fn is_policy_recursion(&self) -> bool {
        match self {
            Self::Query { code, message } => {
                code.as_deref() == Some(POLICY_RECURSION_CODE)
                    || message.to_lowercase().contains("infinite recursion")
            }
            _ => false,
        }
    }

    /// Short machine-readable kind, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io { .. } => "io",
            Self::Serialization { .. } => "serialization",
            Self::Config(_) => "config",
            Self::Transport(_) => "transport",
            Self::Query { .. } if self.is_policy_recursion() => "policy_recursion",
            Self::Query { .. } => "query",
            Self::Auth(_) => "auth",
            Self::Internal(_) => "internal",
        }
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for RevereError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for RevereError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for RevereError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for RevereError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, RevereError>`.
pub type Result<T> = std::result::Result<T, RevereError>;
