//! Mapping of HTTP failures onto `RevereError`.

use reqwest::StatusCode;
use revere_core::error::RevereError;
use serde::Deserialize;

/// Error body returned by the rows endpoint.
#[derive(Debug, Default, Deserialize)]
struct RowsErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
}

/// Error body returned by the auth endpoints. Field names vary by version.
#[derive(Debug, Default, Deserialize)]
struct AuthErrorBody {
    error: Option<String>,
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
}

/// Request never produced a usable response.
pub(crate) fn from_reqwest(err: reqwest::Error) -> RevereError {
    if err.is_decode() {
        return RevereError::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        };
    }
    RevereError::transport(err.to_string())
}

/// Gateway failures mean the backend itself was not reachable.
fn is_unreachable(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Maps a non-2xx rows response.
pub(crate) fn rows_error(status: StatusCode, body: &str) -> RevereError {
    if is_unreachable(status) {
        return RevereError::transport(format!("backend unavailable (HTTP {})", status.as_u16()));
    }

    let parsed: RowsErrorBody = serde_json::from_str(body).unwrap_or_default();
    let mut message = parsed
        .message
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
    if let Some(details) = parsed.details.filter(|d| !d.is_empty()) {
        message = format!("{} ({})", message, details);
    }
    if let Some(hint) = parsed.hint.filter(|h| !h.is_empty()) {
        message = format!("{}; hint: {}", message, hint);
    }
    RevereError::query(parsed.code, message)
}

/// Maps a non-2xx auth response.
pub(crate) fn auth_error(status: StatusCode, body: &str) -> RevereError {
    if is_unreachable(status) {
        return RevereError::transport(format!("auth service unavailable (HTTP {})", status.as_u16()));
    }

    let parsed: AuthErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .error_description
        .or(parsed.msg)
        .or(parsed.message)
        .or(parsed.error)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
    RevereError::auth(message)
}
