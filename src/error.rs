//! Tagged error type shared by the REST and auth-provider clients.
//!
//! DESIGN
//! ======
//! Every failure crossing a network boundary is classified once, here, into
//! an [`ErrorKind`]. Callers branch on the kind (auth errors force a local
//! logout, everything else becomes UI state) instead of inspecting messages.

use serde::Deserialize;

pub const DEFAULT_ERROR_MESSAGE: &str = "An error occurred";
pub const AUTH_REQUIRED_KEY: &str = "errors.authenticationRequired";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 401/403 or a missing access token. Never retried.
    Auth,
    /// Transport failure or an unexpected backend response.
    Network,
    /// The request was rejected as invalid (400/404/409/422) or failed local validation.
    Validation,
}

/// Error returned by every API call in this crate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    pub status: Option<u16>,
    pub translation_key: Option<String>,
}

/// Error body shape returned by the backend and the auth provider.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
    #[serde(alias = "msg", alias = "error_description")]
    detail: Option<String>,
    status: Option<u16>,
    translation_key: Option<String>,
}

impl ApiError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), status: None, translation_key: None }
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_translation_key(mut self, key: impl Into<String>) -> Self {
        self.translation_key = Some(key.into());
        self
    }

    /// No access token is available for an authenticated call.
    #[must_use]
    pub fn auth_required() -> Self {
        Self::new(ErrorKind::Auth, "Authentication required").with_translation_key(AUTH_REQUIRED_KEY)
    }

    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new(ErrorKind::Auth, "Unauthorized").with_status(401)
    }

    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Classify a non-success HTTP response from its status and raw body.
    ///
    /// The body's own `status` wins over the HTTP status when present, and
    /// the translation key is preferred as the message so callers can translate it.
    #[must_use]
    pub fn from_response(http_status: u16, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        let status = parsed.status.unwrap_or(http_status);
        let message = parsed
            .translation_key
            .clone()
            .or(parsed.message)
            .or(parsed.detail)
            .or(parsed.error)
            .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_owned());

        Self { kind: kind_for_status(status), message, status: Some(status), translation_key: parsed.translation_key }
    }

    #[must_use]
    pub fn is_auth(&self) -> bool {
        self.kind == ErrorKind::Auth
    }

    /// Translation key when present, otherwise the raw message.
    #[must_use]
    pub fn display_message(&self) -> &str {
        self.translation_key.as_deref().unwrap_or(&self.message)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());
        let kind = status.map_or(ErrorKind::Network, kind_for_status);
        Self { kind, message: err.to_string(), status, translation_key: None }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::network(format!("unexpected response body: {err}"))
    }
}

/// Map an HTTP status to the error taxonomy.
#[must_use]
pub fn kind_for_status(status: u16) -> ErrorKind {
    match status {
        401 | 403 => ErrorKind::Auth,
        400 | 404 | 409 | 422 => ErrorKind::Validation,
        _ => ErrorKind::Network,
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
