//! Auth wire types shared by the provider client and the reconciler.

use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;

/// The auth provider's user object (not the application profile).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Pending address of an unconfirmed email change.
    #[serde(default)]
    pub new_email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

/// An authenticated upstream identity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Expiry as Unix seconds.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

fn default_token_type() -> String {
    "bearer".to_owned()
}

impl Session {
    /// Fill `expires_at` from `expires_in` when the provider omitted it.
    #[must_use]
    pub fn with_expiry_from(mut self, now_unix: i64) -> Self {
        if self.expires_at.is_none() {
            self.expires_at = self.expires_in.map(|secs| now_unix + secs);
        }
        self
    }

    #[must_use]
    pub fn is_expired_at(&self, now_unix: i64) -> bool {
        self.expires_at.is_some_and(|at| at <= now_unix)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
}

/// One upstream auth state change.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthChange {
    pub event: AuthEvent,
    pub session: Option<Session>,
}

impl AuthChange {
    #[must_use]
    pub fn new(event: AuthEvent, session: Option<Session>) -> Self {
        Self { event, session }
    }

    #[must_use]
    pub fn signed_out() -> Self {
        Self { event: AuthEvent::SignedOut, session: None }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct PasswordCredentials {
    pub email: String,
    pub password: String,
}

/// Result of a sign-up: a session when email confirmation is disabled,
/// otherwise only the unconfirmed user.
#[derive(Clone, Debug, PartialEq)]
pub enum SignUpOutcome {
    SignedIn(Session),
    ConfirmationSent(AuthUser),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
    Apple,
    Facebook,
    Github,
}

impl OAuthProvider {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Apple => "apple",
            Self::Facebook => "facebook",
            Self::Github => "github",
        }
    }
}

impl std::str::FromStr for OAuthProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "apple" => Ok(Self::Apple),
            "facebook" => Ok(Self::Facebook),
            "github" => Ok(Self::Github),
            other => Err(format!("unsupported oauth provider: {other}")),
        }
    }
}

/// Which confirmation email to resend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResendKind {
    Signup,
    EmailChange,
}

/// Attributes accepted by the provider's update-user endpoint.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct UserAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(rename = "data", skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}
