//! Supabase Auth (GoTrue) client.
//!
//! SYSTEM CONTEXT
//! ==============
//! Token issuance belongs to the auth provider. This client only calls its
//! REST endpoints, persists the returned session in [`KeyValueStorage`] under
//! the configured storage key, and publishes every change as an
//! [`AuthChange`] on a broadcast channel.
//!
//! DESIGN
//! ======
//! The persisted session is the only copy. `current_session` and the
//! [`TokenSource`] impl read it back from storage on every call, so clearing
//! the auth keys during a forced logout also stops this client from handing
//! out the old token.
//!
//! ERROR HANDLING
//! ==============
//! Provider error bodies (`msg`, `error_description`, `error`) are classified
//! by [`ApiError::from_response`]. Sign-out always removes the local session,
//! even when the remote call fails.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::json;
use time::OffsetDateTime;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::types::{
    AuthChange, AuthEvent, AuthUser, OAuthProvider, PasswordCredentials, ResendKind, Session, SignUpOutcome,
    UserAttributes,
};
use crate::api::{TokenSource, read_json};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::storage::KeyValueStorage;

#[cfg(test)]
#[path = "provider_test.rs"]
mod tests;

/// Capacity of the auth change channel.
pub const AUTH_EVENT_CAPACITY: usize = 64;

const AUTH_PATH: &str = "/auth/v1";

// =============================================================================
// TRAIT
// =============================================================================

/// Read access to the persisted session. The reconciler re-reads it after
/// falling behind the event channel.
pub trait SessionSource: Send + Sync {
    fn current_session(&self) -> Option<Session>;
}

/// Upstream identity provider.
///
/// [`super::context::AuthContext`] depends on this seam; tests substitute a
/// scripted mock.
#[async_trait]
pub trait AuthProvider: SessionSource {
    /// Subscribe to auth state changes from now on.
    fn subscribe(&self) -> broadcast::Receiver<AuthChange>;

    /// Load the persisted session (refreshing it when expired) and emit
    /// `INITIAL_SESSION`.
    async fn initialize(&self) -> Option<Session>;

    async fn sign_in_with_password(&self, credentials: &PasswordCredentials) -> Result<Session, ApiError>;

    async fn sign_up(&self, credentials: &PasswordCredentials) -> Result<SignUpOutcome, ApiError>;

    async fn sign_out(&self) -> Result<(), ApiError>;

    async fn refresh_session(&self) -> Result<Session, ApiError>;

    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> Result<(), ApiError>;

    async fn update_user(&self, attributes: &UserAttributes) -> Result<AuthUser, ApiError>;

    async fn resend(&self, kind: ResendKind, email: &str) -> Result<(), ApiError>;

    /// Browser URL that starts the OAuth flow for `provider`.
    fn oauth_authorize_url(&self, provider: OAuthProvider, redirect_to: &str) -> String;
}

// =============================================================================
// GOTRUE CLIENT
// =============================================================================

pub struct GoTrueClient {
    http: reqwest::Client,
    auth_url: String,
    authorize_url: reqwest::Url,
    api_key: String,
    storage_key: String,
    storage: Arc<dyn KeyValueStorage>,
    events: broadcast::Sender<AuthChange>,
}

impl GoTrueClient {
    /// Build a client from `config`, persisting into `storage`.
    ///
    /// # Errors
    ///
    /// Returns a network error if the HTTP client cannot be constructed, or a
    /// validation error if the auth URL does not parse.
    pub fn new(config: &ClientConfig, storage: Arc<dyn KeyValueStorage>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeouts.request())
            .connect_timeout(config.timeouts.connect())
            .build()
            .map_err(|e| ApiError::network(format!("http client build failed: {e}")))?;
        let auth_url = format!("{}{AUTH_PATH}", config.supabase_url.trim_end_matches('/'));
        let authorize_url = reqwest::Url::parse(&format!("{auth_url}/authorize"))
            .map_err(|e| ApiError::validation(format!("invalid auth url {auth_url}: {e}")))?;
        let (events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Ok(Self {
            http,
            auth_url,
            authorize_url,
            api_key: config.supabase_publishable_key.clone(),
            storage_key: config.auth_storage_key.clone(),
            storage,
            events,
        })
    }

    fn load_session(&self) -> Option<Session> {
        let raw = self.storage.get_item(&self.storage_key)?;
        match serde_json::from_str(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!(error = %e, key = %self.storage_key, "discarding unreadable persisted session");
                self.storage.remove_item(&self.storage_key);
                None
            }
        }
    }

    fn save_session(&self, session: &Session) {
        match serde_json::to_string(session) {
            Ok(raw) => self.storage.set_item(&self.storage_key, &raw),
            Err(e) => warn!(error = %e, "failed to serialize session"),
        }
    }

    fn emit(&self, event: AuthEvent, session: Option<Session>) {
        debug!(?event, has_session = session.is_some(), "auth change");
        // No receivers is not an error: nobody is listening yet.
        let _ = self.events.send(AuthChange::new(event, session));
    }

    fn store_and_emit(&self, event: AuthEvent, session: Session) -> Session {
        let session = session.with_expiry_from(now_unix());
        self.save_session(&session);
        self.emit(event, Some(session.clone()));
        session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.auth_url)
    }

    async fn post(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: &serde_json::Value,
        token: Option<&str>,
    ) -> Result<reqwest::Response, ApiError> {
        let mut builder = self.http.post(self.url(path)).header("apikey", &self.api_key).json(body);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        Ok(builder.send().await?)
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: &serde_json::Value,
        token: Option<&str>,
    ) -> Result<T, ApiError> {
        read_json(self.post(path, query, body, token).await?).await
    }

    async fn post_empty(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: &serde_json::Value,
        token: Option<&str>,
    ) -> Result<(), ApiError> {
        let response = self.post(path, query, body, token).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(ApiError::from_response(status.as_u16(), &text))
    }
}

fn now_unix() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

#[async_trait]
impl AuthProvider for GoTrueClient {
    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.events.subscribe()
    }

    async fn initialize(&self) -> Option<Session> {
        let session = match self.load_session() {
            Some(session) if session.is_expired_at(now_unix()) => match self.refresh_session().await {
                Ok(refreshed) => Some(refreshed),
                Err(e) => {
                    warn!(error = %e, "persisted session expired and could not be refreshed");
                    self.storage.remove_item(&self.storage_key);
                    None
                }
            },
            other => other,
        };
        self.emit(AuthEvent::InitialSession, session.clone());
        session
    }

    async fn sign_in_with_password(&self, credentials: &PasswordCredentials) -> Result<Session, ApiError> {
        let body = json!({ "email": credentials.email, "password": credentials.password });
        let session: Session = self.post_json("/token", &[("grant_type", "password")], &body, None).await?;
        info!(user_id = %session.user.id, "signed in with password");
        Ok(self.store_and_emit(AuthEvent::SignedIn, session))
    }

    async fn sign_up(&self, credentials: &PasswordCredentials) -> Result<SignUpOutcome, ApiError> {
        let body = json!({ "email": credentials.email, "password": credentials.password });
        let raw: serde_json::Value = self.post_json("/signup", &[], &body, None).await?;
        if raw.get("access_token").is_some() {
            let session: Session = serde_json::from_value(raw)?;
            return Ok(SignUpOutcome::SignedIn(self.store_and_emit(AuthEvent::SignedIn, session)));
        }
        // Confirmation pending: some deployments nest the user, some return it bare.
        let user_value = raw.get("user").cloned().unwrap_or(raw);
        let user: AuthUser = serde_json::from_value(user_value)?;
        info!(user_id = %user.id, "sign-up awaiting email confirmation");
        Ok(SignUpOutcome::ConfirmationSent(user))
    }

    async fn sign_out(&self) -> Result<(), ApiError> {
        let remote = match self.load_session() {
            Some(session) => self.post_empty("/logout", &[], &json!({}), Some(&session.access_token)).await,
            None => Ok(()),
        };
        self.storage.remove_item(&self.storage_key);
        self.emit(AuthEvent::SignedOut, None);
        match remote {
            // The token is already dead upstream; the local sign-out is what matters.
            Err(e) if e.is_auth() || e.status == Some(404) => Ok(()),
            other => other,
        }
    }

    async fn refresh_session(&self) -> Result<Session, ApiError> {
        let current = self.load_session().ok_or_else(ApiError::auth_required)?;
        let body = json!({ "refresh_token": current.refresh_token });
        let session: Session = self.post_json("/token", &[("grant_type", "refresh_token")], &body, None).await?;
        Ok(self.store_and_emit(AuthEvent::TokenRefreshed, session))
    }

    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> Result<(), ApiError> {
        self.post_empty("/recover", &[("redirect_to", redirect_to)], &json!({ "email": email }), None).await
    }

    async fn update_user(&self, attributes: &UserAttributes) -> Result<AuthUser, ApiError> {
        let mut session = self.load_session().ok_or_else(ApiError::auth_required)?;
        let response = self
            .http
            .put(self.url("/user"))
            .header("apikey", &self.api_key)
            .bearer_auth(&session.access_token)
            .json(attributes)
            .send()
            .await?;
        let user: AuthUser = read_json(response).await?;
        session.user = user.clone();
        self.save_session(&session);
        self.emit(AuthEvent::UserUpdated, Some(session));
        Ok(user)
    }

    async fn resend(&self, kind: ResendKind, email: &str) -> Result<(), ApiError> {
        self.post_empty("/resend", &[], &json!({ "type": kind, "email": email }), None).await
    }

    fn oauth_authorize_url(&self, provider: OAuthProvider, redirect_to: &str) -> String {
        let mut url = self.authorize_url.clone();
        url.query_pairs_mut().append_pair("provider", provider.as_str()).append_pair("redirect_to", redirect_to);
        url.into()
    }
}

impl SessionSource for GoTrueClient {
    fn current_session(&self) -> Option<Session> {
        self.load_session()
    }
}

impl TokenSource for GoTrueClient {
    fn access_token(&self) -> Option<String> {
        self.load_session().map(|session| session.access_token)
    }
}
