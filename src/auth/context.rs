//! The auth handle held at the application root.
//!
//! SYSTEM CONTEXT
//! ==============
//! [`AuthContext::start`] subscribes to the provider, spawns the reconciler,
//! then initializes the provider so the persisted session arrives as the
//! first event. Readers use [`AuthContext::snapshot`] or [`AuthContext::watch`].
//! Account actions call the provider or the backend and route any change to
//! the auth triple through reconciler commands, tagged with the user who was
//! signed in when the action started. [`AuthContext::shutdown`]
//! stops the task and abandons in-flight fetches.

use std::sync::{Arc, Mutex, PoisonError};

use serde_json::json;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::provider::{AuthProvider, SessionSource};
use super::reconciler::{AuthSnapshot, COMMAND_BUFFER, Command, Reconciler};
use super::types::{AuthUser, OAuthProvider, PasswordCredentials, ResendKind, Session, SignUpOutcome, UserAttributes};
use crate::api::users::{AccountApi, ProfileSource, UpdateProfile, UserProfile};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::state::{AppAction, AppStore};
use crate::storage::KeyValueStorage;

#[cfg(test)]
#[path = "context_test.rs"]
mod tests;

pub struct AuthContext {
    provider: Arc<dyn AuthProvider>,
    api: Arc<dyn AccountApi>,
    store: AppStore,
    password_reset_redirect: String,
    oauth_redirect: String,
    state: watch::Receiver<AuthSnapshot>,
    commands: mpsc::Sender<Command>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl AuthContext {
    /// Start reconciliation and load the persisted session.
    pub async fn start<A>(
        config: &ClientConfig,
        provider: Arc<dyn AuthProvider>,
        api: Arc<A>,
        storage: Arc<dyn KeyValueStorage>,
        store: AppStore,
    ) -> Self
    where
        A: AccountApi + 'static,
    {
        let (state_tx, state) = watch::channel(AuthSnapshot::default());
        let (commands, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let changes = provider.subscribe();
        let sessions: Arc<dyn SessionSource> = Arc::clone(&provider) as Arc<dyn SessionSource>;
        let profiles: Arc<dyn ProfileSource> = Arc::clone(&api) as Arc<dyn ProfileSource>;
        let reconciler = Reconciler::new(state_tx, sessions, profiles, storage, store.clone());
        let task = tokio::spawn(reconciler.run(changes, command_rx, shutdown_rx));

        provider.initialize().await;
        info!("auth context started");

        Self {
            provider,
            api,
            store,
            password_reset_redirect: config.password_reset_redirect(),
            oauth_redirect: config.app_origin.clone(),
            state,
            commands,
            shutdown: Mutex::new(Some(shutdown_tx)),
            task: Mutex::new(Some(task)),
        }
    }

    // =========================================================================
    // STATE
    // =========================================================================

    #[must_use]
    pub fn snapshot(&self) -> AuthSnapshot {
        self.state.borrow().clone()
    }

    /// A receiver that is notified on every reconciled change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<AuthSnapshot> {
        self.state.clone()
    }

    #[must_use]
    pub fn store(&self) -> &AppStore {
        &self.store
    }

    /// Access token of the reconciled session.
    #[must_use]
    pub fn jwt_token(&self) -> Option<String> {
        self.state.borrow().session.as_ref().map(|s| s.access_token.clone())
    }

    fn current_user_id(&self) -> Option<String> {
        self.state.borrow().user.as_ref().map(|u| u.id.clone())
    }

    // =========================================================================
    // SIGN IN / OUT
    // =========================================================================

    /// # Errors
    ///
    /// Returns the provider's error for rejected credentials or transport failures.
    pub async fn sign_in_with_email(&self, email: &str, password: &str) -> Result<Session, ApiError> {
        let credentials = PasswordCredentials { email: email.to_owned(), password: password.to_owned() };
        self.provider.sign_in_with_password(&credentials).await
    }

    /// # Errors
    ///
    /// Returns the provider's error.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, ApiError> {
        let credentials = PasswordCredentials { email: email.to_owned(), password: password.to_owned() };
        self.provider.sign_up(&credentials).await
    }

    /// URL to open in a browser to continue with `provider`.
    #[must_use]
    pub fn sign_in_with_oauth(&self, provider: OAuthProvider) -> String {
        self.provider.oauth_authorize_url(provider, &self.oauth_redirect)
    }

    /// Sign out upstream; the application store is reset on success.
    ///
    /// # Errors
    ///
    /// Returns the provider's error. The local session is gone either way.
    pub async fn sign_out(&self) -> Result<(), ApiError> {
        self.provider.sign_out().await?;
        self.store.dispatch(AppAction::Reset);
        Ok(())
    }

    // =========================================================================
    // PROVIDER ACCOUNT
    // =========================================================================

    /// # Errors
    ///
    /// Returns the provider's error.
    pub async fn reset_password_for_email(&self, email: &str) -> Result<(), ApiError> {
        self.provider.reset_password_for_email(email, &self.password_reset_redirect).await
    }

    /// # Errors
    ///
    /// Returns the provider's error.
    pub async fn update_password(&self, password: &str) -> Result<AuthUser, ApiError> {
        let attributes = UserAttributes { password: Some(password.to_owned()), ..UserAttributes::default() };
        self.provider.update_user(&attributes).await
    }

    /// # Errors
    ///
    /// Returns the provider's error.
    pub async fn update_email(&self, email: &str) -> Result<AuthUser, ApiError> {
        let attributes = UserAttributes { email: Some(email.to_owned()), ..UserAttributes::default() };
        self.provider.update_user(&attributes).await
    }

    /// Resend the pending confirmation: the email-change one when the user has
    /// an unconfirmed new address, otherwise the sign-up one.
    ///
    /// # Errors
    ///
    /// Auth error without a signed-in user; validation error when the user has
    /// no email; otherwise the provider's error.
    pub async fn resend_email_verification(&self) -> Result<(), ApiError> {
        let user = self.state.borrow().user.clone().ok_or_else(ApiError::auth_required)?;
        let kind = if user.new_email.is_some() { ResendKind::EmailChange } else { ResendKind::Signup };
        let email = user.email.ok_or_else(|| ApiError::validation("user has no email address"))?;
        self.provider.resend(kind, &email).await
    }

    /// Store names in the provider's user metadata and merge them into the
    /// in-memory profile. Blank names keep the current profile value.
    ///
    /// # Errors
    ///
    /// Returns the provider's error; the profile is untouched on failure.
    pub async fn update_auth_user_metadata(
        &self,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<AuthUser, ApiError> {
        let issuer = self.current_user_id();
        let attributes = UserAttributes {
            metadata: Some(json!({ "firstName": first_name, "lastName": last_name })),
            ..UserAttributes::default()
        };
        let user = self.provider.update_user(&attributes).await?;
        if let Some(user_id) = issuer {
            let first_name = first_name.map(str::to_owned);
            let last_name = last_name.map(str::to_owned);
            self.send_command(|ack| Command::MergeProfileNames { user_id, first_name, last_name, ack }).await;
        }
        Ok(user)
    }

    // =========================================================================
    // BACKEND PROFILE
    // =========================================================================

    /// `PATCH /users/me`; the returned profile replaces the in-memory one
    /// unless another user signed in while the request was in flight.
    ///
    /// # Errors
    ///
    /// Auth error without a signed-in user; otherwise the request error. An
    /// auth error from the backend also forces a local logout.
    pub async fn update_user_profile(&self, update: &UpdateProfile) -> Result<UserProfile, ApiError> {
        let user_id = self.current_user_id().ok_or_else(ApiError::auth_required)?;
        match self.api.update_profile(update).await {
            Ok(profile) => {
                let copy = profile.clone();
                self.send_command(|ack| Command::SetProfile { user_id, profile: copy, ack }).await;
                Ok(profile)
            }
            Err(e) => {
                warn!(error = %e, "failed to update user profile");
                if e.is_auth() {
                    self.force_logout(user_id, "profile update rejected the session").await;
                }
                Err(e)
            }
        }
    }

    /// `DELETE /users/me`, then sign out.
    ///
    /// # Errors
    ///
    /// Auth error without a signed-in user; `Unauthorized` after a forced
    /// local logout on 401/403; otherwise the server's message or
    /// "Failed to delete account".
    pub async fn delete_user_account(&self) -> Result<(), ApiError> {
        let user_id = self.current_user_id().ok_or_else(ApiError::auth_required)?;
        match self.api.delete_profile().await {
            Ok(()) => {
                info!("account deleted; signing out");
                if let Err(e) = self.sign_out().await {
                    warn!(error = %e, "sign-out after account deletion failed");
                }
                Ok(())
            }
            Err(e) if matches!(e.status, Some(401 | 403)) => {
                warn!(status = ?e.status, "account deletion unauthorized");
                self.force_logout(user_id, "account deletion rejected the session").await;
                Err(ApiError::unauthorized())
            }
            Err(e) => {
                warn!(error = %e, "failed to delete user account");
                Err(e)
            }
        }
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Stop the reconciler and wait for it to exit. Idempotent.
    pub async fn shutdown(&self) {
        let signal = self.shutdown.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(signal) = signal {
            let _ = signal.send(());
        }
        let task = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "auth reconciler task ended abnormally");
            }
        }
        info!("auth context shut down");
    }

    async fn force_logout(&self, user_id: String, reason: &'static str) {
        self.send_command(|ack| Command::ForceLogout { user_id, reason, ack }).await;
    }

    /// Send a command and wait until the reconciler applied it.
    async fn send_command(&self, build: impl FnOnce(oneshot::Sender<()>) -> Command) {
        let (ack, applied) = oneshot::channel();
        if self.commands.send(build(ack)).await.is_err() {
            warn!("auth reconciler is not running; command dropped");
            return;
        }
        let _ = applied.await;
    }
}
