//! Auth state reconciliation.
//!
//! ARCHITECTURE
//! ============
//! One task owns the `(user, session, profile)` triple. It selects over:
//!
//! - upstream [`AuthChange`] events (broadcast receiver held from startup),
//! - [`Command`]s sent by [`super::context::AuthContext`] account actions,
//! - completed profile fetches (a `JoinSet`),
//! - the shutdown signal.
//!
//! Each input is applied to the triple in one `send_modify`, so readers of the
//! `watch` channel never observe a half-updated state.
//!
//! DESIGN
//! ======
//! A profile fetch is issued when the id is first seen, and the id is recorded
//! at that moment, so repeated events for the same user never fetch twice.
//! Every fetch carries the user id and a ticket from a monotonic counter; a
//! result is applied only when both still match. A newer fetch or a sign-out
//! aborts the previous one outright.
//!
//! Commands carry the id of the user who started the account action and are
//! dropped once a different user (or nobody) is signed in. After falling
//! behind the event channel the task re-reads the persisted session from the
//! [`SessionSource`] instead of trusting whatever events remain.
//!
//! ERROR HANDLING
//! ==============
//! A 401/403 from the profile endpoint forces a local logout: state cleared,
//! every `supabase.auth*` storage key removed, application store reset. Other
//! fetch failures leave the user signed in without a profile. Nothing is
//! propagated to callers.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::{AbortHandle, JoinSet};
use tracing::{debug, error, info, warn};

use super::provider::SessionSource;
use super::types::{AuthChange, AuthEvent, AuthUser, Session};
use crate::api::users::{ProfileSource, UserProfile};
use crate::error::ApiError;
use crate::state::{AppAction, AppStore};
use crate::storage::{KeyValueStorage, clear_auth_keys};

#[cfg(test)]
#[path = "reconciler_test.rs"]
mod tests;

/// Buffer for account-action commands.
pub const COMMAND_BUFFER: usize = 32;

// =============================================================================
// SNAPSHOT
// =============================================================================

/// The reconciled auth state exposed to the rest of the application.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthSnapshot {
    pub user: Option<AuthUser>,
    pub session: Option<Session>,
    pub profile: Option<UserProfile>,
    /// True until the first upstream event has been processed.
    pub is_loading: bool,
    /// True while the profile for the current user is being fetched.
    pub is_user_loading: bool,
}

impl Default for AuthSnapshot {
    fn default() -> Self {
        Self { user: None, session: None, profile: None, is_loading: true, is_user_loading: true }
    }
}

impl AuthSnapshot {
    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.session.is_some()
    }

    fn cleared() -> Self {
        Self { is_loading: false, is_user_loading: false, ..Self::default() }
    }
}

// =============================================================================
// COMMANDS
// =============================================================================

/// Mutations requested by account actions, tagged with the id of the user
/// who issued them. Each is acknowledged once applied or dropped.
#[derive(Debug)]
pub enum Command {
    /// Replace the profile with a fresh copy returned by the backend.
    SetProfile { user_id: String, profile: UserProfile, ack: oneshot::Sender<()> },
    /// Merge updated names into the in-memory profile; `None` or blank keeps the old value.
    MergeProfileNames {
        user_id: String,
        first_name: Option<String>,
        last_name: Option<String>,
        ack: oneshot::Sender<()>,
    },
    /// Clear everything locally without calling the provider.
    ForceLogout { user_id: String, reason: &'static str, ack: oneshot::Sender<()> },
}

struct ProfileOutcome {
    user_id: String,
    ticket: u64,
    result: Result<UserProfile, ApiError>,
}

// =============================================================================
// RECONCILER
// =============================================================================

pub struct Reconciler {
    state: watch::Sender<AuthSnapshot>,
    sessions: Arc<dyn SessionSource>,
    profiles: Arc<dyn ProfileSource>,
    storage: Arc<dyn KeyValueStorage>,
    store: AppStore,
    last_user_id: Option<String>,
    session_token: Option<String>,
    ticket: u64,
    in_flight: Option<AbortHandle>,
    fetches: JoinSet<ProfileOutcome>,
}

impl Reconciler {
    #[must_use]
    pub fn new(
        state: watch::Sender<AuthSnapshot>,
        sessions: Arc<dyn SessionSource>,
        profiles: Arc<dyn ProfileSource>,
        storage: Arc<dyn KeyValueStorage>,
        store: AppStore,
    ) -> Self {
        Self {
            state,
            sessions,
            profiles,
            storage,
            store,
            last_user_id: None,
            session_token: None,
            ticket: 0,
            in_flight: None,
            fetches: JoinSet::new(),
        }
    }

    /// Run until shutdown, or until both the event and command sources close.
    pub async fn run(
        mut self,
        mut changes: broadcast::Receiver<AuthChange>,
        mut commands: mpsc::Receiver<Command>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        info!("auth reconciler started");
        let mut changes_open = true;
        let mut commands_open = true;

        while changes_open || commands_open {
            tokio::select! {
                _ = &mut shutdown => break,
                change = changes.recv(), if changes_open => match change {
                    Ok(change) => self.apply_change(change),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "auth reconciler lagged behind upstream events; resyncing");
                        self.resync();
                    }
                    Err(broadcast::error::RecvError::Closed) => changes_open = false,
                },
                command = commands.recv(), if commands_open => match command {
                    Some(command) => self.apply_command(command),
                    None => commands_open = false,
                },
                Some(joined) = self.fetches.join_next(), if !self.fetches.is_empty() => match joined {
                    Ok(outcome) => self.apply_profile(outcome),
                    Err(e) if e.is_cancelled() => debug!("profile fetch cancelled"),
                    Err(e) => error!(error = %e, "profile fetch task failed"),
                },
            }
        }

        self.fetches.abort_all();
        info!("auth reconciler stopped");
    }

    // -------------------------------------------------------------------------
    // UPSTREAM EVENTS
    // -------------------------------------------------------------------------

    fn apply_change(&mut self, change: AuthChange) {
        debug!(event = ?change.event, has_session = change.session.is_some(), "reconciling auth change");
        match (change.event, change.session) {
            (AuthEvent::SignedOut, _) => {
                if self.session_token.is_some() {
                    self.force_local_logout("signed out upstream while a session was held");
                } else {
                    self.clear_auth_state();
                    self.store.dispatch(AppAction::Reset);
                }
            }
            (_, Some(session)) => self.apply_session(session),
            (_, None) => self.clear_auth_state(),
        }
    }

    /// Rebuild the triple from the persisted session after missed events.
    fn resync(&mut self) {
        match self.sessions.current_session() {
            Some(session) => self.apply_session(session),
            None => self.apply_change(AuthChange::signed_out()),
        }
    }

    fn apply_session(&mut self, session: Session) {
        let user_id = session.user.id.clone();
        let access_token = session.access_token.clone();
        let is_new_user = self.last_user_id.as_deref() != Some(user_id.as_str());
        self.session_token = Some(access_token.clone());

        self.state.send_modify(|s| {
            s.user = Some(session.user.clone());
            s.session = Some(session);
            s.is_loading = false;
            if is_new_user {
                s.profile = None;
                s.is_user_loading = true;
            }
        });

        if is_new_user {
            info!(%user_id, "new user session; resetting application state");
            self.store.dispatch(AppAction::Reset);
            self.last_user_id = Some(user_id.clone());
            self.spawn_fetch(user_id, access_token);
        }
    }

    // -------------------------------------------------------------------------
    // PROFILE FETCH
    // -------------------------------------------------------------------------

    fn spawn_fetch(&mut self, user_id: String, access_token: String) {
        self.cancel_fetch();
        let ticket = self.ticket;
        let profiles = Arc::clone(&self.profiles);
        debug!(%user_id, ticket, "issuing profile fetch");
        let handle = self.fetches.spawn(async move {
            let result = profiles.fetch_profile(&access_token).await;
            ProfileOutcome { user_id, ticket, result }
        });
        self.in_flight = Some(handle);
    }

    /// Abort the in-flight fetch and invalidate any result already queued.
    fn cancel_fetch(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
        self.ticket += 1;
    }

    fn apply_profile(&mut self, outcome: ProfileOutcome) {
        let ProfileOutcome { user_id, ticket, result } = outcome;
        if ticket != self.ticket || self.last_user_id.as_deref() != Some(user_id.as_str()) {
            debug!(%user_id, ticket, current = self.ticket, "discarding stale profile result");
            return;
        }
        self.in_flight = None;

        match result {
            Ok(profile) => {
                info!(%user_id, "profile loaded");
                self.state.send_modify(|s| {
                    s.profile = Some(profile);
                    s.is_user_loading = false;
                });
            }
            Err(e) if e.is_auth() => {
                warn!(%user_id, status = ?e.status, "profile fetch unauthorized");
                self.force_local_logout("profile endpoint rejected the session");
            }
            Err(e) => {
                error!(%user_id, error = %e, "profile fetch failed");
                self.state.send_modify(|s| {
                    s.profile = None;
                    s.is_user_loading = false;
                });
            }
        }
    }

    // -------------------------------------------------------------------------
    // COMMANDS
    // -------------------------------------------------------------------------

    fn apply_command(&mut self, command: Command) {
        match command {
            Command::SetProfile { user_id, profile, ack } => {
                if self.issued_by_current_user(&user_id, "set_profile") {
                    self.state.send_modify(|s| s.profile = Some(profile));
                }
                let _ = ack.send(());
            }
            Command::MergeProfileNames { user_id, first_name, last_name, ack } => {
                if !self.issued_by_current_user(&user_id, "merge_profile_names") {
                    let _ = ack.send(());
                    return;
                }
                self.state.send_modify(|s| {
                    if let Some(profile) = s.profile.as_mut() {
                        if let Some(first) = first_name.filter(|n| !n.trim().is_empty()) {
                            profile.first_name = first;
                        }
                        if let Some(last) = last_name.filter(|n| !n.trim().is_empty()) {
                            profile.last_name = last;
                        }
                    }
                });
                let _ = ack.send(());
            }
            Command::ForceLogout { user_id, reason, ack } => {
                if self.issued_by_current_user(&user_id, "force_logout") {
                    self.force_local_logout(reason);
                }
                let _ = ack.send(());
            }
        }
    }

    fn issued_by_current_user(&self, user_id: &str, command: &str) -> bool {
        let current = self.last_user_id.as_deref() == Some(user_id);
        if !current {
            debug!(user_id, command, current_user = ?self.last_user_id, "dropping command issued for another user");
        }
        current
    }

    // -------------------------------------------------------------------------
    // LOGOUT
    // -------------------------------------------------------------------------

    fn clear_auth_state(&mut self) {
        self.cancel_fetch();
        self.last_user_id = None;
        self.session_token = None;
        self.state.send_modify(|s| *s = AuthSnapshot::cleared());
    }

    /// Clear local state and stored auth keys without calling the provider.
    fn force_local_logout(&mut self, reason: &str) {
        warn!(reason, user_id = ?self.last_user_id, "forcing local logout");
        let removed = clear_auth_keys(self.storage.as_ref());
        debug!(removed, "cleared stored auth keys");
        self.clear_auth_state();
        self.store.dispatch(AppAction::Reset);
    }
}
