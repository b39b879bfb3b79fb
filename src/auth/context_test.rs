use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::*;
use crate::api::users::UserRole;
use crate::auth::provider::SessionSource;
use crate::auth::types::{AuthChange, AuthEvent};
use crate::storage::MemoryStorage;

// =========================================================================
// MockProvider
// =========================================================================

struct MockProvider {
    events: broadcast::Sender<AuthChange>,
    persisted: Mutex<Option<Session>>,
    calls: Mutex<Vec<String>>,
}

impl MockProvider {
    fn new(persisted: Option<Session>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self { events, persisted: Mutex::new(persisted), calls: Mutex::new(Vec::new()) }
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn emit(&self, event: AuthEvent, session: Option<Session>) {
        let _ = self.events.send(AuthChange::new(event, session));
    }
}

impl SessionSource for MockProvider {
    fn current_session(&self) -> Option<Session> {
        self.persisted.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuthProvider for MockProvider {
    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.events.subscribe()
    }

    async fn initialize(&self) -> Option<Session> {
        let session = self.current_session();
        self.emit(AuthEvent::InitialSession, session.clone());
        session
    }

    async fn sign_in_with_password(&self, credentials: &PasswordCredentials) -> Result<Session, ApiError> {
        self.record(format!("sign_in:{}", credentials.email));
        if credentials.password != "secret" {
            return Err(ApiError::from_response(400, r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#));
        }
        let session = session("a");
        *self.persisted.lock().unwrap() = Some(session.clone());
        self.emit(AuthEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, credentials: &PasswordCredentials) -> Result<SignUpOutcome, ApiError> {
        self.record(format!("sign_up:{}", credentials.email));
        Ok(SignUpOutcome::ConfirmationSent(auth_user("new")))
    }

    async fn sign_out(&self) -> Result<(), ApiError> {
        self.record("sign_out");
        *self.persisted.lock().unwrap() = None;
        self.emit(AuthEvent::SignedOut, None);
        Ok(())
    }

    async fn refresh_session(&self) -> Result<Session, ApiError> {
        self.current_session().ok_or_else(ApiError::auth_required)
    }

    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> Result<(), ApiError> {
        self.record(format!("recover:{email}:{redirect_to}"));
        Ok(())
    }

    async fn update_user(&self, attributes: &UserAttributes) -> Result<AuthUser, ApiError> {
        self.record(format!("update_user:{}", serde_json::to_string(attributes).unwrap()));
        Ok(auth_user("a"))
    }

    async fn resend(&self, kind: ResendKind, email: &str) -> Result<(), ApiError> {
        self.record(format!("resend:{kind:?}:{email}"));
        Ok(())
    }

    fn oauth_authorize_url(&self, provider: OAuthProvider, redirect_to: &str) -> String {
        format!("https://auth.test/authorize?provider={}&redirect_to={redirect_to}", provider.as_str())
    }
}

// =========================================================================
// MockAccountApi
// =========================================================================

#[derive(Default)]
struct MockAccountApi {
    update_result: Mutex<Option<Result<UserProfile, ApiError>>>,
    delete_result: Mutex<Option<Result<(), ApiError>>>,
    /// When set, `update_profile` waits for the test to release it.
    update_gate: Mutex<Option<oneshot::Receiver<()>>>,
}

impl MockAccountApi {
    fn gate_update(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.update_gate.lock().unwrap() = Some(rx);
        tx
    }
}

#[async_trait]
impl ProfileSource for MockAccountApi {
    async fn fetch_profile(&self, access_token: &str) -> Result<UserProfile, ApiError> {
        Ok(profile(access_token.trim_start_matches("access-"), "Ala", "Kowalska"))
    }
}

#[async_trait]
impl AccountApi for MockAccountApi {
    async fn update_profile(&self, _update: &UpdateProfile) -> Result<UserProfile, ApiError> {
        let gate = self.update_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.update_result.lock().unwrap().take().unwrap_or_else(|| Err(ApiError::network("unscripted")))
    }

    async fn delete_profile(&self) -> Result<(), ApiError> {
        self.delete_result.lock().unwrap().take().unwrap_or_else(|| Err(ApiError::network("unscripted")))
    }
}

// =========================================================================
// Fixtures
// =========================================================================

fn auth_user(id: &str) -> AuthUser {
    AuthUser {
        id: id.into(),
        email: Some(format!("{id}@example.test")),
        new_email: None,
        user_metadata: serde_json::Value::Null,
    }
}

fn session(id: &str) -> Session {
    Session {
        access_token: format!("access-{id}"),
        refresh_token: format!("refresh-{id}"),
        token_type: "bearer".into(),
        expires_in: Some(3600),
        expires_at: None,
        user: auth_user(id),
    }
}

fn profile(id: &str, first: &str, last: &str) -> UserProfile {
    UserProfile {
        id: id.into(),
        email: format!("{id}@example.test"),
        first_name: first.into(),
        last_name: last.into(),
        avatar: None,
        role: UserRole::User,
        is_new_account: None,
        avatar_id: None,
    }
}

fn config() -> ClientConfig {
    ClientConfig::from_lookup(|key| match key {
        "SUPABASE_URL" => Some("https://project.supabase.co".into()),
        "SUPABASE_PUBLISHABLE_KEY" => Some("anon-key".into()),
        "BACKEND_API_URL" => Some("https://api.example.test".into()),
        "APP_ORIGIN" => Some("https://app.example.test".into()),
        _ => None,
    })
    .unwrap()
}

struct Fixture {
    ctx: AuthContext,
    provider: Arc<MockProvider>,
    api: Arc<MockAccountApi>,
    storage: Arc<MemoryStorage>,
}

async fn start(persisted: Option<Session>) -> Fixture {
    let provider = Arc::new(MockProvider::new(persisted));
    let api = Arc::new(MockAccountApi::default());
    let storage = Arc::new(MemoryStorage::new());
    storage.set_item("supabase.auth.token", "{}");
    let ctx = AuthContext::start(
        &config(),
        Arc::clone(&provider) as Arc<dyn AuthProvider>,
        Arc::clone(&api),
        Arc::clone(&storage) as Arc<dyn KeyValueStorage>,
        AppStore::new(),
    )
    .await;
    Fixture { ctx, provider, api, storage }
}

async fn wait_for(ctx: &AuthContext, what: &str, pred: impl FnMut(&AuthSnapshot) -> bool) -> AuthSnapshot {
    let mut rx = ctx.watch();
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(pred))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
        .unwrap()
        .clone()
}

async fn signed_in() -> Fixture {
    let f = start(Some(session("a"))).await;
    wait_for(&f.ctx, "profile", |s| s.profile.is_some()).await;
    f
}

// =========================================================================
// Startup and sign-in
// =========================================================================

#[tokio::test]
async fn start_reconciles_persisted_session() {
    let f = signed_in().await;
    let snap = f.ctx.snapshot();

    assert_eq!(snap.user.map(|u| u.id), Some("a".to_owned()));
    assert_eq!(snap.profile.map(|p| p.display_name()), Some("Ala Kowalska".to_owned()));
    assert_eq!(f.ctx.jwt_token().as_deref(), Some("access-a"));
    assert_eq!(f.ctx.store().epoch(), 1);
}

#[tokio::test]
async fn start_without_session_settles_signed_out() {
    let f = start(None).await;
    let snap = wait_for(&f.ctx, "settled", |s| !s.is_loading).await;

    assert!(!snap.is_signed_in());
    assert!(f.ctx.jwt_token().is_none());
}

#[tokio::test]
async fn sign_in_with_email_updates_snapshot() {
    let f = start(None).await;
    let session = f.ctx.sign_in_with_email("a@example.test", "secret").await.unwrap();
    assert_eq!(session.user.id, "a");

    wait_for(&f.ctx, "profile", |s| s.profile.is_some()).await;
    assert_eq!(f.provider.calls(), vec!["sign_in:a@example.test"]);
}

#[tokio::test]
async fn rejected_credentials_surface_provider_message() {
    let f = start(None).await;
    let err = f.ctx.sign_in_with_email("a@example.test", "wrong").await.unwrap_err();

    assert_eq!(err.message, "Invalid login credentials");
    assert!(!f.ctx.snapshot().is_signed_in());
}

#[tokio::test]
async fn sign_out_clears_state_and_resets_store() {
    let f = signed_in().await;
    f.ctx.sign_out().await.unwrap();

    let snap = wait_for(&f.ctx, "signed out", |s| !s.is_signed_in()).await;
    assert!(snap.profile.is_none());
    assert!(f.storage.get_item("supabase.auth.token").is_none());
    assert!(f.ctx.store().epoch() >= 2);
}

// =========================================================================
// Provider account actions
// =========================================================================

#[tokio::test]
async fn reset_password_uses_update_password_redirect() {
    let f = start(None).await;
    f.ctx.reset_password_for_email("a@example.test").await.unwrap();
    assert_eq!(f.provider.calls(), vec!["recover:a@example.test:https://app.example.test/update-password"]);
}

#[tokio::test]
async fn oauth_redirects_back_to_app_origin() {
    let f = start(None).await;
    let url = f.ctx.sign_in_with_oauth(OAuthProvider::Github);
    assert_eq!(url, "https://auth.test/authorize?provider=github&redirect_to=https://app.example.test");
}

#[tokio::test]
async fn resend_picks_signup_or_email_change() {
    let f = signed_in().await;
    f.ctx.resend_email_verification().await.unwrap();

    let mut pending = session("b");
    pending.user.new_email = Some("new@example.test".into());
    f.provider.emit(AuthEvent::UserUpdated, Some(pending));
    wait_for(&f.ctx, "user b", |s| s.user.as_ref().is_some_and(|u| u.new_email.is_some())).await;
    f.ctx.resend_email_verification().await.unwrap();

    assert_eq!(f.provider.calls(), vec!["resend:Signup:a@example.test", "resend:EmailChange:b@example.test"]);
}

#[tokio::test]
async fn resend_without_user_requires_auth() {
    let f = start(None).await;
    wait_for(&f.ctx, "settled", |s| !s.is_loading).await;
    assert!(f.ctx.resend_email_verification().await.unwrap_err().is_auth());
}

#[tokio::test]
async fn metadata_update_merges_non_blank_names() {
    let f = signed_in().await;
    f.ctx.update_auth_user_metadata(Some("Ola"), Some("")).await.unwrap();

    let profile = f.ctx.snapshot().profile.unwrap();
    assert_eq!(profile.first_name, "Ola");
    assert_eq!(profile.last_name, "Kowalska");
    assert!(f.provider.calls()[0].contains(r#""data":{"firstName":"Ola","lastName":""}"#));
}

#[tokio::test]
async fn update_password_sends_only_password() {
    let f = start(None).await;
    f.ctx.update_password("n3w-pass").await.unwrap();
    assert_eq!(f.provider.calls(), vec![r#"update_user:{"password":"n3w-pass"}"#]);
}

// =========================================================================
// Backend profile actions
// =========================================================================

#[tokio::test]
async fn update_user_profile_replaces_profile() {
    let f = signed_in().await;
    *f.api.update_result.lock().unwrap() = Some(Ok(profile("a", "Ola", "Nowak")));

    let update = UpdateProfile { first_name: Some("Ola".into()), last_name: Some("Nowak".into()) };
    f.ctx.update_user_profile(&update).await.unwrap();

    assert_eq!(f.ctx.snapshot().profile.unwrap().display_name(), "Ola Nowak");
}

#[tokio::test]
async fn update_user_profile_auth_error_forces_logout() {
    let f = signed_in().await;
    *f.api.update_result.lock().unwrap() = Some(Err(ApiError::from_response(401, "{}")));

    let err = f.ctx.update_user_profile(&UpdateProfile::default()).await.unwrap_err();

    assert!(err.is_auth());
    assert!(!f.ctx.snapshot().is_signed_in());
    assert!(f.storage.get_item("supabase.auth.token").is_none());
    assert!(!f.provider.calls().contains(&"sign_out".to_owned()));
}

#[tokio::test]
async fn update_user_profile_validation_error_keeps_session() {
    let f = signed_in().await;
    *f.api.update_result.lock().unwrap() = Some(Err(ApiError::from_response(422, r#"{"message":"firstName too long"}"#)));

    let err = f.ctx.update_user_profile(&UpdateProfile::default()).await.unwrap_err();

    assert_eq!(err.message, "firstName too long");
    assert!(f.ctx.snapshot().is_signed_in());
}

#[tokio::test]
async fn update_user_profile_without_user_requires_auth() {
    let f = start(None).await;
    wait_for(&f.ctx, "settled", |s| !s.is_loading).await;
    *f.api.update_result.lock().unwrap() = Some(Ok(profile("a", "Ola", "Nowak")));

    let err = f.ctx.update_user_profile(&UpdateProfile::default()).await.unwrap_err();
    assert!(err.is_auth());
    assert!(f.ctx.snapshot().profile.is_none());
}

/// Sign in as `b` while `a`'s profile update is still in flight.
async fn switch_user_during_update(f: &Fixture) -> Result<UserProfile, ApiError> {
    let release = f.api.gate_update();
    let update = UpdateProfile { first_name: Some("Ola".into()), last_name: None };
    let pending = f.ctx.update_user_profile(&update);
    let switch = async {
        f.provider.emit(AuthEvent::SignedIn, Some(session("b")));
        wait_for(&f.ctx, "profile b", |s| s.profile.as_ref().is_some_and(|p| p.id == "b")).await;
        release.send(()).unwrap();
    };
    let (result, ()) = tokio::join!(pending, switch);
    result
}

#[tokio::test]
async fn late_profile_update_never_lands_on_next_user() {
    let f = signed_in().await;
    *f.api.update_result.lock().unwrap() = Some(Ok(profile("a", "Ola", "Kowalska")));

    let updated = switch_user_during_update(&f).await.unwrap();
    assert_eq!(updated.id, "a");

    let snap = f.ctx.snapshot();
    assert_eq!(snap.user.map(|u| u.id), Some("b".to_owned()));
    let current = snap.profile.unwrap();
    assert_eq!((current.id.as_str(), current.first_name.as_str()), ("b", "Ala"));
}

#[tokio::test]
async fn late_unauthorized_update_keeps_next_user_signed_in() {
    let f = signed_in().await;
    *f.api.update_result.lock().unwrap() = Some(Err(ApiError::from_response(401, "{}")));

    let err = switch_user_during_update(&f).await.unwrap_err();
    assert!(err.is_auth());

    let snap = f.ctx.snapshot();
    assert_eq!(snap.user.map(|u| u.id), Some("b".to_owned()));
    assert!(f.storage.get_item("supabase.auth.token").is_some());
}

#[tokio::test]
async fn delete_account_success_signs_out() {
    let f = signed_in().await;
    *f.api.delete_result.lock().unwrap() = Some(Ok(()));

    f.ctx.delete_user_account().await.unwrap();

    assert!(f.provider.calls().contains(&"sign_out".to_owned()));
    wait_for(&f.ctx, "signed out", |s| !s.is_signed_in()).await;
}

#[tokio::test]
async fn delete_account_forbidden_forces_logout() {
    let f = signed_in().await;
    *f.api.delete_result.lock().unwrap() = Some(Err(ApiError::from_response(403, "{}")));

    let err = f.ctx.delete_user_account().await.unwrap_err();

    assert_eq!(err.message, "Unauthorized");
    assert_eq!(err.status, Some(401));
    assert!(!f.ctx.snapshot().is_signed_in());
    assert!(f.storage.get_item("supabase.auth.token").is_none());
    assert!(!f.provider.calls().contains(&"sign_out".to_owned()));
}

#[tokio::test]
async fn delete_account_other_failure_keeps_session() {
    let f = signed_in().await;
    *f.api.delete_result.lock().unwrap() = Some(Err(ApiError::from_response(500, r#"{"message":"Stripe unavailable"}"#)));

    let err = f.ctx.delete_user_account().await.unwrap_err();

    assert_eq!(err.message, "Stripe unavailable");
    assert!(f.ctx.snapshot().is_signed_in());
}

// =========================================================================
// Lifecycle
// =========================================================================

#[tokio::test]
async fn shutdown_is_idempotent_and_drops_commands() {
    let f = signed_in().await;
    f.ctx.shutdown().await;
    f.ctx.shutdown().await;

    *f.api.update_result.lock().unwrap() = Some(Ok(profile("a", "Ola", "Nowak")));
    f.ctx.update_user_profile(&UpdateProfile::default()).await.unwrap();

    assert_eq!(f.ctx.snapshot().profile.unwrap().first_name, "Ala");
}
