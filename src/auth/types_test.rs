use super::*;

fn user_json() -> serde_json::Value {
    serde_json::json!({ "id": "u-1", "email": "ala@example.test", "aud": "authenticated" })
}

#[test]
fn session_deserializes_gotrue_token_response() {
    let json = serde_json::json!({
        "access_token": "at",
        "refresh_token": "rt",
        "token_type": "bearer",
        "expires_in": 3600,
        "user": user_json(),
    });
    let session: Session = serde_json::from_value(json).unwrap();
    assert_eq!(session.user.id, "u-1");
    assert_eq!(session.user.email.as_deref(), Some("ala@example.test"));
    assert!(session.user.new_email.is_none());
    assert!(session.expires_at.is_none());

    let session = session.with_expiry_from(1_000);
    assert_eq!(session.expires_at, Some(4_600));
    assert!(!session.is_expired_at(4_599));
    assert!(session.is_expired_at(4_600));
}

#[test]
fn with_expiry_keeps_provider_value() {
    let json = serde_json::json!({
        "access_token": "at",
        "refresh_token": "rt",
        "expires_in": 3600,
        "expires_at": 42,
        "user": user_json(),
    });
    let session: Session = serde_json::from_value(json).unwrap();
    assert_eq!(session.token_type, "bearer");
    assert_eq!(session.with_expiry_from(1_000).expires_at, Some(42));
}

#[test]
fn auth_event_uses_upstream_names() {
    assert_eq!(serde_json::to_string(&AuthEvent::SignedOut).unwrap(), "\"SIGNED_OUT\"");
    let ev: AuthEvent = serde_json::from_str("\"TOKEN_REFRESHED\"").unwrap();
    assert_eq!(ev, AuthEvent::TokenRefreshed);
}

#[test]
fn oauth_provider_parses_case_insensitively() {
    assert_eq!("Google".parse::<OAuthProvider>().unwrap(), OAuthProvider::Google);
    assert_eq!(OAuthProvider::Github.as_str(), "github");
    assert!("myspace".parse::<OAuthProvider>().is_err());
}

#[test]
fn user_attributes_skip_unset_fields() {
    let attrs = UserAttributes { password: Some("hunter22".into()), ..UserAttributes::default() };
    let json = serde_json::to_value(&attrs).unwrap();
    assert_eq!(json, serde_json::json!({ "password": "hunter22" }));

    let attrs = UserAttributes {
        metadata: Some(serde_json::json!({ "firstName": "Ala" })),
        ..UserAttributes::default()
    };
    let json = serde_json::to_value(&attrs).unwrap();
    assert_eq!(json, serde_json::json!({ "data": { "firstName": "Ala" } }));
}

#[test]
fn resend_kind_serializes_snake_case() {
    assert_eq!(serde_json::to_string(&ResendKind::EmailChange).unwrap(), "\"email_change\"");
}
