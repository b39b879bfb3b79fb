use super::*;

#[test]
fn kind_for_status_classifies_auth() {
    assert_eq!(kind_for_status(401), ErrorKind::Auth);
    assert_eq!(kind_for_status(403), ErrorKind::Auth);
}

#[test]
fn kind_for_status_classifies_validation_and_network() {
    assert_eq!(kind_for_status(422), ErrorKind::Validation);
    assert_eq!(kind_for_status(400), ErrorKind::Validation);
    assert_eq!(kind_for_status(500), ErrorKind::Network);
    assert_eq!(kind_for_status(502), ErrorKind::Network);
}

#[test]
fn from_response_prefers_translation_key() {
    let body = r#"{"message":"Profile not found","translationKey":"errors.profileNotFound"}"#;
    let err = ApiError::from_response(404, body);
    assert_eq!(err.kind, ErrorKind::Validation);
    assert_eq!(err.message, "errors.profileNotFound");
    assert_eq!(err.translation_key.as_deref(), Some("errors.profileNotFound"));
    assert_eq!(err.status, Some(404));
}

#[test]
fn from_response_body_status_overrides_http_status() {
    let body = r#"{"message":"Session expired","status":401}"#;
    let err = ApiError::from_response(500, body);
    assert!(err.is_auth());
    assert_eq!(err.status, Some(401));
    assert_eq!(err.to_string(), "Session expired");
}

#[test]
fn from_response_unparseable_body_uses_default_message() {
    let err = ApiError::from_response(503, "<html>bad gateway</html>");
    assert_eq!(err.kind, ErrorKind::Network);
    assert_eq!(err.message, DEFAULT_ERROR_MESSAGE);
}

#[test]
fn from_response_reads_gotrue_error_description() {
    let body = r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#;
    let err = ApiError::from_response(400, body);
    assert_eq!(err.kind, ErrorKind::Validation);
    assert_eq!(err.message, "Invalid login credentials");
}

#[test]
fn auth_required_carries_translation_key() {
    let err = ApiError::auth_required();
    assert!(err.is_auth());
    assert_eq!(err.display_message(), AUTH_REQUIRED_KEY);
    assert_eq!(err.status, None);
}

#[test]
fn display_message_falls_back_to_message() {
    let err = ApiError::network("connection reset");
    assert_eq!(err.display_message(), "connection reset");
}
