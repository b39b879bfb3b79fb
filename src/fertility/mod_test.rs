use super::*;

#[test]
fn intensity_accepts_one_to_five() {
    assert_eq!(Intensity::try_from(1).unwrap().get(), 1);
    assert_eq!(Intensity::try_from(5).unwrap().get(), 5);
    assert_eq!(Intensity::default().get(), 3);
}

#[test]
fn intensity_rejects_out_of_range() {
    assert_eq!(Intensity::try_from(0), Err(ValidationError::IntensityOutOfRange(0)));
    assert_eq!(Intensity::try_from(6), Err(ValidationError::IntensityOutOfRange(6)));
}

#[test]
fn symptom_serializes_with_type_key() {
    let symptom = Symptom { kind: SymptomType::MoodChanges, intensity: Intensity::DEFAULT, description: None };
    let json = serde_json::to_value(&symptom).unwrap();
    assert_eq!(json, serde_json::json!({ "type": "mood_changes", "intensity": 3 }));
}

#[test]
fn symptom_deserialize_rejects_bad_intensity() {
    let result: Result<Symptom, _> = serde_json::from_str(r#"{"type":"cramps","intensity":9}"#);
    assert!(result.is_err());
}

#[test]
fn validation_error_converts_to_tagged_api_error() {
    let err: ApiError = ValidationError::ConsentRequired.into();
    assert_eq!(err.kind, ErrorKind::Validation);
    assert_eq!(err.display_message(), "fertility.errors.consentRequired");
    assert!(!err.is_auth());
}
