//! Consultation requests to a specialist.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::ValidationError;

#[cfg(test)]
#[path = "consultation_test.rs"]
mod tests;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialistType {
    #[default]
    Gynecologist,
    FertilitySpecialist,
    Endocrinologist,
}

impl SpecialistType {
    pub const ALL: [SpecialistType; 3] = [Self::Gynecologist, Self::FertilitySpecialist, Self::Endocrinologist];

    /// Translation key for the specialist's label.
    #[must_use]
    pub fn label_key(self) -> &'static str {
        match self {
            Self::Gynecologist => "fertility.consultation.specialists.gynecologist",
            Self::FertilitySpecialist => "fertility.consultation.specialists.fertilitySpecialist",
            Self::Endocrinologist => "fertility.consultation.specialists.endocrinologist",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsultationStatus {
    #[default]
    Pending,
    Confirmed,
    Completed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationRequest {
    pub id: Uuid,
    pub user_id: String,
    pub specialist_type: SpecialistType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub status: ConsultationStatus,
}

#[derive(Clone, Debug, Default)]
pub struct ConsultationRequestDraft {
    pub specialist_type: SpecialistType,
    pub description: String,
    pub consent_given: bool,
}

impl ConsultationRequestDraft {
    /// Validate into a pending request.
    ///
    /// # Errors
    ///
    /// [`ValidationError::ConsentRequired`] when consent was not given.
    pub fn validate(self, user_id: &str, now: OffsetDateTime) -> Result<ConsultationRequest, ValidationError> {
        if !self.consent_given {
            return Err(ValidationError::ConsentRequired);
        }
        let description = Some(self.description.trim().to_owned()).filter(|d| !d.is_empty());
        Ok(ConsultationRequest {
            id: Uuid::new_v4(),
            user_id: user_id.to_owned(),
            specialist_type: self.specialist_type,
            description,
            created_at: now,
            status: ConsultationStatus::Pending,
        })
    }
}
