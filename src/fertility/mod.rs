//! Fertility tracking: cycle entries, cycle statistics, consultation requests.
//!
//! DESIGN
//! ======
//! Entries are validated client-side from form drafts and kept in the
//! application store for the signed-in session only. Statistics are derived
//! from start dates; the open (most recent) cycle has no length yet.

pub mod consultation;
pub mod cycle;

use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ErrorKind};

pub use consultation::{ConsultationRequest, ConsultationRequestDraft, ConsultationStatus, SpecialistType};
pub use cycle::{CycleAdvisory, CycleEntry, CycleEntryDraft, CycleLength, CycleStats, cycle_days};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymptomType {
    Cramps,
    Headache,
    MoodChanges,
    Fatigue,
    Bloating,
    BreastTenderness,
    Other,
}

/// Symptom intensity on a 1–5 scale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Intensity(u8);

impl Intensity {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;
    pub const DEFAULT: Intensity = Intensity(3);

    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for Intensity {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u8> for Intensity {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ValidationError::IntensityOutOfRange(value))
        }
    }
}

impl From<Intensity> for u8 {
    fn from(value: Intensity) -> Self {
        value.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symptom {
    #[serde(rename = "type")]
    pub kind: SymptomType,
    pub intensity: Intensity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("cycle start date is required")]
    MissingStartDate,
    #[error("cycle end date cannot be earlier than its start date")]
    EndBeforeStart,
    #[error("symptom intensity {0} is outside 1-5")]
    IntensityOutOfRange(u8),
    #[error("consent to data processing is required")]
    ConsentRequired,
}

impl ValidationError {
    #[must_use]
    pub fn translation_key(&self) -> &'static str {
        match self {
            Self::MissingStartDate => "fertility.errors.startDateRequired",
            Self::EndBeforeStart => "fertility.errors.endBeforeStart",
            Self::IntensityOutOfRange(_) => "fertility.errors.intensityRange",
            Self::ConsentRequired => "fertility.errors.consentRequired",
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::new(ErrorKind::Validation, err.to_string()).with_translation_key(err.translation_key())
    }
}

/// Session-scoped fertility data held in the application store.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FertilityJournal {
    pub entries: Vec<CycleEntry>,
    pub consultations: Vec<ConsultationRequest>,
}

impl FertilityJournal {
    #[must_use]
    pub fn stats(&self) -> CycleStats {
        CycleStats::from_entries(&self.entries)
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
