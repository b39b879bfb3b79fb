//! Cycle entries: draft validation, calendar days and cycle statistics.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::{Intensity, Symptom, SymptomType, ValidationError};

#[cfg(test)]
#[path = "cycle_test.rs"]
mod tests;

pub const SHORT_CYCLE_DAYS: u32 = 21;
pub const LONG_CYCLE_DAYS: u32 = 35;
pub const IRREGULAR_SPREAD_DAYS: u32 = 7;
pub const DEFAULT_STATS_WINDOW: usize = 6;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleEntry {
    pub id: Uuid,
    pub user_id: String,
    pub start_date: Date,
    #[serde(default)]
    pub end_date: Option<Date>,
    pub symptoms: Vec<Symptom>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Unvalidated cycle form input.
#[derive(Clone, Debug, Default)]
pub struct CycleEntryDraft {
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub symptoms: Vec<SymptomType>,
    /// Raw 1–5 ratings; unrated symptoms default to 3.
    pub intensities: HashMap<SymptomType, u8>,
    pub notes: String,
}

impl CycleEntryDraft {
    /// Validate the draft into a new entry owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for a missing start date, an end date
    /// before the start, or an intensity outside 1–5.
    pub fn validate(self, user_id: &str, now: OffsetDateTime) -> Result<CycleEntry, ValidationError> {
        let start_date = self.start_date.ok_or(ValidationError::MissingStartDate)?;
        if self.end_date.is_some_and(|end| end < start_date) {
            return Err(ValidationError::EndBeforeStart);
        }

        let notes = Some(self.notes.trim().to_owned()).filter(|n| !n.is_empty());

        let mut kinds = self.symptoms;
        kinds.sort_unstable();
        kinds.dedup();

        let symptoms = kinds
            .into_iter()
            .map(|kind| {
                let intensity = match self.intensities.get(&kind) {
                    Some(raw) => Intensity::try_from(*raw)?,
                    None => Intensity::DEFAULT,
                };
                let description = if kind == SymptomType::Other { notes.clone() } else { None };
                Ok(Symptom { kind, intensity, description })
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;

        Ok(CycleEntry {
            id: Uuid::new_v4(),
            user_id: user_id.to_owned(),
            start_date,
            end_date: self.end_date,
            symptoms,
            notes,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Every day from the entry's start to its end, inclusive, for calendar highlighting.
#[must_use]
pub fn cycle_days(entry: &CycleEntry) -> Vec<Date> {
    let end = entry.end_date.filter(|end| *end >= entry.start_date).unwrap_or(entry.start_date);
    let mut days = vec![entry.start_date];
    let mut current = entry.start_date;
    while current < end {
        match current.next_day() {
            Some(next) => {
                days.push(next);
                current = next;
            }
            None => break,
        }
    }
    days
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleLength {
    pub start_date: Date,
    pub length: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CycleAdvisory {
    /// A completed cycle shorter than 21 days.
    ShortCycle { start_date: Date, length: u32 },
    /// A completed cycle longer than 35 days.
    LongCycle { start_date: Date, length: u32 },
    /// Completed cycle lengths differ by more than 7 days.
    Irregular { spread: u32 },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleStats {
    /// Rounded mean of the completed cycles in the window.
    pub average_length: Option<u32>,
    /// Completed cycles, most recent first.
    pub last_cycles: Vec<CycleLength>,
    pub advisories: Vec<CycleAdvisory>,
}

impl CycleStats {
    /// Stats over the most recent [`DEFAULT_STATS_WINDOW`] completed cycles.
    #[must_use]
    pub fn from_entries(entries: &[CycleEntry]) -> Self {
        Self::from_entries_window(entries, DEFAULT_STATS_WINDOW)
    }

    #[must_use]
    pub fn from_entries_window(entries: &[CycleEntry], window: usize) -> Self {
        let mut starts: Vec<Date> = entries.iter().map(|e| e.start_date).collect();
        starts.sort_unstable();
        starts.dedup();

        let mut cycles: Vec<CycleLength> = starts
            .windows(2)
            .filter_map(|pair| {
                let days = (pair[1] - pair[0]).whole_days();
                u32::try_from(days).ok().map(|length| CycleLength { start_date: pair[0], length })
            })
            .collect();
        cycles.reverse();
        cycles.truncate(window);

        if cycles.is_empty() {
            return Self::default();
        }

        let total: u32 = cycles.iter().map(|c| c.length).sum();
        let count = u32::try_from(cycles.len()).unwrap_or(u32::MAX);
        let average_length = Some((total + count / 2) / count);

        let mut advisories: Vec<CycleAdvisory> = cycles
            .iter()
            .filter_map(|c| {
                if c.length < SHORT_CYCLE_DAYS {
                    Some(CycleAdvisory::ShortCycle { start_date: c.start_date, length: c.length })
                } else if c.length > LONG_CYCLE_DAYS {
                    Some(CycleAdvisory::LongCycle { start_date: c.start_date, length: c.length })
                } else {
                    None
                }
            })
            .collect();

        let longest = cycles.iter().map(|c| c.length).max().unwrap_or(0);
        let shortest = cycles.iter().map(|c| c.length).min().unwrap_or(0);
        let spread = longest - shortest;
        if spread > IRREGULAR_SPREAD_DAYS {
            advisories.push(CycleAdvisory::Irregular { spread });
        }

        Self { average_length, last_cycles: cycles, advisories }
    }
}
