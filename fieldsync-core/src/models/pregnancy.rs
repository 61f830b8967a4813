use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::validation::ValidationStatus;

/// Length of a pregnancy counted from the last menstrual period.
const GESTATION_DAYS: u64 = 280;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PregnancyRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    pub mother_name: String,
    #[serde(default)]
    pub mother_age: Option<u32>,
    pub village: String,
    #[serde(default)]
    pub last_menstrual_period: Option<NaiveDate>,
    #[serde(default)]
    pub expected_delivery_date: Option<NaiveDate>,
    #[serde(default)]
    pub gravida: Option<u32>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub validation: ValidationStatus,
    pub recorded_by: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub synced: bool,
}

impl PregnancyRecord {
    pub fn new(
        mother_name: impl Into<String>,
        village: impl Into<String>,
        recorded_by: impl Into<String>,
    ) -> Self {
        Self {
            remote_id: None,
            mother_name: mother_name.into(),
            mother_age: None,
            village: village.into(),
            last_menstrual_period: None,
            expected_delivery_date: None,
            gravida: None,
            notes: String::new(),
            validation: ValidationStatus::Pending,
            recorded_by: recorded_by.into(),
            created_at: None,
            synced: false,
        }
    }

    pub fn with_mother_age(mut self, age: u32) -> Self {
        self.mother_age = Some(age);
        self
    }

    /// Sets the last menstrual period and derives the expected delivery date
    /// unless one was already given.
    pub fn with_last_menstrual_period(mut self, lmp: NaiveDate) -> Self {
        self.last_menstrual_period = Some(lmp);
        if self.expected_delivery_date.is_none() {
            self.expected_delivery_date = lmp.checked_add_days(Days::new(GESTATION_DAYS));
        }
        self
    }

    pub fn with_expected_delivery_date(mut self, date: NaiveDate) -> Self {
        self.expected_delivery_date = Some(date);
        self
    }

    pub fn with_gravida(mut self, gravida: u32) -> Self {
        self.gravida = Some(gravida);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }
}

impl fmt::Display for PregnancyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pregnancy: {} ({})", self.mother_name, self.village)?;
        if let Some(edd) = self.expected_delivery_date {
            write!(f, ", due {}", edd)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pregnancy_new() {
        let record = PregnancyRecord::new("Amina", "Kisoro", "agent-7");
        assert_eq!(record.mother_name, "Amina");
        assert_eq!(record.village, "Kisoro");
        assert_eq!(record.recorded_by, "agent-7");
        assert_eq!(record.validation, ValidationStatus::Pending);
        assert!(record.remote_id.is_none());
        assert!(!record.synced);
    }

    #[test]
    fn test_lmp_derives_expected_delivery() {
        let lmp = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let record = PregnancyRecord::new("Amina", "Kisoro", "agent-7").with_last_menstrual_period(lmp);
        assert_eq!(
            record.expected_delivery_date,
            NaiveDate::from_ymd_opt(2025, 10, 8)
        );
    }

    #[test]
    fn test_explicit_delivery_date_is_kept() {
        let lmp = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let edd = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap();
        let record = PregnancyRecord::new("Amina", "Kisoro", "agent-7")
            .with_expected_delivery_date(edd)
            .with_last_menstrual_period(lmp);
        assert_eq!(record.expected_delivery_date, Some(edd));
    }

    #[test]
    fn test_remote_document_uses_camel_case() {
        let record = PregnancyRecord::new("Amina", "Kisoro", "agent-7").with_mother_age(24);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["motherName"], "Amina");
        assert_eq!(json["motherAge"], 24);
        assert!(json.get("remoteId").is_none());
    }
}
