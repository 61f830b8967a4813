use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::validation::ValidationStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Female,
    Male,
    #[default]
    Unknown,
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sex::Female => write!(f, "female"),
            Sex::Male => write!(f, "male"),
            Sex::Unknown => write!(f, "unknown"),
        }
    }
}

impl FromStr for Sex {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "female" | "f" => Ok(Sex::Female),
            "male" | "m" => Ok(Sex::Male),
            "unknown" | "u" => Ok(Sex::Unknown),
            _ => Err(format!(
                "Invalid sex '{}'. Valid options: female, male, unknown",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BirthRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    pub mother_name: String,
    #[serde(default)]
    pub child_name: Option<String>,
    #[serde(default)]
    pub sex: Sex,
    pub date_of_birth: NaiveDate,
    #[serde(default)]
    pub birth_weight_grams: Option<u32>,
    #[serde(default)]
    pub place_of_birth: String,
    /// Remote id of the pregnancy this birth concludes, if known.
    #[serde(default)]
    pub pregnancy_id: Option<String>,
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

impl BirthRecord {
    pub fn new(
        mother_name: impl Into<String>,
        date_of_birth: NaiveDate,
        recorded_by: impl Into<String>,
    ) -> Self {
        Self {
            remote_id: None,
            mother_name: mother_name.into(),
            child_name: None,
            sex: Sex::Unknown,
            date_of_birth,
            birth_weight_grams: None,
            place_of_birth: String::new(),
            pregnancy_id: None,
            notes: String::new(),
            validation: ValidationStatus::Pending,
            recorded_by: recorded_by.into(),
            created_at: None,
            synced: false,
        }
    }

    pub fn with_child_name(mut self, name: impl Into<String>) -> Self {
        self.child_name = Some(name.into());
        self
    }

    pub fn with_sex(mut self, sex: Sex) -> Self {
        self.sex = sex;
        self
    }

    pub fn with_birth_weight(mut self, grams: u32) -> Self {
        self.birth_weight_grams = Some(grams);
        self
    }

    pub fn with_place_of_birth(mut self, place: impl Into<String>) -> Self {
        self.place_of_birth = place.into();
        self
    }

    pub fn with_pregnancy_id(mut self, id: impl Into<String>) -> Self {
        self.pregnancy_id = Some(id.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }
}

impl fmt::Display for BirthRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let child = self.child_name.as_deref().unwrap_or("unnamed");
        write!(
            f,
            "Birth: {} ({}) to {} on {}",
            child, self.sex, self.mother_name, self.date_of_birth
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_birth_builder() {
        let dob = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        let record = BirthRecord::new("Amina", dob, "agent-7")
            .with_child_name("Baraka")
            .with_sex(Sex::Male)
            .with_birth_weight(3200)
            .with_place_of_birth("Kisoro HC III");

        assert_eq!(record.child_name.as_deref(), Some("Baraka"));
        assert_eq!(record.sex, Sex::Male);
        assert_eq!(record.birth_weight_grams, Some(3200));
        assert_eq!(record.place_of_birth, "Kisoro HC III");
    }

    #[test]
    fn test_sex_from_str() {
        assert_eq!(Sex::from_str("F").unwrap(), Sex::Female);
        assert_eq!(Sex::from_str("male").unwrap(), Sex::Male);
        assert!(Sex::from_str("other").is_err());
    }

    #[test]
    fn test_display() {
        let dob = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        let record = BirthRecord::new("Amina", dob, "agent-7").with_sex(Sex::Female);
        let output = format!("{}", record);
        assert!(output.contains("unnamed"));
        assert!(output.contains("female"));
        assert!(output.contains("2025-03-14"));
    }
}
