use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supervisor review state of a captured record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    #[default]
    Pending,
    Validated,
    Rejected,
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationStatus::Pending => write!(f, "pending"),
            ValidationStatus::Validated => write!(f, "validated"),
            ValidationStatus::Rejected => write!(f, "rejected"),
        }
    }
}

impl FromStr for ValidationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ValidationStatus::Pending),
            "validated" => Ok(ValidationStatus::Validated),
            "rejected" => Ok(ValidationStatus::Rejected),
            _ => Err(format!(
                "Invalid validation status '{}'. Valid options: pending, validated, rejected",
                s
            )),
        }
    }
}
