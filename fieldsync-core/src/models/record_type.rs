use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kinds of records captured in the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    Pregnancy,
    Birth,
}

impl RecordType {
    /// Every record type, in the order sync phases visit them.
    pub const ALL: [RecordType; 2] = [RecordType::Pregnancy, RecordType::Birth];

    /// Name stored in the local tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Pregnancy => "pregnancy",
            RecordType::Birth => "birth",
        }
    }

    /// Remote collection holding documents of this type.
    pub fn collection(&self) -> &'static str {
        match self {
            RecordType::Pregnancy => "pregnancies",
            RecordType::Birth => "births",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pregnancy" | "pregnancies" => Ok(RecordType::Pregnancy),
            "birth" | "births" => Ok(RecordType::Birth),
            _ => Err(format!(
                "Invalid record type '{}'. Valid options: pregnancy, birth",
                s
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_type_display() {
        assert_eq!(format!("{}", RecordType::Pregnancy), "pregnancy");
        assert_eq!(format!("{}", RecordType::Birth), "birth");
    }

    #[test]
    fn test_record_type_from_str() {
        assert_eq!(
            RecordType::from_str("pregnancy").unwrap(),
            RecordType::Pregnancy
        );
        assert_eq!(RecordType::from_str("BIRTHS").unwrap(), RecordType::Birth);
        assert_eq!(
            RecordType::from_str("Pregnancies").unwrap(),
            RecordType::Pregnancy
        );
    }

    #[test]
    fn test_record_type_from_str_invalid() {
        assert!(RecordType::from_str("death").is_err());
        assert!(RecordType::from_str("").is_err());
    }

    #[test]
    fn test_collection_names() {
        assert_eq!(RecordType::Pregnancy.collection(), "pregnancies");
        assert_eq!(RecordType::Birth.collection(), "births");
    }
}
