//! Record bodies carried through the queue, the cache and the remote store.
//!
//! The engine treats a [`RecordPayload`] as an opaque value. The only fields
//! it looks at are the ones exposed through the accessors below.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::birth::BirthRecord;
use super::pregnancy::PregnancyRecord;
use super::record_type::RecordType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RecordPayload {
    Pregnancy(PregnancyRecord),
    Birth(BirthRecord),
}

impl RecordPayload {
    pub fn record_type(&self) -> RecordType {
        match self {
            RecordPayload::Pregnancy(_) => RecordType::Pregnancy,
            RecordPayload::Birth(_) => RecordType::Birth,
        }
    }

    /// Remote identifier, present once the record has been written remotely.
    pub fn remote_id(&self) -> Option<&str> {
        match self {
            RecordPayload::Pregnancy(r) => r.remote_id.as_deref(),
            RecordPayload::Birth(r) => r.remote_id.as_deref(),
        }
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        match self {
            RecordPayload::Pregnancy(r) => r.created_at,
            RecordPayload::Birth(r) => r.created_at,
        }
    }

    pub fn recorded_by(&self) -> &str {
        match self {
            RecordPayload::Pregnancy(r) => &r.recorded_by,
            RecordPayload::Birth(r) => &r.recorded_by,
        }
    }

    pub fn is_synced(&self) -> bool {
        match self {
            RecordPayload::Pregnancy(r) => r.synced,
            RecordPayload::Birth(r) => r.synced,
        }
    }

    pub fn with_remote_id(mut self, id: impl Into<String>) -> Self {
        let id = Some(id.into());
        match &mut self {
            RecordPayload::Pregnancy(r) => r.remote_id = id,
            RecordPayload::Birth(r) => r.remote_id = id,
        }
        self
    }

    /// Copy sent to the remote store: stamped with the local creation time
    /// and flagged as synced.
    pub fn prepare_for_upload(&self, created_at: DateTime<Utc>) -> Self {
        let mut copy = self.clone();
        match &mut copy {
            RecordPayload::Pregnancy(r) => {
                r.created_at = Some(created_at);
                r.synced = true;
            }
            RecordPayload::Birth(r) => {
                r.created_at = Some(created_at);
                r.synced = true;
            }
        }
        copy
    }

    /// Remote document body, without the local `kind` tag.
    pub fn to_document(&self) -> Result<Value, serde_json::Error> {
        match self {
            RecordPayload::Pregnancy(r) => serde_json::to_value(r),
            RecordPayload::Birth(r) => serde_json::to_value(r),
        }
    }

    /// Rebuilds a payload from a remote document, attaching its id.
    pub fn from_document(
        record_type: RecordType,
        remote_id: &str,
        document: Value,
    ) -> Result<Self, serde_json::Error> {
        let payload = match record_type {
            RecordType::Pregnancy => {
                RecordPayload::Pregnancy(serde_json::from_value(document)?)
            }
            RecordType::Birth => RecordPayload::Birth(serde_json::from_value(document)?),
        };
        Ok(payload.with_remote_id(remote_id))
    }

    /// Serialized form stored in the local tables.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

impl fmt::Display for RecordPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordPayload::Pregnancy(r) => fmt::Display::fmt(r, f),
            RecordPayload::Birth(r) => fmt::Display::fmt(r, f),
        }
    }
}

impl From<PregnancyRecord> for RecordPayload {
    fn from(record: PregnancyRecord) -> Self {
        RecordPayload::Pregnancy(record)
    }
}

impl From<BirthRecord> for RecordPayload {
    fn from(record: BirthRecord) -> Self {
        RecordPayload::Birth(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn birth() -> RecordPayload {
        let dob = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        BirthRecord::new("Amina", dob, "agent-7").into()
    }

    #[test]
    fn test_local_encoding_carries_kind_tag() {
        let raw = birth().encode().unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["kind"], "birth");

        let decoded = RecordPayload::decode(&raw).unwrap();
        assert_eq!(decoded.record_type(), RecordType::Birth);
    }

    #[test]
    fn test_document_has_no_kind_tag() {
        let doc = birth().to_document().unwrap();
        assert!(doc.get("kind").is_none());
        assert_eq!(doc["motherName"], "Amina");
    }

    #[test]
    fn test_prepare_for_upload_stamps_and_flags() {
        let created = Utc::now();
        let payload = birth().prepare_for_upload(created);
        assert_eq!(payload.created_at(), Some(created));
        assert!(payload.is_synced());
        assert!(!birth().is_synced());
    }

    #[test]
    fn test_from_document_attaches_remote_id() {
        let doc = json!({
            "motherName": "Zawadi",
            "village": "Bunagana",
            "recordedBy": "agent-2"
        });
        let payload = RecordPayload::from_document(RecordType::Pregnancy, "doc9", doc).unwrap();
        assert_eq!(payload.remote_id(), Some("doc9"));
        assert_eq!(payload.recorded_by(), "agent-2");
    }

    #[test]
    fn test_from_document_rejects_wrong_shape() {
        let doc = json!({ "village": "Bunagana" });
        assert!(RecordPayload::from_document(RecordType::Birth, "doc9", doc).is_err());
    }
}
