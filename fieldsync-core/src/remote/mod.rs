//! Remote document store interface.
//!
//! The remote side is an opaque create/list/update/delete API keyed by
//! collection name and document id. It gives no transactional guarantees
//! towards the device and does not deduplicate creates.

mod http;
mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use http::{check_server, HttpRemoteStore, DEFAULT_TIMEOUT};
pub use memory::MemoryRemoteStore;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    #[error("Request timed out")]
    Timeout,

    #[error("Server returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },
}

/// A document as returned by a collection listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteDocument {
    pub id: String,
    pub data: Value,
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Creates a document and returns the id the store assigned to it.
    async fn create(&self, collection: &str, document: Value) -> Result<String, RemoteError>;

    /// Returns every document currently in the collection.
    async fn list(&self, collection: &str) -> Result<Vec<RemoteDocument>, RemoteError>;

    /// Merges `fields` into an existing document.
    async fn update(&self, collection: &str, id: &str, fields: Value) -> Result<(), RemoteError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError>;
}

/// Shallow merge of `fields` into `document`, the semantics of `update`.
pub(crate) fn merge_fields(document: &mut Value, fields: Value) {
    match (document.as_object_mut(), fields) {
        (Some(target), Value::Object(fields)) => {
            for (key, value) in fields {
                target.insert(key, value);
            }
        }
        (_, fields) => *document = fields,
    }
}
