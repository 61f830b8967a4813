//! In-process remote store.
//!
//! Useful for running without a server and for exercising the sync engine
//! against injected failures.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;
use tokio::sync::Mutex;

use super::{merge_fields, RemoteDocument, RemoteError, RemoteStore};

#[derive(Default)]
struct State {
    collections: HashMap<String, BTreeMap<String, Value>>,
    next_id: u64,
    /// Creates rejected before anything is written.
    failing_creates: usize,
    /// Creates that are written but whose acknowledgment is lost.
    dropped_acks: usize,
    failing_lists: HashSet<String>,
    create_calls: usize,
    latency: Option<Duration>,
}

pub struct MemoryRemoteStore {
    state: Mutex<State>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_id: 1,
                ..State::default()
            }),
        }
    }

    /// Sets the number used for the next generated id (`doc{n}`).
    pub async fn set_next_id(&self, next_id: u64) {
        self.state.lock().await.next_id = next_id;
    }

    /// Rejects the next `count` creates with a server error.
    pub async fn fail_next_creates(&self, count: usize) {
        self.state.lock().await.failing_creates = count;
    }

    /// Stores the next `count` creates but reports a timeout to the caller.
    pub async fn drop_next_acks(&self, count: usize) {
        self.state.lock().await.dropped_acks = count;
    }

    /// Makes listing `collection` fail until switched off.
    pub async fn set_list_failure(&self, collection: &str, failing: bool) {
        let mut state = self.state.lock().await;
        if failing {
            state.failing_lists.insert(collection.to_string());
        } else {
            state.failing_lists.remove(collection);
        }
    }

    /// Delay applied to every create and list call.
    pub async fn set_latency(&self, latency: Duration) {
        self.state.lock().await.latency = Some(latency);
    }

    pub async fn create_calls(&self) -> usize {
        self.state.lock().await.create_calls
    }

    /// Writes a document directly, as another device would.
    pub async fn insert(&self, collection: &str, id: &str, document: Value) {
        self.state
            .lock()
            .await
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), document);
    }

    /// Removes a document directly, as another device would.
    pub async fn remove(&self, collection: &str, id: &str) -> bool {
        self.state
            .lock()
            .await
            .collections
            .get_mut(collection)
            .map(|docs| docs.remove(id).is_some())
            .unwrap_or(false)
    }

    pub async fn get(&self, collection: &str, id: &str) -> Option<Value> {
        self.state
            .lock()
            .await
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id).cloned())
    }

    pub async fn len(&self, collection: &str) -> usize {
        self.state
            .lock()
            .await
            .collections
            .get(collection)
            .map(|docs| docs.len())
            .unwrap_or(0)
    }

    async fn pause(&self) {
        let latency = self.state.lock().await.latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn create(&self, collection: &str, document: Value) -> Result<String, RemoteError> {
        self.pause().await;

        let mut state = self.state.lock().await;
        state.create_calls += 1;

        if state.failing_creates > 0 {
            state.failing_creates -= 1;
            return Err(RemoteError::Status {
                status: 503,
                message: "service unavailable".to_string(),
            });
        }

        let id = format!("doc{}", state.next_id);
        state.next_id += 1;
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), document);

        if state.dropped_acks > 0 {
            state.dropped_acks -= 1;
            return Err(RemoteError::Timeout);
        }

        Ok(id)
    }

    async fn list(&self, collection: &str) -> Result<Vec<RemoteDocument>, RemoteError> {
        self.pause().await;

        let state = self.state.lock().await;
        if state.failing_lists.contains(collection) {
            return Err(RemoteError::Transport(format!(
                "connection reset while listing {}",
                collection
            )));
        }

        Ok(state
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, data)| RemoteDocument {
                        id: id.clone(),
                        data: data.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update(&self, collection: &str, id: &str, fields: Value) -> Result<(), RemoteError> {
        let mut state = self.state.lock().await;
        let document = state
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| RemoteError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        merge_fields(document, fields);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError> {
        let mut state = self.state.lock().await;
        if let Some(docs) = state.collections.get_mut(collection) {
            docs.remove(id);
        }
        Ok(())
    }
}
