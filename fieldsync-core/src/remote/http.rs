//! REST client for the remote document store.
//!
//! Layout:
//! - `POST   {base}/collections/{collection}/documents` -> `{"id": "..."}`
//! - `GET    {base}/collections/{collection}/documents` -> `[{"id": "...", "data": {...}}]`
//! - `PATCH  {base}/collections/{collection}/documents/{id}`
//! - `DELETE {base}/collections/{collection}/documents/{id}`

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use super::{RemoteDocument, RemoteError, RemoteStore};

/// Per-request timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
/// Timeout for the reachability probe.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Deserialize)]
struct CreateResponse {
    id: String,
}

#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpRemoteStore {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: normalize_base_url(&base_url.into()),
            api_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/collections/{}/documents", self.base_url, collection)
    }

    /// Remote ids are opaque, so they are percent-encoded as one path segment.
    fn document_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{}", self.collection_url(collection), urlencoding::encode(id))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("Authorization", format!("Bearer {}", key)),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, RemoteError> {
        let response = self.authorize(request).send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        Err(RemoteError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn create(&self, collection: &str, document: Value) -> Result<String, RemoteError> {
        let response = self
            .send(self.client.post(self.collection_url(collection)).json(&document))
            .await?;

        let created: CreateResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))?;
        Ok(created.id)
    }

    async fn list(&self, collection: &str) -> Result<Vec<RemoteDocument>, RemoteError> {
        let response = self.send(self.client.get(self.collection_url(collection))).await?;

        response
            .json()
            .await
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))
    }

    async fn update(&self, collection: &str, id: &str, fields: Value) -> Result<(), RemoteError> {
        let request = self.client.patch(self.document_url(collection, id)).json(&fields);
        match self.send(request).await {
            Err(RemoteError::Status { status: 404, .. }) => Err(RemoteError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            }),
            other => other.map(|_| ()),
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError> {
        match self.send(self.client.delete(self.document_url(collection, id))).await {
            // Already gone is what we wanted.
            Err(RemoteError::Status { status: 404, .. }) => Ok(()),
            other => other.map(|_| ()),
        }
    }
}

fn map_reqwest_error(e: reqwest::Error) -> RemoteError {
    if e.is_timeout() {
        RemoteError::Timeout
    } else {
        RemoteError::Transport(e.to_string())
    }
}

fn normalize_base_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("http://{}", url)
    }
}

/// Returns true if the server answers its health endpoint.
pub async fn check_server(base_url: &str) -> bool {
    let client = match reqwest::Client::builder().timeout(HEALTH_TIMEOUT).build() {
        Ok(client) => client,
        Err(_) => return false,
    };

    let url = format!("{}/health", normalize_base_url(base_url));
    match client.get(&url).send().await {
        Ok(response) => response.status().is_success(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(url: &str) -> HttpRemoteStore {
        HttpRemoteStore::new(url, Some("test-key".to_string()), DEFAULT_TIMEOUT).unwrap()
    }

    #[test]
    fn test_collection_url() {
        let store = store("https://records.example.org");
        assert_eq!(
            store.collection_url("births"),
            "https://records.example.org/collections/births/documents"
        );
    }

    #[test]
    fn test_document_url() {
        let store = store("http://localhost:8080/");
        assert_eq!(
            store.document_url("pregnancies", "doc42"),
            "http://localhost:8080/collections/pregnancies/documents/doc42"
        );
    }

    #[test]
    fn test_document_url_escapes_id() {
        let store = store("http://localhost:8080");
        assert_eq!(
            store.document_url("births", "a/b?c#d"),
            "http://localhost:8080/collections/births/documents/a%2Fb%3Fc%23d"
        );
    }

    #[test]
    fn test_bare_host_gets_scheme() {
        let store = store("localhost:8080");
        assert_eq!(store.base_url(), "http://localhost:8080");
    }

    #[tokio::test]
    async fn test_check_server_unreachable() {
        // Port 9 (discard) is not expected to serve HTTP.
        assert!(!check_server("http://127.0.0.1:9").await);
    }
}
