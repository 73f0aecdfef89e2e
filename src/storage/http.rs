//! HTTP `PUT` object store (S3 presigned buckets, MinIO, WebDAV and similar).

use crate::error::{GenFlowError, Result};
use crate::storage::ObjectStore;
use async_trait::async_trait;

/// Uploads objects with `PUT {endpoint}/{key}`.
#[derive(Debug, Clone)]
pub struct HttpObjectStore {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    public_url: Option<String>,
}

impl HttpObjectStore {
    /// Store writing to `{endpoint}/{key}`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token: None,
            public_url: None,
        }
    }

    /// Sends `Authorization: Bearer {token}` with every upload.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Base of returned URLs, when objects are served from a different host
    /// than the upload endpoint (a CDN, for instance).
    pub fn with_public_url(mut self, url: impl Into<String>) -> Self {
        self.public_url = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    /// Public URL of a stored key.
    pub fn url_for(&self, key: &str) -> String {
        format!(
            "{}/{key}",
            self.public_url.as_deref().unwrap_or(&self.endpoint)
        )
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: Option<&str>) -> Result<String> {
        let mut request = self
            .client
            .put(format!("{}/{key}", self.endpoint))
            .header(
                reqwest::header::CONTENT_TYPE,
                content_type.unwrap_or("application/octet-stream"),
            )
            .body(bytes);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GenFlowError::provider(
                Some(status.as_u16()),
                status.as_u16().to_string(),
                format!("upload of {key} rejected: {text}"),
            ));
        }
        Ok(self.url_for(key))
    }
}
