//! Artifact download: HTTP(S) and inline `data:` URLs.

use crate::error::{GenFlowError, Result};
use async_trait::async_trait;
use base64::Engine;
use std::path::Path;

/// Downloaded artifact bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    /// Body.
    pub bytes: Vec<u8>,
    /// MIME type reported by the source, without parameters.
    pub content_type: Option<String>,
}

/// Fetches artifacts by URL.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Downloads the resource into memory.
    async fn fetch(&self, url: &str) -> Result<Fetched>;

    /// Downloads the resource to `path`, returning the number of bytes written.
    async fn fetch_to(&self, url: &str, path: &Path) -> Result<u64> {
        let fetched = self.fetch(url).await?;
        tokio::fs::write(path, &fetched.bytes).await?;
        Ok(fetched.bytes.len() as u64)
    }
}

/// [`Downloader`] backed by `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct HttpDownloader {
    client: reqwest::Client,
}

impl HttpDownloader {
    /// Downloader with a default client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Downloader using `client`.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn fetch(&self, url: &str) -> Result<Fetched> {
        if url.starts_with("data:") {
            return decode_data_url(url);
        }

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GenFlowError::MediaIo(format!(
                "download of {} failed with HTTP {}",
                redact_query(url),
                status.as_u16()
            )));
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(mime_essence);
        let bytes = response.bytes().await?.to_vec();
        tracing::debug!(url = %redact_query(url), bytes = bytes.len(), "downloaded artifact");

        Ok(Fetched {
            bytes,
            content_type,
        })
    }
}

/// Decodes a base64 `data:` URL.
pub fn decode_data_url(url: &str) -> Result<Fetched> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| GenFlowError::MediaIo("not a data URL".into()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| GenFlowError::MediaIo("data URL has no payload".into()))?;
    let Some(mime) = meta.strip_suffix(";base64") else {
        return Err(GenFlowError::MediaIo(
            "only base64 data URLs are supported".into(),
        ));
    };

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| GenFlowError::MediaIo(format!("invalid base64 in data URL: {e}")))?;
    Ok(Fetched {
        bytes,
        content_type: (!mime.is_empty()).then(|| mime_essence(mime)),
    })
}

/// Strips the query string, which for provider artifacts carries signatures.
pub(crate) fn redact_query(url: &str) -> &str {
    if url.starts_with("data:") {
        return "data:...";
    }
    url.split_once('?').map_or(url, |(base, _)| base)
}

fn mime_essence(value: &str) -> String {
    value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_data_url() {
        let fetched = decode_data_url("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(fetched.bytes, b"hello");
        assert_eq!(fetched.content_type.as_deref(), Some("image/png"));
    }

    #[test]
    fn test_decode_rejects_plain_data_url() {
        assert!(decode_data_url("data:text/plain,hello").is_err());
        assert!(decode_data_url("data:image/png;base64").is_err());
        assert!(decode_data_url("data:image/png;base64,!!!").is_err());
    }

    #[test]
    fn test_redact_query() {
        assert_eq!(
            redact_query("https://oss.example.com/a.mp4?Expires=1&Signature=abc"),
            "https://oss.example.com/a.mp4"
        );
        assert_eq!(redact_query("https://x/y.png"), "https://x/y.png");
        assert_eq!(redact_query("data:image/png;base64,AAAA"), "data:...");
    }

    #[test]
    fn test_mime_essence() {
        assert_eq!(mime_essence("Video/MP4; charset=binary"), "video/mp4");
    }

    #[tokio::test]
    async fn test_fetch_to_writes_data_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        let written = HttpDownloader::new()
            .fetch_to("data:application/octet-stream;base64,AAEC", &path)
            .await
            .unwrap();
        assert_eq!(written, 3);
        assert_eq!(std::fs::read(&path).unwrap(), vec![0, 1, 2]);
    }
}
