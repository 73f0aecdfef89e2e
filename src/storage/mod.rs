//! Persistence handoff: best-effort promotion of ephemeral provider URLs
//! into durable storage.
//!
//! [`Persistence::persist`] never fails. With storage disabled it returns its
//! input unchanged; on any download or upload error it logs and falls back to
//! the ephemeral URL.

mod http;
mod local;

pub use http::HttpObjectStore;
pub use local::LocalObjectStore;

use crate::error::{GenFlowError, Result};
use crate::registry::Category;
use crate::transfer::{redact_query, Downloader, HttpDownloader};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;

/// Durable object storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `bytes` under `key` and returns the public URL.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: Option<&str>) -> Result<String>;
}

/// Where an artifact came from, used to build its storage key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistContext {
    /// Category of the generating model.
    pub category: Category,
    /// Project the artifact belongs to, if any.
    pub project: Option<String>,
}

impl PersistContext {
    /// Context without a project.
    pub fn new(category: Category) -> Self {
        Self {
            category,
            project: None,
        }
    }

    /// Sets the project.
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }
}

/// Storage selection, usually read from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StorageConfig {
    /// Persistence is a pass-through.
    #[default]
    Disabled,
    /// Files under `dir`, served from `public_url`.
    Local {
        /// Root directory.
        dir: PathBuf,
        /// URL prefix the directory is served from.
        public_url: String,
    },
    /// HTTP `PUT {endpoint}/{key}`.
    Http {
        /// Base URL objects are uploaded to.
        endpoint: String,
        /// Bearer token, if the store needs one.
        token: Option<String>,
        /// Public URL prefix; defaults to the endpoint.
        public_url: Option<String>,
    },
}

impl StorageConfig {
    /// Reads `GENFLOW_STORAGE` (`none`, `local` or `http`) and the variables
    /// of the selected store.
    pub fn from_env() -> Result<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        let required = |name: &str| {
            var(name).ok_or_else(|| GenFlowError::invalid(format!("{name} must be set")))
        };

        match var("GENFLOW_STORAGE").as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("none") | Some("off") => Ok(Self::Disabled),
            Some("local") => Ok(Self::Local {
                dir: PathBuf::from(required("GENFLOW_STORAGE_DIR")?),
                public_url: required("GENFLOW_STORAGE_PUBLIC_URL")?,
            }),
            Some("http") => Ok(Self::Http {
                endpoint: required("GENFLOW_STORAGE_ENDPOINT")?,
                token: var("GENFLOW_STORAGE_TOKEN"),
                public_url: var("GENFLOW_STORAGE_PUBLIC_URL"),
            }),
            Some(other) => Err(GenFlowError::invalid(format!(
                "GENFLOW_STORAGE must be none, local or http, got `{other}`"
            ))),
        }
    }

    /// Instantiates the configured store.
    pub fn into_store(self) -> Option<Arc<dyn ObjectStore>> {
        match self {
            Self::Disabled => None,
            Self::Local { dir, public_url } => {
                Some(Arc::new(LocalObjectStore::new(dir, public_url)))
            }
            Self::Http {
                endpoint,
                token,
                public_url,
            } => {
                let mut store = HttpObjectStore::new(endpoint);
                if let Some(token) = token {
                    store = store.with_token(token);
                }
                if let Some(public_url) = public_url {
                    store = store.with_public_url(public_url);
                }
                Some(Arc::new(store))
            }
        }
    }
}

/// Best-effort durable storage of generated artifacts.
#[derive(Clone)]
pub struct Persistence {
    store: Option<Arc<dyn ObjectStore>>,
    downloader: Arc<dyn Downloader>,
}

impl Persistence {
    /// Persistence with an optional store; `None` disables it.
    pub fn new(store: Option<Arc<dyn ObjectStore>>, downloader: Arc<dyn Downloader>) -> Self {
        Self { store, downloader }
    }

    /// Pass-through persistence.
    pub fn disabled() -> Self {
        Self::new(None, Arc::new(HttpDownloader::new()))
    }

    /// Builds the configured store with an HTTP downloader.
    pub fn from_config(config: StorageConfig) -> Self {
        Self::new(config.into_store(), Arc::new(HttpDownloader::new()))
    }

    /// Returns true if a store is configured.
    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Returns a durable URL for `url`, or `url` itself when storage is
    /// disabled or the handoff fails.
    pub async fn persist(&self, url: &str, context: &PersistContext) -> String {
        let Some(store) = &self.store else {
            return url.to_string();
        };

        match self.try_persist(store.as_ref(), url, context).await {
            Ok(durable) => {
                tracing::info!(
                    source = %redact_query(url),
                    url = %durable,
                    "persisted artifact"
                );
                durable
            }
            Err(e) => {
                tracing::warn!(
                    source = %redact_query(url),
                    "artifact persistence failed, keeping provider URL: {e}"
                );
                url.to_string()
            }
        }
    }

    async fn try_persist(
        &self,
        store: &dyn ObjectStore,
        url: &str,
        context: &PersistContext,
    ) -> Result<String> {
        let fetched = self.downloader.fetch(url).await?;
        let extension = extension_for(fetched.content_type.as_deref(), url);
        let key = object_key(context, Utc::now(), extension);
        store
            .put(&key, fetched.bytes, fetched.content_type.as_deref())
            .await
    }
}

impl std::fmt::Debug for Persistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persistence")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// `{category}/{project}/{YYYYMMDD}/{random}.{ext}`.
pub fn object_key(context: &PersistContext, now: DateTime<Utc>, extension: &str) -> String {
    let project = context
        .project
        .as_deref()
        .map(sanitize_segment)
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| "default".to_string());
    format!(
        "{}/{}/{}/{}.{}",
        context.category,
        project,
        now.format("%Y%m%d"),
        uuid::Uuid::new_v4().simple(),
        extension
    )
}

fn sanitize_segment(segment: &str) -> String {
    segment
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .collect()
}

/// File extension from the content type, else from the URL path.
fn extension_for(content_type: Option<&str>, url: &str) -> &'static str {
    let by_mime = match content_type {
        Some("video/mp4") => Some("mp4"),
        Some("video/quicktime") => Some("mov"),
        Some("video/webm") => Some("webm"),
        Some("image/png") => Some("png"),
        Some("image/jpeg") | Some("image/jpg") => Some("jpg"),
        Some("image/webp") => Some("webp"),
        Some("audio/mpeg") => Some("mp3"),
        Some("audio/wav") | Some("audio/x-wav") => Some("wav"),
        _ => None,
    };
    if let Some(ext) = by_mime {
        return ext;
    }

    let path = redact_query(url);
    let ext = path
        .rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("mp4") => "mp4",
        Some("mov") => "mov",
        Some("webm") => "webm",
        Some("png") => "png",
        Some("jpg") | Some("jpeg") => "jpg",
        Some("webp") => "webp",
        Some("mp3") => "mp3",
        Some("wav") => "wav",
        _ => "bin",
    }
}
