//! Volcengine Ark content-generation tasks, driven by an SDK-style client.
//!
//! [`ArkClient`] mirrors what the vendor SDK offers: create a task, fetch a
//! task, and wait for a task with its own polling loop. [`ArkBackend`] starts
//! that loop on submission and reads its latest observation when polled, so
//! the cadence of remote requests is owned by the client, not the engine.

use crate::error::{GenFlowError, Result};
use crate::registry::{ProviderKind, SubmissionStyle};
use crate::request::ProviderRequest;
use crate::task::backend::TaskBackend;
use crate::task::backends::error_from_response;
use crate::task::status::TaskStatus;
use crate::task::types::{TaskHandle, TaskSnapshot};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;

const DEFAULT_BASE_URL: &str = "https://ark.cn-beijing.volces.com/api/v3";
const TASKS_PATH: &str = "/contents/generations/tasks";

/// Consecutive fetch failures tolerated by the client's wait loop.
const MAX_CONSECUTIVE_ERRORS: u32 = 3;

/// Remote task record returned by `GET /contents/generations/tasks/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArkTask {
    /// Task id.
    pub id: String,
    /// Model the task runs on.
    #[serde(default)]
    pub model: Option<String>,
    /// Vendor status string.
    pub status: String,
    /// Output, once succeeded.
    #[serde(default)]
    pub content: Option<ArkContent>,
    /// Failure details.
    #[serde(default)]
    pub error: Option<ArkError>,
    /// Seed actually used.
    #[serde(default)]
    pub seed: Option<i64>,
}

/// Output section of an [`ArkTask`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArkContent {
    /// Generated video, valid for a limited time.
    #[serde(default)]
    pub video_url: Option<String>,
}

/// Error section of an [`ArkTask`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArkError {
    /// Vendor error code.
    #[serde(default)]
    pub code: Option<String>,
    /// Vendor error message.
    #[serde(default)]
    pub message: Option<String>,
}

impl ArkTask {
    /// Canonical view of this task.
    pub fn snapshot(&self) -> Result<TaskSnapshot> {
        match TaskStatus::from_vendor(&self.status)? {
            TaskStatus::Succeeded => {
                let url = self
                    .content
                    .as_ref()
                    .and_then(|c| c.video_url.clone())
                    .ok_or_else(|| {
                        GenFlowError::Protocol(format!(
                            "Ark task {} succeeded without a video_url",
                            self.id
                        ))
                    })?;
                Ok(TaskSnapshot::succeeded(vec![url]))
            }
            TaskStatus::Failed => {
                let (code, message) = self
                    .error
                    .clone()
                    .map(|e| (e.code, e.message.unwrap_or_default()))
                    .unwrap_or_else(|| (None, format!("task {}", self.status)));
                Ok(TaskSnapshot::failed(code, message))
            }
            other => Ok(TaskSnapshot::with_status(other)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateTaskResponse {
    id: String,
}

/// Minimal Ark task client.
#[derive(Debug, Clone)]
pub struct ArkClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl ArkClient {
    /// Client for `base_url` (trailing `/` ignored).
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Creates a task and returns its id.
    pub async fn create_task(&self, body: &serde_json::Value) -> Result<String> {
        let response = self
            .client
            .post(format!("{}{TASKS_PATH}", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(error_from_response(status.as_u16(), &text));
        }
        let created: CreateTaskResponse = serde_json::from_str(&text)?;
        Ok(created.id)
    }

    /// Fetches a task record.
    pub async fn get_task(&self, task_id: &str) -> Result<ArkTask> {
        let response = self
            .client
            .get(format!("{}{TASKS_PATH}/{task_id}", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(error_from_response(status.as_u16(), &text));
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Polls a task until it is terminal, publishing every observation.
    ///
    /// Stops early when nobody listens any more or `max_wait` elapses; the
    /// last published snapshot is then whatever was observed last.
    pub async fn wait_task(
        &self,
        task_id: &str,
        interval: Duration,
        max_wait: Duration,
        updates: watch::Sender<TaskSnapshot>,
    ) {
        let start = Instant::now();
        let mut errors = 0;

        loop {
            match self.get_task(task_id).await.and_then(|task| task.snapshot()) {
                Ok(snapshot) => {
                    errors = 0;
                    let terminal = snapshot.status.is_terminal();
                    tracing::debug!(
                        task_id = %task_id,
                        status = %snapshot.status,
                        elapsed_secs = start.elapsed().as_secs(),
                        "Ark task update"
                    );
                    if updates.send(snapshot).is_err() || terminal {
                        return;
                    }
                }
                Err(e) if e.is_retryable() && errors + 1 < MAX_CONSECUTIVE_ERRORS => {
                    errors += 1;
                    tracing::warn!(task_id = %task_id, attempt = errors, "Ark task fetch failed: {e}");
                }
                Err(e) => {
                    let _ = updates.send(TaskSnapshot::failed(
                        e.code().map(str::to_string),
                        e.to_string(),
                    ));
                    return;
                }
            }

            if start.elapsed() >= max_wait {
                tracing::warn!(task_id = %task_id, "Ark wait loop gave up after {max_wait:?}");
                return;
            }
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = updates.closed() => return,
            }
        }
    }
}

/// Builder for [`ArkBackend`].
#[derive(Debug, Clone)]
pub struct ArkBackendBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    poll_interval: Duration,
    max_wait: Duration,
}

impl Default for ArkBackendBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            poll_interval: Duration::from_secs(10),
            max_wait: Duration::from_secs(1800),
        }
    }
}

impl ArkBackendBuilder {
    /// Creates a builder with default intervals.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `ARK_API_KEY` env var.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the API base URL. Falls back to `ARK_BASE_URL`.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the interval of the client's own polling loop.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets how long the client keeps polling one task.
    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Builds the backend. Fails with `Auth` if no key is configured.
    pub fn build(self) -> Result<ArkBackend> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var("ARK_API_KEY").ok())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| GenFlowError::Auth("ARK_API_KEY not set and no API key provided".into()))?;
        let base_url = self
            .base_url
            .or_else(|| std::env::var("ARK_BASE_URL").ok())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(ArkBackend {
            client: ArkClient::new(api_key, base_url),
            poll_interval: self.poll_interval,
            max_wait: self.max_wait,
            watchers: Arc::new(Mutex::new(HashMap::new())),
        })
    }
}

/// Sdk-managed-poll backend for Ark video generation.
#[derive(Debug)]
pub struct ArkBackend {
    client: ArkClient,
    poll_interval: Duration,
    max_wait: Duration,
    watchers: Arc<Mutex<HashMap<String, watch::Receiver<TaskSnapshot>>>>,
}

impl ArkBackend {
    /// Creates a new [`ArkBackendBuilder`].
    pub fn builder() -> ArkBackendBuilder {
        ArkBackendBuilder::new()
    }

    /// Underlying task client.
    pub fn client(&self) -> &ArkClient {
        &self.client
    }

    fn watcher(&self, task_id: &str) -> Option<watch::Receiver<TaskSnapshot>> {
        self.watchers
            .lock()
            .ok()
            .and_then(|w| w.get(task_id).cloned())
    }

    /// Starts the client's wait loop for `task_id`. The loop drops its
    /// watcher entry when it exits, terminal or not.
    fn watch(&self, task_id: &str) -> tokio::task::JoinHandle<()> {
        let (tx, rx) = watch::channel(TaskSnapshot::pending());
        if let Ok(mut watchers) = self.watchers.lock() {
            watchers.insert(task_id.to_string(), rx);
        }

        let client = self.client.clone();
        let watchers = Arc::clone(&self.watchers);
        let (interval, max_wait) = (self.poll_interval, self.max_wait);
        let id = task_id.to_string();
        tokio::spawn(async move {
            client.wait_task(&id, interval, max_wait, tx).await;
            if let Ok(mut watchers) = watchers.lock() {
                watchers.remove(&id);
            }
        })
    }

    fn forget(&self, task_id: &str) {
        if let Ok(mut watchers) = self.watchers.lock() {
            watchers.remove(task_id);
        }
    }
}

#[async_trait]
impl TaskBackend for ArkBackend {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Ark
    }

    fn style(&self) -> SubmissionStyle {
        SubmissionStyle::SdkManagedPoll
    }

    async fn submit(&self, request: &ProviderRequest) -> Result<TaskHandle> {
        let task_id = self.client.create_task(&request.body).await?;
        tracing::info!(task_id = %task_id, model = %request.model, "submitted Ark task");

        self.watch(&task_id);

        Ok(TaskHandle::remote(
            task_id,
            &request.model,
            ProviderKind::Ark,
            SubmissionStyle::SdkManagedPoll,
        ))
    }

    async fn poll(&self, handle: &TaskHandle) -> Result<TaskSnapshot> {
        let latest = self.watcher(&handle.task_id).and_then(|rx| {
            let snapshot = rx.borrow().clone();
            // a finished wait loop publishes nothing more
            let stale = !snapshot.status.is_terminal() && rx.has_changed().is_err();
            (!stale).then_some(snapshot)
        });
        let snapshot = match latest {
            Some(snapshot) => snapshot,
            // not watched by this backend instance: ask the API directly
            None => {
                self.forget(&handle.task_id);
                self.client.get_task(&handle.task_id).await?.snapshot()?
            }
        };
        if snapshot.status.is_terminal() {
            self.forget(&handle.task_id);
        }
        Ok(snapshot)
    }
}
