//! DashScope asynchronous task API (submit, then poll `/tasks/{id}`).

use crate::error::{GenFlowError, Result};
use crate::registry::{ProviderKind, SubmissionStyle};
use crate::request::ProviderRequest;
use crate::task::backend::TaskBackend;
use crate::task::backends::error_from_response;
use crate::task::status::TaskStatus;
use crate::task::types::{TaskHandle, TaskSnapshot};
use async_trait::async_trait;
use serde::Deserialize;

const DEFAULT_BASE_URL: &str = "https://dashscope.aliyuncs.com/api/v1";

/// Builder for [`DashScopeBackend`].
#[derive(Debug, Clone, Default)]
pub struct DashScopeBackendBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    client: Option<reqwest::Client>,
}

impl DashScopeBackendBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `DASHSCOPE_API_KEY` env var.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the API base URL. Falls back to `DASHSCOPE_BASE_URL`, then the
    /// public Beijing endpoint.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Uses a preconfigured HTTP client.
    pub fn client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Builds the backend. Fails with `Auth` if no key is configured.
    pub fn build(self) -> Result<DashScopeBackend> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var("DASHSCOPE_API_KEY").ok())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                GenFlowError::Auth("DASHSCOPE_API_KEY not set and no API key provided".into())
            })?;
        let base_url = self
            .base_url
            .or_else(|| std::env::var("DASHSCOPE_BASE_URL").ok())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(DashScopeBackend {
            client: self.client.unwrap_or_default(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

/// Async-http-poll backend for DashScope image and video synthesis.
#[derive(Debug)]
pub struct DashScopeBackend {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl DashScopeBackend {
    /// Creates a new [`DashScopeBackendBuilder`].
    pub fn builder() -> DashScopeBackendBuilder {
        DashScopeBackendBuilder::new()
    }
}

#[async_trait]
impl TaskBackend for DashScopeBackend {
    fn provider(&self) -> ProviderKind {
        ProviderKind::DashScope
    }

    fn style(&self) -> SubmissionStyle {
        SubmissionStyle::AsyncHttpPoll
    }

    async fn submit(&self, request: &ProviderRequest) -> Result<TaskHandle> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, request.endpoint))
            .bearer_auth(&self.api_key)
            .header("X-DashScope-Async", "enable")
            .json(&request.body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(error_from_response(status.as_u16(), &text));
        }

        let task_id = parse_submit_response(&text)?;
        tracing::info!(task_id = %task_id, model = %request.model, "submitted DashScope task");
        Ok(TaskHandle::remote(
            task_id,
            &request.model,
            ProviderKind::DashScope,
            SubmissionStyle::AsyncHttpPoll,
        ))
    }

    async fn poll(&self, handle: &TaskHandle) -> Result<TaskSnapshot> {
        let response = self
            .client
            .get(format!("{}/tasks/{}", self.base_url, handle.task_id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(error_from_response(status.as_u16(), &text));
        }

        let snapshot = parse_task_response(&text)?;
        tracing::debug!(
            task_id = %handle.task_id,
            status = %snapshot.status,
            "polled DashScope task"
        );
        Ok(snapshot)
    }
}

fn parse_submit_response(text: &str) -> Result<String> {
    let response: DashScopeResponse = serde_json::from_str(text)?;
    if let Some(code) = response.code.filter(|c| !c.is_empty()) {
        return Err(GenFlowError::provider(
            None,
            code,
            response.message.unwrap_or_default(),
        ));
    }
    response
        .output
        .and_then(|o| o.task_id)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| GenFlowError::Protocol("DashScope submit response has no task_id".into()))
}

/// Converts a `/tasks/{id}` body into a canonical snapshot.
fn parse_task_response(text: &str) -> Result<TaskSnapshot> {
    let response: DashScopeResponse = serde_json::from_str(text)?;
    let output = response
        .output
        .ok_or_else(|| GenFlowError::Protocol("DashScope task response has no output".into()))?;
    let status_text = output.task_status.as_deref().ok_or_else(|| {
        GenFlowError::Protocol("DashScope task response has no task_status".into())
    })?;

    match TaskStatus::from_vendor(status_text)? {
        TaskStatus::Succeeded => {
            let mut urls: Vec<String> = output.video_url.into_iter().collect();
            urls.extend(output.results.iter().filter_map(|r| r.url.clone()));
            if urls.is_empty() {
                // every image of the batch was rejected individually
                if let Some(rejected) = output.results.iter().find(|r| r.code.is_some()) {
                    return Ok(TaskSnapshot::failed(
                        rejected.code.clone(),
                        rejected.message.clone().unwrap_or_default(),
                    ));
                }
                return Err(GenFlowError::Protocol(
                    "DashScope task succeeded without a result URL".into(),
                ));
            }
            Ok(TaskSnapshot::succeeded(urls))
        }
        TaskStatus::Failed => Ok(TaskSnapshot::failed(
            output.code.or(response.code),
            output
                .message
                .or(response.message)
                .map(|m| crate::error::sanitize_error_message(&m))
                .unwrap_or_default(),
        )),
        other => Ok(TaskSnapshot::with_status(other)),
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct DashScopeResponse {
    #[serde(default)]
    output: Option<DashScopeOutput>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DashScopeOutput {
    #[serde(default)]
    task_id: Option<String>,
    #[serde(default)]
    task_status: Option<String>,
    #[serde(default)]
    video_url: Option<String>,
    #[serde(default)]
    results: Vec<DashScopeResult>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DashScopeResult {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}
