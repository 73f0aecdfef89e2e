//! Blocking backend for OpenAI-compatible chat and image endpoints.
//!
//! Serves OpenAI itself as well as the compatible endpoints of DashScope
//! (text) and Ark (images). The submission response already holds the result.

use crate::error::{GenFlowError, Result};
use crate::registry::{ProviderKind, SubmissionStyle};
use crate::request::ProviderRequest;
use crate::task::backend::TaskBackend;
use crate::task::backends::error_from_response;
use crate::task::types::{TaskHandle, TaskSnapshot};
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DASHSCOPE_COMPAT_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";
const ARK_BASE_URL: &str = "https://ark.cn-beijing.volces.com/api/v3";

/// Builder for [`OpenAiBackend`].
#[derive(Debug, Clone)]
pub struct OpenAiBackendBuilder {
    provider: ProviderKind,
    api_key: Option<String>,
    base_url: Option<String>,
    client: Option<reqwest::Client>,
}

impl Default for OpenAiBackendBuilder {
    fn default() -> Self {
        Self {
            provider: ProviderKind::OpenAi,
            api_key: None,
            base_url: None,
            client: None,
        }
    }
}

impl OpenAiBackendBuilder {
    /// Creates a builder for OpenAI itself.
    pub fn new() -> Self {
        Self::default()
    }

    /// Vendor behind the compatible endpoint. Selects the env vars and default
    /// base URL used by [`build`](Self::build).
    pub fn provider(mut self, provider: ProviderKind) -> Self {
        self.provider = provider;
        self
    }

    /// Sets the API key. Falls back to the vendor's key env var
    /// (`OPENAI_API_KEY`, `DASHSCOPE_API_KEY` or `ARK_API_KEY`).
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL. Falls back to `OPENAI_BASE_URL`,
    /// `DASHSCOPE_COMPAT_BASE_URL` or `ARK_BASE_URL`.
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
    pub fn build(self) -> Result<OpenAiBackend> {
        let (key_var, url_var, default_url) = match self.provider {
            ProviderKind::OpenAi => ("OPENAI_API_KEY", "OPENAI_BASE_URL", OPENAI_BASE_URL),
            ProviderKind::DashScope => (
                "DASHSCOPE_API_KEY",
                "DASHSCOPE_COMPAT_BASE_URL",
                DASHSCOPE_COMPAT_BASE_URL,
            ),
            ProviderKind::Ark => ("ARK_API_KEY", "ARK_BASE_URL", ARK_BASE_URL),
        };

        let api_key = self
            .api_key
            .or_else(|| std::env::var(key_var).ok())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| GenFlowError::Auth(format!("{key_var} not set and no API key provided")))?;
        let base_url = self
            .base_url
            .or_else(|| std::env::var(url_var).ok())
            .unwrap_or_else(|| default_url.to_string());

        Ok(OpenAiBackend {
            client: self.client.unwrap_or_default(),
            provider: self.provider,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

/// Blocking chat/image backend.
#[derive(Debug)]
pub struct OpenAiBackend {
    client: reqwest::Client,
    provider: ProviderKind,
    api_key: String,
    base_url: String,
}

impl OpenAiBackend {
    /// Creates a new [`OpenAiBackendBuilder`].
    pub fn builder() -> OpenAiBackendBuilder {
        OpenAiBackendBuilder::new()
    }
}

#[async_trait]
impl TaskBackend for OpenAiBackend {
    fn provider(&self) -> ProviderKind {
        self.provider
    }

    fn style(&self) -> SubmissionStyle {
        SubmissionStyle::Blocking
    }

    async fn submit(&self, request: &ProviderRequest) -> Result<TaskHandle> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, request.endpoint))
            .bearer_auth(&self.api_key)
            .json(&request.body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(error_from_response(status.as_u16(), &text));
        }

        let (task_id, outcome) = if request.endpoint.ends_with("/chat/completions") {
            parse_chat_response(&text)?
        } else {
            parse_images_response(&text)?
        };
        let task_id = task_id.unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());

        tracing::info!(
            task_id = %task_id,
            model = %request.model,
            status = %outcome.status,
            "{} request completed",
            self.provider
        );
        Ok(TaskHandle::remote(task_id, &request.model, self.provider, SubmissionStyle::Blocking)
            .finished(outcome))
    }

    async fn poll(&self, handle: &TaskHandle) -> Result<TaskSnapshot> {
        handle.outcome.clone().ok_or_else(|| {
            GenFlowError::Protocol(format!(
                "blocking task {} has no recorded outcome",
                handle.task_id
            ))
        })
    }
}

fn parse_chat_response(text: &str) -> Result<(Option<String>, TaskSnapshot)> {
    let response: ChatResponse = serde_json::from_str(text)?;
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| GenFlowError::Protocol("chat response has no choices".into()))?;

    let snapshot = if choice.finish_reason.as_deref() == Some("content_filter") {
        TaskSnapshot::failed(
            Some("content_filter".into()),
            "completion was stopped by the provider's content filter",
        )
    } else {
        TaskSnapshot::succeeded_text(choice.message.content.unwrap_or_default())
    };
    Ok((response.id, snapshot))
}

fn parse_images_response(text: &str) -> Result<(Option<String>, TaskSnapshot)> {
    let response: ImagesResponse = serde_json::from_str(text)?;
    if let Some(error) = response.error {
        return Ok((
            None,
            TaskSnapshot::failed(error.code, error.message.unwrap_or_default()),
        ));
    }

    let urls: Vec<String> = response
        .data
        .into_iter()
        .filter_map(|item| match (item.url, item.b64_json) {
            (Some(url), _) => Some(url),
            (None, Some(b64)) => Some(to_data_url(&b64)),
            (None, None) => None,
        })
        .collect();
    if urls.is_empty() {
        return Err(GenFlowError::Protocol("image response has no data".into()));
    }
    Ok((None, TaskSnapshot::succeeded(urls)))
}

/// Wraps inline base64 image data as a `data:` URL, sniffing the format.
fn to_data_url(b64: &str) -> String {
    let head = base64::engine::general_purpose::STANDARD
        .decode(b64.get(..16).unwrap_or(b64))
        .unwrap_or_default();
    let mime = if head.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if head.starts_with(b"RIFF") {
        "image/webp"
    } else {
        "image/png"
    };
    format!("data:{mime};base64,{b64}")
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageData>,
    #[serde(default)]
    error: Option<ImageError>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    b64_json: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}
