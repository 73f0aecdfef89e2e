//! Backend implementations, one per submission style family.

#[cfg(feature = "ark")]
mod ark;
#[cfg(feature = "dashscope")]
mod dashscope;
#[cfg(feature = "openai")]
mod openai;

#[cfg(feature = "ark")]
pub use ark::{ArkBackend, ArkBackendBuilder, ArkClient, ArkTask};

#[cfg(feature = "dashscope")]
pub use dashscope::{DashScopeBackend, DashScopeBackendBuilder};

#[cfg(feature = "openai")]
pub use openai::{OpenAiBackend, OpenAiBackendBuilder};

#[cfg(feature = "openai")]
use crate::error::GenFlowError;
#[cfg(feature = "openai")]
use serde::Deserialize;

/// Error body shapes used by the supported vendors.
#[cfg(feature = "openai")]
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    /// DashScope: top-level `code`/`message`.
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    /// OpenAI and Ark: nested `error` object.
    #[serde(default)]
    error: Option<NestedError>,
}

#[cfg(feature = "openai")]
#[derive(Debug, Default, Deserialize)]
struct NestedError {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Maps a non-2xx vendor response to an error, keeping the vendor's code
/// and message verbatim.
#[cfg(feature = "openai")]
pub(crate) fn error_from_response(status: u16, text: &str) -> GenFlowError {
    let body: ErrorBody = serde_json::from_str(text).unwrap_or_default();

    let (code, message) = match body.error {
        Some(nested) => {
            let code = match nested.code {
                Some(serde_json::Value::String(s)) => Some(s),
                Some(serde_json::Value::Null) | None => nested.kind,
                Some(other) => Some(other.to_string()),
            };
            (code, nested.message)
        }
        None => (body.code, body.message),
    };
    let code = code
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| status.to_string());
    let message = message
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| text.to_string());

    if status == 401 || status == 403 {
        return GenFlowError::Auth(crate::error::sanitize_error_message(&format!(
            "[{code}] {message}"
        )));
    }
    GenFlowError::provider(Some(status), code, message)
}
