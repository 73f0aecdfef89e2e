//! Error types for generation orchestration.

use std::time::Duration;

/// Maximum number of characters of a vendor error body kept in messages.
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Generic explanation used when a group fails without any member error.
pub const PARTIAL_FAILURE_MESSAGE: &str = "some generation tasks in the group failed";

/// Errors that can occur while orchestrating generation tasks.
#[derive(Debug, thiserror::Error)]
pub enum GenFlowError {
    /// Parameters failed validation; nothing was sent to the provider.
    #[error("invalid parameters: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// No model with this id is registered.
    #[error("unknown model: {0}")]
    ModelNotFound(String),

    /// API key missing or rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Provider returned a non-2xx response or an error payload.
    #[error("provider error [{code}]: {message}")]
    Provider {
        /// HTTP status, when the error came from a transport response.
        status: Option<u16>,
        /// Vendor error code (verbatim).
        code: String,
        /// Vendor error message (verbatim, sanitized).
        message: String,
    },

    /// Provider rejected the input or output on content-safety grounds.
    #[error("content policy violation [{code}]: {message}")]
    ContentPolicy {
        /// Vendor error code.
        code: String,
        /// Vendor error message.
        message: String,
    },

    /// Waiting for a task exceeded its wall-clock budget.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Some, but not all, members of a task group failed.
    #[error("{failed} of {total} tasks failed: {message}")]
    PartialGroupFailure {
        /// Number of failed members.
        failed: usize,
        /// Group size.
        total: usize,
        /// Most specific member error, or a generic explanation.
        message: String,
    },

    /// Provider answered with something this crate does not understand.
    #[error("unexpected provider response: {0}")]
    Protocol(String),

    /// Download or media-tool failure during video processing.
    #[error("media I/O failed: {0}")]
    MediaIo(String),

    /// No backend registered for the model's provider (feature disabled or not configured).
    #[error("provider not available: {0}")]
    ProviderNotAvailable(String),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GenFlowError {
    /// Builds a single-message validation error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Validation(vec![message.into()])
    }

    /// Builds a provider error, promoting it to [`GenFlowError::ContentPolicy`]
    /// when the vendor code or message marks a content-safety rejection.
    pub fn provider(
        status: Option<u16>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let code = code.into();
        let message = sanitize_error_message(&message.into());
        if is_content_policy(&code, &message) {
            return Self::ContentPolicy { code, message };
        }
        Self::Provider {
            status,
            code,
            message,
        }
    }

    /// Returns true for caller mistakes that will fail again if resubmitted unchanged.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::ModelNotFound(_))
    }

    /// Returns true if a fresh user-initiated submission may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Network(_) => true,
            Self::Provider {
                status: Some(status),
                ..
            } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Vendor error code, when one is known.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Provider { code, .. } | Self::ContentPolicy { code, .. } => Some(code),
            Self::Timeout(_) => Some("Timeout"),
            _ => None,
        }
    }

    /// Human-readable explanation suitable for showing to an end user.
    pub fn user_message(&self) -> String {
        match self {
            Self::ContentPolicy { message, .. } => format!(
                "The request or the generated result was rejected by the provider's content \
                 safety review. Please rephrase the prompt or use a different image. ({message})"
            ),
            Self::Timeout(budget) => format!(
                "Generation did not finish within {}s. The task may still complete on the \
                 provider side; please submit again.",
                budget.as_secs()
            ),
            Self::Validation(errors) => format!("Invalid parameters: {}", errors.join("; ")),
            Self::Provider { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Returns true if a vendor code/message pair denotes a content-safety rejection.
pub fn is_content_policy(code: &str, message: &str) -> bool {
    const CODE_PATTERNS: &[&str] = &[
        "datainspectionfailed",
        "sensitivecontent",
        "inputtextsensitive",
        "inputimagesensitive",
        "outputvideosensitive",
        "outputimagesensitive",
        "content_policy",
        "contentpolicy",
        "moderation_blocked",
        "content_filter",
    ];
    const MESSAGE_PATTERNS: &[&str] = &[
        "inappropriate content",
        "content policy",
        "data inspection",
        "sensitive content",
        "safety system",
    ];

    let code = code.to_lowercase().replace(['.', '-'], "");
    if CODE_PATTERNS.iter().any(|p| code.contains(p)) {
        return true;
    }
    let message = message.to_lowercase();
    MESSAGE_PATTERNS.iter().any(|p| message.contains(p))
}

/// Trims oversized vendor error bodies and masks bearer tokens.
pub fn sanitize_error_message(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len().min(MAX_ERROR_MESSAGE_LEN));
    let mut words = text.split_whitespace().peekable();
    while let Some(word) = words.next() {
        if !cleaned.is_empty() {
            cleaned.push(' ');
        }
        if word.eq_ignore_ascii_case("bearer") && words.peek().is_some() {
            cleaned.push_str(word);
            cleaned.push_str(" ***");
            words.next();
            continue;
        }
        if word.starts_with("sk-") {
            cleaned.push_str("sk-***");
            continue;
        }
        cleaned.push_str(word);
    }

    if cleaned.chars().count() > MAX_ERROR_MESSAGE_LEN {
        let truncated: String = cleaned.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
        return format!("{truncated}...");
    }
    cleaned
}

/// Result type alias for orchestration operations.
pub type Result<T> = std::result::Result<T, GenFlowError>;
