//! Submission adapter seam: one implementation per backend family.

use crate::error::{GenFlowError, Result};
use crate::registry::{ProviderKind, SubmissionStyle};
use crate::request::ProviderRequest;
use crate::task::types::{TaskHandle, TaskSnapshot};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// A provider endpoint family that can run generation tasks.
///
/// `submit` never blocks on job completion for polling styles; blocking
/// backends return a handle whose outcome is already terminal.
#[async_trait]
pub trait TaskBackend: Send + Sync {
    /// Vendor this backend talks to.
    fn provider(&self) -> ProviderKind;

    /// Submission style this backend implements.
    fn style(&self) -> SubmissionStyle;

    /// Submits one request. Non-2xx responses fail immediately, without retry.
    async fn submit(&self, request: &ProviderRequest) -> Result<TaskHandle>;

    /// Fetches the current state of a submitted task.
    async fn poll(&self, handle: &TaskHandle) -> Result<TaskSnapshot>;
}

/// Backends keyed by provider and submission style.
#[derive(Clone, Default)]
pub struct BackendSet {
    backends: HashMap<(ProviderKind, SubmissionStyle), Arc<dyn TaskBackend>>,
}

impl BackendSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a backend, replacing any previous one for the same key.
    pub fn with(mut self, backend: Arc<dyn TaskBackend>) -> Self {
        self.insert(backend);
        self
    }

    /// Registers a backend, replacing one with the same provider and style.
    pub fn insert(&mut self, backend: Arc<dyn TaskBackend>) {
        self.backends
            .insert((backend.provider(), backend.style()), backend);
    }

    /// Looks up the backend serving a provider/style pair.
    pub fn get(
        &self,
        provider: ProviderKind,
        style: SubmissionStyle,
    ) -> Result<&Arc<dyn TaskBackend>> {
        self.backends.get(&(provider, style)).ok_or_else(|| {
            GenFlowError::ProviderNotAvailable(format!(
                "no {style} backend configured for {provider}"
            ))
        })
    }

    /// Number of registered backends.
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Builds every backend whose credentials are present in the environment.
    ///
    /// Text models of DashScope and image models of Ark go through the
    /// OpenAI-compatible blocking endpoints of those vendors.
    pub fn from_env() -> Self {
        #[allow(unused_mut)]
        let mut set = Self::new();

        #[cfg(feature = "dashscope")]
        if std::env::var("DASHSCOPE_API_KEY").is_ok() {
            if let Ok(backend) = crate::task::backends::DashScopeBackend::builder().build() {
                set.insert(Arc::new(backend));
            }
            if let Ok(backend) = crate::task::backends::OpenAiBackend::builder()
                .provider(ProviderKind::DashScope)
                .build()
            {
                set.insert(Arc::new(backend));
            }
        }

        #[cfg(feature = "ark")]
        if std::env::var("ARK_API_KEY").is_ok() {
            if let Ok(backend) = crate::task::backends::ArkBackend::builder().build() {
                set.insert(Arc::new(backend));
            }
            if let Ok(backend) = crate::task::backends::OpenAiBackend::builder()
                .provider(ProviderKind::Ark)
                .build()
            {
                set.insert(Arc::new(backend));
            }
        }

        #[cfg(feature = "openai")]
        if let Ok(backend) = crate::task::backends::OpenAiBackend::builder().build() {
            set.insert(Arc::new(backend));
        }

        tracing::debug!(backends = set.len(), "configured generation backends");
        set
    }
}

impl std::fmt::Debug for BackendSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.backends.keys()).finish()
    }
}
