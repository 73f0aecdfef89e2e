#![warn(missing_docs)]
//! GenFlow - orchestration of remote AI generation jobs.
//!
//! A validated, provider-shaped request is built from an immutable capability
//! registry, submitted to a remote backend (blocking, HTTP-polled or
//! client-polled), tracked as a group of parallel tasks until every member is
//! terminal, and its artifacts are optionally copied to durable storage.
//! Finished video clips can be joined into one file through ffmpeg.
//!
//! # Quick Start
//!
//! ```no_run
//! use genflow::{
//!     catalog, BackendSet, Category, EngineConfig, GenerationInput, GenerationJob, Persistence,
//!     TaskEngine,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> genflow::Result<()> {
//!     let engine = TaskEngine::new(
//!         Arc::new(catalog::builtin()?),
//!         BackendSet::from_env(),
//!         Persistence::disabled(),
//!         EngineConfig::builder().build()?,
//!     );
//!
//!     let job = GenerationJob::new(
//!         Category::TextToImage,
//!         "wan2.2-t2i-flash",
//!         GenerationInput::new("A lighthouse at dusk"),
//!     )
//!     .with_count(4);
//!
//!     let group = engine.submit_and_wait(&job).await?;
//!     for url in group.report().into_result()? {
//!         println!("{url}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Concatenating videos
//!
//! ```no_run
//! use genflow::{ConcatOptions, ConcatPipeline};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> genflow::Result<()> {
//!     let pipeline = ConcatPipeline::from_options(ConcatOptions::default());
//!     let urls = vec![
//!         "https://cdn.example.com/a.mp4".to_string(),
//!         "https://cdn.example.com/b.mp4".to_string(),
//!     ];
//!     let outcome = pipeline.concat(&urls, Path::new("joined.mp4")).await?;
//!     println!("{:?}", outcome.strategy);
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `dashscope`: Alibaba Cloud DashScope (async task API + compatible mode)
//! - `ark`: Volcengine Ark (content generation tasks + images)
//! - `openai`: OpenAI and OpenAI-compatible chat/images endpoints
//! - `cli`: Command-line interface

mod config;
mod error;
pub mod registry;
pub mod request;
pub mod storage;
pub mod task;
pub mod transfer;
pub mod video;

pub use config::{EngineConfig, EngineConfigBuilder};
pub use error::{
    is_content_policy, sanitize_error_message, GenFlowError, Result, PARTIAL_FAILURE_MESSAGE,
};

pub use registry::{
    catalog, Capabilities, Category, ModelDescriptor, ParamType, ParameterSpec, Params,
    ProviderKind, Registry, RegistryBuilder, SizeConstraint, SubmissionStyle, ValidationReport,
};
pub use request::{GenerationInput, ProviderRequest, RequestBuilder};
pub use storage::{ObjectStore, PersistContext, Persistence, StorageConfig};
pub use task::{
    BackendSet, GenerationJob, GenerationTask, GroupReport, GroupStatus, TaskBackend, TaskEngine,
    TaskError, TaskGroup, TaskHandle, TaskSnapshot, TaskStatus,
};
pub use transfer::{Downloader, HttpDownloader};
pub use video::{ConcatOptions, ConcatOutcome, ConcatPipeline, ConcatStrategy};

#[cfg(feature = "ark")]
pub use task::backends::{ArkBackend, ArkBackendBuilder};

#[cfg(feature = "dashscope")]
pub use task::backends::{DashScopeBackend, DashScopeBackendBuilder};

#[cfg(feature = "openai")]
pub use task::backends::{OpenAiBackend, OpenAiBackendBuilder};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{GenFlowError, Result};
    pub use crate::registry::{Category, Registry};
    pub use crate::request::GenerationInput;
    pub use crate::storage::Persistence;
    pub use crate::task::{BackendSet, GenerationJob, TaskBackend, TaskEngine, TaskGroup};
    pub use crate::video::ConcatPipeline;
    pub use crate::EngineConfig;
}
