//! Video normalization and concatenation.
//!
//! Segments are downloaded into a per-job scratch directory, rewritten to a
//! common frame rate, resolution and audio format, then joined. A stream copy
//! is tried first; a full re-encode runs if that fails.

pub mod ffmpeg;
mod pipeline;
pub mod plan;

pub use ffmpeg::{FfmpegError, FfmpegTool, MediaTool};
pub use pipeline::{ConcatOutcome, ConcatPipeline, ConcatStrategy};
pub use plan::{ConcatOptions, MediaInfo, NormalizePlan, TargetFormat};
