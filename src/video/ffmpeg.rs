//! Thin async wrapper over the `ffmpeg` and `ffprobe` binaries.

use crate::error::GenFlowError;
use crate::video::plan::MediaInfo;
use async_trait::async_trait;
use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Error type for ffmpeg/ffprobe invocations.
#[derive(Debug, thiserror::Error)]
pub enum FfmpegError {
    /// The binary could not be spawned.
    #[error("ffprobe/ffmpeg binary not found: {0}")]
    NotFound(std::io::Error),

    /// The binary exited with an error.
    #[error("ffprobe/ffmpeg execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        /// `None` when killed by a signal.
        exit_code: Option<i32>,
        /// Trimmed standard error.
        stderr: String,
    },

    /// ffprobe printed something unexpected.
    #[error("failed to parse ffprobe output: {0}")]
    ParseError(String),
}

impl From<FfmpegError> for GenFlowError {
    fn from(err: FfmpegError) -> Self {
        GenFlowError::MediaIo(err.to_string())
    }
}

// ---- ffprobe JSON output ----

/// Output of `ffprobe -print_format json -show_format -show_streams`.
#[derive(Debug, Deserialize)]
pub struct FfprobeOutput {
    /// All streams, in file order.
    #[serde(default)]
    pub streams: Vec<FfprobeStream>,
    /// Container-level data.
    pub format: Option<FfprobeFormat>,
}

/// One stream of an [`FfprobeOutput`].
#[derive(Debug, Deserialize)]
pub struct FfprobeStream {
    /// `video`, `audio`, ...
    pub codec_type: Option<String>,
    /// Frame width.
    pub width: Option<u32>,
    /// Frame height.
    pub height: Option<u32>,
    /// e.g. "30/1" or "24000/1001"
    pub r_frame_rate: Option<String>,
    /// Audio channel count.
    pub channels: Option<u32>,
    /// Audio sample rate in Hz, as a string.
    pub sample_rate: Option<String>,
    /// Stream duration in seconds, as a string.
    pub duration: Option<String>,
}

/// Container section of an [`FfprobeOutput`].
#[derive(Debug, Deserialize)]
pub struct FfprobeFormat {
    /// Container duration in seconds, as a string.
    pub duration: Option<String>,
}

impl FfprobeOutput {
    /// First stream of the given type.
    pub fn first_stream(&self, codec_type: &str) -> Option<&FfprobeStream> {
        self.streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some(codec_type))
    }

    /// Collapses the ffprobe report into the facts normalization needs.
    pub fn media_info(&self) -> MediaInfo {
        let video = self.first_stream("video");
        let duration_secs = self
            .format
            .as_ref()
            .and_then(|f| f.duration.as_deref())
            .or_else(|| video.and_then(|v| v.duration.as_deref()))
            .and_then(|d| d.parse::<f64>().ok());

        MediaInfo {
            width: video.and_then(|v| v.width),
            height: video.and_then(|v| v.height),
            has_audio: self.first_stream("audio").is_some(),
            duration_secs,
        }
    }
}

/// Parses an ffprobe rational such as "30000/1001". Zero denominators give 0.
pub fn parse_fraction(s: &str) -> f64 {
    match s.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().unwrap_or(0.0);
            let den: f64 = den.trim().parse().unwrap_or(0.0);
            if den == 0.0 {
                0.0
            } else {
                num / den
            }
        }
        None => s.trim().parse().unwrap_or(0.0),
    }
}

/// Media operations the concatenation pipeline depends on.
#[async_trait]
pub trait MediaTool: Send + Sync {
    /// Reads stream facts from a local file.
    async fn inspect(&self, path: &Path) -> Result<MediaInfo, FfmpegError>;

    /// Runs ffmpeg with the given arguments.
    async fn run(&self, args: &[OsString]) -> Result<(), FfmpegError>;
}

/// [`MediaTool`] spawning the real binaries.
#[derive(Debug, Clone)]
pub struct FfmpegTool {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Default for FfmpegTool {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl FfmpegTool {
    /// Tool running the given binaries.
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }
}

#[async_trait]
impl MediaTool for FfmpegTool {
    async fn inspect(&self, path: &Path) -> Result<MediaInfo, FfmpegError> {
        let output = tokio::process::Command::new(&self.ffprobe)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .output()
            .await
            .map_err(FfmpegError::NotFound)?;

        if !output.status.success() {
            return Err(FfmpegError::ExecutionFailed {
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let report: FfprobeOutput = serde_json::from_str(&stdout)
            .map_err(|e| FfmpegError::ParseError(format!("{e}: {stdout}")))?;
        Ok(report.media_info())
    }

    async fn run(&self, args: &[OsString]) -> Result<(), FfmpegError> {
        tracing::debug!(binary = %self.ffmpeg.display(), args = ?args, "running ffmpeg");
        let output = tokio::process::Command::new(&self.ffmpeg)
            .args(args)
            .output()
            .await
            .map_err(FfmpegError::NotFound)?;

        if !output.status.success() {
            return Err(FfmpegError::ExecutionFailed {
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FFPROBE_JSON: &str = r#"{
        "streams": [
            {"index": 0, "codec_type": "video", "width": 1280, "height": 720,
             "r_frame_rate": "30000/1001", "duration": "5.005"},
            {"index": 1, "codec_type": "audio", "channels": 2, "sample_rate": "48000"}
        ],
        "format": {"duration": "5.013", "format_name": "mov,mp4,m4a,3gp,3g2,mj2"}
    }"#;

    #[test]
    fn test_media_info_from_ffprobe_json() {
        let report: FfprobeOutput = serde_json::from_str(FFPROBE_JSON).unwrap();
        let info = report.media_info();
        assert_eq!(info.width, Some(1280));
        assert_eq!(info.height, Some(720));
        assert!(info.has_audio);
        assert_eq!(info.duration_secs, Some(5.013));

        let rate = report.first_stream("video").unwrap().r_frame_rate.as_deref().unwrap();
        assert!((parse_fraction(rate) - 29.97).abs() < 0.01);
    }

    #[test]
    fn test_silent_clip() {
        let report: FfprobeOutput = serde_json::from_str(
            r#"{"streams": [{"codec_type": "video", "width": 720, "height": 1280}], "format": {}}"#,
        )
        .unwrap();
        let info = report.media_info();
        assert!(!info.has_audio);
        assert_eq!(info.duration_secs, None);
    }

    #[test]
    fn test_parse_fraction() {
        assert_eq!(parse_fraction("30/1"), 30.0);
        assert_eq!(parse_fraction("25"), 25.0);
        assert_eq!(parse_fraction("1/0"), 0.0);
        assert_eq!(parse_fraction("bad"), 0.0);
    }

    #[test]
    fn test_error_maps_to_media_io() {
        let err: GenFlowError = FfmpegError::ExecutionFailed {
            exit_code: Some(1),
            stderr: "Invalid data found".into(),
        }
        .into();
        assert!(matches!(err, GenFlowError::MediaIo(m) if m.contains("Invalid data found")));
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let tool = FfmpegTool::new("/nonexistent/ffmpeg", "/nonexistent/ffprobe");
        let err = tool.inspect(Path::new("clip.mp4")).await.unwrap_err();
        assert!(matches!(err, FfmpegError::NotFound(_)));
        let err = tool.run(&[OsString::from("-version")]).await.unwrap_err();
        assert!(matches!(err, FfmpegError::NotFound(_)));
    }
}
