//! Download, normalize and join a list of video segments.

use crate::error::{GenFlowError, Result};
use crate::transfer::{redact_query, Downloader, HttpDownloader};
use crate::video::ffmpeg::{FfmpegTool, MediaTool};
use crate::video::plan::{
    concat_manifest, reencode_args, stream_copy_args, ConcatOptions, NormalizePlan, TargetFormat,
};
use futures::future::try_join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// How the final file was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcatStrategy {
    /// One source: downloaded as-is.
    Single,
    /// Concat demuxer with `-c copy`.
    StreamCopy,
    /// Filter-graph re-encode after the stream copy failed.
    Reencode,
}

/// Result of [`ConcatPipeline::concat`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConcatOutcome {
    /// Joined file.
    pub output: PathBuf,
    /// How it was produced.
    pub strategy: ConcatStrategy,
    /// Number of sources.
    pub segments: usize,
    /// `None` for a single source, which is never normalized.
    pub target: Option<TargetFormat>,
}

/// Joins remote video clips into one local file.
///
/// Each job gets its own temporary directory which is removed when the job
/// ends, whatever the outcome. Only the output file survives.
pub struct ConcatPipeline {
    downloader: Arc<dyn Downloader>,
    tool: Arc<dyn MediaTool>,
    options: ConcatOptions,
    work_root: Option<PathBuf>,
}

impl std::fmt::Debug for ConcatPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcatPipeline")
            .field("options", &self.options)
            .field("work_root", &self.work_root)
            .finish_non_exhaustive()
    }
}

impl ConcatPipeline {
    /// Pipeline over the given downloader and media tool.
    pub fn new(
        downloader: Arc<dyn Downloader>,
        tool: Arc<dyn MediaTool>,
        options: ConcatOptions,
    ) -> Self {
        Self {
            downloader,
            tool,
            options,
            work_root: None,
        }
    }

    /// HTTP downloads and the ffmpeg binaries named in `options`.
    pub fn from_options(options: ConcatOptions) -> Self {
        let tool = FfmpegTool::new(options.ffmpeg.clone(), options.ffprobe.clone());
        Self::new(Arc::new(HttpDownloader::new()), Arc::new(tool), options)
    }

    /// Directory under which per-job working directories are created.
    /// Defaults to the system temp dir.
    pub fn with_work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.work_root = Some(root.into());
        self
    }

    /// Encoding settings.
    pub fn options(&self) -> &ConcatOptions {
        &self.options
    }

    /// Downloads `urls`, normalizes them to a common format and joins them
    /// into `output`.
    pub async fn concat(&self, urls: &[String], output: &Path) -> Result<ConcatOutcome> {
        if urls.is_empty() {
            return Err(GenFlowError::invalid("at least one video URL is required"));
        }

        let started = Instant::now();
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        if let [url] = urls {
            let bytes = self.downloader.fetch_to(url, output).await?;
            tracing::info!(
                url = %redact_query(url),
                bytes,
                "single segment, skipped concatenation"
            );
            return Ok(ConcatOutcome {
                output: output.to_path_buf(),
                strategy: ConcatStrategy::Single,
                segments: 1,
                target: None,
            });
        }

        let mut builder = tempfile::Builder::new();
        builder.prefix("genflow-concat-");
        let work = match &self.work_root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };

        let result = self.run(urls, work.path(), output).await;
        if result.is_err() {
            remove_if_exists(output).await;
        }
        let (strategy, target) = result?;

        tracing::info!(
            segments = urls.len(),
            strategy = ?strategy,
            width = target.width,
            height = target.height,
            elapsed_secs = started.elapsed().as_secs_f64(),
            "concatenated videos"
        );
        Ok(ConcatOutcome {
            output: output.to_path_buf(),
            strategy,
            segments: urls.len(),
            target: Some(target),
        })
    }

    async fn run(
        &self,
        urls: &[String],
        work: &Path,
        output: &Path,
    ) -> Result<(ConcatStrategy, TargetFormat)> {
        let downloads = urls.iter().enumerate().map(|(i, url)| {
            let path = work.join(format!("source_{i:03}.mp4"));
            async move {
                self.downloader.fetch_to(url, &path).await?;
                Ok::<_, GenFlowError>(path)
            }
        });
        let downloaded = try_join_all(downloads).await?;

        // one ffmpeg at a time
        let mut target = None;
        let mut normalized = Vec::with_capacity(downloaded.len());
        for (i, source) in downloaded.iter().enumerate() {
            let info = self.tool.inspect(source).await?;
            let segment_target = *target
                .get_or_insert_with(|| TargetFormat::from_first(Some(&info), &self.options));
            let path = work.join(format!("normalized_{i:03}.mp4"));
            let plan = NormalizePlan::new(segment_target, info.has_audio, &self.options);
            self.tool.run(&plan.ffmpeg_args(source, &path)).await?;
            tracing::debug!(segment = i, has_audio = info.has_audio, "normalized segment");
            normalized.push(path);
        }
        let target = target.unwrap_or_else(|| TargetFormat::from_first(None, &self.options));

        let manifest = work.join("concat_list.txt");
        tokio::fs::write(&manifest, concat_manifest(&normalized)).await?;

        match self.tool.run(&stream_copy_args(&manifest, output)).await {
            Ok(()) => return Ok((ConcatStrategy::StreamCopy, target)),
            Err(err) => {
                tracing::warn!(error = %err, "stream copy failed, re-encoding");
                remove_if_exists(output).await;
            }
        }

        self.tool
            .run(&reencode_args(&normalized, output, &self.options))
            .await?;
        Ok((ConcatStrategy::Reencode, target))
    }
}

async fn remove_if_exists(path: &Path) {
    if let Err(err) = tokio::fs::remove_file(path).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %err, "failed to remove partial output");
        }
    }
}
