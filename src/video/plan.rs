//! Pure planning for normalization and concatenation: target format,
//! filter expressions and ffmpeg argument lists.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Settings of a concatenation job.
#[derive(Debug, Clone, PartialEq)]
pub struct ConcatOptions {
    /// Frame rate every segment is resampled to.
    pub fps: u32,
    /// Resolution used when the first segment has no readable video stream.
    pub fallback_width: u32,
    /// Height counterpart of `fallback_width`.
    pub fallback_height: u32,
    /// Output audio sample rate in Hz.
    pub sample_rate: u32,
    /// `stereo` or `mono`.
    pub channel_layout: String,
    /// Audio bitrate as ffmpeg understands it, e.g. `128k`.
    pub audio_bitrate: String,
    /// ffmpeg video encoder.
    pub video_codec: String,
    /// ffmpeg audio encoder.
    pub audio_codec: String,
    /// x264 preset.
    pub preset: String,
    /// x264 constant rate factor.
    pub crf: u8,
    /// ffmpeg binary.
    pub ffmpeg: PathBuf,
    /// ffprobe binary.
    pub ffprobe: PathBuf,
}

impl Default for ConcatOptions {
    fn default() -> Self {
        Self {
            fps: 30,
            fallback_width: 1280,
            fallback_height: 720,
            sample_rate: 44_100,
            channel_layout: "stereo".into(),
            audio_bitrate: "128k".into(),
            video_codec: "libx264".into(),
            audio_codec: "aac".into(),
            preset: "veryfast".into(),
            crf: 23,
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

impl ConcatOptions {
    /// Channel count implied by the layout.
    pub fn channels(&self) -> u32 {
        match self.channel_layout.as_str() {
            "mono" => 1,
            "5.1" => 6,
            _ => 2,
        }
    }
}

/// Stream facts of one media file.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MediaInfo {
    /// Frame width, if there is a video stream.
    pub width: Option<u32>,
    /// Frame height, if there is a video stream.
    pub height: Option<u32>,
    /// Whether an audio stream exists.
    pub has_audio: bool,
    /// Duration in seconds.
    pub duration_secs: Option<f64>,
}

/// Common format all segments are normalized to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetFormat {
    /// Even frame width.
    pub width: u32,
    /// Even frame height.
    pub height: u32,
    /// Frame rate.
    pub fps: u32,
}

impl TargetFormat {
    /// The first segment's dimensions rounded up to even, or the fallback
    /// resolution when it has no video stream.
    pub fn from_first(first: Option<&MediaInfo>, options: &ConcatOptions) -> Self {
        let measured = first.and_then(|info| match (info.width, info.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some((w, h)),
            _ => None,
        });
        let (width, height) = measured.unwrap_or((options.fallback_width, options.fallback_height));
        Self {
            width: round_up_even(width),
            height: round_up_even(height),
            fps: options.fps,
        }
    }
}

/// Rounds up to the nearest even number (yuv420p needs even dimensions);
/// `u32::MAX` rounds down.
pub fn round_up_even(n: u32) -> u32 {
    n.checked_add(n % 2).unwrap_or_else(|| n - 1)
}

/// How one segment is rewritten.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizePlan {
    /// Format to produce.
    pub target: TargetFormat,
    /// Whether the source has an audio stream; silent sources get a
    /// synthesized one.
    pub source_has_audio: bool,
    /// Encoding settings.
    pub options: ConcatOptions,
}

impl NormalizePlan {
    /// Plan for one source.
    pub fn new(target: TargetFormat, source_has_audio: bool, options: &ConcatOptions) -> Self {
        Self {
            target,
            source_has_audio,
            options: options.clone(),
        }
    }

    /// `fps`, fit-inside `scale`, centred `pad`, square pixels.
    pub fn video_filter(&self) -> String {
        let TargetFormat { width, height, fps } = self.target;
        format!(
            "fps={fps},scale={width}:{height}:force_original_aspect_ratio=decrease,\
             pad={width}:{height}:(ow-iw)/2:(oh-ih)/2,setsar=1"
        )
    }

    /// lavfi source producing silence in the target audio format.
    pub fn silence_source(&self) -> String {
        format!(
            "anullsrc=channel_layout={}:sample_rate={}",
            self.options.channel_layout, self.options.sample_rate
        )
    }

    /// ffmpeg arguments normalizing `input` into `output`.
    pub fn ffmpeg_args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let mut args = base_args();
        args.push("-i".into());
        args.push(input.into());
        if !self.source_has_audio {
            args.extend(["-f", "lavfi", "-i"].map(OsString::from));
            args.push(self.silence_source().into());
        }

        let audio_map = if self.source_has_audio { "0:a:0" } else { "1:a:0" };
        args.extend(["-map", "0:v:0", "-map", audio_map].map(OsString::from));
        args.push("-vf".into());
        args.push(self.video_filter().into());
        args.extend(video_codec_args(&self.options));
        args.extend(audio_codec_args(&self.options));
        if !self.source_has_audio {
            // the silent source is infinite
            args.push("-shortest".into());
        }
        args.extend(["-movflags", "+faststart"].map(OsString::from));
        args.push(output.into());
        args
    }
}

/// Manifest for ffmpeg's concat demuxer.
pub fn concat_manifest(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| {
            let escaped = p.to_string_lossy().replace('\'', r"'\''");
            format!("file '{escaped}'\n")
        })
        .collect()
}

/// Fast path: join already-compatible files without re-encoding.
pub fn stream_copy_args(manifest: &Path, output: &Path) -> Vec<OsString> {
    let mut args = base_args();
    args.extend(["-f", "concat", "-safe", "0", "-i"].map(OsString::from));
    args.push(manifest.into());
    args.extend(["-c", "copy"].map(OsString::from));
    args.push(output.into());
    args
}

/// `[0:v][0:a][1:v][1:a]...concat=n=N:v=1:a=1[v][a]`.
pub fn reencode_filter(inputs: usize) -> String {
    let pairs: String = (0..inputs).map(|i| format!("[{i}:v][{i}:a]")).collect();
    format!("{pairs}concat=n={inputs}:v=1:a=1[v][a]")
}

/// Slow path: decode every input and re-encode through one filter graph.
pub fn reencode_args(inputs: &[PathBuf], output: &Path, options: &ConcatOptions) -> Vec<OsString> {
    let mut args = base_args();
    for input in inputs {
        args.push("-i".into());
        args.push(input.into());
    }
    args.push("-filter_complex".into());
    args.push(reencode_filter(inputs.len()).into());
    args.extend(["-map", "[v]", "-map", "[a]"].map(OsString::from));
    args.extend(video_codec_args(options));
    args.extend(audio_codec_args(options));
    args.extend(["-movflags", "+faststart"].map(OsString::from));
    args.push(output.into());
    args
}

fn base_args() -> Vec<OsString> {
    ["-y", "-hide_banner", "-loglevel", "error"]
        .map(OsString::from)
        .to_vec()
}

fn video_codec_args(options: &ConcatOptions) -> Vec<OsString> {
    vec![
        "-c:v".into(),
        options.video_codec.clone().into(),
        "-preset".into(),
        options.preset.clone().into(),
        "-crf".into(),
        options.crf.to_string().into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
    ]
}

fn audio_codec_args(options: &ConcatOptions) -> Vec<OsString> {
    vec![
        "-c:a".into(),
        options.audio_codec.clone().into(),
        "-ar".into(),
        options.sample_rate.to_string().into(),
        "-ac".into(),
        options.channels().to_string().into(),
        "-b:a".into(),
        options.audio_bitrate.clone().into(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    fn info(width: u32, height: u32, has_audio: bool) -> MediaInfo {
        MediaInfo {
            width: Some(width),
            height: Some(height),
            has_audio,
            duration_secs: Some(5.0),
        }
    }

    #[test]
    fn test_round_up_even() {
        assert_eq!(round_up_even(720), 720);
        assert_eq!(round_up_even(719), 720);
        assert_eq!(round_up_even(1), 2);
        assert_eq!(round_up_even(0), 0);
        assert_eq!(round_up_even(u32::MAX), u32::MAX - 1);
        assert_eq!(round_up_even(u32::MAX - 1), u32::MAX - 1);
    }

    #[test]
    fn test_target_from_first_segment() {
        let options = ConcatOptions::default();
        let target = TargetFormat::from_first(Some(&info(853, 479, true)), &options);
        assert_eq!(
            target,
            TargetFormat {
                width: 854,
                height: 480,
                fps: 30
            }
        );
    }

    #[test]
    fn test_target_dimensions_always_even() {
        let options = ConcatOptions::default();
        for (w, h) in [(1, 1), (853, 479), (u32::MAX, u32::MAX - 2)] {
            let target = TargetFormat::from_first(Some(&info(w, h, true)), &options);
            assert_eq!(target.width % 2, 0, "{w}x{h}");
            assert_eq!(target.height % 2, 0, "{w}x{h}");
        }
    }

    #[test]
    fn test_target_fallback_without_video() {
        let options = ConcatOptions::default();
        let audio_only = MediaInfo {
            has_audio: true,
            ..Default::default()
        };
        let target = TargetFormat::from_first(Some(&audio_only), &options);
        assert_eq!((target.width, target.height), (1280, 720));
        assert_eq!(TargetFormat::from_first(None, &options).width, 1280);
    }

    #[test]
    fn test_video_filter() {
        let options = ConcatOptions::default();
        let target = TargetFormat::from_first(Some(&info(1280, 720, true)), &options);
        let plan = NormalizePlan::new(target, true, &options);
        assert_eq!(
            plan.video_filter(),
            "fps=30,scale=1280:720:force_original_aspect_ratio=decrease,pad=1280:720:(ow-iw)/2:(oh-ih)/2,setsar=1"
        );
    }

    #[test]
    fn test_normalize_keeps_existing_audio() {
        let options = ConcatOptions::default();
        let plan = NormalizePlan::new(TargetFormat::from_first(None, &options), true, &options);
        let args = strings(&plan.ffmpeg_args(Path::new("in.mp4"), Path::new("out.mp4")));

        assert!(!args.iter().any(|a| a.contains("anullsrc")));
        assert!(!args.contains(&"-shortest".to_string()));
        let map = args.iter().position(|a| a == "0:a:0").unwrap();
        assert_eq!(args[map - 1], "-map");
        for expected in ["-ar", "44100", "-ac", "2", "-b:a", "128k", "libx264"] {
            assert!(args.contains(&expected.to_string()), "missing {expected}");
        }
        assert_eq!(args.last().unwrap(), "out.mp4");
    }

    #[test]
    fn test_normalize_synthesizes_silence() {
        let options = ConcatOptions::default();
        let plan = NormalizePlan::new(TargetFormat::from_first(None, &options), false, &options);
        let args = strings(&plan.ffmpeg_args(Path::new("in.mp4"), Path::new("out.mp4")));

        assert!(args.contains(&"anullsrc=channel_layout=stereo:sample_rate=44100".to_string()));
        assert!(args.contains(&"1:a:0".to_string()));
        assert!(args.contains(&"-shortest".to_string()));
    }

    #[test]
    fn test_manifest_escapes_quotes() {
        let manifest = concat_manifest(&[PathBuf::from("/tmp/a.mp4"), PathBuf::from("/tmp/it's.mp4")]);
        assert_eq!(manifest, "file '/tmp/a.mp4'\nfile '/tmp/it'\\''s.mp4'\n");
    }

    #[test]
    fn test_reencode_filter() {
        assert_eq!(
            reencode_filter(3),
            "[0:v][0:a][1:v][1:a][2:v][2:a]concat=n=3:v=1:a=1[v][a]"
        );
    }

    #[test]
    fn test_stream_copy_args() {
        let args = strings(&stream_copy_args(Path::new("list.txt"), Path::new("out.mp4")));
        assert_eq!(
            args,
            vec![
                "-y", "-hide_banner", "-loglevel", "error", "-f", "concat", "-safe", "0", "-i",
                "list.txt", "-c", "copy", "out.mp4"
            ]
        );
    }

    #[test]
    fn test_reencode_args_list_every_input() {
        let inputs = vec![PathBuf::from("a.mp4"), PathBuf::from("b.mp4")];
        let args = strings(&reencode_args(&inputs, Path::new("out.mp4"), &ConcatOptions::default()));
        assert_eq!(args.iter().filter(|a| *a == "-i").count(), 2);
        assert!(args.contains(&"[0:v][0:a][1:v][1:a]concat=n=2:v=1:a=1[v][a]".to_string()));
    }
}
