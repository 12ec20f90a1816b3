//! [`MediaTools`] backed by the `ffmpeg` and `ffprobe` command-line tools.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;

use crate::collaborators::MediaTools;
use crate::error::PipelineError;
use crate::process::run_tool;
use crate::workdir::sorted_files;

/// Anything quieter than this counts as silence.
pub const SILENCE_THRESHOLD_DB: f64 = -35.0;
/// Shortest gap that counts as silence.
pub const MIN_SILENCE_SECS: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct FfmpegTools {
    ffmpeg_bin: String,
    ffprobe_bin: String,
}

impl Default for FfmpegTools {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl FfmpegTools {
    #[must_use]
    pub fn new(ffmpeg_bin: impl Into<String>, ffprobe_bin: impl Into<String>) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
            ffprobe_bin: ffprobe_bin.into(),
        }
    }

    async fn has_audio_stream(&self, video: &Path) -> Result<bool, PipelineError> {
        let output = run_tool(
            "ffprobe",
            Command::new(&self.ffprobe_bin)
                .args(["-v", "error", "-select_streams", "a"])
                .args(["-show_entries", "stream=index", "-of", "csv=p=0"])
                .arg(video),
        )
        .await?;
        Ok(!String::from_utf8_lossy(&output.stdout).trim().is_empty())
    }

    async fn duration_secs(&self, media: &Path) -> Result<f64, PipelineError> {
        let output = run_tool(
            "ffprobe",
            Command::new(&self.ffprobe_bin)
                .args(["-v", "error", "-show_entries", "format=duration"])
                .args(["-of", "default=noprint_wrappers=1:nokey=1"])
                .arg(media),
        )
        .await?;
        let text = String::from_utf8_lossy(&output.stdout);
        text.trim()
            .parse::<f64>()
            .ok()
            .filter(|d| d.is_finite() && *d > 0.0)
            .ok_or_else(|| PipelineError::ToolFailed {
                tool: "ffprobe".to_string(),
                status: "ok".to_string(),
                stderr: format!("no usable duration for {}: {:?}", media.display(), text.trim()),
            })
    }

    /// Extracts `count` frames evenly across `video` into `out_dir`.
    async fn extract_frames(
        &self,
        video: &Path,
        count: u32,
        scale: Option<u32>,
        out_dir: &Path,
        pattern: &str,
    ) -> Result<Vec<PathBuf>, PipelineError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let duration = self.duration_secs(video).await?;
        let mut filter = format!("fps={:.6}", f64::from(count) / duration);
        if let Some(side) = scale {
            filter.push_str(&format!(",scale={side}:{side}"));
        }

        run_tool(
            "ffmpeg",
            Command::new(&self.ffmpeg_bin)
                .args(["-y", "-v", "error", "-i"])
                .arg(video)
                .args(["-vf", &filter])
                .args(["-frames:v", &count.to_string(), "-q:v", "2"])
                .arg(out_dir.join(pattern)),
        )
        .await?;

        let prefix = pattern.split('%').next().unwrap_or_default();
        Ok(sorted_files(out_dir)
            .await?
            .into_iter()
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(prefix))
            })
            .collect())
    }
}

#[async_trait]
impl MediaTools for FfmpegTools {
    async fn extract_audio(
        &self,
        video: &Path,
        out: &Path,
    ) -> Result<Option<PathBuf>, PipelineError> {
        if !self.has_audio_stream(video).await? {
            tracing::info!(video = %video.display(), "video has no audio stream");
            return Ok(None);
        }
        run_tool(
            "ffmpeg",
            Command::new(&self.ffmpeg_bin)
                .args(["-y", "-v", "error", "-i"])
                .arg(video)
                .args(["-vn", "-ac", "1", "-ar", "16000"])
                .arg(out),
        )
        .await?;
        Ok(Some(out.to_path_buf()))
    }

    async fn mean_volume_db(&self, audio: &Path) -> Result<Option<f64>, PipelineError> {
        let output = run_tool(
            "ffmpeg",
            Command::new(&self.ffmpeg_bin)
                .args(["-hide_banner", "-nostats", "-i"])
                .arg(audio)
                .args(["-af", "volumedetect", "-f", "null", "-"]),
        )
        .await?;
        Ok(parse_mean_volume(&String::from_utf8_lossy(&output.stderr)))
    }

    async fn speech_ratio(&self, audio: &Path) -> Result<f64, PipelineError> {
        let total = self.duration_secs(audio).await?;
        let filter = format!("silencedetect=noise={SILENCE_THRESHOLD_DB}dB:d={MIN_SILENCE_SECS}");
        let output = run_tool(
            "ffmpeg",
            Command::new(&self.ffmpeg_bin)
                .args(["-hide_banner", "-nostats", "-i"])
                .arg(audio)
                .args(["-af", &filter, "-f", "null", "-"]),
        )
        .await?;
        let silence = silence_secs(&String::from_utf8_lossy(&output.stderr), total);
        Ok(speech_ratio_from(total, silence))
    }

    async fn sample_frames(
        &self,
        video: &Path,
        count: u32,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, PipelineError> {
        self.extract_frames(video, count, None, out_dir, "sample_%03d.png")
            .await
    }

    async fn extract_keyframes(
        &self,
        video: &Path,
        max: u32,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, PipelineError> {
        self.extract_frames(video, max.saturating_mul(2), Some(512), out_dir, "key_%03d.jpg")
            .await
    }
}

/// `mean_volume` from `volumedetect` output; `None` for `-inf` or when absent.
#[must_use]
pub fn parse_mean_volume(stderr: &str) -> Option<f64> {
    static MEAN_VOLUME: OnceLock<Regex> = OnceLock::new();
    let re = MEAN_VOLUME.get_or_init(|| {
        Regex::new(r"mean_volume:\s*(-?[0-9.]+|-inf)\s*dB").expect("valid mean_volume regex")
    });
    re.captures(stderr)
        .and_then(|c| c[1].parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Total silence reported by `silencedetect`. A `silence_start` with no
/// matching end runs to `total_secs`.
#[must_use]
pub fn silence_secs(stderr: &str, total_secs: f64) -> f64 {
    static EVENT: OnceLock<Regex> = OnceLock::new();
    let re = EVENT.get_or_init(|| {
        Regex::new(r"silence_(start|end):\s*(-?[0-9.]+)").expect("valid silencedetect regex")
    });

    let mut silence = 0.0;
    let mut open: Option<f64> = None;
    for cap in re.captures_iter(stderr) {
        let Ok(at) = cap[2].parse::<f64>() else {
            continue;
        };
        match &cap[1] {
            "start" => open = Some(at.max(0.0)),
            _ => {
                if let Some(start) = open.take() {
                    silence += (at - start).max(0.0);
                }
            }
        }
    }
    if let Some(start) = open {
        silence += (total_secs - start).max(0.0);
    }
    silence
}

/// Non-silent share of the audio, in `[0, 1]`.
#[must_use]
pub fn speech_ratio_from(total_secs: f64, silence_secs: f64) -> f64 {
    if total_secs <= 0.0 {
        return 0.0;
    }
    ((total_secs - silence_secs) / total_secs).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VOLUMEDETECT: &str = "\
[Parsed_volumedetect_0 @ 0x55d] n_samples: 480000
[Parsed_volumedetect_0 @ 0x55d] mean_volume: -23.4 dB
[Parsed_volumedetect_0 @ 0x55d] max_volume: -3.1 dB";

    #[test]
    fn mean_volume_is_parsed() {
        assert_eq!(parse_mean_volume(VOLUMEDETECT), Some(-23.4));
    }

    #[test]
    fn digital_silence_has_no_volume() {
        assert_eq!(
            parse_mean_volume("[Parsed_volumedetect_0 @ 0x1] mean_volume: -inf dB"),
            None
        );
        assert_eq!(parse_mean_volume("no stats here"), None);
    }

    #[test]
    fn silence_intervals_are_summed() {
        let stderr = "\
[silencedetect @ 0x1] silence_start: 0
[silencedetect @ 0x1] silence_end: 1.5 | silence_duration: 1.5
[silencedetect @ 0x1] silence_start: 6.25
[silencedetect @ 0x1] silence_end: 7.25 | silence_duration: 1";
        assert!((silence_secs(stderr, 10.0) - 2.5).abs() < 1e-9);
    }

    #[test]
    fn trailing_silence_runs_to_end() {
        let stderr = "[silencedetect @ 0x1] silence_start: 8";
        assert!((silence_secs(stderr, 10.0) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn speech_ratio_is_bounded() {
        assert!((speech_ratio_from(10.0, 2.5) - 0.75).abs() < 1e-9);
        assert!(speech_ratio_from(10.0, 12.0).abs() < f64::EPSILON);
        assert!(speech_ratio_from(0.0, 0.0).abs() < f64::EPSILON);
        assert!((speech_ratio_from(4.0, 0.0) - 1.0).abs() < f64::EPSILON);
    }
}
