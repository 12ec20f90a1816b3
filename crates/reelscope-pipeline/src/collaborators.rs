//! Seams between the orchestrator and the tools that do the heavy lifting.
//!
//! Each trait has one process- or HTTP-backed implementation in this crate;
//! tests substitute in-memory fakes.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reelscope_core::ContentItem;

use crate::error::PipelineError;

/// Extensions kept after a download. Everything else (metadata sidecars,
/// thumbnails in odd formats) is ignored.
pub const MEDIA_EXTENSIONS: [&str; 6] = ["mp4", "mov", "jpg", "jpeg", "png", "webp"];
pub const VIDEO_EXTENSIONS: [&str; 2] = ["mp4", "mov"];
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| allowed.iter().any(|a| a.eq_ignore_ascii_case(e)))
}

#[must_use]
pub fn is_media_file(path: &Path) -> bool {
    has_extension(path, &MEDIA_EXTENSIONS)
}

#[must_use]
pub fn is_video_file(path: &Path) -> bool {
    has_extension(path, &VIDEO_EXTENSIONS)
}

#[must_use]
pub fn is_image_file(path: &Path) -> bool {
    has_extension(path, &IMAGE_EXTENSIONS)
}

/// Materialises a post's media on local disk.
#[async_trait]
pub trait MediaDownloader: Send + Sync {
    /// Downloads every media file of `item` into `work_dir` and returns their
    /// paths. Only files with a [`MEDIA_EXTENSIONS`] suffix are returned.
    async fn download(
        &self,
        item: &ContentItem,
        work_dir: &Path,
    ) -> Result<Vec<PathBuf>, PipelineError>;
}

/// Audio and frame extraction from video files.
#[async_trait]
pub trait MediaTools: Send + Sync {
    /// Writes the audio track of `video` to `out`. Returns `None` when the
    /// video has no audio stream.
    async fn extract_audio(&self, video: &Path, out: &Path)
        -> Result<Option<PathBuf>, PipelineError>;

    /// Mean loudness in dBFS, or `None` for digital silence.
    async fn mean_volume_db(&self, audio: &Path) -> Result<Option<f64>, PipelineError>;

    /// Fraction of the audio that is not silence (below -35 dB for at least 0.5 s).
    async fn speech_ratio(&self, audio: &Path) -> Result<f64, PipelineError>;

    /// Up to `count` frames spread evenly across `video`, written to `out_dir`.
    async fn sample_frames(
        &self,
        video: &Path,
        count: u32,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, PipelineError>;

    /// Candidate keyframes for visual summary, scaled to 512x512 and written
    /// to `out_dir` in playback order. Returns at most `2 * max` candidates;
    /// the caller drops near-duplicates and keeps `max`.
    async fn extract_keyframes(
        &self,
        video: &Path,
        max: u32,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, PipelineError>;
}

/// Speech-to-text output for one audio track.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    /// Transcript text, in English.
    pub text: String,
    /// Detected spoken language code, e.g. `en`.
    pub language: Option<String>,
    /// True when the audio was not English and was translated.
    pub translated: bool,
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Returns `None` when no speech was recognised.
    async fn transcribe(&self, audio: &Path) -> Result<Option<Transcript>, PipelineError>;
}

#[async_trait]
pub trait TextDetector: Send + Sync {
    /// OCR text found in `image`; empty when there is none.
    async fn detect_text(&self, image: &Path) -> Result<String, PipelineError>;
}

/// The vision/language model used for image description and the final report.
#[async_trait]
pub trait SynthesisModel: Send + Sync {
    /// Describes all `images` together in one call.
    async fn describe_images(
        &self,
        prompt: &str,
        images: &[PathBuf],
    ) -> Result<String, PipelineError>;

    /// Produces the final report from the aggregated `content`.
    async fn synthesize_report(
        &self,
        system_prompt: &str,
        content: &str,
    ) -> Result<String, PipelineError>;

    /// Name of the model that writes reports, recorded with each result.
    fn model_name(&self) -> &str;
}
