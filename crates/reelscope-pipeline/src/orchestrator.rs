//! Drives one queued post from download to final report.
//!
//! Stage order:
//!
//! 1. done-log check (a hit short-circuits with [`PipelineOutcome::Skipped`])
//! 2. download into a scoped [`WorkDir`]
//! 3. joint image analysis for image posts
//! 4. per video: audio extraction, speech gating, transcription, and the
//!    evaluator-gated keyframe summary
//! 5. aggregation and final synthesis
//!
//! Stages 3 and 4 are best-effort: a failure there is logged and that stage's
//! output is dropped. Download, an empty aggregate, and final synthesis
//! failures fail the item.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use reelscope_core::{AppConfig, ContentItem};

use crate::collaborators::{
    is_image_file, is_video_file, MediaDownloader, MediaTools, SynthesisModel, TextDetector,
    Transcriber, Transcript,
};
use crate::error::PipelineError;
use crate::evaluator::{select_distinct_frames, Evaluator, EvaluatorConfig, VisualMetrics};
use crate::ffmpeg::FfmpegTools;
use crate::gallery_dl::GalleryDl;
use crate::gemini::GeminiClient;
use crate::prompts::{
    content_metadata, Aggregate, IMAGE_ANALYSIS_PROMPT, REPORT_SYSTEM_PROMPT, VIDEO_FRAMES_PROMPT,
};
use crate::tesseract::TesseractCli;
use crate::whisper::WhisperCli;
use crate::workdir::{DoneLog, WorkDir};

/// Audio quieter than this (mean dBFS) is not worth transcribing.
const MIN_SPEECH_VOLUME_DB: f64 = -35.0;
/// Speech ratio below which transcription is skipped.
const MIN_SPEECH_RATIO: f64 = 0.2;
const MAX_KEYFRAMES: u32 = 10;
/// Mean grey-level difference below which a keyframe is a near-duplicate.
const KEYFRAME_DIFF_THRESHOLD: f64 = 5.0;

/// What the pipeline produced for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Already processed by an earlier run; nothing was done.
    Skipped,
    Report { report: String, model: String },
}

#[async_trait]
pub trait ContentPipeline: Send + Sync {
    async fn process(&self, item: &ContentItem) -> Result<PipelineOutcome, PipelineError>;
}

/// The external tools the orchestrator delegates to.
#[derive(Clone)]
pub struct Collaborators {
    pub downloader: Arc<dyn MediaDownloader>,
    pub media: Arc<dyn MediaTools>,
    pub transcriber: Arc<dyn Transcriber>,
    pub text_detector: Arc<dyn TextDetector>,
    pub model: Arc<dyn SynthesisModel>,
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Parent of the per-item work directories.
    pub temp_dir: PathBuf,
    pub done_log_path: PathBuf,
    pub evaluator: EvaluatorConfig,
}

impl OrchestratorConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            temp_dir: config.temp_dir.clone(),
            done_log_path: config.done_log_path.clone(),
            evaluator: EvaluatorConfig::default(),
        }
    }
}

pub struct Orchestrator {
    tools: Collaborators,
    evaluator: Evaluator,
    temp_dir: PathBuf,
    done_log: DoneLog,
}

impl Orchestrator {
    #[must_use]
    pub fn new(tools: Collaborators, config: OrchestratorConfig) -> Self {
        Self {
            tools,
            evaluator: Evaluator::new(config.evaluator),
            temp_dir: config.temp_dir,
            done_log: DoneLog::new(config.done_log_path),
        }
    }

    /// Wires the process- and HTTP-backed collaborators from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MissingApiKey`] when `GOOGLE_API_KEY` is unset,
    /// or [`PipelineError::Http`] if the Gemini client cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self, PipelineError> {
        let api_key = config
            .google_api_key
            .as_deref()
            .ok_or(PipelineError::MissingApiKey)?;
        let model = GeminiClient::new(api_key, &config.vision_model, &config.summary_model)?;

        let tools = Collaborators {
            downloader: Arc::new(GalleryDl::new(
                &config.downloader_bin,
                config.downloader_cookies.clone(),
            )),
            media: Arc::new(FfmpegTools::new(&config.ffmpeg_bin, &config.ffprobe_bin)),
            transcriber: Arc::new(WhisperCli::new(&config.whisper_bin)),
            text_detector: Arc::new(TesseractCli::new(&config.tesseract_bin)),
            model: Arc::new(model),
        };
        Ok(Self::new(tools, OrchestratorConfig::from_app_config(config)))
    }

    async fn analyse_images(&self, shortcode: &str, media: &[PathBuf]) -> Option<String> {
        let images: Vec<PathBuf> = media.iter().filter(|p| is_image_file(p)).cloned().collect();
        if images.is_empty() {
            tracing::warn!(shortcode, "image post downloaded without images");
            return None;
        }

        match self
            .tools
            .model
            .describe_images(IMAGE_ANALYSIS_PROMPT, &images)
            .await
        {
            Ok(summary) => Some(summary),
            Err(e) => {
                tracing::warn!(shortcode, error = %e, "image analysis failed, continuing without it");
                None
            }
        }
    }

    async fn analyse_video(
        &self,
        shortcode: &str,
        work: &WorkDir,
        index: usize,
        video: &Path,
        aggregate: &mut Aggregate,
    ) {
        let audio_out = work.path().join(format!("audio_{index}.wav"));
        let speech_ratio = match self.tools.media.extract_audio(video, &audio_out).await {
            Ok(Some(audio)) => {
                let (ratio, transcript) = self.listen(shortcode, &audio).await;
                if let Some(transcript) = transcript {
                    aggregate.transcripts.push((index, transcript.text));
                }
                ratio
            }
            Ok(None) => 0.0,
            Err(e) => {
                tracing::warn!(shortcode, video = index, error = %e, "audio extraction failed");
                0.0
            }
        };

        let visuals = match self.measure(work, index, video).await {
            Ok(visuals) => visuals,
            Err(e) => {
                tracing::warn!(shortcode, video = index, error = %e, "frame sampling failed");
                VisualMetrics::default()
            }
        };

        let evaluation = self.evaluator.decide(&visuals, speech_ratio);
        tracing::info!(
            shortcode,
            video = index,
            text_ratio = evaluation.text_ratio,
            scene_diversity = evaluation.scene_diversity,
            speech_ratio = evaluation.speech_ratio,
            run_visual_summary = evaluation.run_visual_summary,
            reason = evaluation.reason,
            "evaluated video"
        );
        if !evaluation.run_visual_summary {
            return;
        }

        match self.summarise_keyframes(work, index, video).await {
            Ok(Some(summary)) => aggregate.frame_summaries.push((index, summary)),
            Ok(None) => {
                tracing::info!(shortcode, video = index, "no distinct keyframes extracted");
            }
            Err(e) => {
                tracing::warn!(shortcode, video = index, error = %e, "visual summary failed");
            }
        }
    }

    /// Speech ratio of `audio` and, when there is enough speech, its transcript.
    async fn listen(&self, shortcode: &str, audio: &Path) -> (f64, Option<Transcript>) {
        match self.tools.media.mean_volume_db(audio).await {
            Ok(Some(db)) if db > MIN_SPEECH_VOLUME_DB => {}
            Ok(db) => {
                tracing::info!(shortcode, mean_volume_db = ?db, "no clear speech, skipping transcription");
                return (0.0, None);
            }
            Err(e) => {
                tracing::warn!(shortcode, error = %e, "loudness check failed");
                return (0.0, None);
            }
        }

        let ratio = match self.tools.media.speech_ratio(audio).await {
            Ok(ratio) => ratio,
            Err(e) => {
                tracing::warn!(shortcode, error = %e, "speech ratio estimation failed");
                return (0.0, None);
            }
        };
        if ratio < MIN_SPEECH_RATIO {
            tracing::info!(shortcode, speech_ratio = ratio, "low speech ratio, skipping transcription");
            return (ratio, None);
        }

        match self.tools.transcriber.transcribe(audio).await {
            Ok(transcript) => (ratio, transcript),
            Err(e) => {
                tracing::warn!(shortcode, error = %e, "transcription failed");
                (ratio, None)
            }
        }
    }

    async fn measure(
        &self,
        work: &WorkDir,
        index: usize,
        video: &Path,
    ) -> Result<VisualMetrics, PipelineError> {
        let dir = work.subdir(&format!("samples_{index}"))?;
        let frames = self
            .tools
            .media
            .sample_frames(video, self.evaluator.config().samples, &dir)
            .await?;
        self.evaluator
            .measure_visuals(&frames, self.tools.text_detector.as_ref())
            .await
    }

    async fn summarise_keyframes(
        &self,
        work: &WorkDir,
        index: usize,
        video: &Path,
    ) -> Result<Option<String>, PipelineError> {
        let dir = work.subdir(&format!("keyframes_{index}"))?;
        let candidates = self
            .tools
            .media
            .extract_keyframes(video, MAX_KEYFRAMES, &dir)
            .await?;
        let keyframes = tokio::task::spawn_blocking(move || {
            select_distinct_frames(&candidates, KEYFRAME_DIFF_THRESHOLD, MAX_KEYFRAMES as usize)
        })
        .await??;
        if keyframes.is_empty() {
            return Ok(None);
        }

        tracing::debug!(video = index, keyframes = keyframes.len(), "summarising keyframes");
        let summary = self
            .tools
            .model
            .describe_images(VIDEO_FRAMES_PROMPT, &keyframes)
            .await?;
        Ok(Some(summary))
    }
}

#[async_trait]
impl ContentPipeline for Orchestrator {
    async fn process(&self, item: &ContentItem) -> Result<PipelineOutcome, PipelineError> {
        let shortcode = item.shortcode.as_str();
        if self.done_log.contains(shortcode).await? {
            tracing::info!(shortcode, "already in done-log, skipping");
            return Ok(PipelineOutcome::Skipped);
        }

        let work = WorkDir::create(&self.temp_dir, &format!("{}_{shortcode}", item.post_type))?;
        let mut media = self.tools.downloader.download(item, work.path()).await?;
        if media.is_empty() {
            return Err(PipelineError::NoMedia {
                shortcode: shortcode.to_string(),
            });
        }
        media.sort();
        tracing::info!(shortcode, post_type = %item.post_type, files = media.len(), "media downloaded");

        let mut aggregate = Aggregate {
            metadata: Some(content_metadata(item)),
            description: item.caption.clone(),
            ..Aggregate::default()
        };

        if item.post_type.is_image_type() {
            aggregate.image_analysis = self.analyse_images(shortcode, &media).await;
        }

        let videos: Vec<&PathBuf> = media.iter().filter(|p| is_video_file(p)).collect();
        for (i, video) in videos.into_iter().enumerate() {
            self.analyse_video(shortcode, &work, i + 1, video, &mut aggregate)
                .await;
        }

        let content = aggregate.render();
        if content.is_empty() {
            return Err(PipelineError::NothingToSummarize {
                shortcode: shortcode.to_string(),
            });
        }

        let report = self
            .tools
            .model
            .synthesize_report(REPORT_SYSTEM_PROMPT, &content)
            .await?;

        if let Err(e) = self.done_log.append(shortcode).await {
            tracing::warn!(shortcode, error = %e, "failed to record item in done-log");
        }
        tracing::info!(shortcode, "final report generated");

        Ok(PipelineOutcome::Report {
            report,
            model: self.tools.model.model_name().to_string(),
        })
    }
}
