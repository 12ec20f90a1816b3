//! Gate for the expensive visual-summary stage.
//!
//! The evaluator samples frames from a video, measures how much on-screen
//! text and scene change they carry, and combines that with the measured
//! speech ratio to decide whether the keyframes are worth sending to the
//! vision model. [`Evaluator::decide`] is pure; the measuring half reads
//! frames from disk and asks a [`TextDetector`] for OCR text.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{GrayImage, Luma, RgbImage};
use serde::Serialize;

use crate::collaborators::TextDetector;
use crate::error::PipelineError;

pub const REASON_TEXT: &str = "High text presence detected. Visuals are critical.";
pub const REASON_SCENES: &str = "High scene diversity detected. Visuals are dynamic and important.";
pub const REASON_SPEECH: &str =
    "Visuals are static, but speech ratio is high. Relying on audio transcript.";
pub const REASON_LOW_INFORMATION: &str =
    "Low visual activity and low speech content. Likely not an informational video.";

/// Bins per colour channel in the scene histograms.
const HIST_BINS: usize = 8;
/// Side length keyframes are compared at.
const KEYFRAME_SIZE: u32 = 512;

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatorConfig {
    pub text_ratio_threshold: f64,
    pub scene_diversity_threshold: f64,
    pub speech_reliance_threshold: f64,
    /// OCR output must be longer than this (after trimming) to count as text.
    pub min_text_length: usize,
    /// Frames sampled per video.
    pub samples: u32,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            text_ratio_threshold: 0.2,
            scene_diversity_threshold: 0.4,
            speech_reliance_threshold: 0.75,
            min_text_length: 15,
            samples: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct VisualMetrics {
    /// Fraction of sampled frames carrying readable text.
    pub text_ratio: f64,
    /// Mean Bhattacharyya distance between consecutive sampled frames.
    pub scene_diversity: f64,
}

/// Outcome of [`Evaluator::decide`], with the inputs that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub run_visual_summary: bool,
    pub reason: &'static str,
    pub text_ratio: f64,
    pub scene_diversity: f64,
    pub speech_ratio: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    config: EvaluatorConfig,
}

impl Evaluator {
    #[must_use]
    pub fn new(config: EvaluatorConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Rules, first match wins:
    ///
    /// 1. text ratio at or above threshold: run the visual summary.
    /// 2. scene diversity at or above threshold: run it.
    /// 3. speech ratio at or above the reliance threshold: skip, the
    ///    transcript carries the content.
    /// 4. otherwise skip; there is little information either way.
    #[must_use]
    pub fn decide(&self, visuals: &VisualMetrics, speech_ratio: f64) -> Evaluation {
        let (run_visual_summary, reason) =
            if visuals.text_ratio >= self.config.text_ratio_threshold {
                (true, REASON_TEXT)
            } else if visuals.scene_diversity >= self.config.scene_diversity_threshold {
                (true, REASON_SCENES)
            } else if speech_ratio >= self.config.speech_reliance_threshold {
                (false, REASON_SPEECH)
            } else {
                (false, REASON_LOW_INFORMATION)
            };

        Evaluation {
            run_visual_summary,
            reason,
            text_ratio: visuals.text_ratio,
            scene_diversity: visuals.scene_diversity,
            speech_ratio,
        }
    }

    /// Measures text presence and scene diversity over sampled `frames`.
    ///
    /// Frames that cannot be read count towards the sample total but add no
    /// text and no histogram. OCR failures on a single frame are logged and
    /// treated as "no text".
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Task`] if the blocking image work panics.
    pub async fn measure_visuals(
        &self,
        frames: &[PathBuf],
        detector: &dyn TextDetector,
    ) -> Result<VisualMetrics, PipelineError> {
        if frames.is_empty() {
            return Ok(VisualMetrics::default());
        }

        let owned = frames.to_vec();
        let (histograms, ocr_inputs) = tokio::task::spawn_blocking(move || {
            let mut histograms = Vec::with_capacity(owned.len());
            let mut ocr_inputs = Vec::with_capacity(owned.len());
            for frame in &owned {
                match prepare_frame(frame) {
                    Ok((hist, binarized)) => {
                        histograms.push(hist);
                        ocr_inputs.push(binarized);
                    }
                    Err(e) => {
                        tracing::warn!(frame = %frame.display(), error = %e, "skipping unreadable frame");
                    }
                }
            }
            (histograms, ocr_inputs)
        })
        .await?;

        let mut text_frames = 0usize;
        for path in &ocr_inputs {
            match detector.detect_text(path).await {
                Ok(text) if text.trim().chars().count() > self.config.min_text_length => {
                    text_frames += 1;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(frame = %path.display(), error = %e, "text detection failed");
                }
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let text_ratio = text_frames as f64 / frames.len() as f64;
        Ok(VisualMetrics {
            text_ratio,
            scene_diversity: scene_diversity(&histograms),
        })
    }
}

/// Histogram of `frame` plus a binarized copy written next to it for OCR.
fn prepare_frame(frame: &Path) -> Result<(Vec<f32>, PathBuf), PipelineError> {
    let img = image::open(frame)?;
    let hist = color_histogram(&img.to_rgb8());

    let mut gray = img.to_luma8();
    let threshold = otsu_threshold(&gray);
    for pixel in gray.pixels_mut() {
        pixel.0[0] = if pixel.0[0] > threshold { 255 } else { 0 };
    }
    let stem = frame
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("frame");
    let binarized = frame.with_file_name(format!("{stem}_ocr.png"));
    gray.save(&binarized)?;
    Ok((hist, binarized))
}

/// 8x8x8 RGB histogram, min-max normalised to `[0, 1]`.
#[must_use]
pub fn color_histogram(img: &RgbImage) -> Vec<f32> {
    let step = 256 / HIST_BINS;
    let mut hist = vec![0f32; HIST_BINS * HIST_BINS * HIST_BINS];
    for pixel in img.pixels() {
        let [r, g, b] = pixel.0;
        let idx = (usize::from(r) / step) * HIST_BINS * HIST_BINS
            + (usize::from(g) / step) * HIST_BINS
            + usize::from(b) / step;
        hist[idx] += 1.0;
    }

    let min = hist.iter().copied().fold(f32::INFINITY, f32::min);
    let max = hist.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;
    for v in &mut hist {
        *v = if range > f32::EPSILON { (*v - min) / range } else { 0.0 };
    }
    hist
}

/// Bhattacharyya distance between two histograms: 0 for identical
/// distributions, 1 for disjoint ones.
#[must_use]
pub fn bhattacharyya(a: &[f32], b: &[f32]) -> f64 {
    let sum_a: f64 = a.iter().map(|&v| f64::from(v)).sum();
    let sum_b: f64 = b.iter().map(|&v| f64::from(v)).sum();
    let overlap: f64 = a
        .iter()
        .zip(b)
        .map(|(&x, &y)| (f64::from(x) * f64::from(y)).sqrt())
        .sum();

    let norm = sum_a * sum_b;
    let scale = if norm.abs() > f64::EPSILON {
        1.0 / norm.sqrt()
    } else {
        1.0
    };
    (1.0 - overlap * scale).max(0.0).sqrt()
}

/// Mean distance between consecutive histograms; 0 with fewer than two.
#[must_use]
pub fn scene_diversity(histograms: &[Vec<f32>]) -> f64 {
    if histograms.len() < 2 {
        return 0.0;
    }
    let total: f64 = histograms
        .windows(2)
        .map(|pair| bhattacharyya(&pair[0], &pair[1]))
        .sum();
    #[allow(clippy::cast_precision_loss)]
    let pairs = (histograms.len() - 1) as f64;
    total / pairs
}

/// Otsu's method: the grey level that best separates foreground from background.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn otsu_threshold(img: &GrayImage) -> u8 {
    let mut counts = [0u64; 256];
    for Luma([v]) in img.pixels() {
        counts[usize::from(*v)] += 1;
    }
    let total: u64 = counts.iter().sum();
    if total == 0 {
        return 0;
    }

    let weighted_total: f64 = counts
        .iter()
        .enumerate()
        .map(|(level, &n)| level as f64 * n as f64)
        .sum();

    let mut best = (0u8, 0f64);
    let mut background = 0u64;
    let mut background_sum = 0f64;
    for (level, &n) in counts.iter().enumerate() {
        background += n;
        if background == 0 {
            continue;
        }
        let foreground = total - background;
        if foreground == 0 {
            break;
        }
        background_sum += level as f64 * n as f64;
        let mean_bg = background_sum / background as f64;
        let mean_fg = (weighted_total - background_sum) / foreground as f64;
        let between = background as f64 * foreground as f64 * (mean_bg - mean_fg).powi(2);
        if between > best.1 {
            best = (u8::try_from(level).unwrap_or(u8::MAX), between);
        }
    }
    best.0
}

/// Keeps frames that differ from the last kept frame by more than
/// `threshold` (mean absolute grey-level difference at 512x512), up to `max`.
///
/// # Errors
///
/// Returns [`PipelineError::Image`] if a frame cannot be decoded.
pub fn select_distinct_frames(
    frames: &[PathBuf],
    threshold: f64,
    max: usize,
) -> Result<Vec<PathBuf>, PipelineError> {
    let mut kept = Vec::new();
    let mut previous: Option<GrayImage> = None;

    for frame in frames {
        if kept.len() >= max {
            break;
        }
        let gray = image::open(frame)?
            .resize_exact(KEYFRAME_SIZE, KEYFRAME_SIZE, FilterType::Triangle)
            .to_luma8();

        let distinct = previous
            .as_ref()
            .is_none_or(|prev| mean_abs_diff(prev, &gray) > threshold);
        if distinct {
            kept.push(frame.clone());
            previous = Some(gray);
        }
    }
    Ok(kept)
}

#[allow(clippy::cast_precision_loss)]
fn mean_abs_diff(a: &GrayImage, b: &GrayImage) -> f64 {
    let total: u64 = a
        .pixels()
        .zip(b.pixels())
        .map(|(Luma([x]), Luma([y]))| u64::from(x.abs_diff(*y)))
        .sum();
    total as f64 / f64::from(a.width() * a.height()).max(1.0)
}
