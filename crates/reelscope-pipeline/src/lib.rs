//! Content-understanding pipeline: download, media analysis, evaluation and
//! final report synthesis for one queued post.

pub mod collaborators;
pub mod error;
pub mod evaluator;
pub mod ffmpeg;
pub mod gallery_dl;
pub mod gemini;
pub mod orchestrator;
mod process;
pub mod prompts;
pub mod tesseract;
pub mod whisper;
pub mod workdir;

pub use collaborators::{
    MediaDownloader, MediaTools, SynthesisModel, TextDetector, Transcriber, Transcript,
};
pub use error::PipelineError;
pub use evaluator::{Evaluation, Evaluator, EvaluatorConfig, VisualMetrics};
pub use ffmpeg::FfmpegTools;
pub use gallery_dl::GalleryDl;
pub use gemini::GeminiClient;
pub use orchestrator::{
    Collaborators, ContentPipeline, Orchestrator, OrchestratorConfig, PipelineOutcome,
};
pub use tesseract::TesseractCli;
pub use whisper::WhisperCli;
pub use workdir::{DoneLog, WorkDir};
