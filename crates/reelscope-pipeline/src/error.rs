use std::path::PathBuf;

use thiserror::Error;

/// Errors returned while turning a queued post into a report.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no media files were downloaded for {shortcode}")]
    NoMedia { shortcode: String },

    /// Every analysis stage came back empty and there is no caption either.
    #[error("nothing to summarize for {shortcode}")]
    NothingToSummarize { shortcode: String },

    #[error("GOOGLE_API_KEY is not set")]
    MissingApiKey,

    #[error("{tool} not found (is it installed and on PATH?)")]
    ToolNotFound { tool: String },

    #[error("{tool} failed ({status}): {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model returned an error: {0}")]
    Model(String),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
