pub mod app_config;
pub mod channel;
pub mod config;
pub mod content;
pub mod priority;
pub mod report;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use channel::{Category, Channel, ChannelAssessment, ProfileStats, DEFAULT_PLATFORM};
pub use config::{load_app_config, load_app_config_from_env};
pub use content::{canonical_url, extract_hashtags, ContentItem, ItemStatus, PostType};
pub use priority::{score_channel, score_item, ChannelSignals, ItemSignals};
pub use report::{parse_report, ReportSection, StructuredReport};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

/// Returned when a stored string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} value: {value:?}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}
