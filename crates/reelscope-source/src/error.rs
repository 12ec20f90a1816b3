use thiserror::Error;

/// Errors returned by a source fetcher.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The session is missing or expired; call `reauthenticate` and retry.
    #[error("source session requires re-authentication")]
    AuthRequired,

    #[error("profile not found: {handle}")]
    NotFound { handle: String },

    #[error("profile is private: {handle}")]
    PrivateProfile { handle: String },

    #[error("rate limited by source (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("invalid base URL \"{base_url}\": {reason}")]
    InvalidBaseUrl { base_url: String, reason: String },
}
