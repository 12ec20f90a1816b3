//! Source-fetching collaborator: profiles and recent posts for tracked
//! accounts, with retry and one-shot re-authentication.

pub mod client;
pub mod error;
pub mod fetcher;
pub mod retry;
pub mod types;

pub use client::{Credentials, GatewayClient};
pub use error::SourceError;
pub use fetcher::{with_reauth, SourceFetcher};
pub use retry::{retry_with_backoff, RetryPolicy};
pub use types::{SourcePost, SourceProfile};
