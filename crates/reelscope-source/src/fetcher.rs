//! The source-fetching seam used by discovery.

use std::future::Future;

use async_trait::async_trait;

use crate::error::SourceError;
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::types::{SourcePost, SourceProfile};

/// Access to a social platform's profiles and posts.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Profile metadata for `handle`.
    async fn fetch_profile(&self, handle: &str) -> Result<SourceProfile, SourceError>;

    /// Up to `limit` of the account's most recent posts, newest first.
    async fn fetch_recent_posts(
        &self,
        handle: &str,
        limit: u32,
    ) -> Result<Vec<SourcePost>, SourceError>;

    /// Establish a fresh session after [`SourceError::AuthRequired`].
    async fn reauthenticate(&self) -> Result<(), SourceError>;
}

/// Runs `operation` under `policy`, re-authenticating at most once.
///
/// When the operation (after its own retries) fails with
/// [`SourceError::AuthRequired`], `fetcher.reauthenticate()` is called and the
/// operation is run exactly once more under the same policy. A second
/// `AuthRequired` is returned to the caller.
///
/// # Errors
///
/// Returns the operation's error, or the error from `reauthenticate`.
pub async fn with_reauth<S, T, F, Fut>(
    fetcher: &S,
    policy: RetryPolicy,
    mut operation: F,
) -> Result<T, SourceError>
where
    S: SourceFetcher + ?Sized,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    match retry_with_backoff(policy.max_retries, policy.backoff_base_ms, &mut operation).await {
        Err(SourceError::AuthRequired) => {
            tracing::warn!("source session rejected, re-authenticating once");
            fetcher.reauthenticate().await?;
            retry_with_backoff(policy.max_retries, policy.backoff_base_ms, &mut operation).await
        }
        other => other,
    }
}
