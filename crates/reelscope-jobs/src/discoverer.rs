//! Channel discovery: turns due channels into pending queue entries.
//!
//! A channel that has never been bootstrapped gets its profile scored and a
//! deep historical fetch. After that each run fetches only the most recent
//! posts and stops at the stored cursor, the newest shortcode seen so far.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use reelscope_core::{score_channel, score_item, AppConfig, Channel, ItemSignals, PostType};
use reelscope_db::{DbError, NewContentItem};
use reelscope_source::{with_reauth, RetryPolicy, SourceError, SourceFetcher, SourcePost};
use sqlx::PgPool;
use thiserror::Error;

/// Why a single channel could not be checked. Never escapes a run.
#[derive(Debug, Error)]
enum ChannelError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Db(#[from] DbError),
}

/// What checking one channel did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelCheck {
    Fetched(u64),
    Bootstrapped(u64),
    /// Profile missing or private; the channel was deactivated.
    Retired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscovererConfig {
    /// Check every active channel, ignoring fetch frequency.
    pub force_check_all: bool,
    /// Bounds of the random pause between two channels.
    pub delay_min_secs: u64,
    pub delay_max_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for DiscovererConfig {
    fn default() -> Self {
        Self {
            force_check_all: false,
            delay_min_secs: 5,
            delay_max_secs: 15,
            retry: RetryPolicy::default(),
        }
    }
}

impl DiscovererConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            force_check_all: config.force_check_all,
            delay_min_secs: config.channel_delay_min_secs,
            delay_max_secs: config.channel_delay_max_secs,
            retry: RetryPolicy {
                max_retries: config.source_max_retries,
                backoff_base_ms: config.source_retry_backoff_base_ms,
            },
        }
    }
}

/// Totals for one discovery run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoverSummary {
    pub channels_checked: usize,
    pub bootstrapped: usize,
    /// Channels deactivated because their profile is gone or private.
    pub channels_retired: usize,
    pub items_inserted: u64,
    pub channels_failed: usize,
}

pub struct Discoverer {
    pool: PgPool,
    fetcher: Arc<dyn SourceFetcher>,
    config: DiscovererConfig,
}

impl Discoverer {
    #[must_use]
    pub fn new(pool: PgPool, fetcher: Arc<dyn SourceFetcher>, config: DiscovererConfig) -> Self {
        Self {
            pool,
            fetcher,
            config,
        }
    }

    /// Checks every due channel (or every active one when forced), highest
    /// priority first.
    ///
    /// A failure on one channel is logged, the channel is stamped checked so
    /// it waits for its next due cycle, and the run moves on.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the channel list cannot be loaded or a failed
    /// channel cannot be stamped.
    pub async fn run_once(&self) -> Result<DiscoverSummary, DbError> {
        let channels = if self.config.force_check_all {
            reelscope_db::list_active_channels(&self.pool).await?
        } else {
            reelscope_db::get_due_channels(&self.pool, Utc::now()).await?
        };

        let mut summary = DiscoverSummary::default();
        if channels.is_empty() {
            tracing::info!("discover: no channels due");
            return Ok(summary);
        }
        tracing::info!(
            count = channels.len(),
            forced = self.config.force_check_all,
            "discover: checking channels"
        );

        for (i, channel) in channels.iter().enumerate() {
            if i > 0 {
                self.pause().await;
            }
            summary.channels_checked += 1;

            match self.check_channel(channel).await {
                Ok(ChannelCheck::Fetched(inserted)) => summary.items_inserted += inserted,
                Ok(ChannelCheck::Bootstrapped(inserted)) => {
                    summary.items_inserted += inserted;
                    summary.bootstrapped += 1;
                }
                Ok(ChannelCheck::Retired) => summary.channels_retired += 1,
                Err(e) => {
                    summary.channels_failed += 1;
                    tracing::error!(channel = %channel.handle, error = %e, "discover: channel check failed");
                    match reelscope_db::mark_channel_checked(&self.pool, &channel.handle).await {
                        Ok(()) => {}
                        Err(DbError::NotFound) => {
                            tracing::warn!(channel = %channel.handle, "discover: channel removed during run");
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        tracing::info!(
            channels_checked = summary.channels_checked,
            bootstrapped = summary.bootstrapped,
            channels_retired = summary.channels_retired,
            items_inserted = summary.items_inserted,
            channels_failed = summary.channels_failed,
            "discover: run complete"
        );
        Ok(summary)
    }

    async fn check_channel(&self, channel: &Channel) -> Result<ChannelCheck, ChannelError> {
        if channel.is_bootstrapped {
            Ok(ChannelCheck::Fetched(self.fetch_new_posts(channel).await?))
        } else {
            self.bootstrap(channel).await
        }
    }

    async fn bootstrap(&self, channel: &Channel) -> Result<ChannelCheck, ChannelError> {
        let handle = channel.handle.as_str();
        tracing::info!(channel = handle, "discover: bootstrapping channel");

        let profile = match with_reauth(self.fetcher.as_ref(), self.config.retry, || {
            self.fetcher.fetch_profile(handle)
        })
        .await
        {
            Ok(profile) => profile,
            Err(e @ (SourceError::PrivateProfile { .. } | SourceError::NotFound { .. })) => {
                tracing::warn!(channel = handle, error = %e, "discover: profile inaccessible, retiring channel");
                reelscope_db::deactivate_channel(&self.pool, handle).await?;
                reelscope_db::mark_channel_bootstrapped(&self.pool, handle, None).await?;
                return Ok(ChannelCheck::Retired);
            }
            Err(e) => return Err(e.into()),
        };

        let signals = profile.signals();
        let assessment = score_channel(&signals);
        let is_active = signals.is_active();
        reelscope_db::update_channel_info(
            &self.pool,
            handle,
            &assessment,
            &profile.stats(),
            is_active,
        )
        .await?;
        tracing::info!(
            channel = handle,
            priority = assessment.priority,
            category = %assessment.category.as_str(),
            fetch_frequency_hours = assessment.fetch_frequency_hours,
            "discover: channel scored"
        );

        if !is_active {
            tracing::warn!(channel = handle, "discover: profile is private, retiring channel");
            reelscope_db::mark_channel_bootstrapped(&self.pool, handle, None).await?;
            return Ok(ChannelCheck::Retired);
        }

        let posts = self
            .recent_posts(handle, channel.max_posts_to_fetch)
            .await?;
        let inserted = self.enqueue(handle, assessment.priority, &posts).await?;
        let newest = posts.first().map(|p| p.shortcode.as_str());
        reelscope_db::mark_channel_bootstrapped(&self.pool, handle, newest).await?;

        tracing::info!(
            channel = handle,
            fetched = posts.len(),
            inserted,
            cursor = ?newest,
            "discover: bootstrap complete"
        );
        Ok(ChannelCheck::Bootstrapped(inserted))
    }

    async fn fetch_new_posts(&self, channel: &Channel) -> Result<u64, ChannelError> {
        let handle = channel.handle.as_str();
        let posts = self.recent_posts(handle, channel.posts_to_fetch).await?;
        let fresh = posts_newer_than(&posts, channel.cursor());

        if fresh.is_empty() {
            tracing::debug!(channel = handle, "discover: no new posts");
            reelscope_db::update_channel_after_fetch(&self.pool, handle, None).await?;
            return Ok(0);
        }

        let inserted = self.enqueue(handle, channel.priority, fresh).await?;
        let newest = fresh.first().map(|p| p.shortcode.as_str());
        reelscope_db::update_channel_after_fetch(&self.pool, handle, newest).await?;

        tracing::info!(
            channel = handle,
            new_posts = fresh.len(),
            inserted,
            "discover: new posts queued"
        );
        Ok(inserted)
    }

    async fn recent_posts(&self, handle: &str, limit: u32) -> Result<Vec<SourcePost>, SourceError> {
        with_reauth(self.fetcher.as_ref(), self.config.retry, || {
            self.fetcher.fetch_recent_posts(handle, limit)
        })
        .await
    }

    async fn enqueue(
        &self,
        handle: &str,
        channel_priority: u8,
        posts: &[SourcePost],
    ) -> Result<u64, DbError> {
        let prepared: Vec<PreparedPost<'_>> = posts
            .iter()
            .map(|post| PreparedPost::new(post, channel_priority))
            .collect();
        let items: Vec<NewContentItem<'_>> = prepared
            .iter()
            .map(|p| p.as_new_item(handle))
            .collect();
        reelscope_db::add_content_items(&self.pool, &items).await
    }

    async fn pause(&self) {
        let min_ms = self.config.delay_min_secs.saturating_mul(1000);
        let max_ms = self.config.delay_max_secs.saturating_mul(1000).max(min_ms);
        if max_ms == 0 {
            return;
        }
        let delay_ms = rand::rng().random_range(min_ms..=max_ms);
        tracing::debug!(delay_ms, "discover: pausing before next channel");
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
}

/// The leading run of `posts` (newest first) that precedes `cursor`.
///
/// With no cursor, or a cursor that is not in the batch, every post is new.
fn posts_newer_than<'a>(posts: &'a [SourcePost], cursor: Option<&str>) -> &'a [SourcePost] {
    let end = cursor
        .and_then(|c| posts.iter().position(|p| p.shortcode == c))
        .unwrap_or(posts.len());
    &posts[..end]
}

/// Owned values a [`NewContentItem`] borrows from.
struct PreparedPost<'a> {
    post: &'a SourcePost,
    url: String,
    hashtags: Vec<String>,
    post_type: PostType,
    priority: u8,
}

impl<'a> PreparedPost<'a> {
    fn new(post: &'a SourcePost, channel_priority: u8) -> Self {
        let hashtags = post.resolved_hashtags();
        let post_type = post.post_type();
        let priority = score_item(&ItemSignals {
            channel_priority,
            caption: post.caption.as_deref(),
            hashtags: &hashtags,
            like_count: post.like_count,
            post_type,
        });
        Self {
            post,
            url: post.url(),
            hashtags,
            post_type,
            priority,
        }
    }

    fn as_new_item<'b>(&'b self, handle: &'b str) -> NewContentItem<'b> {
        NewContentItem {
            shortcode: &self.post.shortcode,
            source_url: &self.url,
            channel_handle: handle,
            priority: self.priority,
            post_type: self.post_type,
            caption: self.post.caption.as_deref(),
            hashtags: &self.hashtags,
            like_count: self.post.like_count,
            video_duration_secs: self.post.video_duration_secs,
            uploaded_at: self.post.taken_at,
        }
    }
}
