//! Database operations for the `channels` table.

use chrono::{DateTime, Utc};
use reelscope_core::{Category, Channel, ChannelAssessment, ProfileStats, DEFAULT_PLATFORM};
use sqlx::PgPool;

use crate::DbError;

const CHANNEL_COLUMNS: &str = "handle, platform, is_active, priority, category, posts_to_fetch, \
     max_posts_to_fetch, fetch_frequency_hours, is_bootstrapped, follower_count, media_count, \
     biography, is_verified, last_checked_at, last_fetched_shortcode, created_at, updated_at";

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `channels` table, as stored.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChannelRow {
    pub handle: String,
    pub platform: String,
    pub is_active: bool,
    pub priority: i16,
    pub category: String,
    pub posts_to_fetch: i32,
    pub max_posts_to_fetch: i32,
    pub fetch_frequency_hours: i32,
    pub is_bootstrapped: bool,
    pub follower_count: Option<i64>,
    pub media_count: Option<i64>,
    pub biography: Option<String>,
    pub is_verified: bool,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub last_fetched_shortcode: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ChannelRow> for Channel {
    type Error = DbError;

    fn try_from(row: ChannelRow) -> Result<Self, Self::Error> {
        let invalid = |reason: String| DbError::invalid_record("channels", &row.handle, reason);

        let priority = u8::try_from(row.priority)
            .ok()
            .filter(|p| (1..=10).contains(p))
            .ok_or_else(|| invalid(format!("priority {} out of range", row.priority)))?;
        let category = row
            .category
            .parse::<Category>()
            .map_err(|e| invalid(e.to_string()))?;
        let count = |name: &str, value: i32| {
            u32::try_from(value).map_err(|_| invalid(format!("negative {name}: {value}")))
        };
        let posts_to_fetch = count("posts_to_fetch", row.posts_to_fetch)?;
        let max_posts_to_fetch = count("max_posts_to_fetch", row.max_posts_to_fetch)?;
        let fetch_frequency_hours = count("fetch_frequency_hours", row.fetch_frequency_hours)?;

        if !row.is_bootstrapped && row.last_fetched_shortcode.is_some() {
            return Err(invalid("cursor set before bootstrap".to_string()));
        }

        Ok(Channel {
            handle: row.handle,
            platform: row.platform,
            is_active: row.is_active,
            priority,
            category,
            posts_to_fetch,
            max_posts_to_fetch,
            fetch_frequency_hours,
            is_bootstrapped: row.is_bootstrapped,
            stats: ProfileStats {
                follower_count: row.follower_count,
                media_count: row.media_count,
                biography: row.biography,
                is_verified: row.is_verified,
            },
            last_checked_at: row.last_checked_at,
            last_fetched_shortcode: row.last_fetched_shortcode,
        })
    }
}

/// Fields an operator supplies when registering a channel.
#[derive(Debug, Clone, Copy)]
pub struct NewChannel<'a> {
    pub handle: &'a str,
    pub platform: &'a str,
    pub priority: u8,
    pub category: Category,
}

impl<'a> NewChannel<'a> {
    #[must_use]
    pub fn new(handle: &'a str) -> Self {
        Self {
            handle,
            platform: DEFAULT_PLATFORM,
            priority: 1,
            category: Category::General,
        }
    }
}

fn into_channels(rows: Vec<ChannelRow>) -> Result<Vec<Channel>, DbError> {
    rows.into_iter().map(Channel::try_from).collect()
}

fn expect_one(rows_affected: u64) -> Result<(), DbError> {
    if rows_affected == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Fetches a single channel by handle.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no channel has the handle,
/// [`DbError::InvalidRecord`] if the stored row is malformed, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_channel(pool: &PgPool, handle: &str) -> Result<Channel, DbError> {
    let row = sqlx::query_as::<_, ChannelRow>(&format!(
        "SELECT {CHANNEL_COLUMNS} FROM channels WHERE handle = $1"
    ))
    .bind(handle)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Channel::try_from(row)
}

/// Returns every channel, highest priority first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or [`DbError::InvalidRecord`]
/// if any row is malformed.
pub async fn list_channels(pool: &PgPool) -> Result<Vec<Channel>, DbError> {
    let rows = sqlx::query_as::<_, ChannelRow>(&format!(
        "SELECT {CHANNEL_COLUMNS} FROM channels \
         ORDER BY priority DESC, created_at ASC, handle ASC"
    ))
    .fetch_all(pool)
    .await?;

    into_channels(rows)
}

/// Returns all active channels regardless of when they were last checked.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or [`DbError::InvalidRecord`]
/// if any row is malformed.
pub async fn list_active_channels(pool: &PgPool) -> Result<Vec<Channel>, DbError> {
    let rows = sqlx::query_as::<_, ChannelRow>(&format!(
        "SELECT {CHANNEL_COLUMNS} FROM channels \
         WHERE is_active \
         ORDER BY priority DESC, created_at ASC, handle ASC"
    ))
    .fetch_all(pool)
    .await?;

    into_channels(rows)
}

/// Returns the channels due for a check at `now`, highest priority first.
///
/// A channel is due when it is active and either was never checked or was
/// last checked at least `fetch_frequency_hours` before `now`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or [`DbError::InvalidRecord`]
/// if any row is malformed.
pub async fn get_due_channels(pool: &PgPool, now: DateTime<Utc>) -> Result<Vec<Channel>, DbError> {
    let rows = sqlx::query_as::<_, ChannelRow>(&format!(
        "SELECT {CHANNEL_COLUMNS} FROM channels \
         WHERE is_active \
           AND (last_checked_at IS NULL \
                OR last_checked_at + make_interval(hours => fetch_frequency_hours) <= $1) \
         ORDER BY priority DESC, created_at ASC, handle ASC"
    ))
    .bind(now)
    .fetch_all(pool)
    .await?;

    into_channels(rows)
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Registers a channel if its handle is not already tracked.
///
/// Returns `true` when a new row was inserted and `false` when the handle
/// already existed (the existing row is left untouched).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails, including a priority
/// outside `1..=10`.
pub async fn add_channel(pool: &PgPool, channel: NewChannel<'_>) -> Result<bool, DbError> {
    let result = sqlx::query(
        "INSERT INTO channels (handle, platform, priority, category) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (handle) DO NOTHING",
    )
    .bind(channel.handle)
    .bind(channel.platform)
    .bind(i16::from(channel.priority))
    .bind(channel.category.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Stamps `last_checked_at = NOW()` without touching the cursor.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the channel does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn mark_channel_checked(pool: &PgPool, handle: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE channels \
         SET last_checked_at = NOW(), updated_at = NOW() \
         WHERE handle = $1",
    )
    .bind(handle)
    .execute(pool)
    .await?;

    expect_one(result.rows_affected())
}

/// Advances the cursor after an incremental fetch and stamps the check time.
///
/// With no newest shortcode (nothing new was found) this only stamps the
/// check time, like [`mark_channel_checked`].
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the channel does not exist, or
/// [`DbError::Sqlx`] if the update fails (including a cursor on a channel
/// that was never bootstrapped).
pub async fn update_channel_after_fetch(
    pool: &PgPool,
    handle: &str,
    newest_shortcode: Option<&str>,
) -> Result<(), DbError> {
    let Some(newest) = newest_shortcode else {
        return mark_channel_checked(pool, handle).await;
    };

    let result = sqlx::query(
        "UPDATE channels \
         SET last_fetched_shortcode = $1, last_checked_at = NOW(), updated_at = NOW() \
         WHERE handle = $2",
    )
    .bind(newest)
    .bind(handle)
    .execute(pool)
    .await?;

    expect_one(result.rows_affected())
}

/// Marks the channel bootstrapped, setting its cursor (possibly to null)
/// and stamping the check time.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the channel does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn mark_channel_bootstrapped(
    pool: &PgPool,
    handle: &str,
    newest_shortcode: Option<&str>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE channels \
         SET is_bootstrapped = TRUE, last_fetched_shortcode = $1, \
             last_checked_at = NOW(), updated_at = NOW() \
         WHERE handle = $2",
    )
    .bind(newest_shortcode)
    .bind(handle)
    .execute(pool)
    .await?;

    expect_one(result.rows_affected())
}

/// Writes the result of channel scoring and the profile stats it was based on.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the channel does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_channel_info(
    pool: &PgPool,
    handle: &str,
    assessment: &ChannelAssessment,
    stats: &ProfileStats,
    is_active: bool,
) -> Result<(), DbError> {
    let posts_to_fetch = i32::try_from(assessment.posts_to_fetch)
        .map_err(|_| DbError::invalid_record("channels", handle, "posts_to_fetch overflow"))?;
    let fetch_frequency_hours = i32::try_from(assessment.fetch_frequency_hours).map_err(|_| {
        DbError::invalid_record("channels", handle, "fetch_frequency_hours overflow")
    })?;

    let result = sqlx::query(
        "UPDATE channels SET \
             priority              = $1, \
             category              = $2, \
             fetch_frequency_hours = $3, \
             posts_to_fetch        = $4, \
             follower_count        = $5, \
             media_count           = $6, \
             biography             = $7, \
             is_verified           = $8, \
             is_active             = $9, \
             updated_at            = NOW() \
         WHERE handle = $10",
    )
    .bind(i16::from(assessment.priority))
    .bind(assessment.category.as_str())
    .bind(fetch_frequency_hours)
    .bind(posts_to_fetch)
    .bind(stats.follower_count)
    .bind(stats.media_count)
    .bind(stats.biography.as_deref())
    .bind(stats.is_verified)
    .bind(is_active)
    .bind(handle)
    .execute(pool)
    .await?;

    expect_one(result.rows_affected())
}

/// Retires a channel so it is never due again.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the channel does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn deactivate_channel(pool: &PgPool, handle: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE channels SET is_active = FALSE, updated_at = NOW() WHERE handle = $1",
    )
    .bind(handle)
    .execute(pool)
    .await?;

    expect_one(result.rows_affected())
}
