//! Database operations for the `content_items` work queue.

use chrono::{DateTime, Duration, Utc};
use reelscope_core::{ContentItem, ItemStatus, PostType};
use sqlx::PgPool;

use crate::DbError;

/// Error recorded on items whose processing lease ran out.
pub const ABANDONED_MESSAGE: &str = "abandoned: processing lease expired";

const ITEM_COLUMNS: &str = "shortcode, source_url, channel_handle, status, priority, post_type, \
     caption, hashtags, like_count, video_duration_secs, uploaded_at, added_at, processed_at, \
     final_summary_report, structured_summary, processing_metadata, error_message";

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `content_items` table, as stored.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ContentItemRow {
    pub shortcode: String,
    pub source_url: String,
    pub channel_handle: String,
    pub status: String,
    pub priority: i16,
    pub post_type: String,
    pub caption: Option<String>,
    pub hashtags: Vec<String>,
    pub like_count: Option<i64>,
    pub video_duration_secs: Option<f64>,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub added_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub final_summary_report: Option<String>,
    pub structured_summary: Option<serde_json::Value>,
    pub processing_metadata: Option<serde_json::Value>,
    pub error_message: Option<String>,
}

impl TryFrom<ContentItemRow> for ContentItem {
    type Error = DbError;

    fn try_from(row: ContentItemRow) -> Result<Self, Self::Error> {
        let invalid =
            |reason: String| DbError::invalid_record("content_items", &row.shortcode, reason);

        let status = row
            .status
            .parse::<ItemStatus>()
            .map_err(|e| invalid(e.to_string()))?;
        let post_type = row
            .post_type
            .parse::<PostType>()
            .map_err(|e| invalid(e.to_string()))?;
        let priority = u8::try_from(row.priority)
            .ok()
            .filter(|p| (1..=10).contains(p))
            .ok_or_else(|| invalid(format!("priority {} out of range", row.priority)))?;

        Ok(ContentItem {
            shortcode: row.shortcode,
            source_url: row.source_url,
            channel_handle: row.channel_handle,
            status,
            priority,
            post_type,
            caption: row.caption,
            hashtags: row.hashtags,
            like_count: row.like_count,
            video_duration_secs: row.video_duration_secs,
            uploaded_at: row.uploaded_at,
            added_at: row.added_at,
            processed_at: row.processed_at,
            final_summary_report: row.final_summary_report,
            structured_summary: row.structured_summary,
            processing_metadata: row.processing_metadata,
            error_message: row.error_message,
        })
    }
}

/// A newly discovered post, ready to enqueue as `pending`.
#[derive(Debug, Clone, Copy)]
pub struct NewContentItem<'a> {
    pub shortcode: &'a str,
    pub source_url: &'a str,
    pub channel_handle: &'a str,
    pub priority: u8,
    pub post_type: PostType,
    pub caption: Option<&'a str>,
    pub hashtags: &'a [String],
    pub like_count: Option<i64>,
    pub video_duration_secs: Option<f64>,
    pub uploaded_at: Option<DateTime<Utc>>,
}

/// Number of items in each queue state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
}

impl StatusCounts {
    #[must_use]
    pub fn total(&self) -> i64 {
        self.pending + self.processing + self.completed + self.failed
    }
}

// ---------------------------------------------------------------------------
// Queue operations
// ---------------------------------------------------------------------------

/// Inserts items that are not already queued, leaving existing rows untouched.
///
/// All inserts run in one transaction. Returns how many rows were genuinely
/// new, so re-running discovery over known posts returns zero.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any insert or the commit fails; nothing is
/// inserted in that case.
pub async fn add_content_items(pool: &PgPool, items: &[NewContentItem<'_>]) -> Result<u64, DbError> {
    if items.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    let mut inserted = 0_u64;

    for item in items {
        let result = sqlx::query(
            "INSERT INTO content_items \
                 (shortcode, source_url, channel_handle, status, priority, post_type, \
                  caption, hashtags, like_count, video_duration_secs, uploaded_at) \
             VALUES ($1, $2, $3, 'pending', $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (shortcode) DO NOTHING",
        )
        .bind(item.shortcode)
        .bind(item.source_url)
        .bind(item.channel_handle)
        .bind(i16::from(item.priority))
        .bind(item.post_type.as_str())
        .bind(item.caption)
        .bind(item.hashtags)
        .bind(item.like_count)
        .bind(item.video_duration_secs)
        .bind(item.uploaded_at)
        .execute(&mut *tx)
        .await?;

        inserted += result.rows_affected();
    }

    tx.commit().await?;
    Ok(inserted)
}

/// Atomically claims the highest-priority, oldest pending item.
///
/// The item moves to `processing` with `processed_at = NOW()` in a single
/// statement; concurrent callers skip rows locked by each other, so an item
/// is handed to at most one caller. Returns `None` when the queue is empty.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails, or
/// [`DbError::InvalidRecord`] if the claimed row is malformed.
pub async fn claim_pending_item(pool: &PgPool) -> Result<Option<ContentItem>, DbError> {
    let row = sqlx::query_as::<_, ContentItemRow>(&format!(
        "UPDATE content_items \
         SET status = 'processing', processed_at = NOW() \
         WHERE shortcode = ( \
             SELECT shortcode FROM content_items \
             WHERE status = 'pending' \
             ORDER BY priority DESC, added_at ASC, shortcode ASC \
             LIMIT 1 \
             FOR UPDATE SKIP LOCKED \
         ) \
         RETURNING {ITEM_COLUMNS}"
    ))
    .fetch_optional(pool)
    .await?;

    row.map(ContentItem::try_from).transpose()
}

/// Marks a `processing` item `completed` with its report and metadata.
///
/// # Errors
///
/// Returns [`DbError::InvalidItemTransition`] if the item is not in
/// `processing`, or [`DbError::Sqlx`] if the update fails.
pub async fn complete_item(
    pool: &PgPool,
    shortcode: &str,
    report: &str,
    structured_summary: &serde_json::Value,
    metadata: &serde_json::Value,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE content_items \
         SET status = 'completed', processed_at = NOW(), final_summary_report = $1, \
             structured_summary = $2, processing_metadata = $3, error_message = NULL \
         WHERE shortcode = $4 AND status = 'processing'",
    )
    .bind(report)
    .bind(structured_summary)
    .bind(metadata)
    .bind(shortcode)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidItemTransition {
            shortcode: shortcode.to_string(),
            expected_status: "processing",
        });
    }

    Ok(())
}

/// Marks a `processing` item `failed` with an error message.
///
/// # Errors
///
/// Returns [`DbError::InvalidItemTransition`] if the item is not in
/// `processing`, or [`DbError::Sqlx`] if the update fails.
pub async fn fail_item(pool: &PgPool, shortcode: &str, error_message: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE content_items \
         SET status = 'failed', processed_at = NOW(), error_message = $1 \
         WHERE shortcode = $2 AND status = 'processing'",
    )
    .bind(error_message)
    .bind(shortcode)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidItemTransition {
            shortcode: shortcode.to_string(),
            expected_status: "processing",
        });
    }

    Ok(())
}

/// Fails items that have been `processing` for longer than `lease`.
///
/// Returns the number of items failed with [`ABANDONED_MESSAGE`].
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn fail_stale_items(pool: &PgPool, lease: Duration) -> Result<u64, DbError> {
    let cutoff = Utc::now() - lease;
    let result = sqlx::query(
        "UPDATE content_items \
         SET status = 'failed', error_message = $1 \
         WHERE status = 'processing' AND processed_at < $2",
    )
    .bind(ABANDONED_MESSAGE)
    .bind(cutoff)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Returns failed items to `pending`, optionally only for one channel.
///
/// Clears `processed_at` and `error_message`. Returns how many were requeued.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn reset_failed_items(pool: &PgPool, channel_handle: Option<&str>) -> Result<u64, DbError> {
    let result = sqlx::query(
        "UPDATE content_items \
         SET status = 'pending', processed_at = NULL, error_message = NULL \
         WHERE status = 'failed' AND ($1::TEXT IS NULL OR channel_handle = $1)",
    )
    .bind(channel_handle)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Fetches a single item by shortcode.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no item has the shortcode,
/// [`DbError::InvalidRecord`] if the row is malformed, or [`DbError::Sqlx`]
/// if the query fails.
pub async fn get_item(pool: &PgPool, shortcode: &str) -> Result<ContentItem, DbError> {
    let row = sqlx::query_as::<_, ContentItemRow>(&format!(
        "SELECT {ITEM_COLUMNS} FROM content_items WHERE shortcode = $1"
    ))
    .bind(shortcode)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    ContentItem::try_from(row)
}

/// Returns up to `limit` items, newest first, optionally filtered by status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or [`DbError::InvalidRecord`]
/// if any row is malformed.
pub async fn list_items(
    pool: &PgPool,
    status: Option<ItemStatus>,
    limit: i64,
) -> Result<Vec<ContentItem>, DbError> {
    let rows = sqlx::query_as::<_, ContentItemRow>(&format!(
        "SELECT {ITEM_COLUMNS} FROM content_items \
         WHERE ($1::TEXT IS NULL OR status = $1) \
         ORDER BY added_at DESC, shortcode ASC \
         LIMIT $2"
    ))
    .bind(status.map(ItemStatus::as_str))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(ContentItem::try_from).collect()
}

/// Counts items per status. Statuses with no items count as zero.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or [`DbError::InvalidRecord`]
/// if a stored status is unknown.
pub async fn count_items_by_status(pool: &PgPool) -> Result<StatusCounts, DbError> {
    let rows = sqlx::query_as::<_, (String, i64)>(
        "SELECT status, COUNT(*) FROM content_items GROUP BY status",
    )
    .fetch_all(pool)
    .await?;

    let mut counts = StatusCounts::default();
    for (status, count) in rows {
        let status = status
            .parse::<ItemStatus>()
            .map_err(|e| DbError::invalid_record("content_items", &status, e))?;
        match status {
            ItemStatus::Pending => counts.pending = count,
            ItemStatus::Processing => counts.processing = count,
            ItemStatus::Completed => counts.completed = count,
            ItemStatus::Failed => counts.failed = count,
        }
    }

    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str, post_type: &str, priority: i16) -> ContentItemRow {
        ContentItemRow {
            shortcode: "C1a2b3".to_string(),
            source_url: "https://www.instagram.com/p/C1a2b3/".to_string(),
            channel_handle: "devdaily".to_string(),
            status: status.to_string(),
            priority,
            post_type: post_type.to_string(),
            caption: None,
            hashtags: Vec::new(),
            like_count: None,
            video_duration_secs: None,
            uploaded_at: None,
            added_at: Utc::now(),
            processed_at: None,
            final_summary_report: None,
            structured_summary: None,
            processing_metadata: None,
            error_message: None,
        }
    }

    #[test]
    fn valid_row_converts() {
        let item = ContentItem::try_from(row("pending", "album", 7)).unwrap();
        assert_eq!(item.status, ItemStatus::Pending);
        assert_eq!(item.post_type, PostType::Album);
        assert_eq!(item.priority, 7);
    }

    #[test]
    fn unknown_status_is_invalid_record() {
        let err = ContentItem::try_from(row("queued", "post", 5)).unwrap_err();
        assert!(
            matches!(err, DbError::InvalidRecord { table: "content_items", ref key, .. } if key == "C1a2b3"),
            "got {err:?}"
        );
    }

    #[test]
    fn unknown_post_type_is_invalid_record() {
        let err = ContentItem::try_from(row("pending", "story", 5)).unwrap_err();
        assert!(matches!(err, DbError::InvalidRecord { .. }));
    }

    #[test]
    fn out_of_range_priority_is_invalid_record() {
        assert!(ContentItem::try_from(row("pending", "post", 0)).is_err());
        assert!(ContentItem::try_from(row("pending", "post", 11)).is_err());
        assert!(ContentItem::try_from(row("pending", "post", -3)).is_err());
    }

    #[test]
    fn status_counts_total() {
        let counts = StatusCounts {
            pending: 3,
            processing: 1,
            completed: 10,
            failed: 2,
        };
        assert_eq!(counts.total(), 16);
    }
}
