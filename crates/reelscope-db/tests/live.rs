//! Live integration tests for reelscope-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/reelscope-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory.

use chrono::{Duration, Utc};
use reelscope_core::{Category, ChannelAssessment, ItemStatus, PostType, ProfileStats};
use reelscope_db::{
    add_channel, add_content_items, claim_pending_item, complete_item, count_items_by_status,
    deactivate_channel, fail_item, fail_stale_items, get_channel, get_due_channels, get_item,
    list_active_channels, list_channels, list_items, mark_channel_bootstrapped,
    mark_channel_checked, reset_failed_items, update_channel_after_fetch, update_channel_info,
    DbError, NewChannel, NewContentItem, ABANDONED_MESSAGE,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn insert_channel(pool: &sqlx::PgPool, handle: &str, priority: u8) {
    let mut channel = NewChannel::new(handle);
    channel.priority = priority;
    add_channel(pool, channel)
        .await
        .unwrap_or_else(|e| panic!("add_channel failed for '{handle}': {e}"));
}

/// Backdate a channel's last check by `hours`.
async fn set_checked_hours_ago(pool: &sqlx::PgPool, handle: &str, hours: i64) {
    sqlx::query("UPDATE channels SET last_checked_at = $1 WHERE handle = $2")
        .bind(Utc::now() - Duration::hours(hours))
        .bind(handle)
        .execute(pool)
        .await
        .expect("backdate last_checked_at");
}

fn new_item<'a>(shortcode: &'a str, channel: &'a str, priority: u8) -> NewContentItem<'a> {
    NewContentItem {
        shortcode,
        source_url: "https://www.instagram.com/p/placeholder/",
        channel_handle: channel,
        priority,
        post_type: PostType::Post,
        caption: Some("caption"),
        hashtags: &[],
        like_count: Some(10),
        video_duration_secs: None,
        uploaded_at: None,
    }
}

// ---------------------------------------------------------------------------
// Section 1: Channels
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn add_channel_reports_whether_it_was_new(pool: sqlx::PgPool) {
    assert!(add_channel(&pool, NewChannel::new("devdaily")).await.unwrap());
    assert!(!add_channel(&pool, NewChannel::new("devdaily")).await.unwrap());

    let channel = get_channel(&pool, "devdaily").await.unwrap();
    assert!(channel.is_active);
    assert!(!channel.is_bootstrapped);
    assert_eq!(channel.fetch_frequency_hours, 6);
    assert_eq!(channel.max_posts_to_fetch, 50);
    assert!(channel.last_checked_at.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn get_channel_missing_is_not_found(pool: sqlx::PgPool) {
    let err = get_channel(&pool, "ghost").await.unwrap_err();
    assert!(matches!(err, DbError::NotFound));
}

#[sqlx::test(migrations = "../../migrations")]
async fn due_predicate_follows_fetch_frequency(pool: sqlx::PgPool) {
    insert_channel(&pool, "overdue", 5).await;
    insert_channel(&pool, "recent", 5).await;
    insert_channel(&pool, "never", 5).await;
    // Default frequency is 6 hours.
    set_checked_hours_ago(&pool, "overdue", 7).await;
    set_checked_hours_ago(&pool, "recent", 5).await;

    let due: Vec<String> = get_due_channels(&pool, Utc::now())
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.handle)
        .collect();

    assert!(due.contains(&"overdue".to_string()));
    assert!(due.contains(&"never".to_string()));
    assert!(!due.contains(&"recent".to_string()));
}

#[sqlx::test(migrations = "../../migrations")]
async fn due_channels_are_ordered_by_priority_and_skip_inactive(pool: sqlx::PgPool) {
    insert_channel(&pool, "low", 2).await;
    insert_channel(&pool, "high", 9).await;
    insert_channel(&pool, "retired", 10).await;
    deactivate_channel(&pool, "retired").await.unwrap();

    let due: Vec<String> = get_due_channels(&pool, Utc::now())
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.handle)
        .collect();
    assert_eq!(due, vec!["high".to_string(), "low".to_string()]);

    let active = list_active_channels(&pool).await.unwrap();
    assert_eq!(active.len(), 2);
    assert_eq!(list_channels(&pool).await.unwrap().len(), 3);
}

#[sqlx::test(migrations = "../../migrations")]
async fn bootstrap_then_advance_cursor(pool: sqlx::PgPool) {
    insert_channel(&pool, "devdaily", 1).await;

    mark_channel_bootstrapped(&pool, "devdaily", Some("NEWEST"))
        .await
        .unwrap();
    let channel = get_channel(&pool, "devdaily").await.unwrap();
    assert!(channel.is_bootstrapped);
    assert_eq!(channel.cursor(), Some("NEWEST"));
    assert!(channel.last_checked_at.is_some());

    update_channel_after_fetch(&pool, "devdaily", Some("NEWER"))
        .await
        .unwrap();
    let channel = get_channel(&pool, "devdaily").await.unwrap();
    assert_eq!(channel.cursor(), Some("NEWER"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn fetch_without_new_posts_only_stamps_check(pool: sqlx::PgPool) {
    insert_channel(&pool, "devdaily", 1).await;
    mark_channel_bootstrapped(&pool, "devdaily", Some("CURSOR"))
        .await
        .unwrap();
    set_checked_hours_ago(&pool, "devdaily", 10).await;

    update_channel_after_fetch(&pool, "devdaily", None)
        .await
        .unwrap();

    let channel = get_channel(&pool, "devdaily").await.unwrap();
    assert_eq!(channel.cursor(), Some("CURSOR"));
    let checked = channel.last_checked_at.expect("checked");
    assert!(Utc::now() - checked < Duration::minutes(1));
}

#[sqlx::test(migrations = "../../migrations")]
async fn cursor_cannot_be_set_before_bootstrap(pool: sqlx::PgPool) {
    insert_channel(&pool, "devdaily", 1).await;
    let err = update_channel_after_fetch(&pool, "devdaily", Some("EARLY"))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Sqlx(_)), "got {err:?}");
}

#[sqlx::test(migrations = "../../migrations")]
async fn update_channel_info_writes_assessment_and_stats(pool: sqlx::PgPool) {
    insert_channel(&pool, "devdaily", 1).await;
    let assessment = ChannelAssessment {
        priority: 9,
        category: Category::Tech,
        fetch_frequency_hours: 2,
        posts_to_fetch: 20,
    };
    let stats = ProfileStats {
        follower_count: Some(750_000),
        media_count: Some(1_200),
        biography: Some("Daily tech news".to_string()),
        is_verified: true,
    };

    update_channel_info(&pool, "devdaily", &assessment, &stats, true)
        .await
        .unwrap();

    let channel = get_channel(&pool, "devdaily").await.unwrap();
    assert_eq!(channel.priority, 9);
    assert_eq!(channel.category, Category::Tech);
    assert_eq!(channel.fetch_frequency_hours, 2);
    assert_eq!(channel.posts_to_fetch, 20);
    assert_eq!(channel.stats, stats);
}

#[sqlx::test(migrations = "../../migrations")]
async fn mutators_report_missing_channel(pool: sqlx::PgPool) {
    assert!(matches!(
        mark_channel_checked(&pool, "ghost").await,
        Err(DbError::NotFound)
    ));
    assert!(matches!(
        deactivate_channel(&pool, "ghost").await,
        Err(DbError::NotFound)
    ));
}

// ---------------------------------------------------------------------------
// Section 2: Enqueue and claim
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn enqueue_is_idempotent(pool: sqlx::PgPool) {
    insert_channel(&pool, "devdaily", 5).await;
    let items = [
        new_item("AAA", "devdaily", 5),
        new_item("BBB", "devdaily", 5),
        new_item("CCC", "devdaily", 5),
    ];

    assert_eq!(add_content_items(&pool, &items).await.unwrap(), 3);
    assert_eq!(add_content_items(&pool, &items).await.unwrap(), 0);

    let counts = count_items_by_status(&pool).await.unwrap();
    assert_eq!(counts.pending, 3);
    assert_eq!(counts.total(), 3);
}

#[sqlx::test(migrations = "../../migrations")]
async fn enqueue_does_not_overwrite_existing_items(pool: sqlx::PgPool) {
    insert_channel(&pool, "devdaily", 5).await;
    add_content_items(&pool, &[new_item("AAA", "devdaily", 5)])
        .await
        .unwrap();
    let claimed = claim_pending_item(&pool).await.unwrap().expect("claimed");
    assert_eq!(claimed.shortcode, "AAA");

    let inserted = add_content_items(&pool, &[new_item("AAA", "devdaily", 9)])
        .await
        .unwrap();
    assert_eq!(inserted, 0);

    let item = get_item(&pool, "AAA").await.unwrap();
    assert_eq!(item.status, ItemStatus::Processing);
    assert_eq!(item.priority, 5);
}

#[sqlx::test(migrations = "../../migrations")]
async fn claim_prefers_priority_then_age(pool: sqlx::PgPool) {
    insert_channel(&pool, "devdaily", 5).await;
    add_content_items(&pool, &[new_item("OLD_LOW", "devdaily", 3)])
        .await
        .unwrap();
    add_content_items(&pool, &[new_item("OLD_HIGH", "devdaily", 8)])
        .await
        .unwrap();
    add_content_items(&pool, &[new_item("NEW_HIGH", "devdaily", 8)])
        .await
        .unwrap();
    sqlx::query(
        "UPDATE content_items SET added_at = NOW() - INTERVAL '1 hour' \
         WHERE shortcode IN ('OLD_LOW', 'OLD_HIGH')",
    )
    .execute(&pool)
    .await
    .unwrap();

    let order: Vec<String> = [
        claim_pending_item(&pool).await.unwrap(),
        claim_pending_item(&pool).await.unwrap(),
        claim_pending_item(&pool).await.unwrap(),
    ]
    .into_iter()
    .map(|item| item.expect("item").shortcode)
    .collect();

    assert_eq!(order, vec!["OLD_HIGH", "NEW_HIGH", "OLD_LOW"]);
    assert!(claim_pending_item(&pool).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn claimed_item_is_processing_with_timestamp(pool: sqlx::PgPool) {
    insert_channel(&pool, "devdaily", 5).await;
    add_content_items(&pool, &[new_item("AAA", "devdaily", 5)])
        .await
        .unwrap();

    let item = claim_pending_item(&pool).await.unwrap().expect("claimed");
    assert_eq!(item.status, ItemStatus::Processing);
    assert!(item.processed_at.is_some());
}

#[sqlx::test(migrations = "../../migrations")]
async fn concurrent_claims_hand_out_one_item_once(pool: sqlx::PgPool) {
    insert_channel(&pool, "devdaily", 5).await;
    add_content_items(&pool, &[new_item("ONLY", "devdaily", 5)])
        .await
        .unwrap();

    let claims = (0..8).map(|_| {
        let pool = pool.clone();
        tokio::spawn(async move { claim_pending_item(&pool).await })
    });
    let results = futures::future::join_all(claims).await;

    let winners: Vec<String> = results
        .into_iter()
        .map(|joined| joined.expect("task panicked").expect("claim failed"))
        .filter_map(|claimed| claimed.map(|item| item.shortcode))
        .collect();

    assert_eq!(winners, vec!["ONLY".to_string()]);
}

// ---------------------------------------------------------------------------
// Section 3: Terminal transitions
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn complete_item_stores_report(pool: sqlx::PgPool) {
    insert_channel(&pool, "devdaily", 5).await;
    add_content_items(&pool, &[new_item("AAA", "devdaily", 5)])
        .await
        .unwrap();
    claim_pending_item(&pool).await.unwrap();

    let structured = serde_json::json!({ "core_summary": "hello" });
    let metadata = serde_json::json!({ "worker_id": "worker_1" });
    complete_item(&pool, "AAA", "### Core Summary\nhello", &structured, &metadata)
        .await
        .unwrap();

    let item = get_item(&pool, "AAA").await.unwrap();
    assert_eq!(item.status, ItemStatus::Completed);
    assert_eq!(item.structured_summary, Some(structured));
    assert_eq!(item.processing_metadata, Some(metadata));
    assert!(item.error_message.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn terminal_writes_require_processing(pool: sqlx::PgPool) {
    insert_channel(&pool, "devdaily", 5).await;
    add_content_items(&pool, &[new_item("AAA", "devdaily", 5)])
        .await
        .unwrap();

    let err = fail_item(&pool, "AAA", "boom").await.unwrap_err();
    assert!(matches!(
        err,
        DbError::InvalidItemTransition {
            expected_status: "processing",
            ..
        }
    ));

    let empty = serde_json::json!({});
    let err = complete_item(&pool, "AAA", "r", &empty, &empty)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidItemTransition { .. }));
}

#[sqlx::test(migrations = "../../migrations")]
async fn failed_items_can_be_reset_per_channel(pool: sqlx::PgPool) {
    insert_channel(&pool, "alpha", 5).await;
    insert_channel(&pool, "beta", 5).await;
    add_content_items(
        &pool,
        &[new_item("A1", "alpha", 5), new_item("B1", "beta", 5)],
    )
    .await
    .unwrap();
    while let Some(item) = claim_pending_item(&pool).await.unwrap() {
        fail_item(&pool, &item.shortcode, "download failed")
            .await
            .unwrap();
    }

    assert_eq!(reset_failed_items(&pool, Some("alpha")).await.unwrap(), 1);
    let item = get_item(&pool, "A1").await.unwrap();
    assert_eq!(item.status, ItemStatus::Pending);
    assert!(item.error_message.is_none());
    assert!(item.processed_at.is_none());

    assert_eq!(reset_failed_items(&pool, None).await.unwrap(), 1);
    let failed = list_items(&pool, Some(ItemStatus::Failed), 50).await.unwrap();
    assert!(failed.is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn stale_processing_items_are_failed(pool: sqlx::PgPool) {
    insert_channel(&pool, "devdaily", 5).await;
    add_content_items(
        &pool,
        &[new_item("STALE", "devdaily", 9), new_item("FRESH", "devdaily", 1)],
    )
    .await
    .unwrap();
    claim_pending_item(&pool).await.unwrap();
    claim_pending_item(&pool).await.unwrap();
    sqlx::query(
        "UPDATE content_items SET processed_at = NOW() - INTERVAL '3 hours' \
         WHERE shortcode = 'STALE'",
    )
    .execute(&pool)
    .await
    .unwrap();

    let failed = fail_stale_items(&pool, Duration::hours(2)).await.unwrap();
    assert_eq!(failed, 1);

    let stale = get_item(&pool, "STALE").await.unwrap();
    assert_eq!(stale.status, ItemStatus::Failed);
    assert_eq!(stale.error_message.as_deref(), Some(ABANDONED_MESSAGE));
    let fresh = get_item(&pool, "FRESH").await.unwrap();
    assert_eq!(fresh.status, ItemStatus::Processing);
}

#[sqlx::test(migrations = "../../migrations")]
async fn list_items_filters_by_status_and_limit(pool: sqlx::PgPool) {
    insert_channel(&pool, "devdaily", 5).await;
    add_content_items(
        &pool,
        &[
            new_item("A", "devdaily", 5),
            new_item("B", "devdaily", 5),
            new_item("C", "devdaily", 5),
        ],
    )
    .await
    .unwrap();
    claim_pending_item(&pool).await.unwrap();

    assert_eq!(list_items(&pool, None, 50).await.unwrap().len(), 3);
    assert_eq!(list_items(&pool, None, 2).await.unwrap().len(), 2);
    assert_eq!(
        list_items(&pool, Some(ItemStatus::Pending), 50)
            .await
            .unwrap()
            .len(),
        2
    );
    let counts = count_items_by_status(&pool).await.unwrap();
    assert_eq!(counts.pending, 2);
    assert_eq!(counts.processing, 1);
    assert_eq!(counts.completed, 0);
}
