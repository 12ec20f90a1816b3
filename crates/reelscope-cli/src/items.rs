//! `items` subcommands: inspect the queue and put failed work back.

use chrono::TimeDelta;
use clap::Subcommand;
use reelscope_core::ItemStatus;

#[derive(Debug, Subcommand)]
pub enum ItemsCommands {
    /// List queue entries, newest first
    List {
        /// Only items in this status (pending, processing, completed, failed)
        #[arg(long)]
        status: Option<ItemStatus>,
        #[arg(long, default_value = "20")]
        limit: i64,
    },
    /// Return failed items to pending
    RetryFailed {
        /// Only items from this channel
        #[arg(long)]
        channel: Option<String>,
    },
    /// Fail items stuck in processing longer than the lease
    Reclaim {
        /// Lease length; defaults to `REELSCOPE_PROCESSING_LEASE_MINS`
        #[arg(long)]
        lease_mins: Option<u64>,
    },
}

pub(crate) async fn run(
    pool: &sqlx::PgPool,
    config: &reelscope_core::AppConfig,
    command: ItemsCommands,
) -> anyhow::Result<()> {
    match command {
        ItemsCommands::List { status, limit } => list(pool, status, limit).await,
        ItemsCommands::RetryFailed { channel } => {
            let requeued = reelscope_db::reset_failed_items(pool, channel.as_deref()).await?;
            println!("{requeued} failed items returned to pending");
            Ok(())
        }
        ItemsCommands::Reclaim { lease_mins } => {
            let mins = lease_mins.unwrap_or(config.processing_lease_mins);
            let lease = TimeDelta::try_minutes(i64::try_from(mins)?)
                .ok_or_else(|| anyhow::anyhow!("lease of {mins} minutes is out of range"))?;
            let failed = reelscope_db::fail_stale_items(pool, lease).await?;
            println!("{failed} items processing for more than {mins} minutes marked failed");
            Ok(())
        }
    }
}

async fn list(pool: &sqlx::PgPool, status: Option<ItemStatus>, limit: i64) -> anyhow::Result<()> {
    let items = reelscope_db::list_items(pool, status, limit).await?;
    if items.is_empty() {
        println!("no items found");
        return Ok(());
    }

    println!(
        "{:<16}{:<12}{:<6}{:<8}{:<24}DETAIL",
        "SHORTCODE", "STATUS", "PRIO", "TYPE", "CHANNEL"
    );
    for item in &items {
        let detail = match item.status {
            ItemStatus::Failed => item.error_message.clone().unwrap_or_default(),
            _ => item.source_url.clone(),
        };
        println!(
            "{:<16}{:<12}{:<6}{:<8}{:<24}{}",
            item.shortcode,
            item.status.as_str(),
            item.priority,
            item.post_type.as_str(),
            item.channel_handle,
            detail
        );
    }
    let counts = reelscope_db::count_items_by_status(pool).await?;
    println!(
        "\nqueue: {} pending, {} processing, {} completed, {} failed",
        counts.pending, counts.processing, counts.completed, counts.failed
    );
    Ok(())
}
