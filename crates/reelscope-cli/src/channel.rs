//! `channel` subcommands: register and list tracked accounts.

use clap::Subcommand;

#[derive(Debug, Subcommand)]
pub enum ChannelCommands {
    /// Register one or more handles; existing handles are left untouched
    Add {
        #[arg(required = true)]
        handles: Vec<String>,
        /// Initial priority until the first discovery run scores the channel
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=10))]
        priority: Option<u8>,
    },
    /// List every channel with its schedule and cursor
    List,
}

pub(crate) async fn run(pool: &sqlx::PgPool, command: ChannelCommands) -> anyhow::Result<()> {
    match command {
        ChannelCommands::Add { handles, priority } => add(pool, &handles, priority).await,
        ChannelCommands::List => list(pool).await,
    }
}

async fn add(pool: &sqlx::PgPool, handles: &[String], priority: Option<u8>) -> anyhow::Result<()> {
    let mut added = 0_usize;
    for raw in handles {
        let handle = raw.trim().trim_start_matches('@');
        if handle.is_empty() {
            tracing::warn!(input = %raw, "skipping empty handle");
            continue;
        }

        let mut channel = reelscope_db::NewChannel::new(handle);
        if let Some(priority) = priority {
            channel.priority = priority;
        }
        if reelscope_db::add_channel(pool, channel).await? {
            println!("added {handle}");
            added += 1;
        } else {
            println!("{handle} is already tracked");
        }
    }
    println!("{added} of {} channels added", handles.len());
    Ok(())
}

async fn list(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let channels = reelscope_db::list_channels(pool).await?;
    if channels.is_empty() {
        println!("no channels tracked; add one with `channel add <handle>`");
        return Ok(());
    }

    println!(
        "{:<28}{:<8}{:<10}{:<8}{:<8}{:<18}CURSOR",
        "HANDLE", "ACTIVE", "CATEGORY", "PRIO", "EVERY", "LAST CHECKED"
    );
    for channel in &channels {
        let last_checked = channel.last_checked_at.map_or_else(
            || "never".to_string(),
            |t| t.format("%Y-%m-%d %H:%M").to_string(),
        );
        let every = format!("{}h", channel.fetch_frequency_hours);
        println!(
            "{:<28}{:<8}{:<10}{:<8}{:<8}{:<18}{}",
            channel.handle,
            if channel.is_active { "yes" } else { "no" },
            channel.category.as_str(),
            channel.priority,
            every,
            last_checked,
            channel.cursor().unwrap_or("-"),
        );
    }
    Ok(())
}
