//! One-shot foreground runs of the scheduled jobs.

use std::sync::Arc;

use clap::Subcommand;
use reelscope_jobs::{Discoverer, DiscovererConfig, Worker, WorkerConfig, WorkerOutcome};
use reelscope_pipeline::Orchestrator;
use reelscope_source::GatewayClient;

#[derive(Debug, Subcommand)]
pub enum RunCommands {
    /// Check due channels and queue new posts
    Discover {
        /// Check every active channel regardless of fetch frequency
        #[arg(long)]
        force: bool,
    },
    /// Claim and process one pending item
    Worker,
}

pub(crate) async fn run(
    pool: &sqlx::PgPool,
    config: &reelscope_core::AppConfig,
    command: RunCommands,
) -> anyhow::Result<()> {
    match command {
        RunCommands::Discover { force } => {
            let source = GatewayClient::from_config(config)?;
            let mut discover_config = DiscovererConfig::from_app_config(config);
            discover_config.force_check_all |= force;

            let discoverer = Discoverer::new(pool.clone(), Arc::new(source), discover_config);
            let summary = discoverer.run_once().await?;
            println!(
                "checked {} channels ({} bootstrapped, {} retired, {} failed); {} new items queued",
                summary.channels_checked,
                summary.bootstrapped,
                summary.channels_retired,
                summary.channels_failed,
                summary.items_inserted
            );
        }
        RunCommands::Worker => {
            let pipeline = Orchestrator::from_config(config)?;
            let worker = Worker::new(
                pool.clone(),
                Arc::new(pipeline),
                WorkerConfig::from_app_config(config),
            );
            match worker.run_once().await? {
                WorkerOutcome::Idle => println!("queue empty; nothing to do"),
                WorkerOutcome::Skipped(shortcode) => {
                    println!("{shortcode}: already processed, closed out");
                }
                WorkerOutcome::Completed(shortcode) => println!("{shortcode}: completed"),
                WorkerOutcome::Failed(shortcode) => {
                    println!("{shortcode}: failed; see `items list --status failed`");
                }
            }
        }
    }
    Ok(())
}
