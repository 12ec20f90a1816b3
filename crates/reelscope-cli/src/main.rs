mod channel;
mod items;
mod run;

use clap::{Parser, Subcommand};

use crate::{channel::ChannelCommands, items::ItemsCommands, run::RunCommands};

#[derive(Debug, Parser)]
#[command(name = "reelscope-cli")]
#[command(about = "Operator tooling for the reelscope discovery queue")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Manage tracked channels
    Channel {
        #[command(subcommand)]
        command: ChannelCommands,
    },
    /// Inspect and repair the content queue
    Items {
        #[command(subcommand)]
        command: ItemsCommands,
    },
    /// Run one discover or worker tick in the foreground
    Run {
        #[command(subcommand)]
        command: RunCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Apply pending migrations
    Migrate,
    /// Check database connectivity
    Ping,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("reelscope-cli: no command given; see --help");
        return Ok(());
    };

    let config = reelscope_core::load_app_config()?;
    let pool_config = reelscope_db::PoolConfig::from_app_config(&config);
    let pool = reelscope_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Db {
            command: DbCommands::Migrate,
        } => {
            let applied = reelscope_db::run_migrations(&pool).await?;
            println!("migrations applied: {applied}");
        }
        Commands::Db {
            command: DbCommands::Ping,
        } => {
            reelscope_db::ping(&pool).await?;
            println!("database ok");
        }
        Commands::Channel { command } => channel::run(&pool, command).await?,
        Commands::Items { command } => items::run(&pool, &config, command).await?,
        Commands::Run { command } => run::run(&pool, &config, command).await?,
    }

    Ok(())
}
