mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use reelscope_jobs::{Discoverer, DiscovererConfig, Worker, WorkerConfig};
use reelscope_pipeline::Orchestrator;
use reelscope_source::GatewayClient;
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = reelscope_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    tracing::info!(env = %config.env, worker_id = %config.worker_id, "starting reelscope-server");

    let pool_config = reelscope_db::PoolConfig::from_app_config(&config);
    let pool = reelscope_db::connect_pool(&config.database_url, pool_config).await?;
    reelscope_db::run_migrations(&pool).await?;

    let source = GatewayClient::from_config(&config)?;
    let discoverer = Arc::new(Discoverer::new(
        pool.clone(),
        Arc::new(source),
        DiscovererConfig::from_app_config(&config),
    ));
    let pipeline = Orchestrator::from_config(&config)?;
    let worker = Arc::new(Worker::new(
        pool.clone(),
        Arc::new(pipeline),
        WorkerConfig::from_app_config(&config),
    ));

    let mut scheduler = scheduler::build_scheduler(discoverer, worker, &config).await?;

    let auth = AuthState::from_env(matches!(
        config.env,
        reelscope_core::Environment::Development
    ))?;
    let app = build_app(AppState { pool }, auth, default_rate_limit_state());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "operator API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // An in-flight tick finishes or is abandoned with the process; no new
    // tick starts after this.
    scheduler.shutdown().await?;
    tracing::info!("scheduler stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
