//! Background job scheduler.
//!
//! Discovery and the worker each run on their own fixed interval, plus once
//! right after startup. A tick that finds the previous run of the same job
//! still in progress is skipped, so a job never overlaps itself; the two
//! jobs may interleave with each other.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use reelscope_core::AppConfig;
use reelscope_jobs::{Discoverer, Worker, WorkerOutcome};
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use uuid::Uuid;

/// Delay before the startup runs fire.
const STARTUP_DELAY: Duration = Duration::from_secs(1);

/// One unit of periodic work.
pub(crate) trait Tick: Send + Sync + 'static {
    const NAME: &'static str;

    /// Runs once. Failures are logged here; the next tick tries again.
    fn tick(&self) -> impl Future<Output = ()> + Send;
}

impl Tick for Discoverer {
    const NAME: &'static str = "discover";

    async fn tick(&self) {
        match self.run_once().await {
            Ok(summary) => tracing::info!(
                channels_checked = summary.channels_checked,
                channels_retired = summary.channels_retired,
                items_inserted = summary.items_inserted,
                channels_failed = summary.channels_failed,
                "scheduler: discover run finished"
            ),
            Err(e) => tracing::error!(error = %e, "scheduler: discover run failed"),
        }
    }
}

impl Tick for Worker {
    const NAME: &'static str = "worker";

    async fn tick(&self) {
        match self.run_once().await {
            Ok(WorkerOutcome::Idle) => tracing::debug!("scheduler: worker idle"),
            Ok(outcome) => tracing::info!(?outcome, "scheduler: worker run finished"),
            Err(e) => tracing::error!(error = %e, "scheduler: worker run failed"),
        }
    }
}

/// A job plus the lock that keeps its runs from overlapping.
pub(crate) struct Guarded<T> {
    inner: Arc<T>,
    running: Arc<Mutex<()>>,
}

impl<T> Clone for Guarded<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            running: Arc::clone(&self.running),
        }
    }
}

impl<T: Tick> Guarded<T> {
    pub(crate) fn new(inner: Arc<T>) -> Self {
        Self {
            inner,
            running: Arc::new(Mutex::new(())),
        }
    }

    /// Runs one tick unless one is already in progress. Returns whether it ran.
    pub(crate) async fn run(&self) -> bool {
        let Ok(_running) = self.running.try_lock() else {
            tracing::warn!(
                job = T::NAME,
                "scheduler: previous run still in progress, skipping tick"
            );
            return false;
        };
        self.inner.tick().await;
        true
    }
}

fn make_job<T: Tick>(
    guarded: &Guarded<T>,
    every: Option<Duration>,
) -> Result<Job, JobSchedulerError> {
    let guarded = guarded.clone();
    let run = move |_uuid: Uuid, _lock: JobScheduler| {
        let guarded = guarded.clone();
        Box::pin(async move {
            guarded.run().await;
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    };

    match every {
        Some(interval) => Job::new_repeated_async(interval, run),
        None => Job::new_one_shot_async(STARTUP_DELAY, run),
    }
}

async fn register<T: Tick>(
    scheduler: &JobScheduler,
    job: Arc<T>,
    interval_mins: u64,
) -> Result<(), JobSchedulerError> {
    let guarded = Guarded::new(job);
    let interval = Duration::from_secs(interval_mins.max(1) * 60);

    scheduler.add(make_job(&guarded, Some(interval))?).await?;
    scheduler.add(make_job(&guarded, None)?).await?;
    tracing::info!(
        job = T::NAME,
        interval_mins = interval_mins.max(1),
        "scheduler: registered job"
    );
    Ok(())
}

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`], which must be kept alive for the
/// lifetime of the process and shut down on exit.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    discoverer: Arc<Discoverer>,
    worker: Arc<Worker>,
    config: &AppConfig,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register(&scheduler, discoverer, config.discover_interval_mins).await?;
    register(&scheduler, worker, config.worker_interval_mins).await?;

    scheduler.start().await?;
    Ok(scheduler)
}
