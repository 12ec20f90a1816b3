//! The claim loop: one queued item per tick.

use std::sync::Arc;
use std::time::Instant;

use chrono::TimeDelta;
use reelscope_core::{parse_report, AppConfig, ReportSection, StructuredReport};
use reelscope_db::DbError;
use reelscope_pipeline::{ContentPipeline, PipelineOutcome};
use serde_json::{json, Map, Value};
use sqlx::PgPool;

const SKIPPED_REPORT: &str = "Skipped";
const SKIPPED_NOTE: &str = "Skipped, already processed.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Recorded in each completed item's processing metadata.
    pub worker_id: String,
    /// How long an item may sit in `processing` before it is failed as
    /// abandoned.
    pub processing_lease: TimeDelta,
}

impl WorkerConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        let lease_mins = i64::try_from(config.processing_lease_mins).unwrap_or(i64::MAX);
        Self {
            worker_id: config.worker_id.clone(),
            processing_lease: TimeDelta::try_minutes(lease_mins).unwrap_or(TimeDelta::MAX),
        }
    }
}

/// What one tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// Nothing was pending.
    Idle,
    Skipped(String),
    Completed(String),
    Failed(String),
}

pub struct Worker {
    pool: PgPool,
    pipeline: Arc<dyn ContentPipeline>,
    config: WorkerConfig,
}

impl Worker {
    #[must_use]
    pub fn new(pool: PgPool, pipeline: Arc<dyn ContentPipeline>, config: WorkerConfig) -> Self {
        Self {
            pool,
            pipeline,
            config,
        }
    }

    /// Reclaims expired leases, then claims and processes at most one item.
    ///
    /// Pipeline errors never escape: the item is marked failed with the
    /// error text and the outcome is [`WorkerOutcome::Failed`].
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store cannot be reached or the claimed item
    /// is no longer `processing` when its result is written.
    pub async fn run_once(&self) -> Result<WorkerOutcome, DbError> {
        let abandoned =
            reelscope_db::fail_stale_items(&self.pool, self.config.processing_lease).await?;
        if abandoned > 0 {
            tracing::warn!(abandoned, "worker: failed items whose processing lease expired");
        }

        let Some(item) = reelscope_db::claim_pending_item(&self.pool).await? else {
            tracing::debug!("worker: queue empty");
            return Ok(WorkerOutcome::Idle);
        };
        let shortcode = item.shortcode.clone();
        tracing::info!(
            shortcode = %shortcode,
            channel = %item.channel_handle,
            priority = item.priority,
            "worker: claimed item"
        );

        let started = Instant::now();
        match self.pipeline.process(&item).await {
            Ok(PipelineOutcome::Skipped) => {
                let metadata = json!({
                    "worker_id": self.config.worker_id,
                    "note": SKIPPED_NOTE,
                });
                reelscope_db::complete_item(
                    &self.pool,
                    &shortcode,
                    SKIPPED_REPORT,
                    &Value::Object(Map::new()),
                    &metadata,
                )
                .await?;
                tracing::info!(shortcode = %shortcode, "worker: item already processed, closed out");
                Ok(WorkerOutcome::Skipped(shortcode))
            }
            Ok(PipelineOutcome::Report { report, model }) => {
                let elapsed = started.elapsed().as_secs_f64();
                let structured = structured_json(&parse_report(&report));
                let metadata = json!({
                    "worker_id": self.config.worker_id,
                    "processing_time_sec": round_2dp(elapsed),
                    "model_used": model,
                });
                reelscope_db::complete_item(&self.pool, &shortcode, &report, &structured, &metadata)
                    .await?;
                tracing::info!(
                    shortcode = %shortcode,
                    elapsed_secs = round_2dp(elapsed),
                    "worker: item completed"
                );
                Ok(WorkerOutcome::Completed(shortcode))
            }
            Err(e) => {
                tracing::error!(shortcode = %shortcode, error = %e, "worker: pipeline failed");
                reelscope_db::fail_item(&self.pool, &shortcode, &e.to_string()).await?;
                Ok(WorkerOutcome::Failed(shortcode))
            }
        }
    }
}

fn round_2dp(secs: f64) -> f64 {
    (secs * 100.0).round() / 100.0
}

fn structured_json(report: &StructuredReport) -> Value {
    let fields = report
        .iter()
        .map(|(key, section)| {
            let value = match section {
                ReportSection::Text(text) => Value::String(text.clone()),
                ReportSection::Bullets(items) => {
                    Value::Array(items.iter().cloned().map(Value::String).collect())
                }
            };
            (key.clone(), value)
        })
        .collect();
    Value::Object(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_rounds_to_two_decimals() {
        assert!((round_2dp(12.3456) - 12.35).abs() < f64::EPSILON);
        assert!((round_2dp(0.004) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn structured_summary_keeps_lists_and_prose() {
        let report = "### Core Summary\nA new async runtime.\n\
                      ### Technical Insights\n* one\n* two\n\
                      ### Broader Impact\nSmall.";
        let value = structured_json(&parse_report(report));

        assert_eq!(value["core_summary"], "A new async runtime.");
        assert_eq!(value["technical_insights"], json!(["one", "two"]));
        assert_eq!(value["broader_impact"], "Small.");
    }

    #[test]
    fn empty_report_is_an_empty_object() {
        assert_eq!(structured_json(&parse_report("")), json!({}));
    }
}
