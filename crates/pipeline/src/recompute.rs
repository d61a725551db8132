//! Asynchronous stats recomputation.
//!
//! Reviewer actions do not recompute stats inline; they set a flag on
//! the match row and this worker picks it up. Recomputation reads the
//! then-current persisted events and mappings, so corrections landed
//! after the flag was set are still reflected.

use std::sync::Arc;
use std::time::Duration;

use matchlens_core::stats;
use matchlens_core::types::DbId;
use matchlens_db::repositories::{EventRepo, MappingRepo, MatchRepo, MetricRepo};
use matchlens_db::DbPool;
use matchlens_events::{AnalysisEvent, EventBus};
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;

/// How often the worker checks for flagged matches.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Background worker recomputing stats for flagged matches.
pub struct RecomputeWorker {
    pool: DbPool,
    bus: Arc<EventBus>,
}

impl RecomputeWorker {
    pub fn new(pool: DbPool, bus: Arc<EventBus>) -> Self {
        Self { pool, bus }
    }

    /// Claim-and-recompute until cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!("stats recompute worker started");
        let mut tick = tokio::time::interval(POLL_INTERVAL);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("stats recompute worker stopping");
                    return;
                }
                _ = tick.tick() => {
                    match MatchRepo::claim_recalculation(&self.pool).await {
                        Ok(Some(row)) => {
                            if let Err(e) = self.recompute(row.id).await {
                                tracing::error!(match_id = row.id, error = %e, "stats recompute failed");
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            tracing::warn!(error = %e, "recalculation claim query failed");
                        }
                    }
                }
            }
        }
    }

    /// Recompute one match's metric set from its persisted rows.
    pub async fn recompute(&self, match_id: DbId) -> Result<(), PipelineError> {
        let event_rows = EventRepo::list_all(&self.pool, match_id).await?;
        let mut events = Vec::with_capacity(event_rows.len());
        for row in &event_rows {
            events.push(row.to_core()?);
        }

        let mapping_rows = MappingRepo::list_for_match(&self.pool, match_id).await?;
        let mut identities = Vec::with_capacity(mapping_rows.len());
        for row in &mapping_rows {
            identities.push(row.to_core()?);
        }

        let metrics = stats::compute(&events, &identities);
        for metric in &metrics {
            MetricRepo::upsert(
                &self.pool,
                match_id,
                metric.key,
                &metric.scope.key(),
                metric.value,
                metric.confidence,
                &metric.explanation,
            )
            .await?;
        }

        self.bus.publish(
            AnalysisEvent::new("stats.recalculated", match_id)
                .with_payload(serde_json::json!({ "metrics": metrics.len() })),
        );

        tracing::info!(match_id, metrics = metrics.len(), "stats recalculated");
        Ok(())
    }
}
