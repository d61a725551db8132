//! Repository for the `stage_timings` table.
//!
//! One row per pipeline stage holding a running mean of observed
//! durations, shared across all matches.

use std::collections::HashMap;

use matchlens_core::job::PipelineStage;
use matchlens_core::progress::{record_duration, StageHistory};
use sqlx::PgPool;

pub struct StageTimingRepo;

impl StageTimingRepo {
    /// Load the full history table for remaining-time estimates.
    ///
    /// Rows with a stage string no longer in the enum are skipped.
    pub async fn get_all(
        pool: &PgPool,
    ) -> Result<HashMap<PipelineStage, StageHistory>, sqlx::Error> {
        let rows: Vec<(String, f64, i32)> = sqlx::query_as(
            "SELECT stage, avg_duration_secs, sample_count FROM stage_timings",
        )
        .fetch_all(pool)
        .await?;

        let mut history = HashMap::new();
        for (stage, avg_duration_secs, sample_count) in rows {
            if let Some(stage) = PipelineStage::parse(&stage) {
                history.insert(
                    stage,
                    StageHistory {
                        avg_duration_secs,
                        sample_count,
                    },
                );
            }
        }
        Ok(history)
    }

    /// Fold one observed stage duration into the running mean.
    pub async fn record(
        pool: &PgPool,
        stage: PipelineStage,
        duration_secs: f64,
    ) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;

        let existing: Option<(f64, i32)> = sqlx::query_as(
            "SELECT avg_duration_secs, sample_count FROM stage_timings \
             WHERE stage = $1 FOR UPDATE",
        )
        .bind(stage.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let updated = record_duration(
            existing.map(|(avg_duration_secs, sample_count)| StageHistory {
                avg_duration_secs,
                sample_count,
            }),
            duration_secs,
        );

        sqlx::query(
            "INSERT INTO stage_timings (stage, avg_duration_secs, sample_count) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (stage) DO UPDATE SET \
                 avg_duration_secs = EXCLUDED.avg_duration_secs, \
                 sample_count = EXCLUDED.sample_count",
        )
        .bind(stage.as_str())
        .bind(updated.avg_duration_secs)
        .bind(updated.sample_count)
        .execute(&mut *tx)
        .await?;

        tx.commit().await
    }
}
