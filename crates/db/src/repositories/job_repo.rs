//! Repository for the `analysis_jobs` table.
//!
//! Status strings come from `matchlens_core::job::JobStatus`; the state
//! machine there is enforced at the call sites, this layer only persists.

use matchlens_core::job::{Half, JobStatus, PipelineStage, PipelineVariant};
use matchlens_core::types::DbId;
use sqlx::PgPool;

use crate::models::job::AnalysisJob;

/// Column list for `analysis_jobs` queries.
const COLUMNS: &str = "\
    id, match_id, half, variant, status, current_stage, \
    overall_progress, estimated_seconds_remaining, error_message, \
    started_at, finished_at, created_at, updated_at";

pub struct JobRepo;

impl JobRepo {
    /// Create a queued job for one half of a match.
    pub async fn create(
        pool: &PgPool,
        match_id: DbId,
        half: Half,
        variant: PipelineVariant,
    ) -> Result<AnalysisJob, sqlx::Error> {
        let query = format!(
            "INSERT INTO analysis_jobs (match_id, half, variant, status) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AnalysisJob>(&query)
            .bind(match_id)
            .bind(half.as_str())
            .bind(variant.as_str())
            .bind(JobStatus::Queued.as_str())
            .fetch_one(pool)
            .await
    }

    /// Atomically claim the oldest queued job and mark it running.
    ///
    /// `FOR UPDATE SKIP LOCKED` prevents double-dispatch when several
    /// orchestrator instances poll concurrently.
    pub async fn claim_next_queued(pool: &PgPool) -> Result<Option<AnalysisJob>, sqlx::Error> {
        let query = format!(
            "UPDATE analysis_jobs \
             SET status = $1, started_at = NOW(), updated_at = NOW() \
             WHERE id = ( \
                 SELECT id FROM analysis_jobs \
                 WHERE status = $2 \
                 ORDER BY created_at ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AnalysisJob>(&query)
            .bind(JobStatus::Running.as_str())
            .bind(JobStatus::Queued.as_str())
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<AnalysisJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM analysis_jobs WHERE id = $1");
        sqlx::query_as::<_, AnalysisJob>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// The most recent job for one half of a match, if any.
    pub async fn latest_for_half(
        pool: &PgPool,
        match_id: DbId,
        half: Half,
    ) -> Result<Option<AnalysisJob>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM analysis_jobs \
             WHERE match_id = $1 AND half = $2 \
             ORDER BY created_at DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, AnalysisJob>(&query)
            .bind(match_id)
            .bind(half.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Update the progress surface mid-run.
    ///
    /// `overall_progress` is written with `GREATEST` so progress can
    /// never go backwards even if updates race.
    pub async fn update_progress(
        pool: &PgPool,
        job_id: DbId,
        stage: PipelineStage,
        overall_progress: i16,
        estimated_seconds_remaining: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE analysis_jobs \
             SET current_stage = $2, \
                 overall_progress = GREATEST(overall_progress, $3), \
                 estimated_seconds_remaining = $4, \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(job_id)
        .bind(stage.as_str())
        .bind(overall_progress)
        .bind(estimated_seconds_remaining)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Surface (or clear) a transient error message without touching the
    /// job status. Written only once the error debouncer confirms.
    pub async fn set_error_message(
        pool: &PgPool,
        job_id: DbId,
        message: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE analysis_jobs SET error_message = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(job_id)
        .bind(message)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn mark_done(pool: &PgPool, job_id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE analysis_jobs \
             SET status = $2, overall_progress = 100, estimated_seconds_remaining = 0, \
                 error_message = NULL, finished_at = NOW(), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(job_id)
        .bind(JobStatus::Done.as_str())
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn mark_error(pool: &PgPool, job_id: DbId, message: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE analysis_jobs \
             SET status = $2, error_message = $3, finished_at = NOW(), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(job_id)
        .bind(JobStatus::Error.as_str())
        .bind(message)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Re-queue a failed job (the only backward status edge).
    ///
    /// Returns `false` when the job is not in the error state.
    pub async fn requeue(pool: &PgPool, job_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE analysis_jobs \
             SET status = $2, error_message = NULL, overall_progress = 0, \
                 estimated_seconds_remaining = -1, current_stage = NULL, \
                 started_at = NULL, finished_at = NULL, updated_at = NOW() \
             WHERE id = $1 AND status = $3",
        )
        .bind(job_id)
        .bind(JobStatus::Queued.as_str())
        .bind(JobStatus::Error.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
