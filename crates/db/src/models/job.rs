//! Analysis job entity models and DTOs.

use matchlens_core::error::CoreError;
use matchlens_core::job::{Half, JobStatus, PipelineVariant};
use matchlens_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `analysis_jobs` table: one pipeline run for one half.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AnalysisJob {
    pub id: DbId,
    pub match_id: DbId,
    /// `full`, `first`, or `second`.
    pub half: String,
    /// `windowed` or `consolidated`; fixed at creation, never inferred
    /// from the current stage name.
    pub variant: String,
    pub status: String,
    pub current_stage: Option<String>,
    pub overall_progress: i16,
    /// Negative means "still computing".
    pub estimated_seconds_remaining: i64,
    pub error_message: Option<String>,
    pub started_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl AnalysisJob {
    pub fn job_status(&self) -> Result<JobStatus, CoreError> {
        JobStatus::parse(&self.status)
            .ok_or_else(|| CoreError::Internal(format!("unknown job status '{}'", self.status)))
    }

    pub fn job_half(&self) -> Result<Half, CoreError> {
        Half::parse(&self.half)
            .ok_or_else(|| CoreError::Internal(format!("unknown half '{}'", self.half)))
    }

    pub fn pipeline_variant(&self) -> Result<PipelineVariant, CoreError> {
        PipelineVariant::parse(&self.variant).ok_or_else(|| {
            CoreError::Internal(format!("unknown pipeline variant '{}'", self.variant))
        })
    }
}

/// DTO for `POST /api/v1/matches/{id}/analysis`.
#[derive(Debug, Default, Deserialize)]
pub struct StartAnalysis {
    /// Pipeline variant; defaults to `windowed`.
    pub variant: Option<String>,
    /// Restrict the run to one half. Defaults to every half whose video
    /// is registered.
    pub half: Option<String>,
}
