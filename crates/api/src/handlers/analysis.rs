//! Handlers for `/matches/{id}/analysis`: starting or retrying runs and
//! the per-half progress surface.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use matchlens_core::error::CoreError;
use matchlens_core::job::{combined_status, Half, JobStatus, MatchFormat, PipelineVariant};
use matchlens_core::types::DbId;
use matchlens_db::models::job::{AnalysisJob, StartAnalysis};
use matchlens_db::models::matches::Match;
use matchlens_db::repositories::{JobRepo, MatchRepo};
use matchlens_events::AnalysisEvent;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/matches/{id}/analysis
///
/// Queue an analysis run for each requested half. Errored jobs are
/// requeued in place; queued or running jobs are left alone; anything
/// else gets a fresh job. Returns 202 with the latest job per half.
pub async fn start_analysis(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    body: Option<Json<StartAnalysis>>,
) -> AppResult<impl IntoResponse> {
    let input = body.map(|Json(b)| b).unwrap_or_default();

    let row = MatchRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "match",
            id,
        })?;
    let format = row.match_format()?;

    let variant = match &input.variant {
        Some(raw) => PipelineVariant::parse(raw)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown pipeline variant '{raw}'")))?,
        None => state.config.pipeline_variant,
    };

    let halves = requested_halves(&row, format, input.half.as_deref())?;

    let mut jobs = Vec::with_capacity(halves.len());
    for half in halves {
        let latest = JobRepo::latest_for_half(&state.pool, id, half).await?;
        match latest {
            Some(job) if job.job_status()? == JobStatus::Error => {
                if JobRepo::requeue(&state.pool, job.id).await? {
                    publish_queued(&state, id, job.id, half);
                }
            }
            Some(job)
                if matches!(job.job_status()?, JobStatus::Queued | JobStatus::Running) => {}
            _ => {
                let job = JobRepo::create(&state.pool, id, half, variant).await?;
                publish_queued(&state, id, job.id, half);
            }
        }

        if let Some(job) = JobRepo::latest_for_half(&state.pool, id, half).await? {
            jobs.push(job);
        }
    }

    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: jobs })))
}

/// Which halves a start request targets: the explicit half, or every
/// expected half whose video is registered.
fn requested_halves(
    row: &Match,
    format: MatchFormat,
    requested: Option<&str>,
) -> Result<Vec<Half>, AppError> {
    if let Some(raw) = requested {
        let half = Half::parse(raw)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown half '{raw}'")))?;
        if !format.expected_halves().contains(&half) {
            return Err(AppError::BadRequest(format!(
                "Half '{}' is not valid for a {} match",
                half.as_str(),
                format.as_str()
            )));
        }
        if row.video_path(half).is_none() {
            return Err(AppError::BadRequest(format!(
                "No video registered for the {} half",
                half.as_str()
            )));
        }
        return Ok(vec![half]);
    }

    let halves: Vec<Half> = format
        .expected_halves()
        .iter()
        .copied()
        .filter(|&h| row.video_path(h).is_some())
        .collect();
    if halves.is_empty() {
        return Err(AppError::BadRequest(
            "No videos registered for this match".into(),
        ));
    }
    Ok(halves)
}

fn publish_queued(state: &AppState, match_id: DbId, job_id: DbId, half: Half) {
    state.bus.publish(
        AnalysisEvent::new("job.queued", match_id)
            .with_job(job_id)
            .with_payload(serde_json::json!({ "half": half.as_str() })),
    );
}

/// Per-half slice of the progress surface.
#[derive(Debug, Serialize)]
pub struct HalfProgress {
    pub half: &'static str,
    pub status: String,
    pub current_stage: Option<String>,
    pub overall_progress: i16,
    pub estimated_seconds_remaining: i64,
    pub error_message: Option<String>,
}

/// Response of `GET /api/v1/matches/{id}/analysis`.
#[derive(Debug, Serialize)]
pub struct AnalysisProgress {
    /// Combined match status across halves.
    pub status: String,
    pub halves: Vec<HalfProgress>,
}

/// GET /api/v1/matches/{id}/analysis
///
/// Progress surface: the latest job per expected half plus the combined
/// match status (`partial` while one half of a two-half match lags).
pub async fn get_analysis(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let row = MatchRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "match",
            id,
        })?;
    let format = row.match_format()?;

    let mut halves = Vec::new();
    let mut statuses = Vec::new();
    for &half in format.expected_halves() {
        let job = JobRepo::latest_for_half(&state.pool, id, half).await?;
        let status = match &job {
            Some(j) => Some(j.job_status()?),
            None => None,
        };
        statuses.push(status);
        halves.push(half_progress(half, status, job));
    }

    let combined = match format {
        MatchFormat::SingleVideo => statuses[0].unwrap_or(JobStatus::Idle),
        MatchFormat::TwoHalves => combined_status(statuses[0], statuses[1]),
    };

    Ok(Json(DataResponse {
        data: AnalysisProgress {
            status: combined.as_str().to_string(),
            halves,
        },
    }))
}

fn half_progress(half: Half, status: Option<JobStatus>, job: Option<AnalysisJob>) -> HalfProgress {
    match job {
        Some(job) => HalfProgress {
            half: half.as_str(),
            status: status.unwrap_or(JobStatus::Idle).as_str().to_string(),
            current_stage: job.current_stage,
            overall_progress: job.overall_progress,
            estimated_seconds_remaining: job.estimated_seconds_remaining,
            error_message: job.error_message,
        },
        None => HalfProgress {
            half: half.as_str(),
            status: JobStatus::Idle.as_str().to_string(),
            current_stage: None,
            overall_progress: 0,
            estimated_seconds_remaining: matchlens_core::progress::ETA_UNKNOWN,
            error_message: None,
        },
    }
}
