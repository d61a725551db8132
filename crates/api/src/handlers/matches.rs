//! Handlers for the `/matches` resource: creation, lookup, and video
//! registration.

use std::path::PathBuf;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use matchlens_core::error::CoreError;
use matchlens_core::job::{Half, MatchFormat};
use matchlens_core::types::DbId;
use matchlens_db::models::matches::CreateMatch;
use matchlens_db::repositories::MatchRepo;
use matchlens_pipeline::UploadTask;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/matches
///
/// Create a match. Returns 201 with the created row.
pub async fn create_match(
    State(state): State<AppState>,
    Json(input): Json<CreateMatch>,
) -> AppResult<impl IntoResponse> {
    let format_raw = input.format.as_deref().unwrap_or("single_video");
    let format = MatchFormat::parse(format_raw)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown match format '{format_raw}'")))?;

    let row = MatchRepo::create(&state.pool, &input, format.as_str()).await?;

    tracing::info!(match_id = row.id, name = %row.name, "Match created");
    Ok((StatusCode::CREATED, Json(DataResponse { data: row })))
}

/// GET /api/v1/matches/{id}
pub async fn get_match(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let row = MatchRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "match",
            id,
        })?;
    Ok(Json(DataResponse { data: row }))
}

/// Body of `POST /api/v1/matches/{id}/videos`.
#[derive(Debug, Deserialize)]
pub struct RegisterVideo {
    /// `full`, `first`, or `second`; must agree with the match format.
    pub half: String,
    /// Path of the staged upload on local disk.
    pub source_path: String,
}

/// POST /api/v1/matches/{id}/videos
///
/// Register an uploaded video half. The bytes are moved into the blob
/// store asynchronously by the upload worker, which then queues the
/// analysis job; the request only validates and enqueues.
pub async fn register_video(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<RegisterVideo>,
) -> AppResult<impl IntoResponse> {
    let row = MatchRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "match",
            id,
        })?;

    let half = Half::parse(&input.half)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown half '{}'", input.half)))?;
    let format = row.match_format()?;
    if !format.expected_halves().contains(&half) {
        return Err(AppError::BadRequest(format!(
            "Half '{}' is not valid for a {} match",
            half.as_str(),
            format.as_str()
        )));
    }

    let source_path = PathBuf::from(&input.source_path);
    if tokio::fs::metadata(&source_path).await.is_err() {
        return Err(AppError::BadRequest(format!(
            "Staged upload not found: {}",
            input.source_path
        )));
    }

    state.upload_queue.enqueue(UploadTask {
        match_id: id,
        half,
        source_path,
    });

    tracing::info!(match_id = id, half = half.as_str(), "Video registration queued");
    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: serde_json::json!({
                "queued": true,
                "pending_uploads": state.upload_queue.len(),
            }),
        }),
    ))
}
