//! Handlers for match events: listing and reviewer corrections.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use matchlens_core::error::CoreError;
use matchlens_core::event::{EventKind, Team};
use matchlens_core::types::DbId;
use matchlens_db::models::event::EventListQuery;
use matchlens_db::models::review::CorrectEvent;
use matchlens_db::repositories::EventRepo;
use matchlens_pipeline::review;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/matches/{id}/events
///
/// Final merged events ordered by match time, optionally filtered by
/// `kind` and `team`.
pub async fn list_events(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Query(query): Query<EventListQuery>,
) -> AppResult<impl IntoResponse> {
    if let Some(kind) = &query.kind {
        EventKind::parse(kind)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown event kind '{kind}'")))?;
    }
    if let Some(team) = &query.team {
        Team::parse(team)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown team '{team}'")))?;
    }

    let rows = EventRepo::list(&state.pool, id, &query).await?;
    Ok(Json(DataResponse { data: rows }))
}

/// POST /api/v1/events/{id}/correct
///
/// Apply reviewer corrections to an event. The corrected row becomes
/// authoritative (source `corrected`, confidence 1.0) and its open
/// review is resolved.
pub async fn correct_event(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<CorrectEvent>,
) -> AppResult<impl IntoResponse> {
    review::correct_event(&state.pool, &state.bus, id, &input).await?;

    let row = EventRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "event",
            id,
        })?;

    tracing::info!(event_id = id, "Event corrected");
    Ok(Json(DataResponse { data: row }))
}
