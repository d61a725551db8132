//! Handlers for the human review queue.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use matchlens_core::types::DbId;
use matchlens_db::models::review::ResolveReview;
use matchlens_pipeline::review;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/matches/{id}/reviews
///
/// Open reviews joined with their events, oldest first.
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let rows = review::list_pending(&state.pool, id).await?;
    Ok(Json(DataResponse { data: rows }))
}

/// POST /api/v1/reviews/{event_id}/resolve
///
/// Record a resolution for an event's open review. Resolving an
/// already-resolved review is a no-op.
pub async fn resolve_review(
    State(state): State<AppState>,
    Path(event_id): Path<DbId>,
    Json(input): Json<ResolveReview>,
) -> AppResult<impl IntoResponse> {
    review::resolve(&state.pool, &state.bus, event_id, &input.resolution).await?;

    tracing::info!(event_id, resolution = %input.resolution, "Review resolved");
    Ok(Json(DataResponse {
        data: serde_json::json!({ "resolved": true }),
    }))
}
