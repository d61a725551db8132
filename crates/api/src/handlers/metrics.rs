//! Handlers for stat metrics and recomputation.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use matchlens_core::error::CoreError;
use matchlens_core::stats::StatScope;
use matchlens_core::types::DbId;
use matchlens_db::models::metric::MetricListQuery;
use matchlens_db::repositories::{MatchRepo, MetricRepo};
use matchlens_pipeline::review;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/matches/{id}/metrics
///
/// Stat metrics for a match, optionally filtered to one scope key
/// (`match`, `team:<team>`, or `player:<team>:<number>`).
pub async fn list_metrics(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Query(query): Query<MetricListQuery>,
) -> AppResult<impl IntoResponse> {
    if let Some(scope) = &query.scope {
        StatScope::parse(scope)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown metric scope '{scope}'")))?;
    }

    let rows = MetricRepo::list(&state.pool, id, &query).await?;
    Ok(Json(DataResponse { data: rows }))
}

/// POST /api/v1/matches/{id}/recalculate
///
/// Flag the match for asynchronous stats recomputation. Only stats are
/// recomputed, never the full pipeline.
pub async fn recalculate(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    MatchRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "match",
            id,
        })?;

    review::request_recalculation(&state.pool, id).await?;

    tracing::info!(match_id = id, "Stats recalculation requested");
    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: serde_json::json!({ "recalculation_queued": true }),
        }),
    ))
}
