//! Handlers for `/matches/{id}/clips`.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use matchlens_core::ranking::{filter_to_target_count, Clip};
use matchlens_core::types::DbId;
use matchlens_db::repositories::ClipRepo;
use serde::Deserialize;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Query parameters for `GET /api/v1/matches/{id}/clips`.
#[derive(Debug, Default, Deserialize)]
pub struct ClipListQuery {
    /// Keep only clips at or above this final importance.
    pub min_importance: Option<f64>,
    /// Adaptively thin the list toward this many clips.
    pub target_count: Option<usize>,
}

/// GET /api/v1/matches/{id}/clips
///
/// Ranked clips, highest importance first. `min_importance` is a hard
/// floor; `target_count` lowers the importance threshold step by step
/// until enough clips qualify.
pub async fn list_clips(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Query(query): Query<ClipListQuery>,
) -> AppResult<impl IntoResponse> {
    let mut rows = ClipRepo::list_ranked(&state.pool, id).await?;

    if let Some(min) = query.min_importance {
        rows.retain(|c| c.final_importance >= min);
    }

    if let Some(target) = query.target_count {
        // Rows are already importance-sorted, so the adaptive filter's
        // keep-set is a prefix of them.
        let ranked: Vec<Clip> = rows
            .iter()
            .map(|r| Clip {
                start_secs: r.start_secs,
                end_secs: r.end_secs,
                base_importance: r.base_importance,
                final_importance: r.final_importance,
            })
            .collect();
        let kept = filter_to_target_count(&ranked, target);
        rows.truncate(kept.len());
    }

    Ok(Json(DataResponse { data: rows }))
}
