//! Handlers for track-identity mappings.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use matchlens_core::event::Team;
use matchlens_core::identity;
use matchlens_core::types::DbId;
use matchlens_db::models::mapping::ConfirmMapping;
use matchlens_db::repositories::MappingRepo;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/matches/{id}/mappings
pub async fn list_mappings(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let rows = MappingRepo::list_for_match(&state.pool, id).await?;
    Ok(Json(DataResponse { data: rows }))
}

/// POST /api/v1/matches/{id}/mappings/{track}/confirm
///
/// Human confirmation of a jersey number. The confirmed mapping is
/// final: confidence 1.0, source `manual`, review flag cleared, and
/// automated passes can no longer overwrite it.
pub async fn confirm_mapping(
    State(state): State<AppState>,
    Path((id, track_key)): Path<(DbId, String)>,
    Json(input): Json<ConfirmMapping>,
) -> AppResult<impl IntoResponse> {
    let existing_row = MappingRepo::find_by_key(&state.pool, id, &track_key).await?;
    let existing = match &existing_row {
        Some(row) => Some(row.to_core()?),
        None => None,
    };

    let team = match &input.team {
        Some(raw) => Team::parse(raw)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown team '{raw}'")))?,
        None => existing
            .as_ref()
            .map(|i| i.team)
            .ok_or_else(|| AppError::BadRequest("Team is required for a new mapping".into()))?,
    };

    let confirmed = identity::confirm(existing, &track_key, team, input.jersey_number)?;
    let row = MappingRepo::upsert_manual(
        &state.pool,
        id,
        &track_key,
        confirmed.team.as_str(),
        input.jersey_number,
    )
    .await?;

    tracing::info!(
        match_id = id,
        track_key = %track_key,
        jersey_number = input.jersey_number,
        "Mapping confirmed"
    );
    Ok(Json(DataResponse { data: row }))
}
