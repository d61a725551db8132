//! Match event entity models and core-type conversions.
//!
//! The `detail` column stores the tagged payload union as JSONB; `kind`
//! is denormalized from it for cheap filtering. Conversions to and from
//! [`MatchEvent`] live here so repositories and the pipeline never touch
//! raw JSON themselves.

use matchlens_core::error::CoreError;
use matchlens_core::event::{EventSource, MatchEvent, PitchPoint, Team};
use matchlens_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `match_events` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MatchEventRow {
    pub id: DbId,
    pub match_id: DbId,
    pub job_id: Option<DbId>,
    pub half: String,
    pub kind: String,
    pub team: String,
    pub event_secs: f64,
    pub confidence: f64,
    /// `detected` or `corrected`.
    pub source: String,
    pub needs_review: bool,
    pub actor_track: Option<String>,
    pub position_x: Option<f64>,
    pub position_y: Option<f64>,
    pub detail: serde_json::Value,
    pub merged_from_windows: serde_json::Value,
    pub original_secs: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl MatchEventRow {
    /// Rehydrate the domain event from this row.
    pub fn to_core(&self) -> Result<MatchEvent, CoreError> {
        let team = Team::parse(&self.team)
            .ok_or_else(|| CoreError::Internal(format!("unknown team '{}'", self.team)))?;
        let source = EventSource::parse(&self.source)
            .ok_or_else(|| CoreError::Internal(format!("unknown event source '{}'", self.source)))?;
        let detail = serde_json::from_value(self.detail.clone())
            .map_err(|e| CoreError::Internal(format!("bad event detail for row {}: {e}", self.id)))?;
        let window_ids = serde_json::from_value(self.merged_from_windows.clone())
            .map_err(|e| CoreError::Internal(format!("bad window ids for row {}: {e}", self.id)))?;
        let original_secs = serde_json::from_value(self.original_secs.clone())
            .map_err(|e| CoreError::Internal(format!("bad original secs for row {}: {e}", self.id)))?;

        let position = match (self.position_x, self.position_y) {
            (Some(x), Some(y)) => Some(PitchPoint { x, y }),
            _ => None,
        };

        Ok(MatchEvent {
            team,
            event_secs: self.event_secs,
            confidence: self.confidence,
            source,
            actor_track: self.actor_track.clone(),
            position,
            detail,
            window_ids,
            original_secs,
        })
    }
}

/// Insert payload derived from a domain event.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub kind: String,
    pub team: String,
    pub event_secs: f64,
    pub confidence: f64,
    pub source: String,
    pub needs_review: bool,
    pub actor_track: Option<String>,
    pub position_x: Option<f64>,
    pub position_y: Option<f64>,
    pub detail: serde_json::Value,
    pub merged_from_windows: serde_json::Value,
    pub original_secs: serde_json::Value,
}

impl NewEvent {
    /// Flatten a domain event into column values.
    ///
    /// `needs_review` is decided by the caller (low-confidence gating is
    /// pipeline policy, not a property of the event itself).
    pub fn from_core(event: &MatchEvent, needs_review: bool) -> Result<Self, CoreError> {
        let detail = serde_json::to_value(&event.detail)
            .map_err(|e| CoreError::Internal(format!("event detail serialization: {e}")))?;
        let merged_from_windows = serde_json::to_value(&event.window_ids)
            .map_err(|e| CoreError::Internal(format!("window ids serialization: {e}")))?;
        let original_secs = serde_json::to_value(&event.original_secs)
            .map_err(|e| CoreError::Internal(format!("original secs serialization: {e}")))?;

        Ok(Self {
            kind: event.kind().as_str().to_string(),
            team: event.team.as_str().to_string(),
            event_secs: event.event_secs,
            confidence: event.confidence,
            source: event.source.as_str().to_string(),
            needs_review,
            actor_track: event.actor_track.clone(),
            position_x: event.position.map(|p| p.x),
            position_y: event.position.map(|p| p.y),
            detail,
            merged_from_windows,
            original_secs,
        })
    }
}

/// Query parameters for `GET /api/v1/matches/{id}/events`.
#[derive(Debug, Default, serde::Deserialize)]
pub struct EventListQuery {
    pub kind: Option<String>,
    pub team: Option<String>,
}
