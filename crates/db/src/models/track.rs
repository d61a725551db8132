//! Track entity models.
//!
//! Only the summary digest lives in Postgres; the full frame array is a
//! blob-store document referenced by `frames_path`.

use matchlens_core::track::TrackSummary;
use matchlens_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `tracks` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TrackRow {
    pub id: DbId,
    pub match_id: DbId,
    pub job_id: DbId,
    pub half: String,
    pub track_key: String,
    pub start_secs: f64,
    pub end_secs: f64,
    pub frame_count: i32,
    pub avg_confidence: f64,
    pub frames_path: String,
    pub created_at: Timestamp,
}

/// Insert DTO pairing a summary with its blob document path.
#[derive(Debug, Clone)]
pub struct NewTrack {
    pub summary: TrackSummary,
    pub frames_path: String,
}
