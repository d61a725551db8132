//! Clip entity models.

use matchlens_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `clips` table: one ranked candidate highlight.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Clip {
    pub id: DbId,
    pub match_id: DbId,
    pub job_id: DbId,
    pub half: String,
    pub start_secs: f64,
    pub end_secs: f64,
    pub base_importance: f64,
    pub final_importance: f64,
    pub storage_path: Option<String>,
    pub created_at: Timestamp,
}

/// Insert DTO for a freshly ranked clip.
#[derive(Debug, Clone)]
pub struct NewClip {
    pub start_secs: f64,
    pub end_secs: f64,
    pub base_importance: f64,
    pub final_importance: f64,
    pub storage_path: Option<String>,
}

impl From<matchlens_core::ranking::Clip> for NewClip {
    fn from(clip: matchlens_core::ranking::Clip) -> Self {
        Self {
            start_secs: clip.start_secs,
            end_secs: clip.end_secs,
            base_importance: clip.base_importance,
            final_importance: clip.final_importance,
            storage_path: None,
        }
    }
}
