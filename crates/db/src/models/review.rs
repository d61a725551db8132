//! Pending review entity models.

use matchlens_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `pending_reviews` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PendingReview {
    pub id: DbId,
    pub match_id: DbId,
    pub event_id: DbId,
    pub reason: String,
    pub resolved: bool,
    pub resolution: Option<String>,
    pub created_at: Timestamp,
    pub resolved_at: Option<Timestamp>,
}

/// An unresolved review joined with its underlying event, as served by
/// `GET /api/v1/matches/{id}/reviews`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PendingReviewWithEvent {
    pub id: DbId,
    pub event_id: DbId,
    pub reason: String,
    pub created_at: Timestamp,
    pub kind: String,
    pub team: String,
    pub event_secs: f64,
    pub confidence: f64,
    pub actor_track: Option<String>,
    pub detail: serde_json::Value,
}

/// DTO for `POST /api/v1/reviews/{event_id}/resolve`.
#[derive(Debug, Deserialize)]
pub struct ResolveReview {
    pub resolution: String,
}

/// DTO for `POST /api/v1/events/{id}/correct`.
///
/// Absent fields are left untouched; present fields become authoritative
/// (source flips to `corrected`, confidence to 1.0).
#[derive(Debug, Default, Deserialize)]
pub struct CorrectEvent {
    pub actor_track: Option<String>,
    /// New pass outcome: `complete`, `incomplete`, or `intercepted`.
    pub outcome: Option<String>,
}
