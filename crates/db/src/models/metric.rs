//! Stat metric entity models.

use matchlens_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `stat_metrics` table, unique per (match, key, scope).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StatMetricRow {
    pub id: DbId,
    pub match_id: DbId,
    pub key: String,
    /// `match`, `team:<team>`, or `player:<team>:<number>`.
    pub scope: String,
    pub value: f64,
    pub confidence: f64,
    pub explanation: String,
    pub updated_at: Timestamp,
}

/// Query parameters for `GET /api/v1/matches/{id}/metrics`.
#[derive(Debug, Default, Deserialize)]
pub struct MetricListQuery {
    pub scope: Option<String>,
}
