//! Identity mapping entity models and core-type conversions.

use matchlens_core::error::CoreError;
use matchlens_core::event::Team;
use matchlens_core::identity::{MappingSource, TrackIdentity};
use matchlens_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `identity_mappings` table. Keyed by (match, track);
/// outlives individual job runs.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct IdentityMapping {
    pub id: DbId,
    pub match_id: DbId,
    pub track_key: String,
    pub team: String,
    pub jersey_number: Option<i16>,
    pub confidence: f64,
    /// `ocr`, `manual`, or `corrected`.
    pub source: String,
    pub needs_review: bool,
    pub ocr_history: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl IdentityMapping {
    /// Rehydrate the domain identity from this row.
    pub fn to_core(&self) -> Result<TrackIdentity, CoreError> {
        let team = Team::parse(&self.team)
            .ok_or_else(|| CoreError::Internal(format!("unknown team '{}'", self.team)))?;
        let source = MappingSource::parse(&self.source).ok_or_else(|| {
            CoreError::Internal(format!("unknown mapping source '{}'", self.source))
        })?;
        let ocr_history = serde_json::from_value(self.ocr_history.clone()).map_err(|e| {
            CoreError::Internal(format!("bad ocr history for row {}: {e}", self.id))
        })?;

        Ok(TrackIdentity {
            track_key: self.track_key.clone(),
            team,
            jersey_number: self.jersey_number,
            confidence: self.confidence,
            source,
            needs_review: self.needs_review,
            ocr_history,
        })
    }
}

/// Column values for upserting a resolved identity.
#[derive(Debug, Clone)]
pub struct UpsertMapping {
    pub track_key: String,
    pub team: String,
    pub jersey_number: Option<i16>,
    pub confidence: f64,
    pub source: String,
    pub needs_review: bool,
    pub ocr_history: serde_json::Value,
}

impl UpsertMapping {
    pub fn from_core(identity: &TrackIdentity) -> Result<Self, CoreError> {
        let ocr_history = serde_json::to_value(&identity.ocr_history)
            .map_err(|e| CoreError::Internal(format!("ocr history serialization: {e}")))?;
        Ok(Self {
            track_key: identity.track_key.clone(),
            team: identity.team.as_str().to_string(),
            jersey_number: identity.jersey_number,
            confidence: identity.confidence,
            source: identity.source.as_str().to_string(),
            needs_review: identity.needs_review,
            ocr_history,
        })
    }
}

/// DTO for `POST /api/v1/matches/{id}/mappings/{track}/confirm`.
#[derive(Debug, Deserialize)]
pub struct ConfirmMapping {
    pub jersey_number: i16,
    /// Required when confirming a track the automated pass never saw.
    pub team: Option<String>,
}
