//! Match entity models and DTOs.

use matchlens_core::error::CoreError;
use matchlens_core::job::{Half, MatchFormat};
use matchlens_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `matches` table.
///
/// The match owns everything that outlives individual analysis runs:
/// identity mappings, pending reviews, metrics, and the
/// `needs_recalculation` flag the recompute worker consumes.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Match {
    pub id: DbId,
    pub name: String,
    pub home_team: String,
    pub away_team: String,
    /// `single_video` or `two_halves`.
    pub format: String,
    pub full_video_path: Option<String>,
    pub first_video_path: Option<String>,
    pub second_video_path: Option<String>,
    pub needs_recalculation: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Match {
    /// Parse the stored format string.
    pub fn match_format(&self) -> Result<MatchFormat, CoreError> {
        MatchFormat::parse(&self.format)
            .ok_or_else(|| CoreError::Internal(format!("unknown match format '{}'", self.format)))
    }

    /// Storage path of the registered video for `half`, if any.
    pub fn video_path(&self, half: Half) -> Option<&str> {
        match half {
            Half::Full => self.full_video_path.as_deref(),
            Half::First => self.first_video_path.as_deref(),
            Half::Second => self.second_video_path.as_deref(),
        }
    }
}

/// DTO for `POST /api/v1/matches`.
#[derive(Debug, Deserialize)]
pub struct CreateMatch {
    pub name: String,
    pub home_team: String,
    pub away_team: String,
    /// `single_video` (default) or `two_halves`.
    pub format: Option<String>,
}
