//! Match event types: the tagged payload union, teams, sources, and
//! validation.
//!
//! An event's payload is a real sum type, not a bag of optional fields.
//! Consumers match exhaustively, so adding a variant is a compile error
//! everywhere it matters.

use crate::error::CoreError;
use crate::types::VideoSecs;

// ---------------------------------------------------------------------------
// Teams
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    Home,
    Away,
}

impl Team {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Away => "away",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "home" => Some(Self::Home),
            "away" => Some(Self::Away),
            _ => None,
        }
    }

    pub fn opponent(self) -> Self {
        match self {
            Self::Home => Self::Away,
            Self::Away => Self::Home,
        }
    }
}

// ---------------------------------------------------------------------------
// Event kinds and payloads
// ---------------------------------------------------------------------------

/// Flat kind discriminant, used for DB filtering columns and log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Pass,
    Carry,
    Turnover,
    Shot,
    SetPiece,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Carry => "carry",
            Self::Turnover => "turnover",
            Self::Shot => "shot",
            Self::SetPiece => "set_piece",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pass" => Some(Self::Pass),
            "carry" => Some(Self::Carry),
            "turnover" => Some(Self::Turnover),
            "shot" => Some(Self::Shot),
            "set_piece" => Some(Self::SetPiece),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassOutcome {
    Complete,
    Incomplete,
    Intercepted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnoverCause {
    Dispossessed,
    BadTouch,
    OutOfBounds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetPieceKind {
    Corner,
    FreeKick,
    ThrowIn,
    GoalKick,
    Penalty,
}

/// Kind-specific event payload. Serialized (including into the `detail`
/// JSONB column) with an explicit `type` tag.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventDetail {
    Pass {
        outcome: PassOutcome,
        progressive: bool,
    },
    Carry {
        distance_m: f64,
        progressive: bool,
    },
    Turnover {
        cause: TurnoverCause,
    },
    Shot {
        on_target: bool,
        goal: bool,
    },
    SetPiece {
        kind: SetPieceKind,
    },
}

impl EventDetail {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Pass { .. } => EventKind::Pass,
            Self::Carry { .. } => EventKind::Carry,
            Self::Turnover { .. } => EventKind::Turnover,
            Self::Shot { .. } => EventKind::Shot,
            Self::SetPiece { .. } => EventKind::SetPiece,
        }
    }
}

// ---------------------------------------------------------------------------
// Event source
// ---------------------------------------------------------------------------

/// Where an event's current field values came from. A reviewer correction
/// flips the source to `Corrected`, and corrected rows are authoritative:
/// no automated pass may downgrade them back to `Detected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    Detected,
    Corrected,
}

impl EventSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Detected => "detected",
            Self::Corrected => "corrected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "detected" => Some(Self::Detected),
            "corrected" => Some(Self::Corrected),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Pitch positions
// ---------------------------------------------------------------------------

/// Normalized field position, both axes in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PitchPoint {
    pub x: f64,
    pub y: f64,
}

impl PitchPoint {
    pub fn distance_to(self, other: PitchPoint) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

// ---------------------------------------------------------------------------
// MatchEvent
// ---------------------------------------------------------------------------

/// One detected (or corrected) on-pitch event, positioned in video time.
///
/// `window_ids` lists the label windows that contributed a sighting of
/// this event; a raw single-window sighting has exactly one entry and the
/// consolidated variant produces none. `original_secs` keeps every
/// contributing timestamp for audit after merging.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MatchEvent {
    pub team: Team,
    pub event_secs: VideoSecs,
    pub confidence: f64,
    pub source: EventSource,
    pub actor_track: Option<String>,
    pub position: Option<PitchPoint>,
    pub detail: EventDetail,
    pub window_ids: Vec<u32>,
    pub original_secs: Vec<VideoSecs>,
}

impl MatchEvent {
    pub fn kind(&self) -> EventKind {
        self.detail.kind()
    }

    pub fn is_goal(&self) -> bool {
        matches!(self.detail, EventDetail::Shot { goal: true, .. })
    }

    /// Structural validation of value ranges.
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_confidence(self.confidence)?;
        if self.event_secs < 0.0 || !self.event_secs.is_finite() {
            return Err(CoreError::Validation(format!(
                "event_secs must be finite and non-negative, got {}",
                self.event_secs
            )));
        }
        if let Some(p) = self.position {
            if !(0.0..=1.0).contains(&p.x) || !(0.0..=1.0).contains(&p.y) {
                return Err(CoreError::Validation(format!(
                    "position out of normalized range: ({}, {})",
                    p.x, p.y
                )));
            }
        }
        Ok(())
    }
}

/// Validate a confidence value is within `[0, 1]`.
pub fn validate_confidence(confidence: f64) -> Result<(), CoreError> {
    if !(0.0..=1.0).contains(&confidence) || !confidence.is_finite() {
        return Err(CoreError::Validation(format!(
            "confidence must be within [0, 1], got {confidence}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn shot(goal: bool) -> MatchEvent {
        MatchEvent {
            team: Team::Home,
            event_secs: 48.2,
            confidence: 0.8,
            source: EventSource::Detected,
            actor_track: Some("track_3".to_string()),
            position: None,
            detail: EventDetail::Shot {
                on_target: true,
                goal,
            },
            window_ids: vec![0],
            original_secs: vec![48.2],
        }
    }

    // -- detail tagging --

    #[test]
    fn detail_serializes_with_type_tag() {
        let detail = EventDetail::Shot {
            on_target: true,
            goal: false,
        };
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["type"], "shot");
        assert_eq!(json["on_target"], true);
        assert_eq!(json["goal"], false);
    }

    #[test]
    fn detail_deserializes_from_tagged_json() {
        let detail: EventDetail =
            serde_json::from_str(r#"{"type":"set_piece","kind":"free_kick"}"#).unwrap();
        assert_matches!(
            detail,
            EventDetail::SetPiece {
                kind: SetPieceKind::FreeKick
            }
        );
    }

    #[test]
    fn detail_kind_matches_variant() {
        assert_eq!(
            EventDetail::Pass {
                outcome: PassOutcome::Complete,
                progressive: false
            }
            .kind(),
            EventKind::Pass
        );
        assert_eq!(
            EventDetail::Turnover {
                cause: TurnoverCause::Dispossessed
            }
            .kind(),
            EventKind::Turnover
        );
    }

    // -- validation --

    #[test]
    fn validate_accepts_well_formed_event() {
        assert!(shot(false).validate().is_ok());
    }

    #[test]
    fn validate_rejects_confidence_above_one() {
        let mut ev = shot(false);
        ev.confidence = 1.2;
        assert_matches!(ev.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn validate_rejects_negative_timestamp() {
        let mut ev = shot(false);
        ev.event_secs = -1.0;
        assert_matches!(ev.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn validate_rejects_position_outside_pitch() {
        let mut ev = shot(false);
        ev.position = Some(PitchPoint { x: 1.4, y: 0.5 });
        assert_matches!(ev.validate(), Err(CoreError::Validation(_)));
    }

    // -- helpers --

    #[test]
    fn goal_detection_requires_goal_flag() {
        assert!(shot(true).is_goal());
        assert!(!shot(false).is_goal());
    }

    #[test]
    fn team_opponent_flips() {
        assert_eq!(Team::Home.opponent(), Team::Away);
        assert_eq!(Team::Away.opponent(), Team::Home);
    }

    #[test]
    fn pitch_distance() {
        let a = PitchPoint { x: 0.0, y: 0.0 };
        let b = PitchPoint { x: 0.3, y: 0.4 };
        assert!((a.distance_to(b) - 0.5).abs() < f64::EPSILON);
    }
}
