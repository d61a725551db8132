//! Wire types for the perception service API.
//!
//! Raw DTOs deserialize straight off the wire and convert into core
//! domain types at the crate boundary, so nothing above this layer sees
//! perception-service JSON shapes.

use matchlens_core::event::{EventDetail, EventSource, MatchEvent, PitchPoint, Team};
use matchlens_core::identity::OcrReading;
use matchlens_core::ranking::Clip;
use matchlens_core::track::{format_track_key, BoundingBox, TrackFrame};
use matchlens_core::types::VideoSecs;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Tracking
// ---------------------------------------------------------------------------

/// Response to `POST /track`: the submission was accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackSubmission {
    pub job_id: String,
}

/// Terminality of an asynchronous tracking job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingStatus {
    Processing,
    Completed,
    Error,
}

/// One tracked player as returned by `GET /track/{job_id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTrack {
    pub track_id: u32,
    pub frames: Vec<RawTrackFrame>,
}

/// One per-frame observation on the wire.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RawTrackFrame {
    pub frame_number: u32,
    pub timestamp: VideoSecs,
    pub bbox: [f64; 4],
    pub confidence: f64,
}

impl RawTrack {
    /// Canonical key for this track.
    pub fn track_key(&self) -> String {
        format_track_key(self.track_id)
    }

    /// Convert the wire frames into domain frames.
    pub fn to_frames(&self) -> Vec<TrackFrame> {
        self.frames
            .iter()
            .map(|f| TrackFrame {
                frame_number: f.frame_number,
                timestamp: f.timestamp,
                bbox: BoundingBox {
                    x: f.bbox[0],
                    y: f.bbox[1],
                    w: f.bbox[2],
                    h: f.bbox[3],
                },
                confidence: f.confidence,
            })
            .collect()
    }
}

/// Response to `GET /track/{job_id}`.
///
/// `tracks` is populated only when `status` is `Completed`; `error`
/// only when it is `Error`.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackingPoll {
    pub status: TrackingStatus,
    /// Fraction complete in `[0, 1]`.
    #[serde(default)]
    pub progress: f64,
    /// Source video duration, reported once known.
    #[serde(default)]
    pub duration_secs: Option<f64>,
    #[serde(default)]
    pub tracks: Vec<RawTrack>,
    #[serde(default)]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Event labeling
// ---------------------------------------------------------------------------

/// One labeled event as emitted by `POST /label/windows` or
/// `POST /analyze`.
///
/// The detail payload shares its tagged-JSON shape with
/// [`EventDetail`], so the perception contract and the domain type
/// cannot drift apart silently.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEvent {
    pub team: Team,
    pub event_secs: VideoSecs,
    pub confidence: f64,
    #[serde(default)]
    pub actor_track_id: Option<u32>,
    #[serde(default)]
    pub position: Option<PitchPoint>,
    pub detail: EventDetail,
}

impl RawEvent {
    /// Lift the wire event into a domain event.
    ///
    /// `window_id` tags which label window sighted it (none for the
    /// consolidated variant's whole-video pass).
    pub fn into_event(self, window_id: Option<u32>) -> MatchEvent {
        MatchEvent {
            team: self.team,
            event_secs: self.event_secs,
            confidence: self.confidence,
            source: EventSource::Detected,
            actor_track: self.actor_track_id.map(format_track_key),
            position: self.position,
            detail: self.detail,
            window_ids: window_id.into_iter().collect(),
            original_secs: vec![self.event_secs],
        }
    }
}

/// Response to `POST /label/windows` and `POST /analyze`: the labeled
/// events plus the candidate highlight scenes found in the same span.
#[derive(Debug, Clone, Deserialize)]
pub struct LabelResponse {
    pub events: Vec<RawEvent>,
    #[serde(default)]
    pub scenes: Vec<RawScene>,
}

/// One candidate highlight interval with its visual-salience score.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RawScene {
    pub start_secs: VideoSecs,
    pub end_secs: VideoSecs,
    pub base_importance: f64,
}

impl RawScene {
    /// Lift the wire scene into an unranked clip.
    pub fn into_clip(self) -> Clip {
        Clip {
            start_secs: self.start_secs,
            end_secs: self.end_secs,
            base_importance: self.base_importance,
            final_importance: self.base_importance,
        }
    }
}

// ---------------------------------------------------------------------------
// Jersey OCR
// ---------------------------------------------------------------------------

/// Response to `POST /ocr/jersey`.
#[derive(Debug, Clone, Deserialize)]
pub struct OcrResponse {
    /// Kit-color team assignment for the track, when the service could
    /// decide one.
    #[serde(default)]
    pub team: Option<Team>,
    pub readings: Vec<RawOcrReading>,
}

/// One jersey reading on the wire.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RawOcrReading {
    pub jersey_number: i16,
    pub confidence: f64,
    pub frame_number: u32,
}

impl From<RawOcrReading> for OcrReading {
    fn from(r: RawOcrReading) -> Self {
        OcrReading {
            jersey_number: r.jersey_number,
            confidence: r.confidence,
            frame_number: r.frame_number,
        }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Body of `POST /track` and `POST /analyze`.
#[derive(Debug, Serialize)]
pub struct VideoRequest<'a> {
    pub video_path: &'a str,
}

/// Body of `POST /label/windows`.
#[derive(Debug, Serialize)]
pub struct LabelWindowRequest<'a> {
    pub video_path: &'a str,
    pub window_id: u32,
    pub start_secs: VideoSecs,
    pub end_secs: VideoSecs,
}

/// Body of `POST /ocr/jersey`.
#[derive(Debug, Serialize)]
pub struct OcrRequest<'a> {
    pub video_path: &'a str,
    pub track_key: &'a str,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use matchlens_core::event::PassOutcome;

    #[test]
    fn raw_event_deserializes_and_lifts() {
        let raw: RawEvent = serde_json::from_str(
            r#"{
                "team": "home",
                "event_secs": 93.4,
                "confidence": 0.77,
                "actor_track_id": 6,
                "detail": {"type": "pass", "outcome": "complete", "progressive": true}
            }"#,
        )
        .unwrap();

        let event = raw.into_event(Some(2));
        assert_eq!(event.team, Team::Home);
        assert_eq!(event.actor_track.as_deref(), Some("track_6"));
        assert_eq!(event.source, EventSource::Detected);
        assert_eq!(event.window_ids, vec![2]);
        assert_eq!(event.original_secs, vec![93.4]);
        assert_eq!(
            event.detail,
            EventDetail::Pass {
                outcome: PassOutcome::Complete,
                progressive: true
            }
        );
    }

    #[test]
    fn consolidated_event_has_no_window() {
        let raw = RawEvent {
            team: Team::Away,
            event_secs: 10.0,
            confidence: 0.5,
            actor_track_id: None,
            position: None,
            detail: EventDetail::Turnover {
                cause: matchlens_core::event::TurnoverCause::BadTouch,
            },
        };
        let event = raw.into_event(None);
        assert!(event.window_ids.is_empty());
        assert!(event.actor_track.is_none());
    }

    #[test]
    fn raw_track_converts_bbox_array() {
        let track = RawTrack {
            track_id: 3,
            frames: vec![RawTrackFrame {
                frame_number: 30,
                timestamp: 1.0,
                bbox: [0.1, 0.2, 0.05, 0.1],
                confidence: 0.9,
            }],
        };
        assert_eq!(track.track_key(), "track_3");
        let frames = track.to_frames();
        assert_eq!(frames.len(), 1);
        assert!((frames[0].bbox.w - 0.05).abs() < f64::EPSILON);
    }

    #[test]
    fn tracking_poll_defaults_optional_fields() {
        let poll: TrackingPoll =
            serde_json::from_str(r#"{"status": "processing", "progress": 0.4}"#).unwrap();
        assert_eq!(poll.status, TrackingStatus::Processing);
        assert!(poll.tracks.is_empty());
        assert!(poll.error.is_none());
    }
}
