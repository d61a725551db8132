//! Player track types and summary math.
//!
//! Full per-frame arrays are large (one entry per detection per frame) and
//! live in the blob store as JSON documents; only the summary columns
//! computed here are persisted in Postgres.

use crate::error::CoreError;
use crate::types::VideoSecs;

/// Prefix for track keys as emitted by the perception service.
pub const TRACK_KEY_PREFIX: &str = "track_";

// ---------------------------------------------------------------------------
// Frame-level types
// ---------------------------------------------------------------------------

/// Axis-aligned box, all coordinates normalized to `[0, 1]` of the frame.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl BoundingBox {
    /// Center point of the box.
    pub fn center(self) -> (f64, f64) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }
}

/// One observation of a tracked player in one frame.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrackFrame {
    pub frame_number: u32,
    pub timestamp: VideoSecs,
    pub bbox: BoundingBox,
    pub confidence: f64,
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Row-sized digest of a track, derived from its frame array.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrackSummary {
    pub track_key: String,
    pub start_secs: VideoSecs,
    pub end_secs: VideoSecs,
    pub frame_count: u32,
    pub avg_confidence: f64,
}

/// Summarize a frame array into its persistable digest.
///
/// Frames need not be sorted; start/end are taken over all timestamps.
/// An empty frame array is invalid by construction upstream, so it is
/// rejected rather than summarized as zeros.
pub fn summarize_frames(track_key: &str, frames: &[TrackFrame]) -> Result<TrackSummary, CoreError> {
    if frames.is_empty() {
        return Err(CoreError::Validation(format!(
            "track {track_key} has no frames"
        )));
    }

    let mut start = f64::INFINITY;
    let mut end = f64::NEG_INFINITY;
    let mut conf_sum = 0.0;
    for f in frames {
        start = start.min(f.timestamp);
        end = end.max(f.timestamp);
        conf_sum += f.confidence;
    }

    Ok(TrackSummary {
        track_key: track_key.to_string(),
        start_secs: start,
        end_secs: end,
        frame_count: frames.len() as u32,
        avg_confidence: conf_sum / frames.len() as f64,
    })
}

// ---------------------------------------------------------------------------
// Track keys
// ---------------------------------------------------------------------------

/// Build the canonical key for a numeric tracker id.
pub fn format_track_key(id: u32) -> String {
    format!("{TRACK_KEY_PREFIX}{id}")
}

/// Parse a canonical track key back to its numeric id.
pub fn parse_track_key(key: &str) -> Option<u32> {
    key.strip_prefix(TRACK_KEY_PREFIX)?.parse().ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn frame(n: u32, ts: f64, conf: f64) -> TrackFrame {
        TrackFrame {
            frame_number: n,
            timestamp: ts,
            bbox: BoundingBox {
                x: 0.1,
                y: 0.2,
                w: 0.05,
                h: 0.1,
            },
            confidence: conf,
        }
    }

    #[test]
    fn summarize_spans_and_averages() {
        let frames = vec![frame(30, 1.0, 0.9), frame(60, 2.0, 0.7), frame(90, 3.0, 0.8)];
        let s = summarize_frames("track_4", &frames).unwrap();
        assert_eq!(s.track_key, "track_4");
        assert!((s.start_secs - 1.0).abs() < f64::EPSILON);
        assert!((s.end_secs - 3.0).abs() < f64::EPSILON);
        assert_eq!(s.frame_count, 3);
        assert!((s.avg_confidence - 0.8).abs() < 1e-12);
    }

    #[test]
    fn summarize_unsorted_frames() {
        let frames = vec![frame(60, 2.0, 0.5), frame(30, 1.0, 0.5)];
        let s = summarize_frames("track_1", &frames).unwrap();
        assert!((s.start_secs - 1.0).abs() < f64::EPSILON);
        assert!((s.end_secs - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn summarize_rejects_empty() {
        assert_matches!(
            summarize_frames("track_9", &[]),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn bbox_center() {
        let b = BoundingBox {
            x: 0.2,
            y: 0.4,
            w: 0.2,
            h: 0.2,
        };
        let (cx, cy) = b.center();
        assert!((cx - 0.3).abs() < f64::EPSILON);
        assert!((cy - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn track_key_round_trip() {
        assert_eq!(format_track_key(12), "track_12");
        assert_eq!(parse_track_key("track_12"), Some(12));
        assert_eq!(parse_track_key("player_12"), None);
        assert_eq!(parse_track_key("track_x"), None);
    }
}
