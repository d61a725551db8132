//! Track-to-jersey identity resolution.
//!
//! The perception service reads jersey numbers off player crops frame by
//! frame; individual readings are noisy, so a track's number is decided
//! by a confidence-weighted vote over its whole reading history. Weak or
//! conflicting votes are flagged for human review, and a human decision
//! is final: no automated pass may overwrite it.

use crate::error::CoreError;
use crate::event::Team;

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Vote share below which a proposed mapping is flagged for review.
pub const OCR_REVIEW_THRESHOLD: f64 = 0.75;

/// Vote share at or above which an automated pass may clear an existing
/// review flag, provided the winning number agrees with the stored one.
pub const AUTO_RESOLVE_THRESHOLD: f64 = 0.90;

/// A competing number read at or above this confidence in a single frame
/// marks the vote as conflicting regardless of the winner's share.
pub const CONFLICT_READING_THRESHOLD: f64 = OCR_REVIEW_THRESHOLD;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One jersey-number reading from one frame.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OcrReading {
    pub jersey_number: i16,
    pub confidence: f64,
    pub frame_number: u32,
}

/// Where a mapping's current jersey number came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingSource {
    /// Automated OCR vote.
    Ocr,
    /// Human confirmation.
    Manual,
    /// Human overrode an earlier human confirmation.
    Corrected,
}

impl MappingSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ocr => "ocr",
            Self::Manual => "manual",
            Self::Corrected => "corrected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ocr" => Some(Self::Ocr),
            "manual" => Some(Self::Manual),
            "corrected" => Some(Self::Corrected),
            _ => None,
        }
    }

    /// Human decisions are final against automated passes.
    pub fn is_human(self) -> bool {
        matches!(self, Self::Manual | Self::Corrected)
    }
}

/// Resolved (or unresolved) identity of one track within one match.
///
/// Invariant: `source.is_human()` implies `needs_review == false`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrackIdentity {
    pub track_key: String,
    pub team: Team,
    pub jersey_number: Option<i16>,
    pub confidence: f64,
    pub source: MappingSource,
    pub needs_review: bool,
    pub ocr_history: Vec<OcrReading>,
}

/// Result of a weighted vote over a reading history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JerseyVote {
    pub jersey_number: i16,
    /// Winning number's share of total reading weight, in `[0, 1]`.
    pub share: f64,
    /// A competing number had at least one strong reading.
    pub conflicting: bool,
}

// ---------------------------------------------------------------------------
// Voting
// ---------------------------------------------------------------------------

/// Confidence-weighted vote over a reading history.
///
/// Returns `None` for an empty history. The share is the winner's summed
/// confidence over the total, so unanimous histories approach 1.0 no
/// matter how many readings they contain.
pub fn vote(readings: &[OcrReading]) -> Option<JerseyVote> {
    if readings.is_empty() {
        return None;
    }

    let mut totals: Vec<(i16, f64)> = Vec::new();
    let mut grand_total = 0.0;
    for r in readings {
        grand_total += r.confidence;
        match totals.iter_mut().find(|(n, _)| *n == r.jersey_number) {
            Some((_, w)) => *w += r.confidence,
            None => totals.push((r.jersey_number, r.confidence)),
        }
    }

    let (winner, winner_weight) = totals
        .iter()
        .copied()
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))?;

    let share = if grand_total > 0.0 {
        winner_weight / grand_total
    } else {
        0.0
    };

    let conflicting = readings.iter().any(|r| {
        r.jersey_number != winner && r.confidence >= CONFLICT_READING_THRESHOLD
    });

    Some(JerseyVote {
        jersey_number: winner,
        share,
        conflicting,
    })
}

// ---------------------------------------------------------------------------
// Automated proposal
// ---------------------------------------------------------------------------

/// Fold new OCR readings into a track's identity.
///
/// Human-sourced mappings only accumulate history; their number, source,
/// and cleared review flag are untouched. For automated mappings the
/// vote runs over the full accumulated history, and review flags follow
/// two rules:
///
/// * an unflagged mapping is flagged when the vote share drops below
///   [`OCR_REVIEW_THRESHOLD`] or the vote is conflicting;
/// * an already-flagged mapping is cleared only by a vote at or above
///   [`AUTO_RESOLVE_THRESHOLD`] that agrees with the stored number.
pub fn propose(
    existing: Option<TrackIdentity>,
    track_key: &str,
    team: Team,
    new_readings: &[OcrReading],
) -> TrackIdentity {
    let mut identity = existing.unwrap_or_else(|| TrackIdentity {
        track_key: track_key.to_string(),
        team,
        jersey_number: None,
        confidence: 0.0,
        source: MappingSource::Ocr,
        needs_review: true,
        ocr_history: Vec::new(),
    });

    identity.ocr_history.extend_from_slice(new_readings);

    if identity.source.is_human() {
        return identity;
    }

    let Some(vote) = vote(&identity.ocr_history) else {
        identity.jersey_number = None;
        identity.confidence = 0.0;
        identity.needs_review = true;
        return identity;
    };

    let was_flagged = identity.needs_review;
    let agrees_with_stored = match identity.jersey_number {
        Some(stored) => stored == vote.jersey_number,
        None => true,
    };

    identity.needs_review = if was_flagged {
        !(vote.share >= AUTO_RESOLVE_THRESHOLD && agrees_with_stored && !vote.conflicting)
    } else {
        vote.share < OCR_REVIEW_THRESHOLD || vote.conflicting
    };
    identity.jersey_number = Some(vote.jersey_number);
    identity.confidence = vote.share;
    identity.source = MappingSource::Ocr;

    identity
}

// ---------------------------------------------------------------------------
// Human confirmation
// ---------------------------------------------------------------------------

/// Valid jersey numbers, inclusive.
pub const JERSEY_NUMBER_RANGE: std::ops::RangeInclusive<i16> = 1..=99;

/// Validate a jersey number a human is trying to confirm.
pub fn validate_jersey_number(number: i16) -> Result<(), CoreError> {
    if JERSEY_NUMBER_RANGE.contains(&number) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Jersey number must be between {} and {}, got {number}",
            JERSEY_NUMBER_RANGE.start(),
            JERSEY_NUMBER_RANGE.end()
        )))
    }
}

/// Apply a human confirmation of a track's jersey number.
///
/// Always yields a human-sourced mapping with full confidence and no
/// review flag. Confirming the same number twice is a no-op; changing a
/// previously human-confirmed number marks the mapping `Corrected`.
pub fn confirm(
    existing: Option<TrackIdentity>,
    track_key: &str,
    team: Team,
    jersey_number: i16,
) -> Result<TrackIdentity, CoreError> {
    validate_jersey_number(jersey_number)?;

    let mut identity = existing.unwrap_or_else(|| TrackIdentity {
        track_key: track_key.to_string(),
        team,
        jersey_number: None,
        confidence: 0.0,
        source: MappingSource::Ocr,
        needs_review: false,
        ocr_history: Vec::new(),
    });

    let source = if identity.source.is_human() && identity.jersey_number != Some(jersey_number) {
        MappingSource::Corrected
    } else if identity.source.is_human() {
        identity.source
    } else {
        MappingSource::Manual
    };

    identity.jersey_number = Some(jersey_number);
    identity.confidence = 1.0;
    identity.source = source;
    identity.needs_review = false;
    Ok(identity)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn reading(number: i16, confidence: f64, frame: u32) -> OcrReading {
        OcrReading {
            jersey_number: number,
            confidence,
            frame_number: frame,
        }
    }

    // -- vote --

    #[test]
    fn vote_empty_history_is_none() {
        assert_eq!(vote(&[]), None);
    }

    #[test]
    fn vote_picks_weighted_modal_number() {
        let readings = [reading(10, 0.8, 1), reading(10, 0.7, 2), reading(4, 0.3, 3)];
        let v = vote(&readings).unwrap();
        assert_eq!(v.jersey_number, 10);
        assert!((v.share - 1.5 / 1.8).abs() < 1e-12);
        assert!(!v.conflicting);
    }

    #[test]
    fn vote_flags_strong_competitor_as_conflict() {
        let readings = [
            reading(10, 0.9, 1),
            reading(10, 0.9, 2),
            reading(10, 0.9, 3),
            reading(4, 0.8, 4),
        ];
        let v = vote(&readings).unwrap();
        assert_eq!(v.jersey_number, 10);
        assert!(v.share > OCR_REVIEW_THRESHOLD);
        assert!(v.conflicting);
    }

    #[test]
    fn vote_weak_competitor_is_not_conflict() {
        let readings = [reading(10, 0.9, 1), reading(4, 0.2, 2)];
        assert!(!vote(&readings).unwrap().conflicting);
    }

    // -- propose --

    #[test]
    fn clean_vote_proposes_without_review() {
        let readings = [reading(10, 0.9, 1), reading(10, 0.8, 2)];
        let id = propose(None, "track_3", Team::Home, &readings);
        assert_eq!(id.jersey_number, Some(10));
        assert_eq!(id.source, MappingSource::Ocr);
        assert!(!id.needs_review);
        assert!((id.confidence - 1.0).abs() < 1e-12);
    }

    #[test]
    fn weak_vote_is_flagged_for_review() {
        let readings = [reading(10, 0.5, 1), reading(4, 0.4, 2)];
        let id = propose(None, "track_3", Team::Home, &readings);
        assert_eq!(id.jersey_number, Some(10));
        assert!(id.needs_review);
        assert!(id.confidence < OCR_REVIEW_THRESHOLD);
    }

    #[test]
    fn conflicting_vote_is_flagged_despite_high_share() {
        let readings = [
            reading(10, 0.9, 1),
            reading(10, 0.9, 2),
            reading(10, 0.9, 3),
            reading(10, 0.9, 4),
            reading(4, 0.8, 5),
        ];
        let id = propose(None, "track_3", Team::Home, &readings);
        assert!(id.confidence >= OCR_REVIEW_THRESHOLD);
        assert!(id.needs_review);
    }

    #[test]
    fn no_readings_leaves_unresolved_flagged() {
        let id = propose(None, "track_3", Team::Away, &[]);
        assert_eq!(id.jersey_number, None);
        assert!(id.needs_review);
    }

    #[test]
    fn history_accumulates_across_passes() {
        let first = propose(None, "track_3", Team::Home, &[reading(10, 0.6, 1)]);
        let second = propose(Some(first), "track_3", Team::Home, &[reading(10, 0.7, 2)]);
        assert_eq!(second.ocr_history.len(), 2);
    }

    #[test]
    fn automated_pass_never_overwrites_human_mapping() {
        let confirmed = confirm(None, "track_3", Team::Home, 7).unwrap();
        let after = propose(
            Some(confirmed),
            "track_3",
            Team::Home,
            &[reading(10, 0.99, 1), reading(10, 0.99, 2)],
        );
        assert_eq!(after.jersey_number, Some(7));
        assert_eq!(after.source, MappingSource::Manual);
        assert!(!after.needs_review);
        // The evidence is still recorded for a future human to weigh.
        assert_eq!(after.ocr_history.len(), 2);
    }

    #[test]
    fn flagged_mapping_clears_on_strong_agreement() {
        let weak = propose(None, "track_3", Team::Home, &[reading(10, 0.5, 1), reading(4, 0.4, 2)]);
        assert!(weak.needs_review);

        let strong_readings: Vec<OcrReading> =
            (3..30).map(|f| reading(10, 0.95, f)).collect();
        let after = propose(Some(weak), "track_3", Team::Home, &strong_readings);
        assert_eq!(after.jersey_number, Some(10));
        assert!(after.confidence >= AUTO_RESOLVE_THRESHOLD);
        assert!(!after.needs_review);
    }

    #[test]
    fn flagged_mapping_stays_flagged_below_auto_resolve() {
        let weak = propose(None, "track_3", Team::Home, &[reading(10, 0.5, 1), reading(4, 0.4, 2)]);
        // One more decent reading lifts the share above the review
        // threshold but not to auto-resolve strength.
        let after = propose(Some(weak), "track_3", Team::Home, &[reading(10, 0.9, 3)]);
        assert!(after.confidence >= OCR_REVIEW_THRESHOLD);
        assert!(after.confidence < AUTO_RESOLVE_THRESHOLD);
        assert!(after.needs_review);
    }

    #[test]
    fn flagged_mapping_stays_flagged_when_winner_changes() {
        let weak = propose(None, "track_3", Team::Home, &[reading(10, 0.5, 1), reading(4, 0.4, 2)]);
        let flips: Vec<OcrReading> = (3..40).map(|f| reading(4, 0.95, f)).collect();
        let after = propose(Some(weak), "track_3", Team::Home, &flips);
        assert_eq!(after.jersey_number, Some(4));
        assert!(after.needs_review);
    }

    // -- confirm --

    #[test]
    fn confirm_is_manual_and_unflagged() {
        let weak = propose(None, "track_3", Team::Home, &[reading(10, 0.5, 1)]);
        let confirmed = confirm(Some(weak), "track_3", Team::Home, 10).unwrap();
        assert_eq!(confirmed.source, MappingSource::Manual);
        assert!(!confirmed.needs_review);
        assert!((confirmed.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn confirm_is_idempotent() {
        let once = confirm(None, "track_3", Team::Home, 10).unwrap();
        let twice = confirm(Some(once.clone()), "track_3", Team::Home, 10).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn reconfirming_a_different_number_marks_corrected() {
        let first = confirm(None, "track_3", Team::Home, 10).unwrap();
        let changed = confirm(Some(first), "track_3", Team::Home, 4).unwrap();
        assert_eq!(changed.jersey_number, Some(4));
        assert_eq!(changed.source, MappingSource::Corrected);
        assert!(!changed.needs_review);
    }

    #[test]
    fn confirm_rejects_out_of_range_numbers() {
        assert_matches!(
            confirm(None, "track_3", Team::Home, 0),
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            confirm(None, "track_3", Team::Home, 100),
            Err(CoreError::Validation(_))
        );
    }
}
