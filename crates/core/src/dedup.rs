//! Cross-window event deduplication and merging.
//!
//! The windowed pipeline labels overlapping time windows independently,
//! so one on-pitch action is frequently sighted by two adjacent windows
//! with slightly different timestamps. This module collapses those
//! sightings into single events with boosted confidence, keeping the
//! contributing windows and timestamps for audit.
//!
//! Pure in-memory logic; persistence of the merged rows happens in the
//! pipeline crate.

use std::cmp::Ordering;

use crate::event::{EventSource, MatchEvent};

// ---------------------------------------------------------------------------
// Merge criteria constants
// ---------------------------------------------------------------------------

/// Maximum timestamp gap from the cluster anchor for two sightings to be
/// considered the same action. Windows overlap by 10 s, so duplicate
/// sightings land well inside this.
pub const MERGE_TOLERANCE_SECS: f64 = 3.0;

/// Maximum normalized pitch distance between sightings that both carry a
/// position. Sightings without positions merge on time alone.
pub const MERGE_DISTANCE_LIMIT: f64 = 0.15;

/// Confidence added per corroborating sighting beyond the first.
pub const AGREEMENT_BONUS: f64 = 0.1;

// ---------------------------------------------------------------------------
// Pairwise criterion
// ---------------------------------------------------------------------------

/// Whether `candidate` is a duplicate sighting of the action anchored by
/// `anchor`.
pub fn can_merge(anchor: &MatchEvent, candidate: &MatchEvent) -> bool {
    if anchor.kind() != candidate.kind() || anchor.team != candidate.team {
        return false;
    }
    if (anchor.event_secs - candidate.event_secs).abs() > MERGE_TOLERANCE_SECS {
        return false;
    }
    match (anchor.position, candidate.position) {
        (Some(a), Some(b)) => a.distance_to(b) <= MERGE_DISTANCE_LIMIT,
        _ => true,
    }
}

// ---------------------------------------------------------------------------
// Merge pass
// ---------------------------------------------------------------------------

/// Collapse duplicate sightings into merged events.
///
/// Events are clustered greedily in time order; every candidate is
/// compared against the cluster *anchor* (its earliest member), so the
/// tolerance never chains across a long run of sightings. The merged
/// event keeps the anchor's timestamp and position, which makes the pass
/// idempotent: re-merging its own output changes nothing.
///
/// Singletons pass through untouched. A corrected member is
/// authoritative for the merged payload, actor, confidence, and source;
/// otherwise those come from the highest-confidence member.
pub fn merge_events(mut events: Vec<MatchEvent>) -> Vec<MatchEvent> {
    events.sort_by(|a, b| {
        a.event_secs
            .partial_cmp(&b.event_secs)
            .unwrap_or(Ordering::Equal)
    });

    let mut consumed = vec![false; events.len()];
    let mut merged = Vec::with_capacity(events.len());

    for i in 0..events.len() {
        if consumed[i] {
            continue;
        }
        let mut members = vec![i];
        for j in (i + 1)..events.len() {
            if consumed[j] {
                continue;
            }
            // Sorted input: once past the tolerance no later event fits.
            if events[j].event_secs - events[i].event_secs > MERGE_TOLERANCE_SECS {
                break;
            }
            if can_merge(&events[i], &events[j]) {
                consumed[j] = true;
                members.push(j);
            }
        }

        if members.len() == 1 {
            merged.push(events[i].clone());
        } else {
            merged.push(merge_cluster(&events, &members));
        }
    }

    merged
}

/// Build the representative event for a cluster of duplicate sightings.
///
/// `members` holds indexes into `events`, first entry being the anchor.
fn merge_cluster(events: &[MatchEvent], members: &[usize]) -> MatchEvent {
    let anchor = &events[members[0]];

    // Corrected sightings win outright; otherwise trust the most
    // confident one.
    let value_source = members
        .iter()
        .map(|&i| &events[i])
        .find(|e| e.source == EventSource::Corrected)
        .unwrap_or_else(|| {
            members
                .iter()
                .map(|&i| &events[i])
                .max_by(|a, b| {
                    a.confidence
                        .partial_cmp(&b.confidence)
                        .unwrap_or(Ordering::Equal)
                })
                .unwrap_or(anchor)
        });

    let confidence = if value_source.source == EventSource::Corrected {
        value_source.confidence
    } else {
        let mean: f64 = members.iter().map(|&i| events[i].confidence).sum::<f64>()
            / members.len() as f64;
        (mean + AGREEMENT_BONUS * (members.len() - 1) as f64).min(1.0)
    };

    let mut window_ids: Vec<u32> = members
        .iter()
        .flat_map(|&i| events[i].window_ids.iter().copied())
        .collect();
    window_ids.sort_unstable();
    window_ids.dedup();

    let mut original_secs: Vec<f64> = members
        .iter()
        .flat_map(|&i| {
            let e = &events[i];
            if e.original_secs.is_empty() {
                vec![e.event_secs]
            } else {
                e.original_secs.clone()
            }
        })
        .collect();
    original_secs.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    MatchEvent {
        team: anchor.team,
        event_secs: anchor.event_secs,
        confidence,
        source: value_source.source,
        actor_track: value_source.actor_track.clone(),
        position: anchor.position,
        detail: value_source.detail.clone(),
        window_ids,
        original_secs,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventDetail, PassOutcome, PitchPoint, Team};

    fn shot(secs: f64, confidence: f64, window: u32) -> MatchEvent {
        MatchEvent {
            team: Team::Home,
            event_secs: secs,
            confidence,
            source: EventSource::Detected,
            actor_track: Some("track_7".to_string()),
            position: None,
            detail: EventDetail::Shot {
                on_target: true,
                goal: false,
            },
            window_ids: vec![window],
            original_secs: vec![secs],
        }
    }

    fn pass(secs: f64, team: Team, confidence: f64) -> MatchEvent {
        MatchEvent {
            team,
            event_secs: secs,
            confidence,
            source: EventSource::Detected,
            actor_track: None,
            position: None,
            detail: EventDetail::Pass {
                outcome: PassOutcome::Complete,
                progressive: false,
            },
            window_ids: vec![0],
            original_secs: vec![secs],
        }
    }

    // -- clustering --

    #[test]
    fn adjacent_window_shots_merge() {
        // The same shot sighted at 48.2 s by window 0 and 48.9 s by
        // window 1 must come out as one event.
        let merged = merge_events(vec![shot(48.2, 0.8, 0), shot(48.9, 0.7, 1)]);
        assert_eq!(merged.len(), 1);
        assert!((merged[0].event_secs - 48.2).abs() < f64::EPSILON);
        assert_eq!(merged[0].window_ids, vec![0, 1]);
        assert_eq!(merged[0].original_secs, vec![48.2, 48.9]);
    }

    #[test]
    fn merged_confidence_is_boosted_mean() {
        let merged = merge_events(vec![shot(10.0, 0.8, 0), shot(10.5, 0.6, 1)]);
        // mean 0.7 plus one agreement bonus.
        assert!((merged[0].confidence - 0.8).abs() < 1e-12);
    }

    #[test]
    fn merged_confidence_saturates_at_one() {
        let merged = merge_events(vec![
            shot(10.0, 0.95, 0),
            shot(10.2, 0.95, 1),
            shot(10.4, 0.95, 2),
        ]);
        assert!((merged[0].confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn distinct_actions_stay_apart() {
        let merged = merge_events(vec![shot(10.0, 0.8, 0), shot(15.0, 0.8, 1)]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn different_teams_never_merge() {
        let merged = merge_events(vec![
            pass(20.0, Team::Home, 0.8),
            pass(20.5, Team::Away, 0.8),
        ]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn different_kinds_never_merge() {
        let merged = merge_events(vec![shot(20.0, 0.8, 0), pass(20.5, Team::Home, 0.8)]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn tolerance_does_not_chain() {
        // 0.0 and 2.9 cluster; 5.0 is within 3 s of 2.9 but not of the
        // anchor, so it must stay separate.
        let merged = merge_events(vec![shot(0.0, 0.8, 0), shot(2.9, 0.8, 0), shot(5.0, 0.8, 1)]);
        assert_eq!(merged.len(), 2);
        assert!((merged[1].event_secs - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn distant_pitch_positions_block_merge() {
        let mut a = shot(30.0, 0.8, 0);
        a.position = Some(PitchPoint { x: 0.1, y: 0.1 });
        let mut b = shot(30.5, 0.8, 1);
        b.position = Some(PitchPoint { x: 0.9, y: 0.9 });
        let merged = merge_events(vec![a, b]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn nearby_pitch_positions_allow_merge() {
        let mut a = shot(30.0, 0.8, 0);
        a.position = Some(PitchPoint { x: 0.50, y: 0.50 });
        let mut b = shot(30.5, 0.8, 1);
        b.position = Some(PitchPoint { x: 0.55, y: 0.50 });
        let merged = merge_events(vec![a, b]);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn singleton_passes_through_untouched() {
        let input = vec![shot(12.0, 0.63, 4)];
        let merged = merge_events(input.clone());
        assert_eq!(merged, input);
    }

    #[test]
    fn payload_comes_from_most_confident_member() {
        let mut weak = shot(40.0, 0.5, 0);
        weak.actor_track = Some("track_1".to_string());
        let mut strong = shot(40.5, 0.9, 1);
        strong.actor_track = Some("track_2".to_string());

        let merged = merge_events(vec![weak, strong]);
        assert_eq!(merged[0].actor_track.as_deref(), Some("track_2"));
        // Timestamp still anchored at the earliest sighting.
        assert!((merged[0].event_secs - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn corrected_member_is_authoritative() {
        let mut corrected = shot(50.0, 1.0, 0);
        corrected.source = EventSource::Corrected;
        corrected.actor_track = Some("track_9".to_string());
        let duplicate = shot(50.8, 0.6, 1);

        let merged = merge_events(vec![duplicate, corrected]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].source, EventSource::Corrected);
        assert_eq!(merged[0].actor_track.as_deref(), Some("track_9"));
        assert!((merged[0].confidence - 1.0).abs() < f64::EPSILON);
    }

    // -- idempotence --

    #[test]
    fn merge_is_idempotent() {
        let mut near_a = shot(30.0, 0.7, 0);
        near_a.position = Some(PitchPoint { x: 0.5, y: 0.5 });
        let mut near_b = shot(30.5, 0.9, 1);
        near_b.position = Some(PitchPoint { x: 0.52, y: 0.5 });
        let mut far = shot(31.0, 0.8, 1);
        far.position = Some(PitchPoint { x: 0.9, y: 0.9 });

        let input = vec![
            shot(48.2, 0.8, 0),
            shot(48.9, 0.7, 1),
            pass(10.0, Team::Home, 0.9),
            pass(11.5, Team::Home, 0.6),
            pass(12.0, Team::Away, 0.6),
            near_a,
            near_b,
            far,
            shot(200.0, 0.4, 3),
        ];

        let once = merge_events(input);
        let twice = merge_events(once.clone());
        assert_eq!(once, twice);
    }
}
