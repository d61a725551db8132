//! Confidence-weighted match statistics.
//!
//! Aggregates final events into team, match, and per-player metrics.
//! Every metric carries the confidence of its inputs and a plain-text
//! explanation of what went into it, so a consumer can always tell a
//! solid number from a guess. Player metrics flow through resolved track
//! identities and inherit the weaker of event and mapping confidence.

use std::collections::BTreeMap;

use crate::event::{EventDetail, EventKind, EventSource, MatchEvent, PassOutcome, Team};
use crate::identity::TrackIdentity;

// ---------------------------------------------------------------------------
// Metric keys
// ---------------------------------------------------------------------------

pub const METRIC_PASS_COUNT: &str = "pass_count";
pub const METRIC_PASS_COMPLETION_RATE: &str = "pass_completion_rate";
pub const METRIC_SHOT_COUNT: &str = "shot_count";
pub const METRIC_SHOTS_ON_TARGET: &str = "shots_on_target";
pub const METRIC_GOAL_COUNT: &str = "goal_count";
pub const METRIC_TURNOVER_COUNT: &str = "turnover_count";
pub const METRIC_SET_PIECE_COUNT: &str = "set_piece_count";
pub const METRIC_CARRY_COUNT: &str = "carry_count";
pub const METRIC_EVENT_COUNT: &str = "event_count";

/// Per-kind metric keys emitted at player scope.
const PLAYER_METRIC_KINDS: &[(EventKind, &str)] = &[
    (EventKind::Pass, METRIC_PASS_COUNT),
    (EventKind::Shot, METRIC_SHOT_COUNT),
    (EventKind::Carry, METRIC_CARRY_COUNT),
    (EventKind::Turnover, METRIC_TURNOVER_COUNT),
];

// ---------------------------------------------------------------------------
// Scopes
// ---------------------------------------------------------------------------

/// What slice of the match a metric describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatScope {
    Match,
    Team(Team),
    /// A jersey number within a team. Both teams can field a number 10,
    /// so the team is part of the scope.
    Player(Team, i16),
}

impl StatScope {
    /// Stable string key, used as the `scope` column and in queries.
    pub fn key(&self) -> String {
        match self {
            Self::Match => "match".to_string(),
            Self::Team(team) => format!("team:{}", team.as_str()),
            Self::Player(team, number) => format!("player:{}:{number}", team.as_str()),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        if s == "match" {
            return Some(Self::Match);
        }
        if let Some(team) = s.strip_prefix("team:") {
            return Team::parse(team).map(Self::Team);
        }
        let rest = s.strip_prefix("player:")?;
        let (team, number) = rest.split_once(':')?;
        Some(Self::Player(Team::parse(team)?, number.parse().ok()?))
    }
}

/// One computed metric, ready to upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct StatMetric {
    pub key: &'static str,
    pub scope: StatScope,
    pub value: f64,
    pub confidence: f64,
    pub explanation: String,
}

// ---------------------------------------------------------------------------
// Confidence helpers
// ---------------------------------------------------------------------------

fn mean_confidence(events: &[&MatchEvent]) -> f64 {
    if events.is_empty() {
        return 0.0;
    }
    events.iter().map(|e| e.confidence).sum::<f64>() / events.len() as f64
}

fn corrected_count(events: &[&MatchEvent]) -> usize {
    events
        .iter()
        .filter(|e| e.source == EventSource::Corrected)
        .count()
}

fn explain(events: &[&MatchEvent], noun: &str) -> String {
    if events.is_empty() {
        return format!("no contributing {noun} events");
    }
    let corrected = corrected_count(events);
    let mut text = format!(
        "{} {noun} events, mean confidence {:.2}",
        events.len(),
        mean_confidence(events)
    );
    if corrected > 0 {
        text.push_str(&format!(", {corrected} corrected"));
    }
    text
}

fn count_metric(key: &'static str, scope: StatScope, events: &[&MatchEvent], noun: &str) -> StatMetric {
    StatMetric {
        key,
        scope,
        value: events.len() as f64,
        confidence: mean_confidence(events),
        explanation: explain(events, noun),
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Compute the full metric set for one match from its final events and
/// resolved identities.
///
/// Pure and deterministic; the recompute worker re-runs it from the
/// then-current corrected rows whenever a recalculation is requested.
pub fn compute(events: &[MatchEvent], identities: &[TrackIdentity]) -> Vec<StatMetric> {
    let mut metrics = Vec::new();

    for team in [Team::Home, Team::Away] {
        let team_events: Vec<&MatchEvent> = events.iter().filter(|e| e.team == team).collect();
        metrics.extend(team_metrics(team, &team_events));
    }

    metrics.extend(match_metrics(events));
    metrics.extend(player_metrics(events, identities));
    metrics
}

fn team_metrics(team: Team, events: &[&MatchEvent]) -> Vec<StatMetric> {
    let scope = StatScope::Team(team);
    let of_kind = |kind: EventKind| -> Vec<&MatchEvent> {
        events.iter().copied().filter(|e| e.kind() == kind).collect()
    };

    let passes = of_kind(EventKind::Pass);
    let shots = of_kind(EventKind::Shot);
    let on_target: Vec<&MatchEvent> = shots
        .iter()
        .copied()
        .filter(|e| matches!(e.detail, EventDetail::Shot { on_target: true, .. }))
        .collect();
    let goals: Vec<&MatchEvent> = shots.iter().copied().filter(|e| e.is_goal()).collect();

    let mut metrics = vec![
        count_metric(METRIC_PASS_COUNT, scope, &passes, "pass"),
        count_metric(METRIC_SHOT_COUNT, scope, &shots, "shot"),
        count_metric(METRIC_SHOTS_ON_TARGET, scope, &on_target, "on-target shot"),
        count_metric(METRIC_GOAL_COUNT, scope, &goals, "goal"),
        count_metric(
            METRIC_TURNOVER_COUNT,
            scope,
            &of_kind(EventKind::Turnover),
            "turnover",
        ),
        count_metric(
            METRIC_SET_PIECE_COUNT,
            scope,
            &of_kind(EventKind::SetPiece),
            "set piece",
        ),
        count_metric(METRIC_CARRY_COUNT, scope, &of_kind(EventKind::Carry), "carry"),
    ];

    // A completion rate over zero passes would be an invented number;
    // emit it only when passes exist.
    if !passes.is_empty() {
        let completed = passes
            .iter()
            .filter(|e| {
                matches!(
                    e.detail,
                    EventDetail::Pass {
                        outcome: PassOutcome::Complete,
                        ..
                    }
                )
            })
            .count();
        metrics.push(StatMetric {
            key: METRIC_PASS_COMPLETION_RATE,
            scope,
            value: completed as f64 / passes.len() as f64,
            confidence: mean_confidence(&passes),
            explanation: format!(
                "{completed} of {} passes completed, {}",
                passes.len(),
                explain(&passes, "pass")
            ),
        });
    }

    metrics
}

fn match_metrics(events: &[MatchEvent]) -> Vec<StatMetric> {
    let all: Vec<&MatchEvent> = events.iter().collect();
    let goals: Vec<&MatchEvent> = events.iter().filter(|e| e.is_goal()).collect();
    vec![
        count_metric(METRIC_EVENT_COUNT, StatScope::Match, &all, "match"),
        count_metric(METRIC_GOAL_COUNT, StatScope::Match, &goals, "goal"),
    ]
}

fn player_metrics(events: &[MatchEvent], identities: &[TrackIdentity]) -> Vec<StatMetric> {
    // Only unflagged mappings with a number attribute events to players.
    let resolved: BTreeMap<&str, (&TrackIdentity, i16)> = identities
        .iter()
        .filter_map(|id| {
            let number = id.jersey_number?;
            (!id.needs_review).then_some((id.track_key.as_str(), (id, number)))
        })
        .collect();

    // Group attributable events per (team, number).
    let mut per_player: BTreeMap<(Team, i16), (f64, Vec<&MatchEvent>)> = BTreeMap::new();
    for event in events {
        let Some(track_key) = event.actor_track.as_deref() else {
            continue;
        };
        let Some((identity, number)) = resolved.get(track_key) else {
            continue;
        };
        let entry = per_player
            .entry((identity.team, *number))
            .or_insert((identity.confidence, Vec::new()));
        entry.0 = entry.0.min(identity.confidence);
        entry.1.push(event);
    }

    let mut metrics = Vec::new();
    for ((team, number), (mapping_confidence, player_events)) in &per_player {
        for &(kind, key) in PLAYER_METRIC_KINDS {
            let of_kind: Vec<&MatchEvent> = player_events
                .iter()
                .copied()
                .filter(|e| e.kind() == kind)
                .collect();
            if of_kind.is_empty() {
                continue;
            }
            let event_confidence = mean_confidence(&of_kind);
            metrics.push(StatMetric {
                key,
                scope: StatScope::Player(*team, *number),
                value: of_kind.len() as f64,
                confidence: event_confidence.min(*mapping_confidence),
                explanation: format!(
                    "{}, mapping confidence {:.2}",
                    explain(&of_kind, kind.as_str()),
                    mapping_confidence
                ),
            });
        }
    }
    metrics
}

// ---------------------------------------------------------------------------
// Score helpers
// ---------------------------------------------------------------------------

/// Home goals minus away goals, as seen in the final events.
pub fn goal_differential(events: &[MatchEvent]) -> i32 {
    let mut diff = 0;
    for event in events.iter().filter(|e| e.is_goal()) {
        match event.team {
            Team::Home => diff += 1,
            Team::Away => diff -= 1,
        }
    }
    diff
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::MappingSource;

    fn event(team: Team, detail: EventDetail, confidence: f64, track: Option<&str>) -> MatchEvent {
        MatchEvent {
            team,
            event_secs: 10.0,
            confidence,
            source: EventSource::Detected,
            actor_track: track.map(str::to_string),
            position: None,
            detail,
            window_ids: vec![0],
            original_secs: vec![10.0],
        }
    }

    fn pass(team: Team, outcome: PassOutcome, confidence: f64, track: Option<&str>) -> MatchEvent {
        event(
            team,
            EventDetail::Pass {
                outcome,
                progressive: false,
            },
            confidence,
            track,
        )
    }

    fn shot(team: Team, goal: bool, confidence: f64) -> MatchEvent {
        event(
            team,
            EventDetail::Shot {
                on_target: goal,
                goal,
            },
            confidence,
            None,
        )
    }

    fn identity(track: &str, team: Team, number: i16, confidence: f64) -> TrackIdentity {
        TrackIdentity {
            track_key: track.to_string(),
            team,
            jersey_number: Some(number),
            confidence,
            source: MappingSource::Ocr,
            needs_review: false,
            ocr_history: Vec::new(),
        }
    }

    fn find<'a>(metrics: &'a [StatMetric], key: &str, scope: &StatScope) -> &'a StatMetric {
        metrics
            .iter()
            .find(|m| m.key == key && m.scope == *scope)
            .unwrap()
    }

    // -- team metrics --

    #[test]
    fn team_pass_count_and_confidence() {
        let events = vec![
            pass(Team::Home, PassOutcome::Complete, 0.8, None),
            pass(Team::Home, PassOutcome::Incomplete, 0.6, None),
            pass(Team::Away, PassOutcome::Complete, 0.9, None),
        ];
        let metrics = compute(&events, &[]);

        let home = find(&metrics, METRIC_PASS_COUNT, &StatScope::Team(Team::Home));
        assert!((home.value - 2.0).abs() < f64::EPSILON);
        assert!((home.confidence - 0.7).abs() < 1e-12);

        let away = find(&metrics, METRIC_PASS_COUNT, &StatScope::Team(Team::Away));
        assert!((away.value - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn completion_rate_reflects_outcomes() {
        let events = vec![
            pass(Team::Home, PassOutcome::Complete, 0.8, None),
            pass(Team::Home, PassOutcome::Complete, 0.8, None),
            pass(Team::Home, PassOutcome::Intercepted, 0.8, None),
            pass(Team::Home, PassOutcome::Incomplete, 0.8, None),
        ];
        let metrics = compute(&events, &[]);
        let rate = find(
            &metrics,
            METRIC_PASS_COMPLETION_RATE,
            &StatScope::Team(Team::Home),
        );
        assert!((rate.value - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn no_passes_means_no_completion_rate() {
        let metrics = compute(&[shot(Team::Home, false, 0.9)], &[]);
        assert!(!metrics
            .iter()
            .any(|m| m.key == METRIC_PASS_COMPLETION_RATE
                && m.scope == StatScope::Team(Team::Home)));
    }

    #[test]
    fn goals_counted_from_shot_payloads() {
        let events = vec![
            shot(Team::Home, true, 0.9),
            shot(Team::Home, false, 0.8),
            shot(Team::Away, true, 0.95),
        ];
        let metrics = compute(&events, &[]);
        let home_goals = find(&metrics, METRIC_GOAL_COUNT, &StatScope::Team(Team::Home));
        assert!((home_goals.value - 1.0).abs() < f64::EPSILON);
        let match_goals = find(&metrics, METRIC_GOAL_COUNT, &StatScope::Match);
        assert!((match_goals.value - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_input_yields_zero_counts_with_zero_confidence() {
        let metrics = compute(&[], &[]);
        let home_passes = find(&metrics, METRIC_PASS_COUNT, &StatScope::Team(Team::Home));
        assert!((home_passes.value - 0.0).abs() < f64::EPSILON);
        assert!((home_passes.confidence - 0.0).abs() < f64::EPSILON);
        assert!(home_passes.explanation.contains("no contributing"));
    }

    #[test]
    fn corrected_events_show_up_in_explanations() {
        let mut corrected = pass(Team::Home, PassOutcome::Complete, 1.0, None);
        corrected.source = EventSource::Corrected;
        let events = vec![corrected, pass(Team::Home, PassOutcome::Complete, 0.8, None)];
        let metrics = compute(&events, &[]);
        let home = find(&metrics, METRIC_PASS_COUNT, &StatScope::Team(Team::Home));
        assert!(home.explanation.contains("1 corrected"));
    }

    // -- player metrics --

    #[test]
    fn player_confidence_is_min_of_event_and_mapping() {
        let events = vec![
            pass(Team::Home, PassOutcome::Complete, 0.9, Some("track_1")),
            pass(Team::Home, PassOutcome::Complete, 0.9, Some("track_1")),
        ];
        let ids = vec![identity("track_1", Team::Home, 10, 0.8)];
        let metrics = compute(&events, &ids);

        let player = find(
            &metrics,
            METRIC_PASS_COUNT,
            &StatScope::Player(Team::Home, 10),
        );
        assert!((player.value - 2.0).abs() < f64::EPSILON);
        // Mapping confidence 0.8 undercuts event confidence 0.9.
        assert!((player.confidence - 0.8).abs() < 1e-12);
    }

    #[test]
    fn flagged_mappings_do_not_attribute_events() {
        let events = vec![pass(Team::Home, PassOutcome::Complete, 0.9, Some("track_1"))];
        let mut flagged = identity("track_1", Team::Home, 10, 0.6);
        flagged.needs_review = true;
        let metrics = compute(&events, &[flagged]);
        assert!(!metrics
            .iter()
            .any(|m| matches!(m.scope, StatScope::Player(_, _))));
    }

    #[test]
    fn unmapped_tracks_do_not_attribute_events() {
        let events = vec![pass(Team::Home, PassOutcome::Complete, 0.9, Some("track_9"))];
        let metrics = compute(&events, &[identity("track_1", Team::Home, 10, 0.9)]);
        assert!(!metrics
            .iter()
            .any(|m| matches!(m.scope, StatScope::Player(_, _))));
    }

    #[test]
    fn two_tracks_same_player_pool_their_events() {
        // The tracker lost the player at halftime and issued a new key;
        // both resolve to home #10.
        let events = vec![
            pass(Team::Home, PassOutcome::Complete, 0.9, Some("track_1")),
            pass(Team::Home, PassOutcome::Complete, 0.7, Some("track_8")),
        ];
        let ids = vec![
            identity("track_1", Team::Home, 10, 0.95),
            identity("track_8", Team::Home, 10, 0.85),
        ];
        let metrics = compute(&events, &ids);
        let player = find(
            &metrics,
            METRIC_PASS_COUNT,
            &StatScope::Player(Team::Home, 10),
        );
        assert!((player.value - 2.0).abs() < f64::EPSILON);
        // Weakest contributing mapping bounds the confidence.
        assert!((player.confidence - 0.8).abs() < 1e-12);
    }

    // -- scopes --

    #[test]
    fn scope_keys_round_trip() {
        for scope in [
            StatScope::Match,
            StatScope::Team(Team::Away),
            StatScope::Player(Team::Home, 10),
        ] {
            assert_eq!(StatScope::parse(&scope.key()), Some(scope));
        }
        assert_eq!(StatScope::parse("player:10"), None);
        assert_eq!(StatScope::parse("galaxy"), None);
    }

    // -- goal differential --

    #[test]
    fn goal_differential_is_home_minus_away() {
        let events = vec![
            shot(Team::Home, true, 0.9),
            shot(Team::Away, true, 0.9),
            shot(Team::Away, true, 0.9),
            shot(Team::Home, false, 0.9),
        ];
        assert_eq!(goal_differential(&events), -1);
    }
}
