//! Clip importance scoring and adaptive-threshold filtering.
//!
//! Scene detection hands us clips with a base importance from visual
//! salience alone. Ranking folds in what actually happened (goals and
//! shots overlapping the clip) and when it happened (late in a close
//! match beats early in a blowout), then clamps to `[0, 1]`.

use std::cmp::Ordering;

use crate::event::{EventDetail, MatchEvent};
use crate::types::VideoSecs;

// ---------------------------------------------------------------------------
// Scoring constants
// ---------------------------------------------------------------------------

/// Additive bonus per goal overlapping the clip.
pub const GOAL_PROXIMITY_BONUS: f64 = 0.25;

/// Additive bonus per non-goal shot overlapping the clip.
pub const SHOT_PROXIMITY_BONUS: f64 = 0.10;

/// Shots and goals still count for a clip that starts up to this many
/// seconds after the event (the celebration often lands in its own clip).
pub const SHOT_LEAD_WINDOW_SECS: f64 = 10.0;

/// Fraction of total match time past which the late-match boost applies.
pub const LATE_MATCH_FRACTION: f64 = 0.75;

/// Multiplier for clips late in the match.
pub const LATE_MATCH_MULTIPLIER: f64 = 1.2;

/// Absolute goal differential at or below which the match counts as close.
pub const CLOSE_SCORE_MARGIN: i32 = 1;

/// Multiplier for clips in a close match.
pub const CLOSE_SCORE_MULTIPLIER: f64 = 1.15;

// ---------------------------------------------------------------------------
// Adaptive filter constants
// ---------------------------------------------------------------------------

/// Starting importance threshold for target-count filtering.
pub const FILTER_START_THRESHOLD: f64 = 0.70;

/// Hard floor below which the threshold never drops.
pub const FILTER_FLOOR_THRESHOLD: f64 = 0.20;

/// Threshold decrement per relaxation step.
pub const FILTER_THRESHOLD_STEP: f64 = 0.05;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A candidate highlight clip inside one video.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Clip {
    pub start_secs: VideoSecs,
    pub end_secs: VideoSecs,
    /// Visual-salience score from scene detection, already in `[0, 1]`.
    pub base_importance: f64,
    /// Event- and context-aware score, always in `[0, 1]`.
    pub final_importance: f64,
}

/// Match context the ranker scores against.
#[derive(Debug, Clone, Copy)]
pub struct RankContext {
    /// Offset of this video's start within the whole match (45 min worth
    /// of seconds for a second-half video, zero otherwise).
    pub half_offset_secs: f64,
    /// Whole-match duration in seconds. Zero disables the late-match
    /// boost rather than dividing by it.
    pub total_match_secs: f64,
    /// Home goals minus away goals.
    pub score_differential: i32,
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Whether `event` counts toward `clip`'s importance.
fn event_counts_for_clip(clip: &Clip, event: &MatchEvent) -> bool {
    let direct = event.event_secs >= clip.start_secs && event.event_secs <= clip.end_secs;
    if direct {
        return true;
    }
    if matches!(event.detail, EventDetail::Shot { .. }) {
        // A clip can open just after the ball crosses the line.
        return event.event_secs < clip.start_secs
            && clip.start_secs - event.event_secs <= SHOT_LEAD_WINDOW_SECS;
    }
    false
}

/// Score one clip against the final events and match context.
pub fn score_clip(clip: &Clip, events: &[MatchEvent], ctx: &RankContext) -> f64 {
    let mut score = clip.base_importance;

    for event in events {
        if !event_counts_for_clip(clip, event) {
            continue;
        }
        match event.detail {
            EventDetail::Shot { goal: true, .. } => score += GOAL_PROXIMITY_BONUS,
            EventDetail::Shot { goal: false, .. } => score += SHOT_PROXIMITY_BONUS,
            _ => {}
        }
    }

    if ctx.total_match_secs > 0.0 {
        let match_secs = ctx.half_offset_secs + clip.start_secs;
        if match_secs >= LATE_MATCH_FRACTION * ctx.total_match_secs {
            score *= LATE_MATCH_MULTIPLIER;
        }
    }
    if ctx.score_differential.abs() <= CLOSE_SCORE_MARGIN {
        score *= CLOSE_SCORE_MULTIPLIER;
    }

    score.clamp(0.0, 1.0)
}

/// Score every clip, filling in `final_importance`.
pub fn rank_clips(mut clips: Vec<Clip>, events: &[MatchEvent], ctx: &RankContext) -> Vec<Clip> {
    for clip in &mut clips {
        clip.final_importance = score_clip(clip, events, ctx);
    }
    clips
}

// ---------------------------------------------------------------------------
// Filtering
// ---------------------------------------------------------------------------

fn by_importance_then_start(a: &Clip, b: &Clip) -> Ordering {
    b.final_importance
        .partial_cmp(&a.final_importance)
        .unwrap_or(Ordering::Equal)
        .then(
            a.start_secs
                .partial_cmp(&b.start_secs)
                .unwrap_or(Ordering::Equal),
        )
}

/// Keep clips at or above `min_importance`, best first (ties broken by
/// earlier start), at most `max_count` of them.
pub fn filter_clips(ranked: &[Clip], min_importance: f64, max_count: usize) -> Vec<Clip> {
    let mut kept: Vec<Clip> = ranked
        .iter()
        .filter(|c| c.final_importance >= min_importance)
        .cloned()
        .collect();
    kept.sort_by(by_importance_then_start);
    kept.truncate(max_count);
    kept
}

/// Relax the threshold until at least `target` clips qualify, never
/// dropping below the floor.
///
/// Starts at [`FILTER_START_THRESHOLD`] and steps down by
/// [`FILTER_THRESHOLD_STEP`]; the step count is fixed, so this always
/// terminates. Returns exactly `target` clips when enough qualify, or
/// every floor-qualifying clip when the footage simply does not contain
/// `target` clips worth keeping.
pub fn filter_to_target_count(ranked: &[Clip], target: usize) -> Vec<Clip> {
    let steps =
        ((FILTER_START_THRESHOLD - FILTER_FLOOR_THRESHOLD) / FILTER_THRESHOLD_STEP).round() as u32;

    for step in 0..=steps {
        let threshold = FILTER_START_THRESHOLD - step as f64 * FILTER_THRESHOLD_STEP;
        let qualifying = filter_clips(ranked, threshold, usize::MAX);
        if qualifying.len() >= target {
            let mut kept = qualifying;
            kept.truncate(target);
            return kept;
        }
    }

    filter_clips(ranked, FILTER_FLOOR_THRESHOLD, usize::MAX)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventSource, Team};

    fn clip(start: f64, end: f64, base: f64) -> Clip {
        Clip {
            start_secs: start,
            end_secs: end,
            base_importance: base,
            final_importance: 0.0,
        }
    }

    fn shot_at(secs: f64, goal: bool) -> MatchEvent {
        MatchEvent {
            team: Team::Home,
            event_secs: secs,
            confidence: 0.9,
            source: EventSource::Detected,
            actor_track: None,
            position: None,
            detail: EventDetail::Shot {
                on_target: true,
                goal,
            },
            window_ids: vec![0],
            original_secs: vec![secs],
        }
    }

    /// Context with every boost disabled: early clip, lopsided score.
    fn neutral_ctx() -> RankContext {
        RankContext {
            half_offset_secs: 0.0,
            total_match_secs: 5400.0,
            score_differential: 3,
        }
    }

    // -- score_clip --

    #[test]
    fn clip_without_events_keeps_base_score() {
        let c = clip(100.0, 120.0, 0.55);
        let score = score_clip(&c, &[shot_at(500.0, true)], &neutral_ctx());
        assert!((score - 0.55).abs() < f64::EPSILON);
    }

    #[test]
    fn goal_overlap_adds_goal_bonus() {
        let c = clip(40.0, 60.0, 0.5);
        let score = score_clip(&c, &[shot_at(48.9, true)], &neutral_ctx());
        assert!((score - 0.75).abs() < 1e-12);
    }

    #[test]
    fn shot_overlap_adds_shot_bonus() {
        let c = clip(40.0, 60.0, 0.5);
        let score = score_clip(&c, &[shot_at(48.9, false)], &neutral_ctx());
        assert!((score - 0.6).abs() < 1e-12);
    }

    #[test]
    fn shot_just_before_clip_start_still_counts() {
        // Celebration clip opening 1.1 s after the goal.
        let c = clip(50.0, 65.0, 0.5);
        let score = score_clip(&c, &[shot_at(48.9, true)], &neutral_ctx());
        assert!((score - 0.75).abs() < 1e-12);
    }

    #[test]
    fn shot_too_far_before_clip_does_not_count() {
        let c = clip(70.0, 85.0, 0.5);
        let score = score_clip(&c, &[shot_at(48.9, true)], &neutral_ctx());
        assert!((score - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn pass_before_clip_start_does_not_count() {
        let c = clip(50.0, 65.0, 0.5);
        let pass = MatchEvent {
            detail: EventDetail::Pass {
                outcome: crate::event::PassOutcome::Complete,
                progressive: true,
            },
            ..shot_at(48.9, false)
        };
        let score = score_clip(&c, &[pass], &neutral_ctx());
        assert!((score - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn late_match_clips_get_boosted() {
        let ctx = RankContext {
            half_offset_secs: 2700.0,
            total_match_secs: 5400.0,
            score_differential: 3,
        };
        // 2700 + 1500 = 4200 s, past 75% of 5400.
        let c = clip(1500.0, 1520.0, 0.5);
        let score = score_clip(&c, &[], &ctx);
        assert!((score - 0.6).abs() < 1e-12);
    }

    #[test]
    fn close_score_clips_get_boosted() {
        let ctx = RankContext {
            score_differential: -1,
            ..neutral_ctx()
        };
        let c = clip(100.0, 120.0, 0.4);
        let score = score_clip(&c, &[], &ctx);
        assert!((score - 0.46).abs() < 1e-12);
    }

    #[test]
    fn zero_duration_match_disables_late_boost() {
        let ctx = RankContext {
            half_offset_secs: 0.0,
            total_match_secs: 0.0,
            score_differential: 3,
        };
        let c = clip(100.0, 120.0, 0.5);
        assert!((score_clip(&c, &[], &ctx) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn score_never_exceeds_one() {
        let ctx = RankContext {
            half_offset_secs: 2700.0,
            total_match_secs: 5400.0,
            score_differential: 0,
        };
        let c = clip(2000.0, 2030.0, 0.95);
        let events = vec![shot_at(2010.0, true), shot_at(2015.0, false)];
        let score = score_clip(&c, &events, &ctx);
        assert!((score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn score_never_goes_negative() {
        let c = clip(10.0, 20.0, 0.0);
        assert!(score_clip(&c, &[], &neutral_ctx()) >= 0.0);
    }

    // -- filter_clips --

    #[test]
    fn filter_orders_best_first_then_earliest() {
        let mut a = clip(300.0, 320.0, 0.0);
        a.final_importance = 0.8;
        let mut b = clip(100.0, 120.0, 0.0);
        b.final_importance = 0.9;
        let mut c = clip(50.0, 70.0, 0.0);
        c.final_importance = 0.8;

        let kept = filter_clips(&[a, b, c], 0.5, 10);
        assert!((kept[0].final_importance - 0.9).abs() < f64::EPSILON);
        assert!((kept[1].start_secs - 50.0).abs() < f64::EPSILON);
        assert!((kept[2].start_secs - 300.0).abs() < f64::EPSILON);
    }

    #[test]
    fn filter_drops_below_threshold_and_truncates() {
        let mut clips = Vec::new();
        for i in 0..5 {
            let mut c = clip(i as f64 * 100.0, i as f64 * 100.0 + 20.0, 0.0);
            c.final_importance = 0.3 + i as f64 * 0.15;
            clips.push(c);
        }
        let kept = filter_clips(&clips, 0.45, 2);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|c| c.final_importance >= 0.45));
    }

    // -- filter_to_target_count --

    fn clips_with_scores(scores: &[f64]) -> Vec<Clip> {
        scores
            .iter()
            .enumerate()
            .map(|(i, &s)| {
                let mut c = clip(i as f64 * 60.0, i as f64 * 60.0 + 20.0, 0.0);
                c.final_importance = s;
                c
            })
            .collect()
    }

    #[test]
    fn target_count_met_at_start_threshold() {
        let clips = clips_with_scores(&[0.9, 0.85, 0.8, 0.75, 0.1]);
        let kept = filter_to_target_count(&clips, 3);
        assert_eq!(kept.len(), 3);
        assert!((kept[0].final_importance - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn threshold_relaxes_to_reach_target() {
        // Only one clip clears 0.70; the threshold must drop to pick up
        // the 0.41 and 0.33 clips.
        let clips = clips_with_scores(&[0.9, 0.41, 0.33, 0.1]);
        let kept = filter_to_target_count(&clips, 3);
        assert_eq!(kept.len(), 3);
        assert!((kept[2].final_importance - 0.33).abs() < f64::EPSILON);
    }

    #[test]
    fn floor_limits_how_far_threshold_drops() {
        // Scores under the 0.20 floor can never be promoted.
        let clips = clips_with_scores(&[0.9, 0.41, 0.12, 0.05]);
        let kept = filter_to_target_count(&clips, 4);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn short_footage_returns_everything_above_floor() {
        let clips = clips_with_scores(&[0.25, 0.22]);
        let kept = filter_to_target_count(&clips, 11);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn empty_input_returns_empty() {
        assert!(filter_to_target_count(&[], 11).is_empty());
    }
}
