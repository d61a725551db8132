//! Stage-weighted progress and remaining-time estimation.
//!
//! Overall progress is the weight of completed stages plus the interior
//! fraction of the current one, so a variant switch can never make the
//! bar jump backwards. Remaining time comes from global per-stage
//! duration history; with no history for any remaining stage the
//! estimate is the explicit unknown sentinel rather than a guess.

use std::collections::HashMap;

use crate::job::{PipelineStage, PipelineVariant};

/// Sentinel for "remaining time still unknown". Kept negative so a
/// client can distinguish it from a genuine zero-seconds-left estimate.
pub const ETA_UNKNOWN: i64 = -1;

// ---------------------------------------------------------------------------
// Overall progress
// ---------------------------------------------------------------------------

/// Percentage complete for a job at `current` stage, `stage_fraction`
/// of the way through it.
///
/// `stage_fraction` is clamped to `[0, 1]`. Stages are weighted by the
/// stored variant's table, so the result is always in `[0, 100]`.
pub fn overall_progress(
    variant: PipelineVariant,
    current: PipelineStage,
    stage_fraction: f64,
) -> i16 {
    let fraction = stage_fraction.clamp(0.0, 1.0);
    let mut done_weight: u32 = 0;

    for &stage in variant.stages() {
        if stage == current {
            let partial = variant.stage_weight(stage) as f64 * fraction;
            return (done_weight as f64 + partial).round().clamp(0.0, 100.0) as i16;
        }
        done_weight += variant.stage_weight(stage);
    }

    // Stage not in this variant's table; report completed weight only.
    done_weight.min(100) as i16
}

// ---------------------------------------------------------------------------
// Duration history
// ---------------------------------------------------------------------------

/// Global duration history for one stage, persisted across jobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageHistory {
    pub avg_duration_secs: f64,
    pub sample_count: i32,
}

/// Compute the incremental (online) mean after observing a new value.
///
/// Formula: `new_avg = old_avg + (new_value - old_avg) / new_count`
pub fn incremental_mean(old_avg: f64, new_value: f64, new_count: i32) -> f64 {
    old_avg + (new_value - old_avg) / new_count as f64
}

/// Fold a finished stage run into its history.
pub fn record_duration(history: Option<StageHistory>, duration_secs: f64) -> StageHistory {
    match history {
        Some(h) => {
            let count = h.sample_count + 1;
            StageHistory {
                avg_duration_secs: incremental_mean(h.avg_duration_secs, duration_secs, count),
                sample_count: count,
            }
        }
        None => StageHistory {
            avg_duration_secs: duration_secs,
            sample_count: 1,
        },
    }
}

// ---------------------------------------------------------------------------
// Remaining time
// ---------------------------------------------------------------------------

/// Estimate seconds remaining for a job at `current` stage.
///
/// Sums historical averages for the rest of the current stage and every
/// later stage. Returns [`ETA_UNKNOWN`] if any of those stages has no
/// recorded samples yet.
pub fn estimate_remaining_secs(
    variant: PipelineVariant,
    current: PipelineStage,
    stage_fraction: f64,
    history: &HashMap<PipelineStage, StageHistory>,
) -> i64 {
    let fraction = stage_fraction.clamp(0.0, 1.0);
    let mut remaining = 0.0;
    let mut reached_current = false;

    for &stage in variant.stages() {
        if stage == current {
            reached_current = true;
        }
        if !reached_current {
            continue;
        }
        let Some(h) = history.get(&stage).filter(|h| h.sample_count > 0) else {
            return ETA_UNKNOWN;
        };
        if stage == current {
            remaining += h.avg_duration_secs * (1.0 - fraction);
        } else {
            remaining += h.avg_duration_secs;
        }
    }

    if !reached_current {
        return ETA_UNKNOWN;
    }
    remaining.round() as i64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- overall_progress --

    #[test]
    fn progress_zero_at_first_stage_start() {
        assert_eq!(
            overall_progress(PipelineVariant::Windowed, PipelineStage::Prepare, 0.0),
            0
        );
    }

    #[test]
    fn progress_counts_completed_stage_weight() {
        // Prepare (5) done, halfway through Track (30).
        assert_eq!(
            overall_progress(PipelineVariant::Windowed, PipelineStage::Track, 0.5),
            20
        );
    }

    #[test]
    fn progress_reaches_100_at_final_stage_end() {
        assert_eq!(
            overall_progress(PipelineVariant::Windowed, PipelineStage::Aggregate, 1.0),
            100
        );
        assert_eq!(
            overall_progress(PipelineVariant::Consolidated, PipelineStage::Aggregate, 1.0),
            100
        );
    }

    #[test]
    fn progress_is_monotonic_across_a_run() {
        let variant = PipelineVariant::Windowed;
        let mut last = -1;
        for &stage in variant.stages() {
            for fraction in [0.0, 0.25, 0.5, 0.75, 1.0] {
                let p = overall_progress(variant, stage, fraction);
                assert!(p >= last, "progress went backwards at {stage:?}");
                last = p;
            }
        }
    }

    #[test]
    fn fraction_is_clamped() {
        assert_eq!(
            overall_progress(PipelineVariant::Windowed, PipelineStage::Prepare, 7.0),
            5
        );
        assert_eq!(
            overall_progress(PipelineVariant::Windowed, PipelineStage::Prepare, -3.0),
            0
        );
    }

    // -- record_duration --

    #[test]
    fn first_sample_becomes_the_average() {
        let h = record_duration(None, 120.0);
        assert_eq!(h.sample_count, 1);
        assert!((h.avg_duration_secs - 120.0).abs() < f64::EPSILON);
    }

    #[test]
    fn second_sample_averages() {
        let h = record_duration(
            Some(StageHistory {
                avg_duration_secs: 120.0,
                sample_count: 1,
            }),
            60.0,
        );
        assert_eq!(h.sample_count, 2);
        assert!((h.avg_duration_secs - 90.0).abs() < f64::EPSILON);
    }

    // -- estimate_remaining_secs --

    fn full_history() -> HashMap<PipelineStage, StageHistory> {
        let mut h = HashMap::new();
        for (stage, avg) in [
            (PipelineStage::Prepare, 10.0),
            (PipelineStage::Track, 300.0),
            (PipelineStage::LabelWindows, 400.0),
            (PipelineStage::MergeRank, 20.0),
            (PipelineStage::Identify, 60.0),
            (PipelineStage::Aggregate, 10.0),
        ] {
            h.insert(
                stage,
                StageHistory {
                    avg_duration_secs: avg,
                    sample_count: 4,
                },
            );
        }
        h
    }

    #[test]
    fn eta_sums_remaining_stage_averages() {
        let eta = estimate_remaining_secs(
            PipelineVariant::Windowed,
            PipelineStage::MergeRank,
            0.0,
            &full_history(),
        );
        assert_eq!(eta, 20 + 60 + 10);
    }

    #[test]
    fn eta_scales_the_current_stage_by_fraction() {
        let eta = estimate_remaining_secs(
            PipelineVariant::Windowed,
            PipelineStage::LabelWindows,
            0.75,
            &full_history(),
        );
        assert_eq!(eta, 100 + 20 + 60 + 10);
    }

    #[test]
    fn eta_unknown_when_a_remaining_stage_has_no_history() {
        let mut history = full_history();
        history.remove(&PipelineStage::Aggregate);
        let eta = estimate_remaining_secs(
            PipelineVariant::Windowed,
            PipelineStage::MergeRank,
            0.5,
            &history,
        );
        assert_eq!(eta, ETA_UNKNOWN);
    }

    #[test]
    fn eta_ignores_history_gaps_behind_the_current_stage() {
        let mut history = full_history();
        history.remove(&PipelineStage::Prepare);
        history.remove(&PipelineStage::Track);
        let eta = estimate_remaining_secs(
            PipelineVariant::Windowed,
            PipelineStage::Identify,
            0.0,
            &history,
        );
        assert_eq!(eta, 70);
    }

    #[test]
    fn eta_unknown_for_foreign_stage() {
        let eta = estimate_remaining_secs(
            PipelineVariant::Consolidated,
            PipelineStage::Track,
            0.0,
            &full_history(),
        );
        assert_eq!(eta, ETA_UNKNOWN);
    }
}
