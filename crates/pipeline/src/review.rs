//! Human review queue operations.
//!
//! Reviewer actions operate on persisted rows only, so they are safe to
//! run while a pipeline job is mid-flight. Corrections are
//! authoritative: they flip the event's source to `corrected` with
//! confidence 1.0, which the merge and stats passes treat as final.

use matchlens_core::event::{EventDetail, MatchEvent, PassOutcome};
use matchlens_core::types::DbId;
use matchlens_core::CoreError;
use matchlens_db::models::review::{CorrectEvent, PendingReviewWithEvent};
use matchlens_db::repositories::{EventRepo, MatchRepo, ReviewRepo};
use matchlens_db::DbPool;
use matchlens_events::{AnalysisEvent, EventBus};

use crate::error::PipelineError;

/// Open reviews for a match joined with their events, oldest first.
pub async fn list_pending(
    pool: &DbPool,
    match_id: DbId,
) -> Result<Vec<PendingReviewWithEvent>, PipelineError> {
    Ok(ReviewRepo::list_pending(pool, match_id).await?)
}

/// Close the open review for an event and record the resolution.
/// Resolving an already-resolved review is a no-op.
pub async fn resolve(
    pool: &DbPool,
    bus: &EventBus,
    event_id: DbId,
    resolution: &str,
) -> Result<(), PipelineError> {
    let review = ReviewRepo::find_open_for_event(pool, event_id).await?;
    let Some(review) = review else {
        return Ok(());
    };

    if ReviewRepo::resolve(pool, event_id, resolution).await? {
        bus.publish(
            AnalysisEvent::new("review.resolved", review.match_id).with_payload(
                serde_json::json!({
                    "event_id": event_id,
                    "resolution": resolution,
                }),
            ),
        );
    }
    Ok(())
}

/// Apply reviewer corrections to an event.
///
/// Only the supplied fields are rewritten, each with its own UPDATE, so
/// a concurrent stage re-run can never clobber an untouched column. The
/// corrected row gets source `corrected` and confidence 1.0, and its
/// open review (if any) is resolved as `corrected`.
pub async fn correct_event(
    pool: &DbPool,
    bus: &EventBus,
    event_id: DbId,
    corrections: &CorrectEvent,
) -> Result<MatchEvent, PipelineError> {
    let row = EventRepo::find_by_id(pool, event_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "event",
            id: event_id,
        })?;
    let current = row.to_core()?;

    if let Some(actor) = &corrections.actor_track {
        EventRepo::set_actor(pool, event_id, actor).await?;
    }

    if let Some(outcome) = &corrections.outcome {
        let detail = apply_outcome(&current.detail, outcome)?;
        let value = serde_json::to_value(&detail)
            .map_err(|e| CoreError::Internal(format!("event detail serialization: {e}")))?;
        EventRepo::set_detail(pool, event_id, detail.kind().as_str(), &value).await?;
    }

    EventRepo::mark_corrected(pool, event_id).await?;

    if ReviewRepo::resolve(pool, event_id, "corrected").await? {
        bus.publish(
            AnalysisEvent::new("review.resolved", row.match_id).with_payload(serde_json::json!({
                "event_id": event_id,
                "resolution": "corrected",
            })),
        );
    }

    let corrected = EventRepo::find_by_id(pool, event_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "event",
            id: event_id,
        })?;
    Ok(corrected.to_core()?)
}

/// Flag a match's stats for asynchronous recomputation.
pub async fn request_recalculation(pool: &DbPool, match_id: DbId) -> Result<(), PipelineError> {
    MatchRepo::request_recalculation(pool, match_id).await?;
    Ok(())
}

/// Rewrite a pass detail with a corrected outcome. Outcome corrections
/// only make sense for pass events.
fn apply_outcome(detail: &EventDetail, outcome: &str) -> Result<EventDetail, CoreError> {
    let EventDetail::Pass { progressive, .. } = detail else {
        return Err(CoreError::Validation(format!(
            "outcome correction applies to pass events, this is a {} event",
            detail.kind().as_str()
        )));
    };

    let outcome = match outcome {
        "complete" => PassOutcome::Complete,
        "incomplete" => PassOutcome::Incomplete,
        "intercepted" => PassOutcome::Intercepted,
        other => {
            return Err(CoreError::Validation(format!(
                "unknown pass outcome '{other}'"
            )))
        }
    };

    Ok(EventDetail::Pass {
        outcome,
        progressive: *progressive,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn outcome_correction_preserves_progressive_flag() {
        let detail = EventDetail::Pass {
            outcome: PassOutcome::Complete,
            progressive: true,
        };
        let corrected = apply_outcome(&detail, "intercepted").unwrap();
        assert_eq!(
            corrected,
            EventDetail::Pass {
                outcome: PassOutcome::Intercepted,
                progressive: true,
            }
        );
    }

    #[test]
    fn outcome_correction_rejects_non_pass_events() {
        let detail = EventDetail::Shot {
            on_target: true,
            goal: false,
        };
        assert_matches!(
            apply_outcome(&detail, "complete"),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn unknown_outcome_is_rejected() {
        let detail = EventDetail::Pass {
            outcome: PassOutcome::Complete,
            progressive: false,
        };
        assert_matches!(
            apply_outcome(&detail, "juggled"),
            Err(CoreError::Validation(_))
        );
    }
}
