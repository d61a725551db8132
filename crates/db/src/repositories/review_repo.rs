//! Repository for the `pending_reviews` table.

use matchlens_core::types::DbId;
use sqlx::PgPool;

use crate::models::review::{PendingReview, PendingReviewWithEvent};

/// Column list for `pending_reviews` queries.
const COLUMNS: &str = "\
    id, match_id, event_id, reason, resolved, resolution, \
    created_at, resolved_at";

pub struct ReviewRepo;

impl ReviewRepo {
    /// Enqueue an event for review. One open entry per event; a re-run
    /// that flags the same event again just refreshes the reason.
    pub async fn upsert(
        pool: &PgPool,
        match_id: DbId,
        event_id: DbId,
        reason: &str,
    ) -> Result<PendingReview, sqlx::Error> {
        let query = format!(
            "INSERT INTO pending_reviews (match_id, event_id, reason) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (event_id) DO UPDATE SET \
                 reason = EXCLUDED.reason, \
                 resolved = FALSE, \
                 resolution = NULL, \
                 resolved_at = NULL \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PendingReview>(&query)
            .bind(match_id)
            .bind(event_id)
            .bind(reason)
            .fetch_one(pool)
            .await
    }

    /// Open reviews for a match joined with their events, oldest first.
    pub async fn list_pending(
        pool: &PgPool,
        match_id: DbId,
    ) -> Result<Vec<PendingReviewWithEvent>, sqlx::Error> {
        sqlx::query_as::<_, PendingReviewWithEvent>(
            "SELECT r.id, r.event_id, r.reason, r.created_at, \
                    e.kind, e.team, e.event_secs, e.confidence, e.actor_track, e.detail \
             FROM pending_reviews r \
             JOIN match_events e ON e.id = r.event_id \
             WHERE r.match_id = $1 AND NOT r.resolved \
             ORDER BY r.created_at ASC",
        )
        .bind(match_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_open_for_event(
        pool: &PgPool,
        event_id: DbId,
    ) -> Result<Option<PendingReview>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM pending_reviews \
             WHERE event_id = $1 AND NOT resolved"
        );
        sqlx::query_as::<_, PendingReview>(&query)
            .bind(event_id)
            .fetch_optional(pool)
            .await
    }

    /// Close the open review for an event. Returns `false` when there is
    /// no open entry (already resolved, or never queued).
    pub async fn resolve(
        pool: &PgPool,
        event_id: DbId,
        resolution: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE pending_reviews \
             SET resolved = TRUE, resolution = $2, resolved_at = NOW() \
             WHERE event_id = $1 AND NOT resolved",
        )
        .bind(event_id)
        .bind(resolution)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count of open reviews for a match.
    pub async fn count_pending(pool: &PgPool, match_id: DbId) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM pending_reviews WHERE match_id = $1 AND NOT resolved",
        )
        .bind(match_id)
        .fetch_one(pool)
        .await?;
        Ok(count)
    }
}
