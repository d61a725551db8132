//! Repository for the `match_events` table.
//!
//! Reviewer corrections are targeted single-column updates, never whole-row
//! rewrites, so a correction can land while the pipeline is still writing
//! other rows for the same match.

use matchlens_core::job::Half;
use matchlens_core::types::DbId;
use sqlx::PgPool;

use crate::models::event::{EventListQuery, MatchEventRow, NewEvent};

/// Column list for `match_events` queries.
const COLUMNS: &str = "\
    id, match_id, job_id, half, kind, team, event_secs, confidence, \
    source, needs_review, actor_track, position_x, position_y, \
    detail, merged_from_windows, original_secs, created_at, updated_at";

pub struct EventRepo;

impl EventRepo {
    /// Insert the merged event set produced by one pipeline run.
    pub async fn insert_many(
        pool: &PgPool,
        match_id: DbId,
        job_id: DbId,
        half: Half,
        events: &[NewEvent],
    ) -> Result<Vec<MatchEventRow>, sqlx::Error> {
        let query = format!(
            "INSERT INTO match_events \
             (match_id, job_id, half, kind, team, event_secs, confidence, \
              source, needs_review, actor_track, position_x, position_y, \
              detail, merged_from_windows, original_secs) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
             RETURNING {COLUMNS}"
        );

        let mut tx = pool.begin().await?;
        let mut rows = Vec::with_capacity(events.len());
        for event in events {
            let row = sqlx::query_as::<_, MatchEventRow>(&query)
                .bind(match_id)
                .bind(job_id)
                .bind(half.as_str())
                .bind(&event.kind)
                .bind(&event.team)
                .bind(event.event_secs)
                .bind(event.confidence)
                .bind(&event.source)
                .bind(event.needs_review)
                .bind(&event.actor_track)
                .bind(event.position_x)
                .bind(event.position_y)
                .bind(&event.detail)
                .bind(&event.merged_from_windows)
                .bind(&event.original_secs)
                .fetch_one(&mut *tx)
                .await?;
            rows.push(row);
        }
        tx.commit().await?;
        Ok(rows)
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<MatchEventRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM match_events WHERE id = $1");
        sqlx::query_as::<_, MatchEventRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Events for a match in timeline order, optionally filtered by kind
    /// and/or team.
    pub async fn list(
        pool: &PgPool,
        match_id: DbId,
        filter: &EventListQuery,
    ) -> Result<Vec<MatchEventRow>, sqlx::Error> {
        let mut query = format!("SELECT {COLUMNS} FROM match_events WHERE match_id = $1");
        if filter.kind.is_some() {
            query.push_str(" AND kind = $2");
        }
        if filter.team.is_some() {
            let idx = if filter.kind.is_some() { 3 } else { 2 };
            query.push_str(&format!(" AND team = ${idx}"));
        }
        query.push_str(" ORDER BY event_secs ASC");

        let mut q = sqlx::query_as::<_, MatchEventRow>(&query).bind(match_id);
        if let Some(kind) = &filter.kind {
            q = q.bind(kind);
        }
        if let Some(team) = &filter.team {
            q = q.bind(team);
        }
        q.fetch_all(pool).await
    }

    /// All events for a match regardless of half, for stats recomputes.
    pub async fn list_all(pool: &PgPool, match_id: DbId) -> Result<Vec<MatchEventRow>, sqlx::Error> {
        Self::list(pool, match_id, &EventListQuery::default()).await
    }

    /// Wipe a half's events before a re-run writes the new set.
    pub async fn delete_for_half(
        pool: &PgPool,
        match_id: DbId,
        half: Half,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM match_events WHERE match_id = $1 AND half = $2")
            .bind(match_id)
            .bind(half.as_str())
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Reassign the acting player of an event.
    pub async fn set_actor(
        pool: &PgPool,
        event_id: DbId,
        actor_track: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE match_events SET actor_track = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(event_id)
        .bind(actor_track)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Overwrite the detail payload (and its denormalized kind).
    pub async fn set_detail(
        pool: &PgPool,
        event_id: DbId,
        kind: &str,
        detail: &serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE match_events SET kind = $2, detail = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(event_id)
        .bind(kind)
        .bind(detail)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Stamp an event as human-verified: source `corrected`, full
    /// confidence, review flag cleared.
    pub async fn mark_corrected(pool: &PgPool, event_id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE match_events \
             SET source = 'corrected', confidence = 1.0, needs_review = FALSE, \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(event_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn delete(pool: &PgPool, event_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM match_events WHERE id = $1")
            .bind(event_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
