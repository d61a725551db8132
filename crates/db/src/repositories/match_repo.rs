//! Repository for the `matches` table.

use matchlens_core::job::Half;
use matchlens_core::types::DbId;
use sqlx::PgPool;

use crate::models::matches::{CreateMatch, Match};

/// Column list for `matches` queries.
const COLUMNS: &str = "\
    id, name, home_team, away_team, format, \
    full_video_path, first_video_path, second_video_path, \
    needs_recalculation, created_at, updated_at";

pub struct MatchRepo;

impl MatchRepo {
    pub async fn create(
        pool: &PgPool,
        input: &CreateMatch,
        format: &str,
    ) -> Result<Match, sqlx::Error> {
        let query = format!(
            "INSERT INTO matches (name, home_team, away_team, format) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Match>(&query)
            .bind(&input.name)
            .bind(&input.home_team)
            .bind(&input.away_team)
            .bind(format)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Match>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM matches WHERE id = $1");
        sqlx::query_as::<_, Match>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Record the blob-store path of a registered half video.
    ///
    /// Single-column update so a concurrent upload of the other half
    /// cannot be clobbered.
    pub async fn set_video_path(
        pool: &PgPool,
        match_id: DbId,
        half: Half,
        path: &str,
    ) -> Result<(), sqlx::Error> {
        let column = match half {
            Half::Full => "full_video_path",
            Half::First => "first_video_path",
            Half::Second => "second_video_path",
        };
        let query =
            format!("UPDATE matches SET {column} = $2, updated_at = NOW() WHERE id = $1");
        sqlx::query(&query)
            .bind(match_id)
            .bind(path)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Flag the match for a stats recompute. Idempotent.
    pub async fn request_recalculation(pool: &PgPool, match_id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE matches SET needs_recalculation = TRUE, updated_at = NOW() WHERE id = $1",
        )
        .bind(match_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Atomically claim one match flagged for recalculation, clearing
    /// the flag in the same statement.
    ///
    /// Uses `FOR UPDATE SKIP LOCKED` so multiple recompute workers never
    /// double-claim.
    pub async fn claim_recalculation(pool: &PgPool) -> Result<Option<Match>, sqlx::Error> {
        let query = format!(
            "UPDATE matches \
             SET needs_recalculation = FALSE, updated_at = NOW() \
             WHERE id = ( \
                 SELECT id FROM matches \
                 WHERE needs_recalculation \
                 ORDER BY updated_at ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Match>(&query).fetch_optional(pool).await
    }
}
