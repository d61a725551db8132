//! Repository for the `clips` table.

use matchlens_core::job::Half;
use matchlens_core::types::DbId;
use sqlx::PgPool;

use crate::models::clip::{Clip, NewClip};

/// Column list for `clips` queries.
const COLUMNS: &str = "\
    id, match_id, job_id, half, start_secs, end_secs, \
    base_importance, final_importance, storage_path, created_at";

pub struct ClipRepo;

impl ClipRepo {
    /// Replace the clip set for one half: the latest run wins.
    pub async fn replace_for_half(
        pool: &PgPool,
        match_id: DbId,
        job_id: DbId,
        half: Half,
        clips: &[NewClip],
    ) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM clips WHERE match_id = $1 AND half = $2")
            .bind(match_id)
            .bind(half.as_str())
            .execute(&mut *tx)
            .await?;
        for clip in clips {
            sqlx::query(
                "INSERT INTO clips \
                 (match_id, job_id, half, start_secs, end_secs, \
                  base_importance, final_importance, storage_path) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(match_id)
            .bind(job_id)
            .bind(half.as_str())
            .bind(clip.start_secs)
            .bind(clip.end_secs)
            .bind(clip.base_importance)
            .bind(clip.final_importance)
            .bind(&clip.storage_path)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await
    }

    /// All clips for a match, most important first.
    pub async fn list_ranked(pool: &PgPool, match_id: DbId) -> Result<Vec<Clip>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM clips \
             WHERE match_id = $1 \
             ORDER BY final_importance DESC, start_secs ASC"
        );
        sqlx::query_as::<_, Clip>(&query)
            .bind(match_id)
            .fetch_all(pool)
            .await
    }
}
