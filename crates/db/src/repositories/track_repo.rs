//! Repository for the `tracks` table.

use matchlens_core::job::Half;
use matchlens_core::types::DbId;
use sqlx::PgPool;

use crate::models::track::{NewTrack, TrackRow};

/// Column list for `tracks` queries.
const COLUMNS: &str = "\
    id, match_id, job_id, half, track_key, start_secs, end_secs, \
    frame_count, avg_confidence, frames_path, created_at";

pub struct TrackRepo;

impl TrackRepo {
    /// Insert the track digests produced by one tracking run.
    pub async fn insert_many(
        pool: &PgPool,
        match_id: DbId,
        job_id: DbId,
        half: Half,
        tracks: &[NewTrack],
    ) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;
        for track in tracks {
            sqlx::query(
                "INSERT INTO tracks \
                 (match_id, job_id, half, track_key, start_secs, end_secs, \
                  frame_count, avg_confidence, frames_path) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(match_id)
            .bind(job_id)
            .bind(half.as_str())
            .bind(&track.summary.track_key)
            .bind(track.summary.start_secs)
            .bind(track.summary.end_secs)
            .bind(track.summary.frame_count as i32)
            .bind(track.summary.avg_confidence)
            .bind(&track.frames_path)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await
    }

    /// Tracks recorded by a specific job run.
    pub async fn list_for_job(pool: &PgPool, job_id: DbId) -> Result<Vec<TrackRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM tracks WHERE job_id = $1 ORDER BY track_key ASC"
        );
        sqlx::query_as::<_, TrackRow>(&query)
            .bind(job_id)
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_key(
        pool: &PgPool,
        match_id: DbId,
        track_key: &str,
    ) -> Result<Option<TrackRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM tracks \
             WHERE match_id = $1 AND track_key = $2 \
             ORDER BY created_at DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, TrackRow>(&query)
            .bind(match_id)
            .bind(track_key)
            .fetch_optional(pool)
            .await
    }
}
