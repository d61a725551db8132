//! Repository for the `stat_metrics` table.

use matchlens_core::types::DbId;
use sqlx::PgPool;

use crate::models::metric::{MetricListQuery, StatMetricRow};

/// Column list for `stat_metrics` queries.
const COLUMNS: &str = "\
    id, match_id, key, scope, value, confidence, explanation, updated_at";

pub struct MetricRepo;

impl MetricRepo {
    /// Upsert one metric value. Recomputes overwrite in place, keyed by
    /// (match, key, scope).
    pub async fn upsert(
        pool: &PgPool,
        match_id: DbId,
        key: &str,
        scope: &str,
        value: f64,
        confidence: f64,
        explanation: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO stat_metrics \
             (match_id, key, scope, value, confidence, explanation) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (match_id, key, scope) DO UPDATE SET \
                 value = EXCLUDED.value, \
                 confidence = EXCLUDED.confidence, \
                 explanation = EXCLUDED.explanation, \
                 updated_at = NOW()",
        )
        .bind(match_id)
        .bind(key)
        .bind(scope)
        .bind(value)
        .bind(confidence)
        .bind(explanation)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Metrics for a match, optionally narrowed to one scope string.
    pub async fn list(
        pool: &PgPool,
        match_id: DbId,
        filter: &MetricListQuery,
    ) -> Result<Vec<StatMetricRow>, sqlx::Error> {
        match &filter.scope {
            Some(scope) => {
                let query = format!(
                    "SELECT {COLUMNS} FROM stat_metrics \
                     WHERE match_id = $1 AND scope = $2 \
                     ORDER BY scope ASC, key ASC"
                );
                sqlx::query_as::<_, StatMetricRow>(&query)
                    .bind(match_id)
                    .bind(scope)
                    .fetch_all(pool)
                    .await
            }
            None => {
                let query = format!(
                    "SELECT {COLUMNS} FROM stat_metrics \
                     WHERE match_id = $1 \
                     ORDER BY scope ASC, key ASC"
                );
                sqlx::query_as::<_, StatMetricRow>(&query)
                    .bind(match_id)
                    .fetch_all(pool)
                    .await
            }
        }
    }
}
