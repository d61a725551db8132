//! Repository for the `identity_mappings` table.
//!
//! Mappings are keyed by (match, track) and upserted, so a re-run of the
//! identify stage refines prior rows instead of duplicating them. Rows
//! with source `manual` are never overwritten by automated passes.

use matchlens_core::types::DbId;
use sqlx::PgPool;

use crate::models::mapping::{IdentityMapping, UpsertMapping};

/// Column list for `identity_mappings` queries.
const COLUMNS: &str = "\
    id, match_id, track_key, team, jersey_number, confidence, \
    source, needs_review, ocr_history, created_at, updated_at";

pub struct MappingRepo;

impl MappingRepo {
    /// Upsert an OCR-derived identity.
    ///
    /// The `source <> 'manual'` guard in the conflict arm keeps
    /// human-confirmed rows authoritative over later automated passes.
    pub async fn upsert_automated(
        pool: &PgPool,
        match_id: DbId,
        mapping: &UpsertMapping,
    ) -> Result<IdentityMapping, sqlx::Error> {
        let query = format!(
            "INSERT INTO identity_mappings \
             (match_id, track_key, team, jersey_number, confidence, \
              source, needs_review, ocr_history) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (match_id, track_key) DO UPDATE SET \
                 team = EXCLUDED.team, \
                 jersey_number = EXCLUDED.jersey_number, \
                 confidence = EXCLUDED.confidence, \
                 source = EXCLUDED.source, \
                 needs_review = EXCLUDED.needs_review, \
                 ocr_history = EXCLUDED.ocr_history, \
                 updated_at = NOW() \
             WHERE identity_mappings.source <> 'manual' \
             RETURNING {COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, IdentityMapping>(&query)
            .bind(match_id)
            .bind(&mapping.track_key)
            .bind(&mapping.team)
            .bind(mapping.jersey_number)
            .bind(mapping.confidence)
            .bind(&mapping.source)
            .bind(mapping.needs_review)
            .bind(&mapping.ocr_history)
            .fetch_optional(pool)
            .await?;

        // The conflict WHERE clause filtered the update out: the existing
        // manual row stands.
        match inserted {
            Some(row) => Ok(row),
            None => {
                let existing = Self::find_by_key(pool, match_id, &mapping.track_key).await?;
                existing.ok_or(sqlx::Error::RowNotFound)
            }
        }
    }

    /// Upsert a human confirmation: authoritative, full confidence.
    pub async fn upsert_manual(
        pool: &PgPool,
        match_id: DbId,
        track_key: &str,
        team: &str,
        jersey_number: i16,
    ) -> Result<IdentityMapping, sqlx::Error> {
        let query = format!(
            "INSERT INTO identity_mappings \
             (match_id, track_key, team, jersey_number, confidence, source, needs_review) \
             VALUES ($1, $2, $3, $4, 1.0, 'manual', FALSE) \
             ON CONFLICT (match_id, track_key) DO UPDATE SET \
                 team = EXCLUDED.team, \
                 jersey_number = EXCLUDED.jersey_number, \
                 confidence = 1.0, \
                 source = 'manual', \
                 needs_review = FALSE, \
                 updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, IdentityMapping>(&query)
            .bind(match_id)
            .bind(track_key)
            .bind(team)
            .bind(jersey_number)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_key(
        pool: &PgPool,
        match_id: DbId,
        track_key: &str,
    ) -> Result<Option<IdentityMapping>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM identity_mappings \
             WHERE match_id = $1 AND track_key = $2"
        );
        sqlx::query_as::<_, IdentityMapping>(&query)
            .bind(match_id)
            .bind(track_key)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_for_match(
        pool: &PgPool,
        match_id: DbId,
    ) -> Result<Vec<IdentityMapping>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM identity_mappings \
             WHERE match_id = $1 \
             ORDER BY track_key ASC"
        );
        sqlx::query_as::<_, IdentityMapping>(&query)
            .bind(match_id)
            .fetch_all(pool)
            .await
    }
}
