use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::Result;
use crate::models::RoundOutcome;

/// Per-round processing hash used to detect replays and recalculations.
pub struct RoundOutcomeRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> RoundOutcomeRepository<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    pub async fn find(&mut self, guild_id: &str, round_id: Uuid) -> Result<Option<RoundOutcome>> {
        let outcome = sqlx::query_as::<_, RoundOutcome>(
            r#"
            SELECT guild_id, round_id, season_id, processing_hash, processed_at
            FROM round_outcomes
            WHERE guild_id = $1 AND round_id = $2
            "#,
        )
        .bind(guild_id)
        .bind(round_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(outcome)
    }

    /// Inserts the outcome on first processing, overwrites it on recalculation.
    pub async fn upsert(
        &mut self,
        guild_id: &str,
        round_id: Uuid,
        season_id: Option<&str>,
        processing_hash: &str,
        processed_at: DateTime<Utc>,
    ) -> Result<RoundOutcome> {
        let outcome = sqlx::query_as::<_, RoundOutcome>(
            r#"
            INSERT INTO round_outcomes (guild_id, round_id, season_id, processing_hash, processed_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (guild_id, round_id)
            DO UPDATE SET
                season_id = EXCLUDED.season_id,
                processing_hash = EXCLUDED.processing_hash,
                processed_at = EXCLUDED.processed_at
            RETURNING guild_id, round_id, season_id, processing_hash, processed_at
            "#,
        )
        .bind(guild_id)
        .bind(round_id)
        .bind(season_id)
        .bind(processing_hash)
        .bind(processed_at)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(outcome)
    }
}
