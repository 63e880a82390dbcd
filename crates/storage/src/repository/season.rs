use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use crate::error::{Result, StorageError};
use crate::models::Season;

pub struct SeasonRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> SeasonRepository<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    pub async fn active(&mut self, guild_id: &str) -> Result<Option<Season>> {
        let season = sqlx::query_as::<_, Season>(
            r#"
            SELECT guild_id, id, name, is_active, start_date, end_date
            FROM seasons
            WHERE guild_id = $1 AND is_active
            "#,
        )
        .bind(guild_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(season)
    }

    pub async fn find(&mut self, guild_id: &str, season_id: &str) -> Result<Season> {
        let season = sqlx::query_as::<_, Season>(
            r#"
            SELECT guild_id, id, name, is_active, start_date, end_date
            FROM seasons
            WHERE guild_id = $1 AND id = $2
            "#,
        )
        .bind(guild_id)
        .bind(season_id)
        .fetch_optional(&mut *self.conn)
        .await?
        .ok_or(StorageError::NotFound)?;

        Ok(season)
    }

    pub async fn list(&mut self, guild_id: &str) -> Result<Vec<Season>> {
        let seasons = sqlx::query_as::<_, Season>(
            r#"
            SELECT guild_id, id, name, is_active, start_date, end_date
            FROM seasons
            WHERE guild_id = $1
            ORDER BY start_date DESC, id
            "#,
        )
        .bind(guild_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(seasons)
    }

    /// Closes whichever season is active, returning its id.
    pub async fn deactivate_active(
        &mut self,
        guild_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>> {
        let closed = sqlx::query_scalar::<_, String>(
            r#"
            UPDATE seasons
            SET is_active = FALSE, end_date = $2
            WHERE guild_id = $1 AND is_active
            RETURNING id
            "#,
        )
        .bind(guild_id)
        .bind(now)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(closed)
    }

    pub async fn create_active(
        &mut self,
        guild_id: &str,
        season_id: &str,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<Season> {
        let season = sqlx::query_as::<_, Season>(
            r#"
            INSERT INTO seasons (guild_id, id, name, is_active, start_date, end_date)
            VALUES ($1, $2, $3, TRUE, $4, NULL)
            RETURNING guild_id, id, name, is_active, start_date, end_date
            "#,
        )
        .bind(guild_id)
        .bind(season_id)
        .bind(name)
        .bind(now)
        .fetch_one(&mut *self.conn)
        .await
        .map_err(|e| {
            let err = StorageError::from(e);
            if err.violates("seasons_pkey") {
                return StorageError::ConstraintViolation(format!(
                    "Season '{}' already exists",
                    season_id
                ));
            }
            err
        })?;

        Ok(season)
    }

    /// Ends an active season. `NotFound` when the season does not exist or
    /// is already closed.
    pub async fn end(&mut self, guild_id: &str, season_id: &str, now: DateTime<Utc>) -> Result<Season> {
        let season = sqlx::query_as::<_, Season>(
            r#"
            UPDATE seasons
            SET is_active = FALSE, end_date = $3
            WHERE guild_id = $1 AND id = $2 AND is_active
            RETURNING guild_id, id, name, is_active, start_date, end_date
            "#,
        )
        .bind(guild_id)
        .bind(season_id)
        .bind(now)
        .fetch_optional(&mut *self.conn)
        .await?
        .ok_or(StorageError::NotFound)?;

        Ok(season)
    }
}
