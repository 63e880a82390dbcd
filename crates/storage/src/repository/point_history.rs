use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{NewPointHistory, PointHistory};

/// Append-only points ledger. Rows are deleted only when a round is rolled
/// back for recalculation.
pub struct PointHistoryRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PointHistoryRepository<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    pub async fn append(
        &mut self,
        guild_id: &str,
        rows: &[NewPointHistory],
        now: DateTime<Utc>,
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO point_history (guild_id, season_id, member_id, round_id, points, reason, tier, opponents, previous_best_tag, awarded_best_tag, previous_tier, created_standing, created_at) ",
        );

        query.push_values(rows, |mut row, entry| {
            row.push_bind(guild_id)
                .push_bind(entry.season_id.as_str())
                .push_bind(entry.member_id.as_str())
                .push_bind(entry.round_id)
                .push_bind(entry.points)
                .push_bind(entry.reason.as_str())
                .push_bind(entry.tier.as_str())
                .push_bind(entry.opponents)
                .push_bind(entry.previous_best_tag)
                .push_bind(entry.awarded_best_tag)
                .push_bind(entry.previous_tier.as_str())
                .push_bind(entry.created_standing)
                .push_bind(now);
        });

        let result = query.build().execute(&mut *self.conn).await?;

        Ok(result.rows_affected())
    }

    pub async fn for_round(&mut self, guild_id: &str, round_id: Uuid) -> Result<Vec<PointHistory>> {
        let rows = sqlx::query_as::<_, PointHistory>(
            r#"
            SELECT id, guild_id, season_id, member_id, round_id, points, reason, tier, opponents,
                   previous_best_tag, awarded_best_tag, previous_tier, created_standing, created_at
            FROM point_history
            WHERE guild_id = $1 AND round_id = $2
            ORDER BY id
            "#,
        )
        .bind(guild_id)
        .bind(round_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows)
    }

    /// Deletes exactly the given rows.
    pub async fn delete(&mut self, guild_id: &str, ids: &[i64]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query("DELETE FROM point_history WHERE guild_id = $1 AND id = ANY($2)")
            .bind(guild_id)
            .bind(ids)
            .execute(&mut *self.conn)
            .await?;

        Ok(result.rows_affected())
    }
}
