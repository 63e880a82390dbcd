use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use crate::error::Result;
use crate::models::{PointHistory, SeasonStanding, Tier};

/// Totals written for one member after a scored round.
#[derive(Debug, Clone)]
pub struct StandingUpdate {
    pub member_id: String,
    pub points: i32,
    pub season_best_tag: Option<i32>,
    pub tier: Tier,
}

pub struct StandingRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> StandingRepository<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    /// Creates empty standings for members seen for the first time this
    /// season and returns the ids of the members it created.
    pub async fn enroll(
        &mut self,
        guild_id: &str,
        season_id: &str,
        member_ids: &[String],
        now: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        if member_ids.is_empty() {
            return Ok(Vec::new());
        }

        let created = sqlx::query_scalar::<_, String>(
            r#"
            INSERT INTO season_standings (guild_id, season_id, member_id, total_points, rounds_played, season_best_tag, current_tier, updated_at)
            SELECT $1, $2, m.member_id, 0, 0, NULL, 'bronze', $4
            FROM UNNEST($3::text[]) AS m(member_id)
            ON CONFLICT (guild_id, season_id, member_id) DO NOTHING
            RETURNING member_id
            "#,
        )
        .bind(guild_id)
        .bind(season_id)
        .bind(member_ids)
        .bind(now)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(created)
    }

    pub async fn find_many(
        &mut self,
        guild_id: &str,
        season_id: &str,
        member_ids: &[String],
    ) -> Result<Vec<SeasonStanding>> {
        let standings = sqlx::query_as::<_, SeasonStanding>(
            r#"
            SELECT guild_id, season_id, member_id, total_points, rounds_played, season_best_tag, current_tier, updated_at
            FROM season_standings
            WHERE guild_id = $1 AND season_id = $2 AND member_id = ANY($3)
            ORDER BY member_id
            "#,
        )
        .bind(guild_id)
        .bind(season_id)
        .bind(member_ids)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(standings)
    }

    /// Number of members holding a standing in the season.
    pub async fn population(&mut self, guild_id: &str, season_id: &str) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM season_standings WHERE guild_id = $1 AND season_id = $2",
        )
        .bind(guild_id)
        .bind(season_id)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(count)
    }

    pub async fn record_round(
        &mut self,
        guild_id: &str,
        season_id: &str,
        update: &StandingUpdate,
        now: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE season_standings
            SET total_points = total_points + $4,
                rounds_played = rounds_played + 1,
                season_best_tag = $5,
                current_tier = $6,
                updated_at = $7
            WHERE guild_id = $1 AND season_id = $2 AND member_id = $3
            "#,
        )
        .bind(guild_id)
        .bind(season_id)
        .bind(&update.member_id)
        .bind(update.points)
        .bind(update.season_best_tag)
        .bind(update.tier.as_str())
        .bind(now)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Reverses one point history row. Counters are floored at zero. The
    /// season-best tag and tier go back to their pre-round values unless a
    /// later round has since overwritten them. A standing the round created
    /// is removed once nothing else contributes to it.
    pub async fn revert_round(&mut self, row: &PointHistory, now: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE season_standings
            SET total_points = GREATEST(total_points - $4, 0),
                rounds_played = GREATEST(rounds_played - 1, 0),
                season_best_tag = CASE
                    WHEN season_best_tag IS NOT DISTINCT FROM $5 THEN $6
                    ELSE season_best_tag
                END,
                current_tier = CASE
                    WHEN season_best_tag IS NOT DISTINCT FROM $5 THEN $7
                    ELSE current_tier
                END,
                updated_at = $8
            WHERE guild_id = $1 AND season_id = $2 AND member_id = $3
            "#,
        )
        .bind(&row.guild_id)
        .bind(&row.season_id)
        .bind(&row.member_id)
        .bind(row.points)
        .bind(row.awarded_best_tag)
        .bind(row.previous_best_tag)
        .bind(row.previous_tier.as_str())
        .bind(now)
        .execute(&mut *self.conn)
        .await?;

        if row.created_standing {
            sqlx::query(
                r#"
                DELETE FROM season_standings
                WHERE guild_id = $1 AND season_id = $2 AND member_id = $3
                  AND rounds_played = 0 AND total_points = 0
                "#,
            )
            .bind(&row.guild_id)
            .bind(&row.season_id)
            .bind(&row.member_id)
            .execute(&mut *self.conn)
            .await?;
        }

        Ok(())
    }

    pub async fn list(
        &mut self,
        guild_id: &str,
        season_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SeasonStanding>> {
        let standings = sqlx::query_as::<_, SeasonStanding>(
            r#"
            SELECT guild_id, season_id, member_id, total_points, rounds_played, season_best_tag, current_tier, updated_at
            FROM season_standings
            WHERE guild_id = $1 AND season_id = $2
            ORDER BY total_points DESC, season_best_tag ASC NULLS LAST, member_id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(guild_id)
        .bind(season_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(standings)
    }
}
