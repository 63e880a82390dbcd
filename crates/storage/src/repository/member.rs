use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use crate::error::{Result, StorageError};
use crate::models::{LeagueMember, MemberTag};

const TAG_UNIQUE_INDEX: &str = "league_members_guild_tag_unique";

/// Target tag state for one member inside a reassignment batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagMove {
    pub member_id: String,
    pub tag_number: Option<i32>,
}

/// Source of truth for who holds which tag right now.
pub struct MemberRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> MemberRepository<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    /// Creates missing members (tagless) and bumps `last_active_at` on all of them.
    pub async fn upsert_active(
        &mut self,
        guild_id: &str,
        member_ids: &[String],
        now: DateTime<Utc>,
    ) -> Result<()> {
        if member_ids.is_empty() {
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO league_members (guild_id, member_id, current_tag, last_active_at, updated_at)
            SELECT $1, m.member_id, NULL, $3, $3
            FROM UNNEST($2::text[]) AS m(member_id)
            ON CONFLICT (guild_id, member_id)
            DO UPDATE SET last_active_at = EXCLUDED.last_active_at
            "#,
        )
        .bind(guild_id)
        .bind(member_ids)
        .bind(now)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Creates missing members without touching existing rows.
    pub async fn ensure(
        &mut self,
        guild_id: &str,
        member_ids: &[String],
        now: DateTime<Utc>,
    ) -> Result<u64> {
        if member_ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO league_members (guild_id, member_id, current_tag, last_active_at, updated_at)
            SELECT $1, m.member_id, NULL, $3, $3
            FROM UNNEST($2::text[]) AS m(member_id)
            ON CONFLICT (guild_id, member_id) DO NOTHING
            "#,
        )
        .bind(guild_id)
        .bind(member_ids)
        .bind(now)
        .execute(&mut *self.conn)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn find(&mut self, guild_id: &str, member_id: &str) -> Result<Option<LeagueMember>> {
        let member = sqlx::query_as::<_, LeagueMember>(
            r#"
            SELECT guild_id, member_id, current_tag, last_active_at, updated_at
            FROM league_members
            WHERE guild_id = $1 AND member_id = $2
            "#,
        )
        .bind(guild_id)
        .bind(member_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(member)
    }

    pub async fn find_many(
        &mut self,
        guild_id: &str,
        member_ids: &[String],
    ) -> Result<Vec<LeagueMember>> {
        let members = sqlx::query_as::<_, LeagueMember>(
            r#"
            SELECT guild_id, member_id, current_tag, last_active_at, updated_at
            FROM league_members
            WHERE guild_id = $1 AND member_id = ANY($2)
            ORDER BY member_id
            "#,
        )
        .bind(guild_id)
        .bind(member_ids)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(members)
    }

    /// All tagged members of a guild, best tag first.
    pub async fn tagged_members(&mut self, guild_id: &str) -> Result<Vec<MemberTag>> {
        let tags = sqlx::query_as::<_, MemberTag>(
            r#"
            SELECT member_id, current_tag AS tag_number
            FROM league_members
            WHERE guild_id = $1 AND current_tag IS NOT NULL
            ORDER BY current_tag
            "#,
        )
        .bind(guild_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(tags)
    }

    pub async fn tag_of(&mut self, guild_id: &str, member_id: &str) -> Result<Option<i32>> {
        let tag = sqlx::query_scalar::<_, Option<i32>>(
            "SELECT current_tag FROM league_members WHERE guild_id = $1 AND member_id = $2",
        )
        .bind(guild_id)
        .bind(member_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(tag.flatten())
    }

    pub async fn holder_of(&mut self, guild_id: &str, tag_number: i32) -> Result<Option<String>> {
        let holder = sqlx::query_scalar::<_, String>(
            "SELECT member_id FROM league_members WHERE guild_id = $1 AND current_tag = $2",
        )
        .bind(guild_id)
        .bind(tag_number)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(holder)
    }

    pub async fn holders_of(&mut self, guild_id: &str, tags: &[i32]) -> Result<Vec<MemberTag>> {
        let holders = sqlx::query_as::<_, MemberTag>(
            r#"
            SELECT member_id, current_tag AS tag_number
            FROM league_members
            WHERE guild_id = $1 AND current_tag = ANY($2)
            ORDER BY current_tag
            "#,
        )
        .bind(guild_id)
        .bind(tags)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(holders)
    }

    /// Applies a batch of tag moves in two passes: every member in the batch
    /// is cleared first, then the new tags are set. Permutations among batch
    /// members therefore never collide with the per-guild unique tag index.
    pub async fn reassign_tags(
        &mut self,
        guild_id: &str,
        moves: &[TagMove],
        now: DateTime<Utc>,
    ) -> Result<()> {
        if moves.is_empty() {
            return Ok(());
        }

        let member_ids: Vec<String> = moves.iter().map(|m| m.member_id.clone()).collect();

        sqlx::query(
            r#"
            UPDATE league_members
            SET current_tag = NULL, updated_at = $3
            WHERE guild_id = $1 AND member_id = ANY($2)
            "#,
        )
        .bind(guild_id)
        .bind(&member_ids)
        .bind(now)
        .execute(&mut *self.conn)
        .await?;

        let (set_members, set_tags): (Vec<String>, Vec<i32>) = moves
            .iter()
            .filter_map(|m| m.tag_number.map(|tag| (m.member_id.clone(), tag)))
            .unzip();

        if set_members.is_empty() {
            return Ok(());
        }

        sqlx::query(
            r#"
            UPDATE league_members AS lm
            SET current_tag = v.tag_number, updated_at = $4
            FROM UNNEST($2::text[], $3::int4[]) AS v(member_id, tag_number)
            WHERE lm.guild_id = $1 AND lm.member_id = v.member_id
            "#,
        )
        .bind(guild_id)
        .bind(&set_members)
        .bind(&set_tags)
        .bind(now)
        .execute(&mut *self.conn)
        .await
        .map_err(|e| {
            let err = StorageError::from(e);
            if err.violates(TAG_UNIQUE_INDEX) {
                return StorageError::ConstraintViolation(format!(
                    "a tag in the batch is still held by a member outside it in guild '{}'",
                    guild_id
                ));
            }
            err
        })?;

        Ok(())
    }

    pub async fn clear_all_tags(&mut self, guild_id: &str, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE league_members
            SET current_tag = NULL, updated_at = $2
            WHERE guild_id = $1 AND current_tag IS NOT NULL
            "#,
        )
        .bind(guild_id)
        .bind(now)
        .execute(&mut *self.conn)
        .await?;

        Ok(result.rows_affected())
    }
}
