use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{NewTagHistoryEntry, TagHistoryEntry};

/// Append-only tag ledger. Rows are only ever inserted.
pub struct TagHistoryRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> TagHistoryRepository<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    pub async fn append(
        &mut self,
        guild_id: &str,
        entries: &[NewTagHistoryEntry],
        now: DateTime<Utc>,
    ) -> Result<u64> {
        if entries.is_empty() {
            return Ok(0);
        }

        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO tag_history (guild_id, round_id, tag_number, old_member_id, new_member_id, reason, metadata, created_at) ",
        );

        query.push_values(entries, |mut row, entry| {
            row.push_bind(guild_id)
                .push_bind(entry.round_id)
                .push_bind(entry.tag_number)
                .push_bind(entry.old_member_id.as_deref())
                .push_bind(entry.new_member_id.as_str())
                .push_bind(entry.reason.as_str())
                .push_bind(Json(&entry.metadata))
                .push_bind(now);
        });

        let result = query.build().execute(&mut *self.conn).await?;

        Ok(result.rows_affected())
    }

    pub async fn for_round(&mut self, guild_id: &str, round_id: Uuid) -> Result<Vec<TagHistoryEntry>> {
        let entries = sqlx::query_as::<_, TagHistoryEntry>(
            r#"
            SELECT id, guild_id, round_id, tag_number, old_member_id, new_member_id, reason, metadata, created_at
            FROM tag_history
            WHERE guild_id = $1 AND round_id = $2
            ORDER BY id
            "#,
        )
        .bind(guild_id)
        .bind(round_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(entries)
    }

    /// Newest first. With `member_id`, only entries where the member gave up
    /// or received a tag.
    pub async fn list(
        &mut self,
        guild_id: &str,
        member_id: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<TagHistoryEntry>> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            SELECT id, guild_id, round_id, tag_number, old_member_id, new_member_id, reason, metadata, created_at
            FROM tag_history
            WHERE guild_id =
            "#,
        );
        query.push_bind(guild_id);

        if let Some(member_id) = member_id {
            query.push(" AND (old_member_id = ");
            query.push_bind(member_id);
            query.push(" OR new_member_id = ");
            query.push_bind(member_id);
            query.push(")");
        }

        query.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        query.push_bind(limit);
        query.push(" OFFSET ");
        query.push_bind(offset);

        let entries = query
            .build_query_as::<TagHistoryEntry>()
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(entries)
    }

    pub async fn count(&mut self, guild_id: &str, member_id: Option<&str>) -> Result<i64> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM tag_history WHERE guild_id = ");
        query.push_bind(guild_id);

        if let Some(member_id) = member_id {
            query.push(" AND (old_member_id = ");
            query.push_bind(member_id);
            query.push(" OR new_member_id = ");
            query.push_bind(member_id);
            query.push(")");
        }

        let count = query
            .build_query_scalar::<i64>()
            .fetch_one(&mut *self.conn)
            .await?;

        Ok(count)
    }
}
