use async_trait::async_trait;
use sqlx::PgConnection;

use crate::error::Result;

/// Serializes mutating operations per guild.
///
/// The lock is scoped to the transaction that owns `conn` and is released
/// when that transaction commits or rolls back. Guilds never contend with
/// each other.
#[async_trait]
pub trait GuildLock: Send + Sync {
    async fn acquire(&self, conn: &mut PgConnection, guild_id: &str) -> Result<()>;
}

/// Postgres transaction-scoped advisory lock keyed by a hash of the guild id.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdvisoryGuildLock;

#[async_trait]
impl GuildLock for AdvisoryGuildLock {
    async fn acquire(&self, conn: &mut PgConnection, guild_id: &str) -> Result<()> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(guild_id)
            .execute(&mut *conn)
            .await?;

        tracing::debug!(guild_id, "advisory guild lock acquired");
        Ok(())
    }
}

/// Row lock on a per-guild sentinel row, for backends without advisory locks.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowGuildLock;

#[async_trait]
impl GuildLock for RowGuildLock {
    async fn acquire(&self, conn: &mut PgConnection, guild_id: &str) -> Result<()> {
        sqlx::query("INSERT INTO guild_locks (guild_id) VALUES ($1) ON CONFLICT (guild_id) DO NOTHING")
            .bind(guild_id)
            .execute(&mut *conn)
            .await?;

        sqlx::query("SELECT guild_id FROM guild_locks WHERE guild_id = $1 FOR UPDATE")
            .bind(guild_id)
            .fetch_one(&mut *conn)
            .await?;

        tracing::debug!(guild_id, "row guild lock acquired");
        Ok(())
    }
}
