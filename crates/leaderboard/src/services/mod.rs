//! Write flows and read views over one guild-scoped store.
//!
//! Every mutating operation opens a transaction, takes the guild lock on it,
//! and commits or rolls back as a whole. Read views take no lock.

mod assignment;
mod queries;
mod reset;
mod rollback;
mod round;
mod season;

use std::sync::Arc;

use sqlx::{PgPool, Postgres, Transaction};
use storage::{AdvisoryGuildLock, GuildLock};

use crate::clock::{Clock, SystemClock};
use crate::config::EngineSettings;
use crate::error::{LeagueError, OperationContext, Result};

pub use rollback::RollbackSummary;

#[derive(Clone)]
pub struct LeagueService {
    pool: PgPool,
    lock: Arc<dyn GuildLock>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
}

impl LeagueService {
    /// Advisory guild lock, system clock and the default recalculation window.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lock: Arc::new(AdvisoryGuildLock),
            clock: Arc::new(SystemClock),
            settings: EngineSettings::default(),
        }
    }

    pub fn with_lock(mut self, lock: Arc<dyn GuildLock>) -> Self {
        self.lock = lock;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Opens a transaction and blocks until it holds the guild lock.
    async fn begin_locked(
        &self,
        guild_id: &str,
        operation: &'static str,
    ) -> Result<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await.in_op(operation)?;

        self.lock
            .acquire(&mut *tx, guild_id)
            .await
            .map_err(|source| LeagueError::Lock {
                guild_id: guild_id.to_string(),
                source,
            })?;

        Ok(tx)
    }
}
