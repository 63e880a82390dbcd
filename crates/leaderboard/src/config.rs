use anyhow::{Context, Result, bail};
use chrono::Duration;

/// Recalculation window used when nothing else is configured.
pub const DEFAULT_RECALCULATION_WINDOW_HOURS: i64 = 24;

/// Engine behaviour that callers may tune.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// How long after first processing a round may still be recalculated
    /// with different inputs.
    pub recalculation_window: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            recalculation_window: Duration::hours(DEFAULT_RECALCULATION_WINDOW_HOURS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStrategy {
    Advisory,
    Row,
}

impl LockStrategy {
    fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "advisory" => Ok(Self::Advisory),
            "row" => Ok(Self::Row),
            other => bail!("GUILD_LOCK_STRATEGY must be 'advisory' or 'row', got '{}'", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub lock_strategy: LockStrategy,
    pub engine: EngineSettings,
}

impl Config {
    /// Builds the config from an explicit database url plus optional overrides.
    pub fn from_lookup(
        database_url: String,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a number")?,
            None => 5,
        };

        let window_hours: i64 = match lookup("RECALCULATION_WINDOW_HOURS") {
            Some(raw) => raw
                .parse()
                .context("RECALCULATION_WINDOW_HOURS must be a number")?,
            None => DEFAULT_RECALCULATION_WINDOW_HOURS,
        };
        if window_hours < 0 {
            bail!("RECALCULATION_WINDOW_HOURS must not be negative");
        }

        let lock_strategy = match lookup("GUILD_LOCK_STRATEGY") {
            Some(raw) => LockStrategy::parse(&raw)?,
            None => LockStrategy::Advisory,
        };

        Ok(Self {
            database_url,
            max_connections,
            lock_strategy,
            engine: EngineSettings {
                recalculation_window: Duration::hours(window_hours),
            },
        })
    }
}
