use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One row per round ever processed; updated in place on recalculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct RoundOutcome {
    pub guild_id: String,
    pub round_id: Uuid,
    pub season_id: Option<String>,
    pub processing_hash: String,
    pub processed_at: DateTime<Utc>,
}
