use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::Tier;

/// Append-only record of the points a member earned in one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PointHistory {
    pub id: i64,
    pub guild_id: String,
    pub season_id: String,
    pub member_id: String,
    pub round_id: Uuid,
    pub points: i32,
    pub reason: String,
    #[sqlx(try_from = "String")]
    pub tier: Tier,
    pub opponents: i32,
    pub previous_best_tag: Option<i32>,
    pub awarded_best_tag: Option<i32>,
    #[sqlx(try_from = "String")]
    pub previous_tier: Tier,
    pub created_standing: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPointHistory {
    pub season_id: String,
    pub member_id: String,
    pub round_id: Uuid,
    pub points: i32,
    pub reason: String,
    pub tier: Tier,
    pub opponents: i32,
    /// Season-best tag before this round, and the one this round wrote.
    pub previous_best_tag: Option<i32>,
    pub awarded_best_tag: Option<i32>,
    pub previous_tier: Tier,
    /// The member's standing was created by this round.
    pub created_standing: bool,
}
