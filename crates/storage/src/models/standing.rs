use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::Tier;

/// Per-member season totals. Created lazily on the member's first scored
/// round; `total_points` always equals the sum of the member's point history
/// rows for the season.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct SeasonStanding {
    pub guild_id: String,
    pub season_id: String,
    pub member_id: String,
    pub total_points: i32,
    pub rounds_played: i32,
    pub season_best_tag: Option<i32>,
    #[sqlx(try_from = "String")]
    pub current_tier: Tier,
    pub updated_at: DateTime<Utc>,
}
