use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A guild member's row in the ledger. Never deleted; tagless members keep
/// `current_tag = None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct LeagueMember {
    pub guild_id: String,
    pub member_id: String,
    pub current_tag: Option<i32>,
    pub last_active_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Projection of who holds which tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, FromRow)]
pub struct MemberTag {
    pub member_id: String,
    pub tag_number: i32,
}
