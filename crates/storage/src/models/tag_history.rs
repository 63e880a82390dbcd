use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::ParseEnumError;

/// Why a tag changed hands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagChangeReason {
    Claim,
    RoundSwap,
    AdminFix,
    Reset,
}

impl TagChangeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Claim => "claim",
            Self::RoundSwap => "round_swap",
            Self::AdminFix => "admin_fix",
            Self::Reset => "reset",
        }
    }
}

impl fmt::Display for TagChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TagChangeReason {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "claim" => Ok(Self::Claim),
            "round_swap" => Ok(Self::RoundSwap),
            "admin_fix" => Ok(Self::AdminFix),
            "reset" => Ok(Self::Reset),
            other => Err(ParseEnumError {
                kind: "tag change reason",
                value: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for TagChangeReason {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Typed context stored alongside a ledger entry (JSONB column).
///
/// Every variant carries a schema `version` so old rows stay readable when a
/// variant gains fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TagChangeMetadata {
    Round {
        version: u16,
        finish_rank: i32,
    },
    Assignment {
        version: u16,
        source: String,
        update_id: Uuid,
    },
    /// The reseeded tag number equals the member's 1-based position in the
    /// reset order, so the entry's `tag_number` already records it.
    Reset {
        version: u16,
    },
}

impl TagChangeMetadata {
    pub const VERSION: u16 = 1;

    pub fn round(finish_rank: i32) -> Self {
        Self::Round {
            version: Self::VERSION,
            finish_rank,
        }
    }

    pub fn assignment(source: impl Into<String>, update_id: Uuid) -> Self {
        Self::Assignment {
            version: Self::VERSION,
            source: source.into(),
            update_id,
        }
    }

    pub fn reset() -> Self {
        Self::Reset {
            version: Self::VERSION,
        }
    }
}

/// Immutable ledger row. One per tag that actually changed hands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TagHistoryEntry {
    pub id: i64,
    pub guild_id: String,
    pub round_id: Option<Uuid>,
    pub tag_number: i32,
    pub old_member_id: Option<String>,
    pub new_member_id: String,
    #[sqlx(try_from = "String")]
    pub reason: TagChangeReason,
    #[sqlx(json)]
    pub metadata: TagChangeMetadata,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTagHistoryEntry {
    pub round_id: Option<Uuid>,
    pub tag_number: i32,
    pub old_member_id: Option<String>,
    pub new_member_id: String,
    pub reason: TagChangeReason,
    pub metadata: TagChangeMetadata,
}
