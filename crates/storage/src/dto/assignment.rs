use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::tags::TagChange;
use crate::models::{MemberTag, TagChangeReason};

/// Who asked for an explicit assignment; decides the ledger reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentSource {
    Claim,
    Admin,
}

impl AssignmentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Claim => "claim",
            Self::Admin => "admin",
        }
    }

    pub fn ledger_reason(&self) -> TagChangeReason {
        match self {
            Self::Claim => TagChangeReason::Claim,
            Self::Admin => TagChangeReason::AdminFix,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct TagAssignment {
    #[validate(length(min = 1, max = 64, message = "Member id must be between 1 and 64 characters"))]
    pub member_id: String,

    #[validate(range(min = 1, message = "Tag number must be positive"))]
    pub tag_number: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ApplyTagAssignmentsRequest {
    #[validate(length(min = 1, max = 64, message = "Guild id must be between 1 and 64 characters"))]
    pub guild_id: String,

    #[validate(length(min = 1, message = "At least one assignment is required"), nested)]
    pub requests: Vec<TagAssignment>,

    pub source: AssignmentSource,

    pub update_id: Uuid,
}

/// Normalized guild tag state after an explicit assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagSnapshot {
    pub guild_id: String,
    pub tags: Vec<MemberTag>,
    pub changes: Vec<TagChange>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ResetTagsRequest {
    #[validate(length(min = 1, max = 64, message = "Guild id must be between 1 and 64 characters"))]
    pub guild_id: String,

    #[validate(length(min = 1, message = "Finish order must list at least one member"))]
    pub finish_order: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_positive_tag_is_invalid() {
        let req = ApplyTagAssignmentsRequest {
            guild_id: "g1".to_string(),
            requests: vec![TagAssignment {
                member_id: "d".to_string(),
                tag_number: 0,
            }],
            source: AssignmentSource::Admin,
            update_id: Uuid::new_v4(),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_source_maps_to_ledger_reason() {
        assert_eq!(AssignmentSource::Claim.ledger_reason(), TagChangeReason::Claim);
        assert_eq!(AssignmentSource::Admin.ledger_reason(), TagChangeReason::AdminFix);
    }
}
