use serde::{Deserialize, Serialize};

/// One tag that changed hands in an operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagChange {
    pub tag_number: i32,
    pub old_member_id: Option<String>,
    pub new_member_id: String,
}

/// A member's tag after an operation; `None` when they hold no tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantTag {
    pub member_id: String,
    pub tag_number: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagAvailability {
    pub tag_number: i32,
    pub available: bool,
    pub holder_id: Option<String>,
}
