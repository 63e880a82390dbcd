use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::tags::{ParticipantTag, TagChange};
use crate::models::Tier;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct RoundParticipant {
    #[validate(length(min = 1, max = 64, message = "Member id must be between 1 and 64 characters"))]
    pub member_id: String,

    #[validate(range(min = 1, message = "Finish rank must be >= 1"))]
    pub finish_rank: i32,
}

/// Request payload for scoring a finished round.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProcessRoundRequest {
    #[validate(length(min = 1, max = 64, message = "Guild id must be between 1 and 64 characters"))]
    pub guild_id: String,

    pub round_id: Uuid,

    #[validate(length(min = 1, message = "A round needs at least one participant"), nested)]
    pub participants: Vec<RoundParticipant>,
}

/// Points a member earned in one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointAward {
    pub member_id: String,
    pub points: i32,
    pub tier: Tier,
    pub opponents_beaten: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessRoundResult {
    pub guild_id: String,
    pub round_id: Uuid,
    pub final_tags: Vec<ParticipantTag>,
    pub tag_changes: Vec<TagChange>,
    pub awards: Vec<PointAward>,
    pub season_id: Option<String>,
    pub points_skipped: bool,
    pub was_idempotent: bool,
    pub recalculated: bool,
}
