use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StartSeasonRequest {
    #[validate(length(min = 1, max = 64, message = "Guild id must be between 1 and 64 characters"))]
    pub guild_id: String,

    #[validate(length(min = 1, max = 100, message = "Season id must be between 1 and 100 characters"))]
    pub season_id: String,

    #[validate(length(min = 1, max = 100, message = "Season name must be between 1 and 100 characters"))]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EndSeasonRequest {
    #[validate(length(min = 1, max = 64, message = "Guild id must be between 1 and 64 characters"))]
    pub guild_id: String,

    #[validate(length(min = 1, max = 100, message = "Season id must be between 1 and 100 characters"))]
    pub season_id: String,
}
