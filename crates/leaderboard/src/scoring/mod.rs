pub mod points;
pub mod tiers;

pub use points::{ScoringEntry, calculate_round_points, points_for_beating};
pub use tiers::{determine_tier, update_best_tag};
