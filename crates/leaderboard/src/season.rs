//! Which season a round scores against.

use storage::models::Season;

/// The active season wins. Without one, a recalculated round falls back to
/// the season it was originally scored in, so a round from a season that has
/// since ended still scores against that season.
pub fn resolve_season_for_round(
    rollback_season_id: Option<&str>,
    active_season: Option<&Season>,
) -> Option<String> {
    match active_season {
        Some(season) => Some(season.id.clone()),
        None => rollback_season_id.map(str::to_string),
    }
}

/// Points are only written when a season could be resolved.
pub fn should_award_points(season_id: Option<&str>) -> bool {
    season_id.is_some()
}
