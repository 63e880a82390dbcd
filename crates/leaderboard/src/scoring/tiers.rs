use storage::models::Tier;

/// Share of the season population (rounded up) whose best tag counts as Gold.
pub const GOLD_PERCENT: i64 = 20;
/// Share of the season population (rounded up) whose best tag counts as
/// Silver or better.
pub const SILVER_PERCENT: i64 = 50;

fn cutoff(population: i64, percent: i64) -> i64 {
    (population * percent + 99) / 100
}

/// Tier of a member from their season-best tag relative to the number of
/// members holding a standing in the season.
pub fn determine_tier(best_tag: Option<i32>, total_season_members: i64) -> Tier {
    let Some(tag) = best_tag else {
        return Tier::Bronze;
    };
    if total_season_members <= 0 || tag <= 0 {
        return Tier::Bronze;
    }

    let tag = i64::from(tag);
    if tag <= cutoff(total_season_members, GOLD_PERCENT) {
        Tier::Gold
    } else if tag <= cutoff(total_season_members, SILVER_PERCENT) {
        Tier::Silver
    } else {
        Tier::Bronze
    }
}

/// Keeps the numerically lowest tag held during the season.
pub fn update_best_tag(previous_best: Option<i32>, new_tag: Option<i32>) -> Option<i32> {
    match (previous_best, new_tag) {
        (Some(prev), Some(new)) => Some(prev.min(new)),
        (prev, None) => prev,
        (None, new) => new,
    }
}
