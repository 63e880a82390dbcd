use storage::dto::round::PointAward;
use storage::models::Tier;

/// Per-opponent award, indexed `[winner][loser]` with Gold = 0, Silver = 1,
/// Bronze = 2. Beating a higher tier pays more; beating a lower tier pays
/// less or nothing.
pub const AWARD_TABLE: [[i32; 3]; 3] = [
    // loser:  Gold  Silver  Bronze
    /* Gold   */ [2, 1, 0],
    /* Silver */ [4, 2, 1],
    /* Bronze */ [6, 4, 2],
];

fn tier_index(tier: Tier) -> usize {
    match tier {
        Tier::Gold => 0,
        Tier::Silver => 1,
        Tier::Bronze => 2,
    }
}

pub fn points_for_beating(winner: Tier, loser: Tier) -> i32 {
    AWARD_TABLE[tier_index(winner)][tier_index(loser)]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoringEntry {
    pub member_id: String,
    pub finish_rank: i32,
    pub tier: Tier,
}

/// Scores every pairwise matchup in a round. A member beats each opponent
/// with a strictly worse finish rank; equal ranks beat nobody. Awards are
/// returned in finish order.
pub fn calculate_round_points(entries: &[ScoringEntry]) -> Vec<PointAward> {
    let mut ordered: Vec<&ScoringEntry> = entries.iter().collect();
    ordered.sort_by(|a, b| {
        a.finish_rank
            .cmp(&b.finish_rank)
            .then_with(|| a.member_id.cmp(&b.member_id))
    });

    ordered
        .iter()
        .map(|winner| {
            let beaten: Vec<&&ScoringEntry> = ordered
                .iter()
                .filter(|other| other.finish_rank > winner.finish_rank)
                .collect();

            PointAward {
                member_id: winner.member_id.clone(),
                points: beaten
                    .iter()
                    .map(|loser| points_for_beating(winner.tier, loser.tier))
                    .sum(),
                tier: winner.tier,
                opponents_beaten: beaten.len() as i32,
            }
        })
        .collect()
}
