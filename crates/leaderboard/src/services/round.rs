use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use storage::dto::round::{PointAward, ProcessRoundRequest, ProcessRoundResult, RoundParticipant};
use storage::dto::tags::ParticipantTag;
use storage::models::{NewPointHistory, NewTagHistoryEntry, TagChangeMetadata, TagChangeReason, Tier};
use storage::repository::{
    MemberRepository, PointHistoryRepository, RoundOutcomeRepository, SeasonRepository,
    StandingRepository, StandingUpdate, TagHistoryRepository, TagMove,
};
use tracing::{debug, info, warn};
use validator::Validate;

use super::LeagueService;
use super::rollback::rollback_round_points;
use crate::allocation::{AllocationInput, TagAllocation, allocate_closed_pool};
use crate::error::{LeagueError, OperationContext, Result};
use crate::hashing::compute_processing_hash;
use crate::idempotency::{RoundDecision, decide};
use crate::scoring::{ScoringEntry, calculate_round_points, determine_tier, update_best_tag};
use crate::season::{resolve_season_for_round, should_award_points};

const OPERATION: &str = "process_round";
const POINTS_REASON: &str = "round";

impl LeagueService {
    /// Applies a finished round: redistributes the participants' tags,
    /// records the ledger, and scores the round against the resolved season.
    ///
    /// Resubmitting identical inputs returns the persisted state with
    /// `was_idempotent = true`. Changed inputs are recalculated inside the
    /// recalculation window and rejected after it.
    #[tracing::instrument(
        skip(self, request),
        fields(guild_id = %request.guild_id, round_id = %request.round_id)
    )]
    pub async fn process_round(&self, request: &ProcessRoundRequest) -> Result<ProcessRoundResult> {
        request.validate()?;
        ensure_distinct_participants(&request.participants)?;

        let guild_id = request.guild_id.as_str();
        let round_id = request.round_id;
        let processing_hash = compute_processing_hash(&request.participants);

        let mut tx = self.begin_locked(guild_id, OPERATION).await?;
        let now = self.clock.now();

        let existing = RoundOutcomeRepository::new(&mut *tx)
            .find(guild_id, round_id)
            .await
            .in_op(OPERATION)?;

        let decision = decide(
            existing.as_ref(),
            &processing_hash,
            now,
            self.settings.recalculation_window,
        );

        let rollback_season_id = match decision {
            RoundDecision::Fresh => None,
            RoundDecision::Replay { season_id } => {
                debug!("identical round resubmitted, returning persisted state");
                let result = replay(&mut tx, request, season_id).await?;
                tx.commit().await.in_op(OPERATION)?;
                return Ok(result);
            }
            RoundDecision::Stale { processed_at } => {
                warn!(%processed_at, "rejecting recalculation outside the window");
                return Err(LeagueError::StaleRecalculation {
                    round_id,
                    processed_at,
                    window_secs: self.settings.recalculation_window.num_seconds(),
                });
            }
            RoundDecision::Recalculate { previous_season_id } => {
                let summary = rollback_round_points(&mut tx, guild_id, round_id, now, OPERATION).await?;
                debug!(
                    rows_removed = summary.rows_removed,
                    points_removed = summary.points_removed,
                    "recalculating round"
                );
                Some(previous_season_id)
            }
        };
        let recalculated = rollback_season_id.is_some();

        let member_ids: Vec<String> = request
            .participants
            .iter()
            .map(|p| p.member_id.clone())
            .collect();

        MemberRepository::new(&mut *tx)
            .upsert_active(guild_id, &member_ids, now)
            .await
            .in_op(OPERATION)?;

        let current: HashMap<String, Option<i32>> = MemberRepository::new(&mut *tx)
            .find_many(guild_id, &member_ids)
            .await
            .in_op(OPERATION)?
            .into_iter()
            .map(|m| (m.member_id, m.current_tag))
            .collect();

        let inputs: Vec<AllocationInput> = request
            .participants
            .iter()
            .map(|p| AllocationInput {
                member_id: p.member_id.clone(),
                finish_rank: p.finish_rank,
                current_tag: current.get(&p.member_id).copied().flatten(),
            })
            .collect();

        let allocation = allocate_closed_pool(&inputs);
        apply_allocation(&mut tx, guild_id, request, &inputs, &allocation, now).await?;

        let active = SeasonRepository::new(&mut *tx)
            .active(guild_id)
            .await
            .in_op(OPERATION)?;
        let season_id =
            resolve_season_for_round(rollback_season_id.flatten().as_deref(), active.as_ref());

        let points_skipped = !should_award_points(season_id.as_deref());
        let awards = match season_id.as_deref() {
            Some(season_id) => {
                score_round(&mut tx, guild_id, season_id, request, &allocation, now).await?
            }
            None => {
                debug!("no resolvable season, skipping points");
                Vec::new()
            }
        };

        RoundOutcomeRepository::new(&mut *tx)
            .upsert(guild_id, round_id, season_id.as_deref(), &processing_hash, now)
            .await
            .in_op(OPERATION)?;

        tx.commit().await.in_op(OPERATION)?;

        info!(
            participants = request.participants.len(),
            tag_changes = allocation.changes.len(),
            season_id = season_id.as_deref().unwrap_or("-"),
            points_skipped,
            recalculated,
            "round processed"
        );

        Ok(ProcessRoundResult {
            guild_id: guild_id.to_string(),
            round_id,
            final_tags: allocation.final_tags,
            tag_changes: allocation.changes,
            awards,
            season_id,
            points_skipped,
            was_idempotent: false,
            recalculated,
        })
    }
}

fn ensure_distinct_participants(participants: &[RoundParticipant]) -> Result<()> {
    let mut seen = HashSet::with_capacity(participants.len());
    for participant in participants {
        if !seen.insert(participant.member_id.as_str()) {
            return Err(LeagueError::validation(format!(
                "member {} appears more than once in the round",
                participant.member_id
            )));
        }
    }
    Ok(())
}

/// Participants in finish order, ties broken by member id.
fn finish_order(participants: &[RoundParticipant]) -> Vec<&RoundParticipant> {
    let mut ordered: Vec<&RoundParticipant> = participants.iter().collect();
    ordered.sort_by(|a, b| {
        a.finish_rank
            .cmp(&b.finish_rank)
            .then_with(|| a.member_id.cmp(&b.member_id))
    });
    ordered
}

async fn replay(
    conn: &mut PgConnection,
    request: &ProcessRoundRequest,
    season_id: Option<String>,
) -> Result<ProcessRoundResult> {
    let guild_id = request.guild_id.as_str();
    let member_ids: Vec<String> = request
        .participants
        .iter()
        .map(|p| p.member_id.clone())
        .collect();

    let current: HashMap<String, Option<i32>> = MemberRepository::new(&mut *conn)
        .find_many(guild_id, &member_ids)
        .await
        .in_op(OPERATION)?
        .into_iter()
        .map(|m| (m.member_id, m.current_tag))
        .collect();

    let final_tags = finish_order(&request.participants)
        .into_iter()
        .map(|p| ParticipantTag {
            member_id: p.member_id.clone(),
            tag_number: current.get(&p.member_id).copied().flatten(),
        })
        .collect();

    let awards = PointHistoryRepository::new(&mut *conn)
        .for_round(guild_id, request.round_id)
        .await
        .in_op(OPERATION)?
        .into_iter()
        .map(|row| PointAward {
            member_id: row.member_id,
            points: row.points,
            tier: row.tier,
            opponents_beaten: row.opponents,
        })
        .collect();

    Ok(ProcessRoundResult {
        guild_id: guild_id.to_string(),
        round_id: request.round_id,
        final_tags,
        tag_changes: Vec::new(),
        awards,
        points_skipped: season_id.is_none(),
        season_id,
        was_idempotent: true,
        recalculated: false,
    })
}

async fn apply_allocation(
    conn: &mut PgConnection,
    guild_id: &str,
    request: &ProcessRoundRequest,
    inputs: &[AllocationInput],
    allocation: &TagAllocation,
    now: DateTime<Utc>,
) -> Result<()> {
    let moves: Vec<TagMove> = allocation
        .moved(inputs)
        .map(|p| TagMove {
            member_id: p.member_id.clone(),
            tag_number: p.tag_number,
        })
        .collect();

    debug!(moves = moves.len(), "applying closed-pool allocation");

    MemberRepository::new(&mut *conn)
        .reassign_tags(guild_id, &moves, now)
        .await
        .in_op(OPERATION)?;

    let ranks: HashMap<&str, i32> = request
        .participants
        .iter()
        .map(|p| (p.member_id.as_str(), p.finish_rank))
        .collect();

    let entries: Vec<NewTagHistoryEntry> = allocation
        .changes
        .iter()
        .map(|change| NewTagHistoryEntry {
            round_id: Some(request.round_id),
            tag_number: change.tag_number,
            old_member_id: change.old_member_id.clone(),
            new_member_id: change.new_member_id.clone(),
            reason: TagChangeReason::RoundSwap,
            metadata: TagChangeMetadata::round(
                ranks.get(change.new_member_id.as_str()).copied().unwrap_or_default(),
            ),
        })
        .collect();

    TagHistoryRepository::new(&mut *conn)
        .append(guild_id, &entries, now)
        .await
        .in_op(OPERATION)?;

    Ok(())
}

/// Enrolls participants in the season, derives tiers from their updated
/// season-best tags, writes one point history row per participant and
/// folds the awards into the standings.
async fn score_round(
    conn: &mut PgConnection,
    guild_id: &str,
    season_id: &str,
    request: &ProcessRoundRequest,
    allocation: &TagAllocation,
    now: DateTime<Utc>,
) -> Result<Vec<PointAward>> {
    let member_ids: Vec<String> = request
        .participants
        .iter()
        .map(|p| p.member_id.clone())
        .collect();

    let created: HashSet<String> = StandingRepository::new(&mut *conn)
        .enroll(guild_id, season_id, &member_ids, now)
        .await
        .in_op(OPERATION)?
        .into_iter()
        .collect();

    let previous: HashMap<String, (Option<i32>, Tier)> = StandingRepository::new(&mut *conn)
        .find_many(guild_id, season_id, &member_ids)
        .await
        .in_op(OPERATION)?
        .into_iter()
        .map(|s| (s.member_id, (s.season_best_tag, s.current_tier)))
        .collect();

    let population = StandingRepository::new(&mut *conn)
        .population(guild_id, season_id)
        .await
        .in_op(OPERATION)?;

    let final_tags: HashMap<&str, Option<i32>> = allocation
        .final_tags
        .iter()
        .map(|p| (p.member_id.as_str(), p.tag_number))
        .collect();

    let best_tags: HashMap<&str, Option<i32>> = request
        .participants
        .iter()
        .map(|p| {
            let prior_best = previous.get(&p.member_id).and_then(|(best, _)| *best);
            let latest = final_tags.get(p.member_id.as_str()).copied().flatten();
            (p.member_id.as_str(), update_best_tag(prior_best, latest))
        })
        .collect();

    let entries: Vec<ScoringEntry> = request
        .participants
        .iter()
        .map(|p| ScoringEntry {
            member_id: p.member_id.clone(),
            finish_rank: p.finish_rank,
            tier: determine_tier(
                best_tags.get(p.member_id.as_str()).copied().flatten(),
                population,
            ),
        })
        .collect();

    let awards = calculate_round_points(&entries);

    let rows: Vec<NewPointHistory> = awards
        .iter()
        .map(|award| NewPointHistory {
            season_id: season_id.to_string(),
            member_id: award.member_id.clone(),
            round_id: request.round_id,
            points: award.points,
            reason: POINTS_REASON.to_string(),
            tier: award.tier,
            opponents: award.opponents_beaten,
            previous_best_tag: previous.get(&award.member_id).and_then(|(best, _)| *best),
            awarded_best_tag: best_tags.get(award.member_id.as_str()).copied().flatten(),
            previous_tier: previous
                .get(&award.member_id)
                .map_or(Tier::Bronze, |(_, tier)| *tier),
            created_standing: created.contains(&award.member_id),
        })
        .collect();

    PointHistoryRepository::new(&mut *conn)
        .append(guild_id, &rows, now)
        .await
        .in_op(OPERATION)?;

    for award in &awards {
        let update = StandingUpdate {
            member_id: award.member_id.clone(),
            points: award.points,
            season_best_tag: best_tags.get(award.member_id.as_str()).copied().flatten(),
            tier: award.tier,
        };
        StandingRepository::new(&mut *conn)
            .record_round(guild_id, season_id, &update, now)
            .await
            .in_op(OPERATION)?;
    }

    debug!(season_id, population, awards = awards.len(), "round scored");

    Ok(awards)
}
