use std::collections::HashMap;

use storage::dto::assignment::{ApplyTagAssignmentsRequest, TagSnapshot};
use storage::models::{NewTagHistoryEntry, TagChangeMetadata};
use storage::repository::{MemberRepository, TagHistoryRepository};
use tracing::{info, warn};
use validator::Validate;

use super::LeagueService;
use crate::assignment::{normalize_requests, plan_assignments};
use crate::error::{LeagueError, OperationContext, Result};

const OPERATION: &str = "apply_tag_assignments";

impl LeagueService {
    /// Applies caller-specified `(member, tag)` pairs outside round flow.
    ///
    /// Fails with `TagSwapNeeded` instead of taking a tag from a member who
    /// is not in the batch; swaps among batch members are applied atomically.
    #[tracing::instrument(
        skip(self, request),
        fields(guild_id = %request.guild_id, update_id = %request.update_id)
    )]
    pub async fn apply_tag_assignments(
        &self,
        request: &ApplyTagAssignmentsRequest,
    ) -> Result<TagSnapshot> {
        request.validate()?;
        let requests = normalize_requests(&request.requests)?;
        let guild_id = request.guild_id.as_str();

        let mut tx = self.begin_locked(guild_id, OPERATION).await?;
        let now = self.clock.now();

        let member_ids: Vec<String> = requests.iter().map(|r| r.member_id.clone()).collect();
        let tags: Vec<i32> = requests.iter().map(|r| r.tag_number).collect();

        MemberRepository::new(&mut *tx)
            .upsert_active(guild_id, &member_ids, now)
            .await
            .in_op(OPERATION)?;

        let current_tags: HashMap<String, Option<i32>> = MemberRepository::new(&mut *tx)
            .find_many(guild_id, &member_ids)
            .await
            .in_op(OPERATION)?
            .into_iter()
            .map(|m| (m.member_id, m.current_tag))
            .collect();

        let holders: HashMap<i32, String> = MemberRepository::new(&mut *tx)
            .holders_of(guild_id, &tags)
            .await
            .in_op(OPERATION)?
            .into_iter()
            .map(|h| (h.tag_number, h.member_id))
            .collect();

        let plan = match plan_assignments(guild_id, &requests, &current_tags, &holders) {
            Ok(plan) => plan,
            Err(LeagueError::TagSwapNeeded(swap)) => {
                warn!(
                    requestor = %swap.requestor_id,
                    holder = %swap.current_holder_id,
                    tag = swap.target_tag,
                    "assignment needs an explicit swap"
                );
                return Err(LeagueError::TagSwapNeeded(swap));
            }
            Err(e) => return Err(e),
        };

        MemberRepository::new(&mut *tx)
            .reassign_tags(guild_id, &plan.moves, now)
            .await
            .in_op(OPERATION)?;

        let reason = request.source.ledger_reason();
        let entries: Vec<NewTagHistoryEntry> = plan
            .changes
            .iter()
            .map(|change| NewTagHistoryEntry {
                round_id: None,
                tag_number: change.tag_number,
                old_member_id: change.old_member_id.clone(),
                new_member_id: change.new_member_id.clone(),
                reason,
                metadata: TagChangeMetadata::assignment(request.source.as_str(), request.update_id),
            })
            .collect();

        TagHistoryRepository::new(&mut *tx)
            .append(guild_id, &entries, now)
            .await
            .in_op(OPERATION)?;

        let tags = MemberRepository::new(&mut *tx)
            .tagged_members(guild_id)
            .await
            .in_op(OPERATION)?;

        tx.commit().await.in_op(OPERATION)?;

        info!(
            requested = requests.len(),
            changed = plan.changes.len(),
            source = request.source.as_str(),
            "tag assignments applied"
        );

        Ok(TagSnapshot {
            guild_id: guild_id.to_string(),
            tags,
            changes: plan.changes,
        })
    }
}
