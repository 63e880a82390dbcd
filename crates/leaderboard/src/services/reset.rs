use std::collections::{HashMap, HashSet};

use storage::dto::assignment::ResetTagsRequest;
use storage::dto::tags::TagChange;
use storage::models::{NewTagHistoryEntry, TagChangeMetadata, TagChangeReason};
use storage::repository::{MemberRepository, TagHistoryRepository, TagMove};
use tracing::info;
use validator::Validate;

use super::LeagueService;
use crate::allocation::allocate_from_reset;
use crate::error::{LeagueError, OperationContext, Result};

const OPERATION: &str = "reset_tags";

impl LeagueService {
    /// Clears every tag in the guild and re-seeds `1..=N` from `finish_order`.
    #[tracing::instrument(skip(self, request), fields(guild_id = %request.guild_id))]
    pub async fn reset_tags(&self, request: &ResetTagsRequest) -> Result<Vec<TagChange>> {
        request.validate()?;
        validate_finish_order(&request.finish_order)?;
        let guild_id = request.guild_id.as_str();

        let mut tx = self.begin_locked(guild_id, OPERATION).await?;
        let now = self.clock.now();

        MemberRepository::new(&mut *tx)
            .ensure(guild_id, &request.finish_order, now)
            .await
            .in_op(OPERATION)?;

        let previous_holders: HashMap<i32, String> = MemberRepository::new(&mut *tx)
            .tagged_members(guild_id)
            .await
            .in_op(OPERATION)?
            .into_iter()
            .map(|m| (m.tag_number, m.member_id))
            .collect();

        let allocation = allocate_from_reset(&request.finish_order, &previous_holders);

        let cleared = MemberRepository::new(&mut *tx)
            .clear_all_tags(guild_id, now)
            .await
            .in_op(OPERATION)?;

        let moves: Vec<TagMove> = allocation
            .assignments
            .iter()
            .map(|a| TagMove {
                member_id: a.member_id.clone(),
                tag_number: Some(a.tag_number),
            })
            .collect();

        MemberRepository::new(&mut *tx)
            .reassign_tags(guild_id, &moves, now)
            .await
            .in_op(OPERATION)?;

        let entries: Vec<NewTagHistoryEntry> = allocation
            .changes
            .iter()
            .map(|change| NewTagHistoryEntry {
                round_id: None,
                tag_number: change.tag_number,
                old_member_id: change.old_member_id.clone(),
                new_member_id: change.new_member_id.clone(),
                reason: TagChangeReason::Reset,
                metadata: TagChangeMetadata::reset(),
            })
            .collect();

        TagHistoryRepository::new(&mut *tx)
            .append(guild_id, &entries, now)
            .await
            .in_op(OPERATION)?;

        tx.commit().await.in_op(OPERATION)?;

        info!(
            cleared,
            seeded = allocation.assignments.len(),
            changed = allocation.changes.len(),
            "tags reset"
        );

        Ok(allocation.changes)
    }
}

fn validate_finish_order(finish_order: &[String]) -> Result<()> {
    let mut seen = HashSet::with_capacity(finish_order.len());
    for member_id in finish_order {
        if member_id.is_empty() {
            return Err(LeagueError::validation("finish order contains an empty member id"));
        }
        if !seen.insert(member_id.as_str()) {
            return Err(LeagueError::validation(format!(
                "member {} appears more than once in the finish order",
                member_id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn test_duplicate_member_in_finish_order() {
        assert!(validate_finish_order(&order(&["a", "b", "a"])).is_err());
    }

    #[test]
    fn test_empty_member_in_finish_order() {
        assert!(validate_finish_order(&order(&["a", ""])).is_err());
    }

    #[test]
    fn test_valid_finish_order() {
        assert!(validate_finish_order(&order(&["a", "b", "c"])).is_ok());
    }
}
