//! Conflict detection for explicit tag assignments.

use std::collections::{HashMap, HashSet};

use storage::dto::assignment::TagAssignment;
use storage::dto::tags::TagChange;
use storage::repository::TagMove;

use crate::error::{LeagueError, Result, TagSwapNeeded};

/// Collapses exact duplicates and rejects ambiguous batches: one member
/// asking for two different tags, or two members asking for the same tag.
pub fn normalize_requests(requests: &[TagAssignment]) -> Result<Vec<TagAssignment>> {
    let mut by_member: HashMap<&str, i32> = HashMap::new();
    let mut by_tag: HashMap<i32, &str> = HashMap::new();
    let mut normalized = Vec::with_capacity(requests.len());

    for request in requests {
        if request.tag_number <= 0 {
            return Err(LeagueError::validation(format!(
                "tag number must be positive, got {} for member {}",
                request.tag_number, request.member_id
            )));
        }

        if let Some(existing) = by_member.get(request.member_id.as_str()) {
            if *existing != request.tag_number {
                return Err(LeagueError::validation(format!(
                    "member {} requested both tag {} and tag {}",
                    request.member_id, existing, request.tag_number
                )));
            }
            continue;
        }

        if let Some(other) = by_tag.get(&request.tag_number) {
            return Err(LeagueError::validation(format!(
                "tag {} requested by both {} and {}",
                request.tag_number, other, request.member_id
            )));
        }

        by_member.insert(&request.member_id, request.tag_number);
        by_tag.insert(request.tag_number, &request.member_id);
        normalized.push(request.clone());
    }

    Ok(normalized)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentPlan {
    pub moves: Vec<TagMove>,
    pub changes: Vec<TagChange>,
}

/// Works out which members must move. `current_tags` holds the requestors'
/// tags before the batch; `holders` maps each requested tag to its current
/// holder. Fails with `TagSwapNeeded` rather than displace a member who is
/// not part of the batch.
pub fn plan_assignments(
    guild_id: &str,
    requests: &[TagAssignment],
    current_tags: &HashMap<String, Option<i32>>,
    holders: &HashMap<i32, String>,
) -> Result<AssignmentPlan> {
    let in_batch: HashSet<&str> = requests.iter().map(|r| r.member_id.as_str()).collect();

    for request in requests {
        if let Some(holder) = holders.get(&request.tag_number)
            && holder != &request.member_id
            && !in_batch.contains(holder.as_str())
        {
            return Err(LeagueError::TagSwapNeeded(TagSwapNeeded {
                guild_id: guild_id.to_string(),
                requestor_id: request.member_id.clone(),
                current_holder_id: holder.clone(),
                target_tag: request.tag_number,
                requestor_current_tag: current_tags.get(&request.member_id).copied().flatten(),
            }));
        }
    }

    let mut moves = Vec::new();
    let mut changes = Vec::new();

    for request in requests {
        let previous = current_tags.get(&request.member_id).copied().flatten();
        if previous == Some(request.tag_number) {
            continue;
        }

        moves.push(TagMove {
            member_id: request.member_id.clone(),
            tag_number: Some(request.tag_number),
        });
        changes.push(TagChange {
            tag_number: request.tag_number,
            old_member_id: holders.get(&request.tag_number).cloned(),
            new_member_id: request.member_id.clone(),
        });
    }

    changes.sort_by_key(|c| c.tag_number);

    Ok(AssignmentPlan { moves, changes })
}
