//! Tag reassignment from finish order.
//!
//! Round processing uses a closed pool: only tags already held by the
//! round's participants are redistributed, and no new tag number is ever
//! minted. Tagless participants stay tagless unless they finish well enough
//! to take a pool tag. League resets are the only path that mints tags.

use std::collections::HashMap;

use storage::dto::tags::{ParticipantTag, TagChange};
use storage::models::MemberTag;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationInput {
    pub member_id: String,
    pub finish_rank: i32,
    pub current_tag: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagAllocation {
    /// Every participant in finish order with the tag they end up holding.
    pub final_tags: Vec<ParticipantTag>,
    /// Tags whose holder changed, ordered by tag number.
    pub changes: Vec<TagChange>,
}

impl TagAllocation {
    /// Participants whose tag differs from what they held before.
    pub fn moved<'a>(&'a self, inputs: &'a [AllocationInput]) -> impl Iterator<Item = &'a ParticipantTag> + 'a {
        let before: HashMap<&str, Option<i32>> = inputs
            .iter()
            .map(|p| (p.member_id.as_str(), p.current_tag))
            .collect();

        self.final_tags.iter().filter(move |p| {
            before
                .get(p.member_id.as_str())
                .is_none_or(|previous| *previous != p.tag_number)
        })
    }
}

/// Redistributes the participants' own tags: best finisher gets the lowest
/// tag in the pool. Ties in finish rank are broken by member id so the
/// result is deterministic.
pub fn allocate_closed_pool(participants: &[AllocationInput]) -> TagAllocation {
    let mut pool: Vec<i32> = participants.iter().filter_map(|p| p.current_tag).collect();
    pool.sort_unstable();

    let previous_holder: HashMap<i32, &str> = participants
        .iter()
        .filter_map(|p| p.current_tag.map(|tag| (tag, p.member_id.as_str())))
        .collect();

    let mut ordered: Vec<&AllocationInput> = participants.iter().collect();
    ordered.sort_by(|a, b| {
        a.finish_rank
            .cmp(&b.finish_rank)
            .then_with(|| a.member_id.cmp(&b.member_id))
    });

    let mut final_tags = Vec::with_capacity(ordered.len());
    let mut changes = Vec::new();

    for (position, participant) in ordered.iter().enumerate() {
        let tag = pool.get(position).copied();

        if let Some(tag) = tag {
            let old_holder = previous_holder.get(&tag).copied();
            if old_holder != Some(participant.member_id.as_str()) {
                changes.push(TagChange {
                    tag_number: tag,
                    old_member_id: old_holder.map(str::to_string),
                    new_member_id: participant.member_id.clone(),
                });
            }
        }

        final_tags.push(ParticipantTag {
            member_id: participant.member_id.clone(),
            tag_number: tag,
        });
    }

    changes.sort_by_key(|c| c.tag_number);

    TagAllocation {
        final_tags,
        changes,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetAllocation {
    pub assignments: Vec<MemberTag>,
    pub changes: Vec<TagChange>,
}

/// Re-seeds the whole league: position `i` in `finish_order` gets tag `i + 1`.
/// `previous_holders` maps every tag currently held in the guild to its
/// holder; a change is only emitted when tag `i + 1` lands on someone new.
pub fn allocate_from_reset(
    finish_order: &[String],
    previous_holders: &HashMap<i32, String>,
) -> ResetAllocation {
    let mut assignments = Vec::with_capacity(finish_order.len());
    let mut changes = Vec::new();

    for (position, member_id) in finish_order.iter().enumerate() {
        let tag_number = position as i32 + 1;
        let old_holder = previous_holders.get(&tag_number);

        if old_holder != Some(member_id) {
            changes.push(TagChange {
                tag_number,
                old_member_id: old_holder.cloned(),
                new_member_id: member_id.clone(),
            });
        }

        assignments.push(MemberTag {
            member_id: member_id.clone(),
            tag_number,
        });
    }

    ResetAllocation {
        assignments,
        changes,
    }
}
