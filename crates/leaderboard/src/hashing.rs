//! Canonical digest of a round's inputs.

use sha2::{Digest, Sha256};
use storage::dto::round::RoundParticipant;

const HASH_DOMAIN: &[u8] = b"league-round-v1";

/// SHA-256 over the `(member_id, finish_rank)` pairs sorted by member id,
/// hex encoded. Submission order does not affect the result.
pub fn compute_processing_hash(participants: &[RoundParticipant]) -> String {
    let mut pairs: Vec<(&str, i32)> = participants
        .iter()
        .map(|p| (p.member_id.as_str(), p.finish_rank))
        .collect();
    pairs.sort_unstable();

    let mut hasher = Sha256::new();
    hasher.update(HASH_DOMAIN);
    for (member_id, finish_rank) in pairs {
        // Length prefix keeps ("ab", 1) + ("c", 2) apart from ("a", ...) + ("bc", ...).
        hasher.update((member_id.len() as u64).to_be_bytes());
        hasher.update(member_id.as_bytes());
        hasher.update(finish_rank.to_be_bytes());
    }

    hex::encode(hasher.finalize())
}
