//! Candidate ordering and slot assignment for the world's rank tables.

use std::cmp::Ordering;

use crate::ids::{CharacterId, IslandId};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankCandidate {
    pub character_id: CharacterId,
    pub power: f64,
    pub base_island: Option<IslandId>,
}

/// Strongest first; equal power goes to the lower id so reruns are stable.
pub fn by_power_desc(a: &RankCandidate, b: &RankCandidate) -> Ordering {
    b.power
        .total_cmp(&a.power)
        .then(a.character_id.cmp(&b.character_id))
}

/// Candidates split into a top tier and the tier right below it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TierSplit {
    pub first: Vec<RankCandidate>,
    pub second: Vec<RankCandidate>,
    /// Slots left empty for lack of candidates.
    pub shortfall: usize,
}

/// Sort `candidates` and fill `first_slots`, then `second_slots`.
pub fn split_tiers(mut candidates: Vec<RankCandidate>, first_slots: usize, second_slots: usize) -> TierSplit {
    candidates.sort_by(by_power_desc);
    let wanted = first_slots + second_slots;
    let shortfall = wanted.saturating_sub(candidates.len());
    candidates.truncate(wanted);

    let second = if candidates.len() > first_slots {
        candidates.split_off(first_slots)
    } else {
        Vec::new()
    };
    TierSplit {
        first: candidates,
        second,
        shortfall,
    }
}

/// Island an agent is posted to. Pure in the character id, so reassigning
/// ranks never shuffles postings.
pub fn cypher_pol_island(character_id: CharacterId, islands: &[IslandId]) -> Option<IslandId> {
    if islands.is_empty() {
        return None;
    }
    let index = (mix64(character_id.raw() as u64) % islands.len() as u64) as usize;
    Some(islands[index])
}

fn mix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}
