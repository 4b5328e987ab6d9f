//! Crew capacity and who may change crews.

use std::cmp::Ordering;

use rand::Rng;

use crate::config::SimulationTuning;
use crate::entities::{Character, CharacterType, CrewType, Ship};
use crate::ids::CharacterId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrewCapacityInfo {
    pub current_members: u32,
    pub max_capacity: u32,
    pub has_space: bool,
}

impl CrewCapacityInfo {
    /// Capacity of a crew with `members` aboard a ship of `ship_level`.
    /// A crew without a ship counts as level 1.
    pub fn new(members: u32, ship_level: Option<u32>, ship_factor: u32) -> Self {
        let max_capacity = Ship::capacity_for(ship_level.unwrap_or(1), ship_factor);
        Self {
            current_members: members,
            max_capacity,
            has_space: members < max_capacity,
        }
    }

    pub fn free_slots(&self) -> u32 {
        self.max_capacity.saturating_sub(self.current_members)
    }
}

/// Chance that a defeated member with `loyalty` joins the victors.
pub fn recruitment_chance(loyalty: i32, tuning: &SimulationTuning) -> f64 {
    let missing_loyalty = 1.0 - loyalty as f64 / 100.0;
    (tuning.recruit_base_chance + missing_loyalty * tuning.recruit_loyalty_weight).clamp(0.0, 1.0)
}

/// Captains and the player never switch crews on their own.
pub fn is_poachable(member: &Character) -> bool {
    !member.is_captain() && !member.is_player
}

/// Least loyal first; ties by id.
pub fn by_ascending_loyalty(a: &Character, b: &Character) -> Ordering {
    a.loyalty.cmp(&b.loyalty).then(a.id.cmp(&b.id))
}

pub fn roll<R: Rng + ?Sized>(chance: f64, rng: &mut R) -> bool {
    rng.gen::<f64>() < chance
}

/// The highest-level orphan leads the new crew; ties go to the lowest id.
pub fn choose_orphan_captain(members: &[Character]) -> Option<CharacterId> {
    members
        .iter()
        .max_by(|a, b| a.level.cmp(&b.level).then(b.id.cmp(&a.id)))
        .map(|c| c.id)
}

/// Which characters a crew of `crew` will take on when the player asks.
pub fn is_type_compatible(crew: CrewType, recruit: CharacterType) -> bool {
    use CharacterType::*;
    match crew {
        CrewType::Pirate => matches!(recruit, Pirate | Civilian | BountyHunter),
        CrewType::Marine => matches!(recruit, Marine | Civilian),
        CrewType::BountyHunter => matches!(recruit, BountyHunter | Civilian | Pirate),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecruitmentOffer {
    pub compatible: bool,
    pub chance: f64,
}

pub const PLAYER_RECRUIT_BASE: f64 = 0.35;

/// Odds of talking `target` into the player's crew. The power gap, the
/// target's loyalty and its kindness each shift the base chance.
pub fn evaluate_player_recruitment(
    crew: CrewType,
    recruiter_power: f64,
    target: &Character,
    target_power: f64,
) -> RecruitmentOffer {
    if target.is_player || target.is_captain() || !is_type_compatible(crew, target.kind) {
        return RecruitmentOffer {
            compatible: false,
            chance: 0.0,
        };
    }

    let power_term = if target_power > 0.0 {
        ((recruiter_power / target_power) - 1.0).clamp(-1.0, 1.0) * 0.2
    } else {
        0.2
    };
    let loyalty_term = -(target.loyalty as f64 / 100.0) * 0.2;
    let kindness_term = (target.kindness as f64 / 100.0) * 0.1;

    RecruitmentOffer {
        compatible: true,
        chance: (PLAYER_RECRUIT_BASE + power_term + loyalty_term + kindness_term).clamp(0.05, 0.9),
    }
}
