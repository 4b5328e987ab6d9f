//! Combat power of a character.
//!
//! Power is a weighted sum of stats plus a level term. Every weight is
//! positive, so power never drops when any single stat or the level rises.

use crate::entities::{Character, DevilFruit};

pub const ATTACK_WEIGHT: f64 = 1.2;
pub const DEFENSE_WEIGHT: f64 = 1.0;
pub const SPEED_WEIGHT: f64 = 0.9;
pub const INTELLIGENCE_WEIGHT: f64 = 0.6;
pub const SKILL_WEIGHT: f64 = 0.8;
pub const ARM_HAKI_WEIGHT: f64 = 2.0;
pub const OBS_HAKI_WEIGHT: f64 = 1.6;
pub const KING_HAKI_WEIGHT: f64 = 4.0;
pub const DEVIL_FRUIT_WEIGHT: f64 = 1.5;
pub const LEVEL_WEIGHT: f64 = 2.0;

/// Power of `character`. `devil_fruit` is the fruit it owns, if any; its
/// bonus scales the devil-fruit stat.
pub fn calculate_power(character: &Character, devil_fruit: Option<&DevilFruit>) -> f64 {
    let s = &character.stats;
    let fruit_bonus = devil_fruit.map(|f| f.power_bonus.max(0.0)).unwrap_or(0.0);

    s.attack as f64 * ATTACK_WEIGHT
        + s.defense as f64 * DEFENSE_WEIGHT
        + s.speed as f64 * SPEED_WEIGHT
        + s.intelligence as f64 * INTELLIGENCE_WEIGHT
        + s.skill as f64 * SKILL_WEIGHT
        + s.arm_haki as f64 * ARM_HAKI_WEIGHT
        + s.obs_haki as f64 * OBS_HAKI_WEIGHT
        + s.king_haki as f64 * KING_HAKI_WEIGHT
        + s.devil_fruit as f64 * DEVIL_FRUIT_WEIGHT * (1.0 + fruit_bonus)
        + character.level as f64 * LEVEL_WEIGHT
}

/// Combined power of a crew from its members' individual powers.
pub fn crew_power<I: IntoIterator<Item = f64>>(member_powers: I) -> f64 {
    member_powers.into_iter().sum()
}
