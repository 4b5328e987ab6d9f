//! Experience, bounty and level progression.
//!
//! Rewards are products of independent factors (level gap, power ratio,
//! affiliation matchup, rank, notoriety, special abilities, closeness) clamped
//! to a band that scales with the winner's level. Level-ups cascade: one large
//! reward may carry a character over several thresholds.

use crate::entities::{Character, CharacterType, CrewPosition, Stats};

/// Safety bound on levels gained in one check.
pub const MAX_LEVEL_UPS_PER_CHECK: u32 = 10;

/// A fighter as seen by the reward formulas: the character plus its power.
#[derive(Debug, Clone, Copy)]
pub struct Combatant<'a> {
    pub character: &'a Character,
    pub power: f64,
}

impl<'a> Combatant<'a> {
    pub fn new(character: &'a Character, power: f64) -> Self {
        Self { character, power }
    }
}

// ── Experience ──────────────────────────────────────────────────────────

/// Experience earned by `winner` for defeating `loser`.
pub fn calculate_experience_gain(winner: Combatant<'_>, loser: Combatant<'_>) -> u64 {
    let w = winner.character;
    let l = loser.character;

    let base = 50.0 + l.level as f64 * 25.0;
    let raw = base
        * experience_level_factor(w.level, l.level)
        * experience_power_factor(winner.power, loser.power)
        * experience_type_factor(w.kind, l.kind)
        * position_factor(l.position, 1.5, 1.3, 1.1)
        * experience_bounty_factor(l.bounty)
        * special_ability_factor(&w.stats, &l.stats)
        * closeness_factor(winner.power, loser.power);

    let level = w.level.max(1) as f64;
    let min = (level * 20.0).max(40.0);
    let max = level * 200.0;
    raw.clamp(min, max).ceil() as u64
}

fn experience_level_factor(winner_level: u32, loser_level: u32) -> f64 {
    let diff = loser_level as f64 - winner_level as f64;
    if diff > 0.0 {
        (1.0 + diff * 0.15).min(3.0)
    } else if diff < 0.0 {
        (1.0 + diff * 0.08).max(0.1)
    } else {
        1.0
    }
}

/// Beating a weaker opponent is not penalized here; the level factor and the
/// clamp already keep those rewards small.
fn experience_power_factor(winner_power: f64, loser_power: f64) -> f64 {
    match power_ratio(winner_power, loser_power) {
        Some(ratio) if ratio > 1.0 => (1.0 + (ratio - 1.0) * 0.75).min(2.5),
        _ => 1.0,
    }
}

fn experience_type_factor(winner: CharacterType, loser: CharacterType) -> f64 {
    match (winner, loser) {
        (_, CharacterType::Government) => 1.4,
        (CharacterType::Pirate, CharacterType::Marine) => 1.2,
        (CharacterType::Marine, CharacterType::Pirate) => 1.15,
        _ => 1.0,
    }
}

fn experience_bounty_factor(loser_bounty: u64) -> f64 {
    1.0 + (loser_bounty as f64 / 1_000_000.0 + 1.0).log10() * 0.2
}

// ── Bounty ──────────────────────────────────────────────────────────────

/// Bounty increase earned by `winner` for defeating `loser`.
pub fn calculate_bounty_gain(winner: Combatant<'_>, loser: Combatant<'_>) -> u64 {
    let w = winner.character;
    let l = loser.character;

    let raw = bounty_base(l)
        * bounty_type_factor(w.kind, l.kind)
        * position_factor(l.position, 1.5, 1.2, 1.0)
        * bounty_level_factor(w.level, l.level)
        * bounty_power_factor(winner.power, loser.power)
        * special_ability_factor(&w.stats, &l.stats)
        * notoriety_factor(w.bounty);

    let level = w.level.max(1) as f64;
    let min = (level * 1_000.0).max(10_000.0);
    let max = level * 30_000.0;
    raw.clamp(min, max).floor() as u64
}

/// Share of the loser's bounty that transfers, rising with its size.
fn bounty_base(loser: &Character) -> f64 {
    let bounty = loser.bounty as f64;
    if loser.bounty == 0 {
        return loser.level as f64 * 50_000.0;
    }
    let rate = if bounty >= 1e9 {
        0.125
    } else if bounty >= 1e8 {
        0.11
    } else if bounty >= 1e7 {
        0.10
    } else if bounty >= 1e6 {
        0.09
    } else {
        0.08
    };
    bounty * rate
}

fn bounty_type_factor(winner: CharacterType, loser: CharacterType) -> f64 {
    match (winner, loser) {
        (_, CharacterType::Government) => 2.5,
        (CharacterType::Pirate, CharacterType::Marine) => 1.8,
        (CharacterType::Marine, CharacterType::Pirate) => 1.3,
        (CharacterType::Pirate, CharacterType::Pirate) => 1.2,
        _ => 1.0,
    }
}

fn bounty_level_factor(winner_level: u32, loser_level: u32) -> f64 {
    let diff = loser_level as f64 - winner_level as f64;
    if diff >= 0.0 {
        1.0 + diff * 0.10
    } else {
        (1.0 + diff * 0.05).max(0.3)
    }
}

fn bounty_power_factor(winner_power: f64, loser_power: f64) -> f64 {
    match power_ratio(winner_power, loser_power) {
        Some(ratio) if ratio > 1.0 => (1.0 + (ratio - 1.0) * 0.75).min(2.5),
        Some(ratio) => ratio.max(0.4),
        None => 1.0,
    }
}

/// Already-famous winners make bigger headlines.
fn notoriety_factor(winner_bounty: u64) -> f64 {
    1.0 + (winner_bounty as f64 / 1_000_000.0 + 1.0).log10() * 0.1
}

// ── Shared factors ──────────────────────────────────────────────────────

fn power_ratio(winner_power: f64, loser_power: f64) -> Option<f64> {
    if winner_power > 0.0 && loser_power >= 0.0 {
        Some(loser_power / winner_power)
    } else {
        None
    }
}

fn position_factor(position: CrewPosition, captain: f64, first_mate: f64, specialist: f64) -> f64 {
    match position {
        CrewPosition::Captain => captain,
        CrewPosition::FirstMate => first_mate,
        _ => specialist,
    }
}

fn special_ability_factor(winner: &Stats, loser: &Stats) -> f64 {
    let mut factor = 1.0;
    if loser.king_haki > 0 {
        factor *= 1.5;
    }
    if loser.haki_total() > winner.haki_total() {
        factor *= 1.2;
    }
    if loser.devil_fruit > 0 {
        factor *= 1.3;
    }
    factor
}

/// Close fights are worth more than stomps.
fn closeness_factor(a: f64, b: f64) -> f64 {
    let average = (a + b) / 2.0;
    if average <= 0.0 {
        return 1.0;
    }
    let relative = (a - b).abs() / average;
    if relative < 0.2 {
        1.3
    } else if relative < 0.5 {
        1.1
    } else {
        1.0
    }
}

/// Portion of a reward handed to non-captain crew members.
pub fn shared_reward(amount: u64, fraction: f64) -> u64 {
    (amount as f64 * fraction.clamp(0.0, 1.0)).floor() as u64
}

// ── Levels ──────────────────────────────────────────────────────────────

/// Experience required to advance from `level` to `level + 1`.
pub fn exp_needed(level: u32) -> u64 {
    let l = level as f64;
    (100.0 * (l + 1.0).powf(1.5) + l * 50.0).floor() as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelUpCheck {
    pub should_level_up: bool,
    pub new_level: u32,
    pub remaining_experience: u64,
    /// Threshold for the level after the check.
    pub exp_needed: u64,
    pub levels_gained: u32,
}

/// Subtract thresholds from `experience` while it covers the next level,
/// at most [`MAX_LEVEL_UPS_PER_CHECK`] times.
pub fn check_level_up(level: u32, experience: u64) -> LevelUpCheck {
    let mut new_level = level.max(1);
    let mut remaining = experience;
    let mut levels_gained = 0;

    while levels_gained < MAX_LEVEL_UPS_PER_CHECK {
        let needed = exp_needed(new_level);
        if remaining < needed {
            break;
        }
        remaining -= needed;
        new_level += 1;
        levels_gained += 1;
    }

    LevelUpCheck {
        should_level_up: levels_gained > 0,
        new_level,
        remaining_experience: remaining,
        exp_needed: exp_needed(new_level),
        levels_gained,
    }
}

/// Add `amount` experience to `character` and apply any level-ups.
pub fn apply_experience(character: &mut Character, amount: u64) -> LevelUpCheck {
    let total = character.experience.saturating_add(amount);
    let check = check_level_up(character.level, total);
    character.level = check.new_level;
    character.experience = check.remaining_experience;
    check
}

// ── Loyalty ─────────────────────────────────────────────────────────────

pub const MIN_LOYALTY: i32 = -100;
pub const MAX_LOYALTY: i32 = 100;

pub fn adjust_loyalty(current: i32, delta: i32) -> i32 {
    current.saturating_add(delta).clamp(MIN_LOYALTY, MAX_LOYALTY)
}

pub fn victory_loyalty_gain<R: rand::Rng + ?Sized>(rng: &mut R) -> i32 {
    rng.gen_range(1..=4)
}

pub fn defeat_loyalty_loss<R: rand::Rng + ?Sized>(rng: &mut R) -> i32 {
    -rng.gen_range(1..=3)
}
