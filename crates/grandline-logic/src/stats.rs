//! Stat growth: level-up budgets, initial stat rolls and the king's haki gate.
//!
//! A combat style assigns a weight to each growth axis. Level-ups spend their
//! budget proportionally to those weights; newly generated characters draw
//! their points one at a time from a weighted pool instead.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::config::GenerationConfig;
use crate::entities::{Character, StatAxis, Stats, StyleCombat, StyleWeights};

pub const STAT_POINTS_PER_LEVEL: u32 = 5;
/// Haki axes stay locked below this level; king's haki needs it too.
pub const HAKI_UNLOCK_LEVEL: u32 = 50;
/// No single axis may take more than this share of a random distribution.
pub const MAX_AXIS_SHARE: f64 = 0.6;

pub fn stat_points_for_levels(levels: u32) -> u32 {
    levels.saturating_mul(STAT_POINTS_PER_LEVEL)
}

/// Points assigned per growth axis, indexed by [`StatAxis::index`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatAllocation([u32; 7]);

impl StatAllocation {
    pub fn get(&self, axis: StatAxis) -> u32 {
        self.0[axis.index()]
    }

    pub fn total(&self) -> u32 {
        self.0.iter().sum()
    }

    pub fn apply_to(&self, stats: &mut Stats) {
        for axis in StatAxis::ALL {
            stats.add(axis, self.get(axis));
        }
    }
}

/// Growth weights for a character of `level` following `style`.
///
/// Haki axes weigh zero until [`HAKI_UNLOCK_LEVEL`]. If that leaves nothing,
/// the non-haki axes share evenly.
pub fn growth_priorities(style: &StyleWeights, level: u32) -> [(StatAxis, u32); 7] {
    let mut priorities = StatAxis::ALL.map(|axis| {
        let weight = if axis.is_haki() && level < HAKI_UNLOCK_LEVEL {
            0
        } else {
            style.get(axis)
        };
        (axis, weight)
    });
    if priorities.iter().all(|(_, w)| *w == 0) {
        for (axis, weight) in priorities.iter_mut() {
            if !axis.is_haki() || level >= HAKI_UNLOCK_LEVEL {
                *weight = 1;
            }
        }
    }
    priorities
}

/// Split `total` points proportionally to the weights, handing leftover
/// points to the largest fractional shares (earlier axes win ties).
pub fn distribute_points_proportionally(total: u32, priorities: &[(StatAxis, u32)]) -> StatAllocation {
    let mut allocation = StatAllocation::default();
    let weight_sum: u64 = priorities.iter().map(|(_, w)| *w as u64).sum();
    if total == 0 || weight_sum == 0 {
        return allocation;
    }

    let mut remainders = Vec::with_capacity(priorities.len());
    let mut assigned = 0u32;
    for &(axis, weight) in priorities {
        let exact = total as u64 * weight as u64;
        let share = (exact / weight_sum) as u32;
        allocation.0[axis.index()] += share;
        assigned += share;
        remainders.push((exact % weight_sum, axis));
    }

    remainders.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    for (_, axis) in remainders.into_iter().take((total - assigned) as usize) {
        allocation.0[axis.index()] += 1;
    }
    allocation
}

/// Draw `total` points one at a time, each axis with probability proportional
/// to its weight. An axis that reaches `ceil(total × 0.6)` leaves the pool.
/// Points that cannot be placed once every axis is capped are dropped.
pub fn distribute_points_randomly<R: Rng + ?Sized>(
    total: u32,
    priorities: &[(StatAxis, u32)],
    rng: &mut R,
) -> StatAllocation {
    let mut allocation = StatAllocation::default();
    let cap = (total as f64 * MAX_AXIS_SHARE).ceil() as u32;
    let mut weights: Vec<u32> = priorities.iter().map(|(_, w)| *w).collect();

    let mut pool = match WeightedIndex::new(&weights) {
        Ok(pool) => pool,
        Err(_) => return allocation,
    };

    for _ in 0..total {
        let slot = pool.sample(rng);
        let axis = priorities[slot].0;
        allocation.0[axis.index()] += 1;

        if allocation.get(axis) >= cap {
            weights[slot] = 0;
            pool = match WeightedIndex::new(&weights) {
                Ok(pool) => pool,
                Err(_) => break,
            };
        }
    }
    allocation
}

/// What a level-up did to a character's stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatGrowth {
    pub allocation: StatAllocation,
    pub devil_fruit_points: u32,
    pub king_haki_awakened: bool,
}

/// Grow `character`'s stats for `levels_gained` new levels. The character's
/// level must already be updated.
pub fn increase_stats<R: Rng + ?Sized>(
    character: &mut Character,
    style: &StyleCombat,
    levels_gained: u32,
    config: &GenerationConfig,
    rng: &mut R,
) -> StatGrowth {
    let priorities = growth_priorities(&style.weights, character.level);
    let allocation = distribute_points_proportionally(stat_points_for_levels(levels_gained), &priorities);
    allocation.apply_to(&mut character.stats);

    let devil_fruit_points = if character.owns_devil_fruit() { levels_gained } else { 0 };
    character.stats.devil_fruit = character.stats.devil_fruit.saturating_add(devil_fruit_points);

    let king_haki_awakened = try_awaken_king_haki(character, config.allow_king_haki_for, rng);

    StatGrowth {
        allocation,
        devil_fruit_points,
        king_haki_awakened,
    }
}

/// Roll the one-time king's haki awakening. Returns `true` only on the call
/// that unlocks it.
pub fn try_awaken_king_haki<R: Rng + ?Sized>(character: &mut Character, threshold: f64, rng: &mut R) -> bool {
    if character.level < HAKI_UNLOCK_LEVEL
        || character.stats.king_haki > 0
        || character.potential_king_haki < threshold
    {
        return false;
    }
    if rng.gen::<f64>() < character.potential_king_haki {
        character.stats.king_haki = 1;
        true
    } else {
        false
    }
}

/// Starting stats for a new character of `level`.
pub fn generate_stats<R: Rng + ?Sized>(
    level: u32,
    style: &StyleCombat,
    owns_fruit: bool,
    potential: f64,
    config: &GenerationConfig,
    rng: &mut R,
) -> Stats {
    let priorities = growth_priorities(&style.weights, level);
    let mut stats = Stats::default();
    distribute_points_randomly(stat_points_for_levels(level), &priorities, rng).apply_to(&mut stats);
    if owns_fruit {
        stats.devil_fruit = level;
    }
    if level >= HAKI_UNLOCK_LEVEL && potential >= config.allow_king_haki_for && rng.gen::<f64>() < potential {
        stats.king_haki = 1;
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::CharacterType;
    use crate::ids::{DevilFruitId, StyleCombatId};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn brawler() -> StyleCombat {
        StyleCombat {
            id: StyleCombatId(1),
            name: "Brawler".into(),
            weights: StyleWeights {
                attack: 5,
                defense: 3,
                speed: 2,
                intelligence: 0,
                skill: 0,
                arm_haki: 4,
                obs_haki: 1,
            },
        }
    }

    #[test]
    fn haki_locked_below_fifty() {
        let low = growth_priorities(&brawler().weights, 49);
        assert!(low.iter().filter(|(a, _)| a.is_haki()).all(|(_, w)| *w == 0));
        let high = growth_priorities(&brawler().weights, 50);
        assert_eq!(high[StatAxis::ArmHaki.index()].1, 4);
    }

    #[test]
    fn empty_style_falls_back_to_even_weights() {
        let priorities = growth_priorities(&StyleWeights::default(), 3);
        assert!(priorities.iter().filter(|(a, _)| !a.is_haki()).all(|(_, w)| *w == 1));
    }

    #[test]
    fn proportional_split_spends_whole_budget() {
        let priorities = growth_priorities(&brawler().weights, 10);
        let allocation = distribute_points_proportionally(10, &priorities);
        assert_eq!(allocation.total(), 10);
        // 10 * 5/10, 10 * 3/10, 10 * 2/10
        assert_eq!(allocation.get(StatAxis::Attack), 5);
        assert_eq!(allocation.get(StatAxis::Defense), 3);
        assert_eq!(allocation.get(StatAxis::Speed), 2);
        assert_eq!(allocation.get(StatAxis::ArmHaki), 0);
    }

    #[test]
    fn proportional_split_largest_remainder() {
        let priorities = [(StatAxis::Attack, 1), (StatAxis::Defense, 1), (StatAxis::Speed, 1)];
        let allocation = distribute_points_proportionally(5, &priorities);
        assert_eq!(allocation.get(StatAxis::Attack), 2);
        assert_eq!(allocation.get(StatAxis::Defense), 2);
        assert_eq!(allocation.get(StatAxis::Speed), 1);
    }

    #[test]
    fn random_distribution_respects_cap() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let priorities = [(StatAxis::Attack, 100), (StatAxis::Defense, 1)];
        for _ in 0..20 {
            let allocation = distribute_points_randomly(50, &priorities, &mut rng);
            assert_eq!(allocation.total(), 50);
            assert!(allocation.get(StatAxis::Attack) <= 30);
        }
    }

    #[test]
    fn random_distribution_single_axis_stops_at_cap() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let allocation = distribute_points_randomly(10, &[(StatAxis::Skill, 3)], &mut rng);
        assert_eq!(allocation.get(StatAxis::Skill), 6);
    }

    #[test]
    fn random_distribution_with_no_weights() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let allocation = distribute_points_randomly(10, &[(StatAxis::Skill, 0)], &mut rng);
        assert_eq!(allocation.total(), 0);
    }

    #[test]
    fn increase_stats_adds_fruit_points() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let config = GenerationConfig::default();
        let mut c = Character::new("Luffy", CharacterType::Pirate, 4, StyleCombatId(1));
        c.devil_fruit_id = Some(DevilFruitId(1));
        let growth = increase_stats(&mut c, &brawler(), 2, &config, &mut rng);
        assert_eq!(growth.allocation.total(), 10);
        assert_eq!(growth.devil_fruit_points, 2);
        assert_eq!(c.stats.devil_fruit, 2);
        assert!(!growth.king_haki_awakened);
    }

    #[test]
    fn king_haki_gate() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut c = Character::new("Shanks", CharacterType::Pirate, 49, StyleCombatId(1));
        c.potential_king_haki = 1.0;
        assert!(!try_awaken_king_haki(&mut c, 0.9, &mut rng));
        c.level = 50;
        assert!(try_awaken_king_haki(&mut c, 0.9, &mut rng));
        assert_eq!(c.stats.king_haki, 1);
        // never granted twice
        assert!(!try_awaken_king_haki(&mut c, 0.9, &mut rng));

        let mut low = Character::new("Buggy", CharacterType::Pirate, 60, StyleCombatId(1));
        low.potential_king_haki = 0.5;
        assert!(!try_awaken_king_haki(&mut low, 0.9, &mut rng));
    }

    #[test]
    fn generated_stats_spend_level_budget() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let config = GenerationConfig::default();
        let stats = generate_stats(12, &brawler(), true, 0.0, &config, &mut rng);
        let spent: u32 = StatAxis::ALL.iter().map(|a| stats.get(*a)).sum();
        assert_eq!(spent, 60);
        assert_eq!(stats.arm_haki + stats.obs_haki, 0);
        assert_eq!(stats.devil_fruit, 12);
        assert_eq!(stats.king_haki, 0);
    }
}
