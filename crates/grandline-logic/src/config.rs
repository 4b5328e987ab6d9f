//! World generation and simulation parameters.
//!
//! Keys are camelCase on the wire. Older files spell the Shichibukai slot
//! count as `schichibukai`; that key is accepted as an alias.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationConfig {
    /// Member slots per ship level.
    pub ship_factor: u32,
    pub yonkou_count: usize,
    #[serde(alias = "schichibukai", alias = "shichibukai")]
    pub shichibukai_count: usize,
    pub admiral_count: usize,
    pub gorousei_count: usize,
    pub cypher_pol_count: usize,
    /// Fraction of each crew-mate's power added to a fighter.
    pub regular_crew_help: f64,
    /// Fraction of the captain's experience and bounty shared with members.
    pub regular_crew_shared_gain: f64,
    /// Probability that an eligible crew stays docked each movement pass.
    pub docked_factor: f64,
    /// Minimum king's haki potential for the awakening roll.
    pub allow_king_haki_for: f64,
    pub devil_fruit_drop_rate: f64,
    /// Upper bound of sampled encounters per island per pass.
    pub battle_simulated_by_turn: usize,
    /// Battles kept per character in history views.
    pub last_combats: usize,
    pub tuning: SimulationTuning,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            ship_factor: 5,
            yonkou_count: 4,
            shichibukai_count: 7,
            admiral_count: 3,
            gorousei_count: 5,
            cypher_pol_count: 9,
            regular_crew_help: 0.2,
            regular_crew_shared_gain: 0.4,
            docked_factor: 0.9,
            allow_king_haki_for: 0.9,
            devil_fruit_drop_rate: 0.05,
            battle_simulated_by_turn: 12,
            last_combats: 20,
            tuning: SimulationTuning::default(),
        }
    }
}

/// Probabilities and bounds that shape a world pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimulationTuning {
    /// Base chance of a defeated member switching crews.
    pub recruit_base_chance: f64,
    /// Extra recruitment chance scaled by missing loyalty.
    pub recruit_loyalty_weight: f64,
    /// Chance to stop recruiting after each successful recruit.
    pub recruit_stop_chance: f64,
    pub removal_chance: f64,
    pub removal_stop_chance: f64,
    /// Chance that a docked crew sets sail in a movement pass.
    pub move_chance: f64,
    /// Cumulative roll thresholds for picking the destination pool.
    pub easier_pool_chance: f64,
    pub same_pool_chance: f64,
    /// Uniform luck added to a win probability, in both directions.
    pub luck_spread: f64,
    /// Islands handled per encounter step of a cooperative pass.
    pub encounter_islands_per_step: usize,
}

impl Default for SimulationTuning {
    fn default() -> Self {
        Self {
            recruit_base_chance: 0.2,
            recruit_loyalty_weight: 0.1,
            recruit_stop_chance: 0.6,
            removal_chance: 0.1,
            removal_stop_chance: 0.7,
            move_chance: 0.4,
            easier_pool_chance: 0.2,
            same_pool_chance: 0.5,
            luck_spread: 0.05,
            encounter_islands_per_step: 8,
        }
    }
}
