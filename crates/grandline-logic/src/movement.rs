//! Docking and island-to-island travel rules.
//!
//! Crews only ever sail to an island whose difficulty is within one step of
//! their current one. [`MovementDecision`] is the only way to express a move,
//! and it refuses to exist for a larger jump.

use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

use crate::config::SimulationTuning;
use crate::ids::{CrewId, IslandId};

/// Largest difficulty change allowed in one move.
pub const MAX_DIFFICULTY_STEP: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MovementError {
    #[error("crew {crew} cannot sail from difficulty {from} to {to}")]
    DifficultyJump { crew: CrewId, from: u8, to: u8 },
    #[error("crew {crew} is already at island {island}")]
    SameIsland { crew: CrewId, island: IslandId },
}

/// A validated relocation of one crew.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovementDecision {
    crew: CrewId,
    from_island: IslandId,
    from_difficulty: u8,
    to_island: IslandId,
    to_difficulty: u8,
}

impl MovementDecision {
    pub fn new(
        crew: CrewId,
        from_island: IslandId,
        from_difficulty: u8,
        to_island: IslandId,
        to_difficulty: u8,
    ) -> Result<Self, MovementError> {
        if from_island == to_island {
            return Err(MovementError::SameIsland { crew, island: to_island });
        }
        if from_difficulty.abs_diff(to_difficulty) > MAX_DIFFICULTY_STEP {
            return Err(MovementError::DifficultyJump {
                crew,
                from: from_difficulty,
                to: to_difficulty,
            });
        }
        Ok(Self {
            crew,
            from_island,
            from_difficulty,
            to_island,
            to_difficulty,
        })
    }

    pub fn crew(&self) -> CrewId {
        self.crew
    }

    pub fn from_island(&self) -> IslandId {
        self.from_island
    }

    pub fn to_island(&self) -> IslandId {
        self.to_island
    }

    pub fn difficulty_change(&self) -> i16 {
        self.to_difficulty as i16 - self.from_difficulty as i16
    }
}

/// Dock (`true`) or put to sea (`false`) for this pass.
pub fn roll_docked<R: Rng + ?Sized>(docked_factor: f64, rng: &mut R) -> bool {
    rng.gen::<f64>() < docked_factor
}

pub fn wants_to_move<R: Rng + ?Sized>(tuning: &SimulationTuning, rng: &mut R) -> bool {
    rng.gen::<f64>() < tuning.move_chance
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationPool {
    Easier,
    Same,
    Harder,
}

pub fn choose_pool<R: Rng + ?Sized>(tuning: &SimulationTuning, rng: &mut R) -> DestinationPool {
    let roll = rng.gen::<f64>();
    if roll < tuning.easier_pool_chance {
        DestinationPool::Easier
    } else if roll < tuning.same_pool_chance {
        DestinationPool::Same
    } else {
        DestinationPool::Harder
    }
}

/// Pools to try in order: the chosen one, then same, harder, easier.
pub fn fallback_order(first: DestinationPool) -> [DestinationPool; 3] {
    match first {
        DestinationPool::Easier => [DestinationPool::Easier, DestinationPool::Same, DestinationPool::Harder],
        DestinationPool::Same => [DestinationPool::Same, DestinationPool::Harder, DestinationPool::Easier],
        DestinationPool::Harder => [DestinationPool::Harder, DestinationPool::Same, DestinationPool::Easier],
    }
}

/// Candidate destinations around a crew's current difficulty. The same pool
/// must not contain the crew's current island.
#[derive(Debug, Clone, Default)]
pub struct DestinationPools {
    pub easier: Vec<IslandId>,
    pub same: Vec<IslandId>,
    pub harder: Vec<IslandId>,
}

impl DestinationPools {
    pub fn get(&self, pool: DestinationPool) -> &[IslandId] {
        match pool {
            DestinationPool::Easier => &self.easier,
            DestinationPool::Same => &self.same,
            DestinationPool::Harder => &self.harder,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.easier.is_empty() && self.same.is_empty() && self.harder.is_empty()
    }
}

/// Roll a pool and pick a random island from the first non-empty pool in
/// fallback order. `None` when every pool is empty.
pub fn pick_destination<R: Rng + ?Sized>(
    pools: &DestinationPools,
    tuning: &SimulationTuning,
    rng: &mut R,
) -> Option<IslandId> {
    let first = choose_pool(tuning, rng);
    fallback_order(first)
        .into_iter()
        .map(|pool| pools.get(pool))
        .find(|islands| !islands.is_empty())
        .and_then(|islands| islands.choose(rng).copied())
}
