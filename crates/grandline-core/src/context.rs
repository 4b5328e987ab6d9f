//! The simulation context threaded through every system.
//!
//! One `SimContext` owns the world: the store, the shared configuration, who
//! the player is, the random source and the events raised since the last
//! drain. The background worker gets its own context built from a snapshot.

use std::sync::Arc;

use grandline_logic::config::GenerationConfig;
use grandline_logic::entities::{Character, Crew, Ship};
use grandline_logic::ids::{CharacterId, CrewId};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::events::WorldEvent;
use crate::store::WorldStore;

/// Which character the player controls, if any.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerIdentity {
    pub character_id: Option<CharacterId>,
}

impl PlayerIdentity {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(character_id: CharacterId) -> Self {
        Self {
            character_id: Some(character_id),
        }
    }

    pub fn character<'a>(&self, store: &'a WorldStore) -> Option<&'a Character> {
        self.character_id.and_then(|id| store.characters.get(id))
    }

    pub fn crew_id(&self, store: &WorldStore) -> Option<CrewId> {
        self.character(store).and_then(|c| c.crew_id)
    }

    pub fn crew<'a>(&self, store: &'a WorldStore) -> Option<&'a Crew> {
        self.crew_id(store).and_then(|id| store.crews.get(id))
    }

    pub fn ship<'a>(&self, store: &'a WorldStore) -> Option<&'a Ship> {
        self.crew_id(store).and_then(|id| store.ship_of(id))
    }

    pub fn is_player_character(&self, character: &Character) -> bool {
        character.is_player || self.character_id == Some(character.id)
    }

    /// A crew is the player's if the player sails with it or captains it.
    pub fn is_player_crew(&self, store: &WorldStore, crew: CrewId) -> bool {
        if self.crew_id(store) == Some(crew) {
            return true;
        }
        store
            .crews
            .get(crew)
            .and_then(|c| c.captain_id)
            .and_then(|captain| store.characters.get(captain))
            .is_some_and(|captain| self.is_player_character(captain))
    }
}

pub struct SimContext {
    pub store: WorldStore,
    pub config: Arc<GenerationConfig>,
    pub player: PlayerIdentity,
    pub rng: ChaCha8Rng,
    pending_events: Vec<WorldEvent>,
}

impl SimContext {
    pub fn new(store: WorldStore, config: Arc<GenerationConfig>, player: PlayerIdentity, seed: u64) -> Self {
        Self {
            store,
            config,
            player,
            rng: ChaCha8Rng::seed_from_u64(seed),
            pending_events: Vec::new(),
        }
    }

    /// Context for a worker: a store snapshot, the same config and player,
    /// an independent random stream.
    pub fn for_snapshot(&self, store: WorldStore, seed: u64) -> Self {
        Self::new(store, Arc::clone(&self.config), self.player, seed)
    }

    pub fn emit(&mut self, event: WorldEvent) {
        log::debug!("world event: {}", event.title);
        self.pending_events.push(event);
    }

    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.pending_events)
    }

    pub fn pending_event_count(&self) -> usize {
        self.pending_events.len()
    }

    pub fn is_player_crew(&self, crew: CrewId) -> bool {
        self.player.is_player_crew(&self.store, crew)
    }
}
