//! Small hand-built worlds for unit tests.

use std::sync::Arc;

use grandline_logic::config::GenerationConfig;
use grandline_logic::entities::*;
use grandline_logic::ids::*;

use crate::context::{PlayerIdentity, SimContext};
use crate::store::WorldStore;

pub struct Fixture {
    pub ctx: SimContext,
    pub style: StyleCombatId,
}

impl Fixture {
    /// Empty world with one balanced style and `ship_factor` 3.
    pub fn new(seed: u64) -> Self {
        let config = GenerationConfig {
            ship_factor: 3,
            ..GenerationConfig::default()
        };
        Self::with_config(config, seed)
    }

    pub fn with_config(config: GenerationConfig, seed: u64) -> Self {
        let mut store = WorldStore::new();
        let style = store.style_combats.insert(StyleCombat {
            id: StyleCombatId(0),
            name: "Balanced".into(),
            weights: StyleWeights {
                attack: 3,
                defense: 3,
                speed: 2,
                intelligence: 1,
                skill: 2,
                arm_haki: 2,
                obs_haki: 1,
            },
        })
        .unwrap();
        Self {
            ctx: SimContext::new(store, Arc::new(config), PlayerIdentity::none(), seed),
            style,
        }
    }

    pub fn island(&mut self, difficulty: u8) -> IslandId {
        let name = format!("Island {}", self.ctx.store.islands.next_id());
        self.ctx.store.islands.insert(Island {
            id: IslandId(0),
            name,
            difficulty,
        })
        .unwrap()
    }

    pub fn territory(&mut self, island: IslandId, owner: Option<CrewId>) -> TerritoryId {
        self.ctx.store.territories.insert(Territory {
            id: TerritoryId(0),
            island_id: island,
            crew_id: owner,
        })
        .unwrap()
    }

    /// Unaffiliated character whose attack scales with its level.
    pub fn character(&mut self, kind: CharacterType, level: u32) -> CharacterId {
        let name = format!("{} {}", kind.label(), self.ctx.store.characters.next_id());
        let mut c = Character::new(name, kind, level, self.style);
        c.stats.attack = level * 5;
        c.stats.defense = level * 3;
        self.ctx.store.characters.insert(c).unwrap()
    }

    /// Docked crew with a captain and a level-1 ship.
    pub fn crew(&mut self, kind: CrewType, island: IslandId, captain_level: u32) -> (CrewId, CharacterId) {
        let crew = self.ctx.store.crews.insert(Crew {
            id: CrewId(0),
            name: format!("{} crew", kind.label()),
            kind,
            captain_id: None,
            current_island: island,
            docked: true,
            reputation: 0,
            treasury: 0,
            founded_at: 0,
        })
        .unwrap();
        let captain = self.character(kind.character_type(), captain_level);
        self.ctx
            .store
            .characters
            .update(captain, |c| {
                c.crew_id = Some(crew);
                c.position = CrewPosition::Captain;
            })
            .unwrap();
        self.ctx.store.crews.update(crew, |c| c.captain_id = Some(captain)).unwrap();
        self.ctx.store.ships.insert(Ship {
            id: ShipId(0),
            crew_id: crew,
            name: "Going Merry".into(),
            level: 1,
            need_repair: false,
            destroyed: false,
        })
        .unwrap();
        (crew, captain)
    }

    pub fn member(&mut self, crew: CrewId, level: u32, loyalty: i32) -> CharacterId {
        let kind = self.ctx.store.crews.get(crew).unwrap().kind.character_type();
        let id = self.character(kind, level);
        self.ctx
            .store
            .characters
            .update(id, |c| {
                c.crew_id = Some(crew);
                c.loyalty = loyalty;
            })
            .unwrap();
        id
    }

    pub fn make_player(&mut self, id: CharacterId) {
        self.ctx.store.characters.update(id, |c| c.is_player = true).unwrap();
        self.ctx.player = PlayerIdentity::new(id);
    }

    pub fn set_attack(&mut self, id: CharacterId, attack: u32) {
        self.ctx.store.characters.update(id, |c| c.stats.attack = attack).unwrap();
    }

    pub fn get(&self, id: CharacterId) -> &Character {
        self.ctx.store.characters.get(id).unwrap()
    }
}
