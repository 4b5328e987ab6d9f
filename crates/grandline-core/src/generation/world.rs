//! Procedural creation of a starting world.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use grandline_logic::config::GenerationConfig;
use grandline_logic::entities::*;
use grandline_logic::ids::*;
use grandline_logic::movement::roll_docked;
use grandline_logic::stats::generate_stats;

use super::names::{character_name, devil_fruit_name, island_name, ship_name};
use crate::context::PlayerIdentity;
use crate::error::StoreError;
use crate::store::WorldStore;
use crate::systems::membership::crew_suffix;

/// Shape of a generated world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorldGenConfig {
    pub island_count: usize,
    pub npc_crews: usize,
    /// Members per crew besides the captain, capped by ship capacity.
    pub max_crew_members: u32,
    pub government_agents: usize,
    pub devil_fruits: usize,
    /// Chance a generated character starts with one of the fruits.
    pub fruit_owner_chance: f64,
    pub player_name: String,
    /// Unix milliseconds stamped on generated crews.
    pub founded_at: u64,
}

impl Default for WorldGenConfig {
    fn default() -> Self {
        Self {
            island_count: 60,
            npc_crews: 90,
            max_crew_members: 6,
            government_agents: 24,
            devil_fruits: 40,
            fruit_owner_chance: 0.15,
            player_name: "Rookie".into(),
            founded_at: 0,
        }
    }
}

pub struct GeneratedWorld {
    pub store: WorldStore,
    pub player: PlayerIdentity,
}

/// Build a world: styles, islands with territories, devil fruits, NPC crews,
/// Government agents, initial territory owners and the player's crew.
pub fn generate_world<R: Rng + ?Sized>(
    gen: &WorldGenConfig,
    config: &GenerationConfig,
    rng: &mut R,
) -> Result<GeneratedWorld, StoreError> {
    let mut store = WorldStore::new();
    let mut builder = Builder {
        gen,
        config,
        styles: seed_styles(&mut store)?,
        free_fruits: Vec::new(),
    };

    let islands = seed_islands(&mut store, gen.island_count, rng)?;
    builder.free_fruits = seed_devil_fruits(&mut store, gen.devil_fruits, rng)?;

    for _ in 0..gen.npc_crews {
        let Some(&island) = islands.choose(rng) else { break };
        let kind = roll_crew_type(rng);
        builder.npc_crew(&mut store, kind, island, rng)?;
    }
    for _ in 0..gen.government_agents {
        let level = rng.gen_range(20..=80);
        builder.character(&mut store, CharacterType::Government, level, rng)?;
    }
    assign_initial_territories(&mut store);

    let player = builder.player_crew(&mut store, &islands, rng)?;
    log::info!(
        "generated world: {} islands, {} crews, {} characters, {} devil fruits",
        store.islands.len(),
        store.crews.len(),
        store.characters.len(),
        store.devil_fruits.len()
    );
    Ok(GeneratedWorld { store, player })
}

struct Builder<'a> {
    gen: &'a WorldGenConfig,
    config: &'a GenerationConfig,
    styles: Vec<StyleCombat>,
    free_fruits: Vec<DevilFruitId>,
}

impl Builder<'_> {
    fn character<R: Rng + ?Sized>(&mut self, store: &mut WorldStore, kind: CharacterType, level: u32, rng: &mut R) -> Result<CharacterId, StoreError> {
        let style = self.styles[rng.gen_range(0..self.styles.len())].clone();
        let fruit = if !self.free_fruits.is_empty() && rng.gen_bool(self.gen.fruit_owner_chance.clamp(0.0, 1.0)) {
            let index = rng.gen_range(0..self.free_fruits.len());
            Some(self.free_fruits.swap_remove(index))
        } else {
            None
        };

        let mut character = Character::new(character_name(rng), kind, level, style.id);
        character.potential_king_haki = rng.gen::<f64>();
        character.stats = generate_stats(level, &style, fruit.is_some(), character.potential_king_haki, self.config, rng);
        character.devil_fruit_id = fruit;
        character.kindness = roll_kindness(kind, rng);
        character.loyalty = rng.gen_range(20..=100);
        if kind == CharacterType::Pirate {
            character.bounty = u64::from(level) * rng.gen_range(500..=5_000);
        }
        let id = store.characters.insert(character)?;
        if let Some(fruit) = fruit {
            store.devil_fruits.update(fruit, |f| f.owner_id = Some(id))?;
        }
        Ok(id)
    }

    fn npc_crew<R: Rng + ?Sized>(&mut self, store: &mut WorldStore, kind: CrewType, island: IslandId, rng: &mut R) -> Result<CrewId, StoreError> {
        let difficulty = store.islands.get(island).map(|i| u32::from(i.difficulty)).unwrap_or(1);
        let captain_level = rng.gen_range(difficulty * 3..=difficulty * 5).max(1);
        let ship_level = rng.gen_range(1..=3).min(MAX_SHIP_LEVEL);
        let capacity = Ship::capacity_for(ship_level, self.config.ship_factor);
        let members = rng.gen_range(0..=self.gen.max_crew_members).min(capacity.saturating_sub(1));

        let captain = self.character(store, kind.character_type(), captain_level, rng)?;
        let captain_name = store.characters.get(captain).map(|c| c.name.clone()).unwrap_or_default();
        let crew = store.crews.insert(Crew {
            id: CrewId(0),
            name: format!("{captain_name}'s {}", crew_suffix(kind)),
            kind,
            captain_id: Some(captain),
            current_island: island,
            docked: roll_docked(self.config.docked_factor, rng),
            reputation: 0,
            treasury: 0,
            founded_at: self.gen.founded_at,
        })?;
        store.ships.insert(Ship {
            id: ShipId(0),
            crew_id: crew,
            name: ship_name(rng),
            level: ship_level,
            need_repair: false,
            destroyed: false,
        })?;
        store.characters.update(captain, |c| {
            c.crew_id = Some(crew);
            c.position = CrewPosition::Captain;
        })?;

        for _ in 0..members {
            let level = rng.gen_range(1..=captain_level);
            let member = self.character(store, kind.character_type(), level, rng)?;
            let position = CrewPosition::SPECIALISTS
                .choose(rng)
                .copied()
                .unwrap_or(CrewPosition::CrewMember);
            store.characters.update(member, |c| {
                c.crew_id = Some(crew);
                c.position = position;
            })?;
        }
        Ok(crew)
    }

    fn player_crew<R: Rng + ?Sized>(&mut self, store: &mut WorldStore, islands: &[IslandId], rng: &mut R) -> Result<PlayerIdentity, StoreError> {
        let home = islands
            .iter()
            .copied()
            .find(|&id| store.islands.get(id).is_some_and(|i| i.difficulty == MIN_DIFFICULTY))
            .or_else(|| islands.first().copied())
            .unwrap_or(IslandId(0));

        let style = self.styles[rng.gen_range(0..self.styles.len())].clone();
        let mut captain = Character::new(self.gen.player_name.clone(), CharacterType::Pirate, 1, style.id);
        captain.stats = generate_stats(1, &style, false, 0.5, self.config, rng);
        captain.potential_king_haki = 0.5;
        captain.loyalty = 100;
        captain.position = CrewPosition::Captain;
        captain.is_player = true;
        let player = store.characters.insert(captain)?;

        let crew = store.crews.insert(Crew {
            id: CrewId(0),
            name: format!("{} Pirates", self.gen.player_name),
            kind: CrewType::Pirate,
            captain_id: Some(player),
            current_island: home,
            docked: true,
            reputation: 0,
            treasury: 0,
            founded_at: self.gen.founded_at,
        })?;
        store.ships.insert(Ship {
            id: ShipId(0),
            crew_id: crew,
            name: format!("{}'s Dinghy", self.gen.player_name),
            level: 1,
            need_repair: false,
            destroyed: false,
        })?;
        store.characters.update(player, |c| c.crew_id = Some(crew))?;
        Ok(PlayerIdentity::new(player))
    }
}

fn roll_crew_type<R: Rng + ?Sized>(rng: &mut R) -> CrewType {
    match rng.gen_range(0..100) {
        0..=59 => CrewType::Pirate,
        60..=84 => CrewType::Marine,
        _ => CrewType::BountyHunter,
    }
}

fn roll_kindness<R: Rng + ?Sized>(kind: CharacterType, rng: &mut R) -> i32 {
    match kind {
        CharacterType::Pirate => rng.gen_range(-60..=40),
        CharacterType::Marine => rng.gen_range(0..=80),
        CharacterType::BountyHunter => rng.gen_range(-30..=30),
        CharacterType::Government => rng.gen_range(-20..=50),
        CharacterType::Civilian => rng.gen_range(20..=100),
    }
}

fn seed_styles(store: &mut WorldStore) -> Result<Vec<StyleCombat>, StoreError> {
    let catalogue = [
        ("Brawler", [5, 3, 2, 0, 1, 4, 1]),
        ("Swordsman", [4, 2, 3, 1, 5, 3, 2]),
        ("Sniper", [3, 1, 2, 3, 5, 1, 4]),
        ("Martial Artist", [3, 3, 5, 1, 3, 2, 3]),
        ("Tactician", [1, 2, 2, 5, 3, 1, 3]),
        ("Juggernaut", [2, 5, 1, 1, 1, 4, 1]),
    ];
    catalogue
        .into_iter()
        .map(|(name, [attack, defense, speed, intelligence, skill, arm_haki, obs_haki])| {
            let mut style = StyleCombat {
                id: StyleCombatId(0),
                name: name.into(),
                weights: StyleWeights {
                    attack,
                    defense,
                    speed,
                    intelligence,
                    skill,
                    arm_haki,
                    obs_haki,
                },
            };
            style.id = store.style_combats.insert(style.clone())?;
            Ok::<_, StoreError>(style)
        })
        .collect()
}

/// Islands spread evenly over every difficulty, one unclaimed territory each.
fn seed_islands<R: Rng + ?Sized>(store: &mut WorldStore, count: usize, rng: &mut R) -> Result<Vec<IslandId>, StoreError> {
    let count = count.max(1);
    let span = usize::from(MAX_DIFFICULTY - MIN_DIFFICULTY) + 1;
    (0..count)
        .map(|i| {
            let difficulty = MIN_DIFFICULTY + ((i * span) / count) as u8;
            let island = store.islands.insert(Island {
                id: IslandId(0),
                name: island_name(rng),
                difficulty,
            })?;
            store.territories.insert(Territory {
                id: TerritoryId(0),
                island_id: island,
                crew_id: None,
            })?;
            Ok::<_, StoreError>(island)
        })
        .collect()
}

fn seed_devil_fruits<R: Rng + ?Sized>(store: &mut WorldStore, count: usize, rng: &mut R) -> Result<Vec<DevilFruitId>, StoreError> {
    const KINDS: [DevilFruitKind; 3] = [DevilFruitKind::Paramecia, DevilFruitKind::Zoan, DevilFruitKind::Logia];
    (0..count)
        .map(|_| {
            let kind = KINDS[rng.gen_range(0..KINDS.len())];
            let power_bonus = match kind {
                DevilFruitKind::Logia => rng.gen_range(0.3..0.5),
                DevilFruitKind::Zoan => rng.gen_range(0.2..0.4),
                DevilFruitKind::Paramecia => rng.gen_range(0.1..0.4),
            };
            store.devil_fruits.insert(DevilFruit {
                id: DevilFruitId(0),
                name: devil_fruit_name(rng),
                kind,
                power_bonus,
                owner_id: None,
            })
        })
        .collect()
}

/// Each territory goes to the strongest docked crew on its island.
fn assign_initial_territories(store: &mut WorldStore) {
    let powers = store.crew_powers();
    let mut strongest: BTreeMap<IslandId, (CrewId, f64)> = BTreeMap::new();
    for crew in store.crews.iter().filter(|c| c.docked) {
        let power = powers.get(&crew.id).copied().unwrap_or(0.0);
        let entry = strongest.entry(crew.current_island).or_insert((crew.id, power));
        if power > entry.1 {
            *entry = (crew.id, power);
        }
    }
    for territory in store.territories.ids() {
        let Some(island) = store.territories.get(territory).map(|t| t.island_id) else { continue };
        if let Some(&(owner, _)) = strongest.get(&island) {
            let _ = store.territories.update(territory, |t| t.crew_id = Some(owner));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn world(seed: u64) -> GeneratedWorld {
        let config = GenerationConfig::default();
        generate_world(&WorldGenConfig::default(), &config, &mut ChaCha8Rng::seed_from_u64(seed)).unwrap()
    }

    #[test]
    fn islands_cover_every_difficulty() {
        let generated = world(1);
        let by_difficulty = generated.store.islands_by_difficulty();
        assert_eq!(by_difficulty.len(), usize::from(MAX_DIFFICULTY));
        assert_eq!(by_difficulty.keys().next(), Some(&MIN_DIFFICULTY));
        assert_eq!(generated.store.territories.len(), generated.store.islands.len());
    }

    #[test]
    fn crews_have_captain_ship_and_room() {
        let generated = world(2);
        let store = &generated.store;
        let factor = GenerationConfig::default().ship_factor;
        for crew in store.crews.iter() {
            let captain = store.characters.get(crew.captain_id.unwrap()).unwrap();
            assert!(captain.is_captain());
            assert_eq!(captain.crew_id, Some(crew.id));
            let ship = store.ship_of(crew.id).unwrap();
            assert!(store.member_count(crew.id) <= ship.capacity(factor));
        }
    }

    #[test]
    fn player_starts_small_on_an_easy_island() {
        let generated = world(3);
        let store = &generated.store;
        let player = generated.player.character(store).unwrap();
        assert!(player.is_player);
        assert_eq!(player.level, 1);
        assert_eq!(player.kind, CharacterType::Pirate);
        let crew = generated.player.crew(store).unwrap();
        assert_eq!(store.islands.get(crew.current_island).unwrap().difficulty, MIN_DIFFICULTY);
        assert!(!store.territory_owners().contains(&crew.id));
    }

    #[test]
    fn fruits_have_at_most_one_owner() {
        let generated = world(4);
        let store = &generated.store;
        for fruit in store.devil_fruits.iter() {
            if let Some(owner) = fruit.owner_id {
                assert_eq!(store.characters.get(owner).unwrap().devil_fruit_id, Some(fruit.id));
            }
        }
        for character in store.characters.iter() {
            if let Some(fruit) = character.devil_fruit_id {
                assert_eq!(store.devil_fruits.get(fruit).unwrap().owner_id, Some(character.id));
            }
        }
    }

    #[test]
    fn same_seed_same_world() {
        assert_eq!(world(5).store, world(5).store);
    }

    #[test]
    fn government_agents_stay_unaffiliated() {
        let generated = world(6);
        let agents: Vec<_> = generated
            .store
            .characters
            .filter(|c| c.kind == CharacterType::Government)
            .collect();
        assert_eq!(agents.len(), WorldGenConfig::default().government_agents);
        assert!(agents.iter().all(|c| c.crew_id.is_none()));
    }
}
