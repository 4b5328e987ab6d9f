//! Plain data records for the world: characters, crews, ships, islands and the
//! catalogues they reference.
//!
//! Nothing here touches a store. The engine crate keys these records by their
//! typed ids and mutates them through its tables.

use serde::{Deserialize, Serialize};

use crate::ids::*;

/// Affiliation of a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CharacterType {
    Pirate,
    Marine,
    Government,
    BountyHunter,
    Civilian,
}

impl CharacterType {
    pub const ALL: [CharacterType; 5] = [
        CharacterType::Pirate,
        CharacterType::Marine,
        CharacterType::Government,
        CharacterType::BountyHunter,
        CharacterType::Civilian,
    ];

    pub fn label(self) -> &'static str {
        match self {
            CharacterType::Pirate => "Pirate",
            CharacterType::Marine => "Marine",
            CharacterType::Government => "Government",
            CharacterType::BountyHunter => "Bounty Hunter",
            CharacterType::Civilian => "Civilian",
        }
    }
}

/// Affiliation of a crew. Government agents and civilians never captain one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrewType {
    Pirate,
    Marine,
    BountyHunter,
}

impl CrewType {
    /// Crew type a character of `kind` would found, if any.
    pub fn for_character(kind: CharacterType) -> Option<CrewType> {
        match kind {
            CharacterType::Pirate => Some(CrewType::Pirate),
            CharacterType::Marine => Some(CrewType::Marine),
            CharacterType::BountyHunter => Some(CrewType::BountyHunter),
            CharacterType::Government | CharacterType::Civilian => None,
        }
    }

    pub fn character_type(self) -> CharacterType {
        match self {
            CrewType::Pirate => CharacterType::Pirate,
            CrewType::Marine => CharacterType::Marine,
            CrewType::BountyHunter => CharacterType::BountyHunter,
        }
    }

    pub fn label(self) -> &'static str {
        self.character_type().label()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrewPosition {
    Captain,
    FirstMate,
    CrewMember,
    Navigator,
    Cook,
    Doctor,
    Sniper,
    Shipwright,
    Musician,
    Archaeologist,
    Helmsman,
}

impl CrewPosition {
    /// Positions a generated crew member may be assigned, captain excluded.
    pub const SPECIALISTS: [CrewPosition; 8] = [
        CrewPosition::Navigator,
        CrewPosition::Cook,
        CrewPosition::Doctor,
        CrewPosition::Sniper,
        CrewPosition::Shipwright,
        CrewPosition::Musician,
        CrewPosition::Archaeologist,
        CrewPosition::Helmsman,
    ];
}

/// The seven axes that grow with levels. King's haki and the devil-fruit
/// stat grow through their own rules and are not part of a growth budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StatAxis {
    Attack,
    Defense,
    Speed,
    Intelligence,
    Skill,
    ArmHaki,
    ObsHaki,
}

impl StatAxis {
    pub const ALL: [StatAxis; 7] = [
        StatAxis::Attack,
        StatAxis::Defense,
        StatAxis::Speed,
        StatAxis::Intelligence,
        StatAxis::Skill,
        StatAxis::ArmHaki,
        StatAxis::ObsHaki,
    ];

    pub fn is_haki(self) -> bool {
        matches!(self, StatAxis::ArmHaki | StatAxis::ObsHaki)
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            StatAxis::Attack => "attack",
            StatAxis::Defense => "defense",
            StatAxis::Speed => "speed",
            StatAxis::Intelligence => "intelligence",
            StatAxis::Skill => "skill",
            StatAxis::ArmHaki => "armament haki",
            StatAxis::ObsHaki => "observation haki",
        }
    }
}

/// Stat accumulators of a character.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub attack: u32,
    pub defense: u32,
    pub speed: u32,
    pub intelligence: u32,
    pub skill: u32,
    pub arm_haki: u32,
    pub obs_haki: u32,
    pub king_haki: u32,
    pub devil_fruit: u32,
}

impl Stats {
    pub fn get(&self, axis: StatAxis) -> u32 {
        match axis {
            StatAxis::Attack => self.attack,
            StatAxis::Defense => self.defense,
            StatAxis::Speed => self.speed,
            StatAxis::Intelligence => self.intelligence,
            StatAxis::Skill => self.skill,
            StatAxis::ArmHaki => self.arm_haki,
            StatAxis::ObsHaki => self.obs_haki,
        }
    }

    pub fn add(&mut self, axis: StatAxis, points: u32) {
        let slot = match axis {
            StatAxis::Attack => &mut self.attack,
            StatAxis::Defense => &mut self.defense,
            StatAxis::Speed => &mut self.speed,
            StatAxis::Intelligence => &mut self.intelligence,
            StatAxis::Skill => &mut self.skill,
            StatAxis::ArmHaki => &mut self.arm_haki,
            StatAxis::ObsHaki => &mut self.obs_haki,
        };
        *slot = slot.saturating_add(points);
    }

    /// Combined haki, used when comparing special abilities.
    pub fn haki_total(&self) -> u32 {
        self.arm_haki + self.obs_haki + self.king_haki
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    pub kind: CharacterType,
    pub position: CrewPosition,
    pub level: u32,
    pub experience: u64,
    pub bounty: u64,
    pub kindness: i32,
    pub loyalty: i32,
    pub stats: Stats,
    pub style_combat_id: StyleCombatId,
    pub devil_fruit_id: Option<DevilFruitId>,
    pub crew_id: Option<CrewId>,
    /// Chance in `0..=1` of awakening king's haki once eligible.
    pub potential_king_haki: f64,
    pub is_player: bool,
}

impl Character {
    /// A level-`level` unaffiliated character with zeroed stats.
    pub fn new(name: impl Into<String>, kind: CharacterType, level: u32, style: StyleCombatId) -> Self {
        Character {
            id: CharacterId(0),
            name: name.into(),
            kind,
            position: CrewPosition::CrewMember,
            level: level.max(1),
            experience: 0,
            bounty: 0,
            kindness: 0,
            loyalty: 0,
            stats: Stats::default(),
            style_combat_id: style,
            devil_fruit_id: None,
            crew_id: None,
            potential_king_haki: 0.0,
            is_player: false,
        }
    }

    pub fn is_captain(&self) -> bool {
        self.position == CrewPosition::Captain
    }

    pub fn owns_devil_fruit(&self) -> bool {
        self.devil_fruit_id.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crew {
    pub id: CrewId,
    pub name: String,
    pub kind: CrewType,
    pub captain_id: Option<CharacterId>,
    pub current_island: IslandId,
    pub docked: bool,
    pub reputation: i64,
    pub treasury: u64,
    /// Unix milliseconds.
    pub founded_at: u64,
}

pub const MAX_SHIP_LEVEL: u32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ship {
    pub id: ShipId,
    pub crew_id: CrewId,
    pub name: String,
    pub level: u32,
    pub need_repair: bool,
    pub destroyed: bool,
}

impl Ship {
    /// Member capacity of a ship at `level` for the configured `ship_factor`.
    pub fn capacity_for(level: u32, ship_factor: u32) -> u32 {
        level.clamp(1, MAX_SHIP_LEVEL) * ship_factor
    }

    pub fn capacity(&self, ship_factor: u32) -> u32 {
        Ship::capacity_for(self.level, ship_factor)
    }
}

pub const MIN_DIFFICULTY: u8 = 1;
pub const MAX_DIFFICULTY: u8 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Island {
    pub id: IslandId,
    pub name: String,
    pub difficulty: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Territory {
    pub id: TerritoryId,
    pub island_id: IslandId,
    pub crew_id: Option<CrewId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DevilFruitKind {
    Paramecia,
    Zoan,
    Logia,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevilFruit {
    pub id: DevilFruitId,
    pub name: String,
    pub kind: DevilFruitKind,
    /// Extra multiplier on the devil-fruit stat's contribution to power.
    pub power_bonus: f64,
    pub owner_id: Option<CharacterId>,
}

/// Growth weights of a combat style over the seven growth axes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleWeights {
    pub attack: u32,
    pub defense: u32,
    pub speed: u32,
    pub intelligence: u32,
    pub skill: u32,
    pub arm_haki: u32,
    pub obs_haki: u32,
}

impl StyleWeights {
    pub fn get(&self, axis: StatAxis) -> u32 {
        match axis {
            StatAxis::Attack => self.attack,
            StatAxis::Defense => self.defense,
            StatAxis::Speed => self.speed,
            StatAxis::Intelligence => self.intelligence,
            StatAxis::Skill => self.skill,
            StatAxis::ArmHaki => self.arm_haki,
            StatAxis::ObsHaki => self.obs_haki,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleCombat {
    pub id: StyleCombatId,
    pub name: String,
    pub weights: StyleWeights,
}

/// Append-only record of a resolved combat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Battle {
    pub id: BattleId,
    pub challenger_id: CharacterId,
    pub opponent_id: CharacterId,
    pub winner_id: CharacterId,
    pub loser_id: CharacterId,
    pub challenger_crew_id: Option<CrewId>,
    pub opponent_crew_id: Option<CrewId>,
    pub experience_gained: u64,
    pub bounty_gained: u64,
    pub damage: u32,
    pub log: Vec<String>,
    pub timestamp: u64,
}

/// Row of the Yonkou, Shichibukai, Admiral and Gorousei tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankEntry {
    pub id: RankEntryId,
    pub character_id: CharacterId,
    pub power: f64,
    pub base_island: Option<IslandId>,
}

/// Row of the CypherPol table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CypherPolAgent {
    pub id: RankEntryId,
    pub character_id: CharacterId,
    pub power: f64,
    pub base_island: Option<IslandId>,
    pub assigned_island: IslandId,
}
