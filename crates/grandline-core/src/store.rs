//! Keyed entity store.
//!
//! Every collection is a [`Table`] of records ordered by their typed id. The
//! whole [`WorldStore`] is `Clone` and serializable: the background worker
//! receives a clone, and saves are a bincode dump of it.
//!
//! Two write paths exist besides single-row updates:
//! - [`WriteBatch`] collects the records touched by one battle and commits
//!   them together, so a failure while computing leaves the store untouched.
//! - [`WorldChangeset`] is the difference between a snapshot and a worker's
//!   result. Merging it back skips rows the caller thread changed in the
//!   meantime. Rules spanning several rows (crew capacity, crew references)
//!   are restored afterwards by `systems::membership::reconcile_merged_crews`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::ops::RangeBounds;

use grandline_logic::entities::*;
use grandline_logic::ids::*;
use grandline_logic::power::calculate_power;
use grandline_logic::tasks::Task;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// A row that lives in a [`Table`].
pub trait Record: Clone + Debug + PartialEq + Serialize + DeserializeOwned {
    type Id: Copy + Ord + Debug + From<u32> + Into<u32> + Serialize + DeserializeOwned;

    /// Collection name used in error messages.
    const COLLECTION: &'static str;

    fn id(&self) -> Self::Id;
    fn set_id(&mut self, id: Self::Id);
}

macro_rules! impl_record {
    ($($ty:ty => $id:ty, $name:literal;)*) => {
        $(
            impl Record for $ty {
                type Id = $id;
                const COLLECTION: &'static str = $name;

                fn id(&self) -> $id {
                    self.id
                }

                fn set_id(&mut self, id: $id) {
                    self.id = id;
                }
            }
        )*
    };
}

impl_record! {
    Character => CharacterId, "characters";
    Crew => CrewId, "crews";
    Ship => ShipId, "ships";
    Island => IslandId, "islands";
    Territory => TerritoryId, "territories";
    Task => TaskId, "tasks";
    Battle => BattleId, "battles";
    DevilFruit => DevilFruitId, "devil fruits";
    StyleCombat => StyleCombatId, "combat styles";
    RankEntry => RankEntryId, "rank entries";
    CypherPolAgent => RankEntryId, "cypher pol agents";
}

fn missing<T: Record>(id: T::Id) -> StoreError {
    StoreError::Missing {
        collection: T::COLLECTION,
        id: id.into(),
    }
}

/// Rows ordered by id, plus the allocator for the next id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Table<T: Record> {
    rows: BTreeMap<T::Id, T>,
    next_id: u32,
    /// First id a worker snapshot may not allocate.
    #[serde(skip)]
    id_limit: Option<u32>,
}

impl<T: Record> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
            id_limit: None,
        }
    }
}

impl<T: Record> Table<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, id: T::Id) -> Option<&T> {
        self.rows.get(&id)
    }

    pub fn require(&self, id: T::Id) -> Result<&T, StoreError> {
        self.rows.get(&id).ok_or_else(|| missing::<T>(id))
    }

    pub fn contains(&self, id: T::Id) -> bool {
        self.rows.contains_key(&id)
    }

    /// Insert `row` under a freshly allocated id and return that id.
    pub fn insert(&mut self, mut row: T) -> Result<T::Id, StoreError> {
        let raw = self.next_id;
        let next = raw
            .checked_add(1)
            .filter(|next| self.id_limit.map_or(true, |limit| *next <= limit))
            .ok_or(StoreError::IdsExhausted { collection: T::COLLECTION })?;
        self.next_id = next;
        let id = T::Id::from(raw);
        row.set_id(id);
        self.rows.insert(id, row);
        Ok(id)
    }

    /// Insert or replace `row` under its own id.
    pub fn put(&mut self, row: T) -> Option<T> {
        let raw: u32 = row.id().into();
        self.next_id = self.next_id.max(raw.saturating_add(1));
        self.rows.insert(row.id(), row)
    }

    /// Apply `patch` to the row with `id` in place. The id itself is kept.
    pub fn update<F: FnOnce(&mut T)>(&mut self, id: T::Id, patch: F) -> Result<(), StoreError> {
        let row = self.rows.get_mut(&id).ok_or_else(|| missing::<T>(id))?;
        patch(row);
        row.set_id(id);
        Ok(())
    }

    pub fn remove(&mut self, id: T::Id) -> Option<T> {
        self.rows.remove(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.rows.values()
    }

    pub fn ids(&self) -> Vec<T::Id> {
        self.rows.keys().copied().collect()
    }

    pub fn filter<'a, P>(&'a self, predicate: P) -> impl Iterator<Item = &'a T> + 'a
    where
        P: Fn(&T) -> bool + 'a,
    {
        self.rows.values().filter(move |row| predicate(row))
    }

    pub fn find<P: Fn(&T) -> bool>(&self, predicate: P) -> Option<&T> {
        self.rows.values().find(|row| predicate(row))
    }

    pub fn range<R: RangeBounds<T::Id>>(&self, range: R) -> impl Iterator<Item = &T> + '_ {
        self.rows.range(range).map(|(_, row)| row)
    }

    /// Drop every row and insert `rows` with ids renumbered from 1.
    pub fn replace_all<I: IntoIterator<Item = T>>(&mut self, rows: I) -> Result<usize, StoreError> {
        self.rows.clear();
        self.next_id = 1;
        for row in rows {
            self.insert(row)?;
        }
        Ok(self.rows.len())
    }

    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    /// Split off a copy that may allocate the next `block` ids, and move
    /// this table's allocator past them.
    fn fork(&mut self, block: u32) -> Table<T> {
        let mut snapshot = self.clone();
        let limit = self.next_id.saturating_add(block);
        snapshot.id_limit = Some(limit);
        self.next_id = limit;
        snapshot
    }

    /// Return the unused tail of a block handed out by [`Table::fork`].
    /// `base` is the table as forked and `worker` what the worker ended with.
    /// A table that allocated since the fork keeps its allocator.
    fn settle(&mut self, base: &Table<T>, worker: &Table<T>) {
        if base.id_limit == Some(self.next_id) {
            self.next_id = worker.next_id.clamp(base.next_id, self.next_id);
        }
    }

    /// Rows added or changed in `after`, and ids that disappeared from `base`.
    pub fn diff(base: &Table<T>, after: &Table<T>) -> TableDiff<T> {
        let upserts = after
            .rows
            .values()
            .filter(|row| base.rows.get(&row.id()) != Some(*row))
            .cloned()
            .collect();
        let deletes = base
            .rows
            .keys()
            .filter(|id| !after.rows.contains_key(id))
            .copied()
            .collect();
        TableDiff { upserts, deletes }
    }

    /// Apply `diff`, computed against `base`, to this table. A row that no
    /// longer matches `base` was changed here after the snapshot and keeps
    /// its current value.
    pub fn apply_diff(&mut self, base: &Table<T>, diff: TableDiff<T>) -> MergeCounts {
        let mut counts = MergeCounts::default();
        for row in diff.upserts {
            let id = row.id();
            if self.rows.get(&id) == base.rows.get(&id) {
                self.put(row);
                counts.applied += 1;
            } else {
                counts.conflicts += 1;
            }
        }
        for id in diff.deletes {
            if self.rows.get(&id) == base.rows.get(&id) {
                self.rows.remove(&id);
                counts.applied += 1;
            } else {
                counts.conflicts += 1;
            }
        }
        counts
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct TableDiff<T: Record> {
    pub upserts: Vec<T>,
    pub deletes: Vec<T::Id>,
}

impl<T: Record> TableDiff<T> {
    pub fn len(&self) -> usize {
        self.upserts.len() + self.deletes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeCounts {
    pub applied: usize,
    /// Rows skipped because the caller thread changed them first.
    pub conflicts: usize,
    /// Rows fixed afterwards to keep crews within their rules.
    pub repaired: usize,
}

impl std::ops::AddAssign for MergeCounts {
    fn add_assign(&mut self, other: Self) {
        self.applied += other.applied;
        self.conflicts += other.conflicts;
        self.repaired += other.repaired;
    }
}

/// Ids handed to a worker snapshot per table.
pub const WORKER_ID_BLOCK: u32 = 65_536;

/// Every persisted collection of the world.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldStore {
    pub characters: Table<Character>,
    pub crews: Table<Crew>,
    pub ships: Table<Ship>,
    pub islands: Table<Island>,
    pub territories: Table<Territory>,
    pub tasks: Table<Task>,
    pub battles: Table<Battle>,
    pub devil_fruits: Table<DevilFruit>,
    pub style_combats: Table<StyleCombat>,
    pub yonkou: Table<RankEntry>,
    pub shichibukai: Table<RankEntry>,
    pub admirals: Table<RankEntry>,
    pub gorousei: Table<RankEntry>,
    pub cypher_pol: Table<CypherPolAgent>,
}

/// Per-table differences between a snapshot and a worker's result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldChangeset {
    pub characters: TableDiff<Character>,
    pub crews: TableDiff<Crew>,
    pub ships: TableDiff<Ship>,
    pub islands: TableDiff<Island>,
    pub territories: TableDiff<Territory>,
    pub tasks: TableDiff<Task>,
    pub battles: TableDiff<Battle>,
    pub devil_fruits: TableDiff<DevilFruit>,
    pub style_combats: TableDiff<StyleCombat>,
    pub yonkou: TableDiff<RankEntry>,
    pub shichibukai: TableDiff<RankEntry>,
    pub admirals: TableDiff<RankEntry>,
    pub gorousei: TableDiff<RankEntry>,
    pub cypher_pol: TableDiff<CypherPolAgent>,
}

impl WorldChangeset {
    pub fn len(&self) -> usize {
        macro_rules! sum {
            ($($t:ident),*) => { 0 $(+ self.$t.len())* };
        }
        sum!(characters, crews, ships, islands, territories, tasks, battles, devil_fruits, style_combats, yonkou, shichibukai, admirals, gorousei, cypher_pol)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl WorldStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone of the store for a worker. The clone may allocate up to
    /// [`WORKER_ID_BLOCK`] ids per table; this store's allocators skip past
    /// them until [`WorldStore::settle_worker_ids`] hands the unused ones back.
    pub fn fork_for_worker(&mut self) -> WorldStore {
        macro_rules! fork {
            ($($t:ident),*) => { WorldStore { $($t: self.$t.fork(WORKER_ID_BLOCK),)* } };
        }
        fork!(characters, crews, ships, islands, territories, tasks, battles, devil_fruits, style_combats, yonkou, shichibukai, admirals, gorousei, cypher_pol)
    }

    /// Resume each allocator right after the last id `worker` used, for every
    /// table this store did not allocate from since `base` was forked. Pass
    /// `base` as `worker` for a pass whose result was dropped.
    pub fn settle_worker_ids(&mut self, base: &WorldStore, worker: &WorldStore) {
        macro_rules! settle {
            ($($t:ident),*) => { $(self.$t.settle(&base.$t, &worker.$t);)* };
        }
        settle!(characters, crews, ships, islands, territories, tasks, battles, devil_fruits, style_combats, yonkou, shichibukai, admirals, gorousei, cypher_pol);
    }

    /// Crew of every character, for comparing memberships across a merge.
    pub fn crew_assignments(&self) -> BTreeMap<CharacterId, Option<CrewId>> {
        self.characters.iter().map(|c| (c.id, c.crew_id)).collect()
    }

    pub fn diff(base: &WorldStore, after: &WorldStore) -> WorldChangeset {
        macro_rules! diff {
            ($($t:ident),*) => { WorldChangeset { $($t: Table::diff(&base.$t, &after.$t),)* } };
        }
        diff!(characters, crews, ships, islands, territories, tasks, battles, devil_fruits, style_combats, yonkou, shichibukai, admirals, gorousei, cypher_pol)
    }

    pub fn apply_changeset(&mut self, base: &WorldStore, changes: WorldChangeset) -> MergeCounts {
        let mut counts = MergeCounts::default();
        macro_rules! apply {
            ($($t:ident),*) => { $(counts += self.$t.apply_diff(&base.$t, changes.$t);)* };
        }
        apply!(characters, crews, ships, islands, territories, tasks, battles, devil_fruits, style_combats, yonkou, shichibukai, admirals, gorousei, cypher_pol);
        counts
    }

    /// Commit every record of `batch` and return the ids of appended battles.
    pub fn commit(&mut self, batch: WriteBatch) -> Result<Vec<BattleId>, StoreError> {
        for character in batch.characters {
            self.characters.put(character);
        }
        for crew in batch.crews {
            self.crews.put(crew);
        }
        for fruit in batch.devil_fruits {
            self.devil_fruits.put(fruit);
        }
        batch.battles.into_iter().map(|battle| self.battles.insert(battle)).collect()
    }

    // ── Queries ────────────────────────────────────────────────────────

    pub fn crew_members(&self, crew: CrewId) -> impl Iterator<Item = &Character> + '_ {
        self.characters.filter(move |c| c.crew_id == Some(crew))
    }

    pub fn member_count(&self, crew: CrewId) -> u32 {
        self.crew_members(crew).count() as u32
    }

    pub fn ship_of(&self, crew: CrewId) -> Option<&Ship> {
        self.ships.find(|s| s.crew_id == crew && !s.destroyed)
    }

    pub fn devil_fruit_of(&self, character: &Character) -> Option<&DevilFruit> {
        character.devil_fruit_id.and_then(|id| self.devil_fruits.get(id))
    }

    pub fn power_of(&self, character: &Character) -> f64 {
        calculate_power(character, self.devil_fruit_of(character))
    }

    pub fn character_power(&self, id: CharacterId) -> Result<f64, StoreError> {
        Ok(self.power_of(self.characters.require(id)?))
    }

    pub fn crew_power(&self, crew: CrewId) -> f64 {
        self.crew_members(crew).map(|c| self.power_of(c)).sum()
    }

    /// Power of every crew with at least one member, in one pass over characters.
    pub fn crew_powers(&self) -> BTreeMap<CrewId, f64> {
        let mut powers = BTreeMap::new();
        for character in self.characters.iter() {
            if let Some(crew) = character.crew_id {
                *powers.entry(crew).or_insert(0.0) += self.power_of(character);
            }
        }
        powers
    }

    pub fn crews_at(&self, island: IslandId) -> impl Iterator<Item = &Crew> + '_ {
        self.crews.filter(move |c| c.current_island == island)
    }

    pub fn territory_of_island(&self, island: IslandId) -> Option<&Territory> {
        self.territories.find(|t| t.island_id == island)
    }

    pub fn territory_owners(&self) -> BTreeSet<CrewId> {
        self.territories.iter().filter_map(|t| t.crew_id).collect()
    }

    /// Island ids grouped by difficulty.
    pub fn islands_by_difficulty(&self) -> BTreeMap<u8, Vec<IslandId>> {
        let mut groups: BTreeMap<u8, Vec<IslandId>> = BTreeMap::new();
        for island in self.islands.iter() {
            groups.entry(island.difficulty).or_default().push(island.id);
        }
        groups
    }
}

/// Records computed for one operation, committed together.
#[derive(Debug, Default)]
pub struct WriteBatch {
    characters: Vec<Character>,
    crews: Vec<Crew>,
    devil_fruits: Vec<DevilFruit>,
    battles: Vec<Battle>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_character(&mut self, character: Character) {
        self.characters.push(character);
    }

    pub fn put_crew(&mut self, crew: Crew) {
        self.crews.push(crew);
    }

    pub fn put_devil_fruit(&mut self, fruit: DevilFruit) {
        self.devil_fruits.push(fruit);
    }

    pub fn append_battle(&mut self, battle: Battle) {
        self.battles.push(battle);
    }

    pub fn len(&self) -> usize {
        self.characters.len() + self.crews.len() + self.devil_fruits.len() + self.battles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
