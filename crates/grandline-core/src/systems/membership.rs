//! Crew membership after battles: recruitment, desertion, re-crewing of
//! orphans and removal of empty crews.
//!
//! The steps run in a fixed order for one battle. The loser crew is checked
//! for emptiness only after recruitment and removal have both finished.

use std::collections::{BTreeMap, BTreeSet};

use grandline_logic::config::GenerationConfig;
use grandline_logic::entities::{Character, Crew, CrewPosition, CrewType, Ship};
use grandline_logic::ids::*;
use grandline_logic::recruitment::{
    self, by_ascending_loyalty, choose_orphan_captain, is_poachable, recruitment_chance, roll,
    CrewCapacityInfo, RecruitmentOffer,
};

use crate::context::SimContext;
use crate::error::{SimError, SimResult};
use crate::events::{now_ms, Importance, WorldEvent, WorldEventKind};
use crate::store::WorldStore;

pub fn crew_capacity_info(store: &WorldStore, config: &GenerationConfig, crew: CrewId) -> SimResult<CrewCapacityInfo> {
    store.crews.require(crew)?;
    let ship_level = store.ship_of(crew).map(|s| s.level);
    Ok(CrewCapacityInfo::new(store.member_count(crew), ship_level, config.ship_factor))
}

/// Automatic membership changes never touch the player's crew.
pub fn is_player_involved(ctx: &SimContext, a: CrewId, b: CrewId) -> bool {
    ctx.is_player_crew(a) || ctx.is_player_crew(b)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipOutcome {
    pub recruited: Vec<CharacterId>,
    pub deserted: Vec<CharacterId>,
    pub founded: Option<CrewId>,
    pub disbanded: bool,
}

/// Run recruitment, removal, orphan re-crewing and the empty-crew check
/// for one crew battle fought on `island`.
pub fn apply_post_battle_membership(
    ctx: &mut SimContext,
    winner: CrewId,
    loser: CrewId,
    island: IslandId,
) -> SimResult<MembershipOutcome> {
    if is_player_involved(ctx, winner, loser) {
        return Ok(MembershipOutcome::default());
    }
    let loser_kind = ctx.store.crews.require(loser)?.kind;

    let capacity = crew_capacity_info(&ctx.store, &ctx.config, winner)?;
    let recruited = process_recruitment(ctx, winner, loser, capacity)?;
    let removed = process_crew_member_removal(ctx, loser)?;
    let deserted = removed.iter().map(|c| c.id).collect();
    let founded = create_crew_for_orphan_members(ctx, &removed, island, loser_kind)?;
    let disbanded = delete_crew_if_empty(ctx, loser)?;

    Ok(MembershipOutcome {
        recruited,
        deserted,
        founded,
        disbanded,
    })
}

fn poachable_members(ctx: &SimContext, crew: CrewId) -> Vec<Character> {
    ctx.store
        .crew_members(crew)
        .filter(|m| is_poachable(m) && !ctx.player.is_player_character(m))
        .cloned()
        .collect()
}

/// Move members of `loser` to `winner`, least loyal first, until a roll says
/// stop or the winner's ship is full.
pub fn process_recruitment(
    ctx: &mut SimContext,
    winner: CrewId,
    loser: CrewId,
    capacity: CrewCapacityInfo,
) -> SimResult<Vec<CharacterId>> {
    let tuning = ctx.config.tuning.clone();
    let mut candidates = poachable_members(ctx, loser);
    candidates.sort_by(by_ascending_loyalty);

    let winner_name = ctx.store.crews.require(winner)?.name.clone();
    let mut members = capacity.current_members;
    let mut recruited = Vec::new();
    for candidate in candidates {
        if members >= capacity.max_capacity {
            break;
        }
        if !roll(recruitment_chance(candidate.loyalty, &tuning), &mut ctx.rng) {
            continue;
        }
        ctx.store.characters.update(candidate.id, |c| {
            c.crew_id = Some(winner);
            c.position = CrewPosition::CrewMember;
        })?;
        members += 1;
        recruited.push(candidate.id);
        ctx.emit(WorldEvent::new(
            WorldEventKind::Recruitment,
            Importance::Low,
            format!("{} joins the {}", candidate.name, winner_name),
            "Impressed by their victory, a defeated fighter switches sides.",
        ));
        if roll(tuning.recruit_stop_chance, &mut ctx.rng) {
            break;
        }
    }
    Ok(recruited)
}

/// Some defeated members walk away from their crew. Returns the removed
/// members as they are after leaving.
pub fn process_crew_member_removal(ctx: &mut SimContext, loser: CrewId) -> SimResult<Vec<Character>> {
    let tuning = ctx.config.tuning.clone();
    let crew_name = ctx.store.crews.require(loser)?.name.clone();
    let mut removed = Vec::new();
    for mut member in poachable_members(ctx, loser) {
        if !roll(tuning.removal_chance, &mut ctx.rng) {
            continue;
        }
        member.crew_id = None;
        member.position = CrewPosition::CrewMember;
        ctx.store.characters.put(member.clone());
        log::debug!("{} left crew {loser}", member.name);
        ctx.emit(WorldEvent::new(
            WorldEventKind::Desertion,
            Importance::Low,
            format!("{} deserts the {crew_name}", member.name),
            "Shaken by defeat, a fighter abandons their crew.",
        ));
        removed.push(member);
        if roll(tuning.removal_stop_chance, &mut ctx.rng) {
            break;
        }
    }
    Ok(removed)
}

pub(crate) fn crew_suffix(kind: CrewType) -> &'static str {
    match kind {
        CrewType::Pirate => "Pirates",
        CrewType::Marine => "Marine Squad",
        CrewType::BountyHunter => "Hunters",
    }
}

/// Found a crew of type `kind` for unaffiliated `members` at `island`. The
/// highest-level member becomes captain and the crew gets a level-1 ship.
/// Whoever does not fit aboard, lowest levels first, stays unaffiliated.
pub fn create_crew_for_orphan_members(
    ctx: &mut SimContext,
    members: &[Character],
    island: IslandId,
    kind: CrewType,
) -> SimResult<Option<CrewId>> {
    let Some(captain_id) = choose_orphan_captain(members) else {
        return Ok(None);
    };
    let captain_name = members
        .iter()
        .find(|m| m.id == captain_id)
        .map(|m| m.name.clone())
        .unwrap_or_default();

    let name = format!("{captain_name}'s {}", crew_suffix(kind));
    let crew = ctx.store.crews.insert(Crew {
        id: CrewId(0),
        name: name.clone(),
        kind,
        captain_id: Some(captain_id),
        current_island: island,
        docked: true,
        reputation: 0,
        treasury: 0,
        founded_at: now_ms(),
    })?;
    ctx.store.ships.insert(Ship {
        id: ShipId(0),
        crew_id: crew,
        name: format!("{captain_name}'s Sloop"),
        level: 1,
        need_repair: false,
        destroyed: false,
    })?;
    let mut aboard: Vec<&Character> = members.iter().collect();
    aboard.sort_by(|a, b| (b.id == captain_id).cmp(&(a.id == captain_id)).then(b.level.cmp(&a.level)).then(a.id.cmp(&b.id)));
    aboard.truncate(Ship::capacity_for(1, ctx.config.ship_factor) as usize);
    for member in &aboard {
        let position = if member.id == captain_id {
            CrewPosition::Captain
        } else {
            CrewPosition::CrewMember
        };
        ctx.store.characters.update(member.id, |c| {
            c.crew_id = Some(crew);
            c.position = position;
        })?;
    }

    ctx.emit(WorldEvent::new(
        WorldEventKind::CrewFounded,
        Importance::Low,
        format!("The {name} set sail"),
        format!("{} outcasts band together under {captain_name}.", aboard.len()),
    ));
    Ok(Some(crew))
}

pub fn delete_crew_if_empty(ctx: &mut SimContext, crew: CrewId) -> SimResult<bool> {
    if !ctx.store.crews.contains(crew) || ctx.store.member_count(crew) > 0 {
        return Ok(false);
    }
    delete_crew(ctx, crew)?;
    Ok(true)
}

/// Remove a crew, its ships and its territorial claims. Anyone still aboard
/// becomes unaffiliated.
pub fn delete_crew(ctx: &mut SimContext, crew: CrewId) -> SimResult<()> {
    let removed = ctx
        .store
        .crews
        .remove(crew)
        .ok_or_else(|| SimError::NotFound(format!("crew {crew}")))?;

    let ships: Vec<_> = ctx.store.ships.filter(|s| s.crew_id == crew).map(|s| s.id).collect();
    for ship in ships {
        ctx.store.ships.remove(ship);
    }
    let claims: Vec<_> = ctx.store.territories.filter(|t| t.crew_id == Some(crew)).map(|t| t.id).collect();
    for territory in claims {
        ctx.store.territories.update(territory, |t| t.crew_id = None)?;
    }
    let stranded: Vec<_> = ctx.store.crew_members(crew).map(|c| c.id).collect();
    for member in stranded {
        ctx.store.characters.update(member, |c| {
            c.crew_id = None;
            c.position = CrewPosition::CrewMember;
        })?;
    }

    ctx.emit(WorldEvent::new(
        WorldEventKind::CrewDisbanded,
        Importance::Low,
        format!("The {} disband", removed.name),
        "",
    ));
    Ok(())
}

/// Delete every crew without members. The player's crew is left alone.
pub fn prune_empty_crews(ctx: &mut SimContext) -> SimResult<usize> {
    let mut counts: BTreeMap<CrewId, u32> = BTreeMap::new();
    for character in ctx.store.characters.iter() {
        if let Some(crew) = character.crew_id {
            *counts.entry(crew).or_insert(0) += 1;
        }
    }
    let empty: Vec<CrewId> = ctx
        .store
        .crews
        .ids()
        .into_iter()
        .filter(|id| !counts.contains_key(id) && !ctx.is_player_crew(*id))
        .collect();
    for crew in &empty {
        delete_crew(ctx, *crew)?;
    }
    if !empty.is_empty() {
        log::debug!("pruned {} empty crews", empty.len());
    }
    Ok(empty.len())
}

// ── Repair after a worker merge ────────────────────────────────────────

/// Fixes applied by [`reconcile_merged_crews`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrewRepairs {
    /// Worker-side crew changes undone to keep a ship within capacity.
    pub rolled_back: usize,
    /// Crews the worker removed while members were still aboard here.
    pub restored: usize,
    pub unaffiliated: usize,
    pub promoted: usize,
    pub disbanded: usize,
}

impl CrewRepairs {
    pub fn total(&self) -> usize {
        self.rolled_back + self.restored + self.unaffiliated + self.promoted + self.disbanded
    }
}

/// Restore the crew rules a row-by-row merge cannot see: every member's
/// crew exists, no ship carries more than its capacity, each crew is led
/// by one of its members and no crew is empty.
///
/// `base` is the snapshot the worker started from, `before` each
/// character's crew on this side just before the merge. Characters the
/// merge moved into an overfull crew go back to their snapshot row first.
pub fn reconcile_merged_crews(
    ctx: &mut SimContext,
    base: &WorldStore,
    before: &BTreeMap<CharacterId, Option<CrewId>>,
) -> SimResult<CrewRepairs> {
    let mut repairs = CrewRepairs::default();
    restore_sunk_crews(ctx, base, &mut repairs)?;
    trim_overfull_crews(ctx, base, before, &mut repairs)?;
    settle_captains(ctx, &mut repairs)?;
    clear_dangling_claims(ctx)?;
    if repairs.total() > 0 {
        log::warn!("crews repaired after merge: {repairs:?}");
    }
    Ok(repairs)
}

fn rosters(store: &WorldStore) -> BTreeMap<CrewId, Vec<Character>> {
    let mut rosters: BTreeMap<CrewId, Vec<Character>> = BTreeMap::new();
    for character in store.characters.iter() {
        if let Some(crew) = character.crew_id {
            rosters.entry(crew).or_default().push(character.clone());
        }
    }
    rosters
}

fn leave_crew(ctx: &mut SimContext, id: CharacterId, repairs: &mut CrewRepairs) -> SimResult<()> {
    ctx.store.characters.update(id, |c| {
        c.crew_id = None;
        c.position = CrewPosition::CrewMember;
    })?;
    repairs.unaffiliated += 1;
    Ok(())
}

fn restore_sunk_crews(ctx: &mut SimContext, base: &WorldStore, repairs: &mut CrewRepairs) -> SimResult<()> {
    let sunk: BTreeSet<CrewId> = ctx
        .store
        .characters
        .iter()
        .filter_map(|c| c.crew_id)
        .filter(|crew| !ctx.store.crews.contains(*crew))
        .collect();
    for crew in sunk {
        let Some(row) = base.crews.get(crew) else {
            let stranded: Vec<_> = ctx.store.crew_members(crew).map(|c| c.id).collect();
            for id in stranded {
                leave_crew(ctx, id, repairs)?;
            }
            continue;
        };
        ctx.store.crews.put(row.clone());
        for ship in base.ships.filter(move |s| s.crew_id == crew) {
            if !ctx.store.ships.contains(ship.id) {
                ctx.store.ships.put(ship.clone());
            }
        }
        repairs.restored += 1;
    }
    Ok(())
}

fn trim_overfull_crews(
    ctx: &mut SimContext,
    base: &WorldStore,
    before: &BTreeMap<CharacterId, Option<CrewId>>,
    repairs: &mut CrewRepairs,
) -> SimResult<()> {
    for (crew, members) in rosters(&ctx.store) {
        let capacity = crew_capacity_info(&ctx.store, &ctx.config, crew)?.max_capacity as usize;
        let mut excess = members.len().saturating_sub(capacity);
        if excess == 0 {
            continue;
        }

        // Newest arrivals from the merge leave first.
        let mut arrivals: Vec<&Character> = members
            .iter()
            .filter(|m| before.get(&m.id).copied().flatten() != Some(crew) && !ctx.player.is_player_character(m))
            .collect();
        arrivals.sort_by(|a, b| b.id.cmp(&a.id));
        for member in arrivals.into_iter().take(excess) {
            roll_back_member(ctx, base, member.id, repairs)?;
            excess -= 1;
        }

        let mut weakest: Vec<&Character> = members
            .iter()
            .filter(|m| {
                !m.is_captain()
                    && !ctx.player.is_player_character(m)
                    && ctx.store.characters.get(m.id).is_some_and(|c| c.crew_id == Some(crew))
            })
            .collect();
        weakest.sort_by(|a, b| a.level.cmp(&b.level).then(b.id.cmp(&a.id)));
        for member in weakest.into_iter().take(excess) {
            leave_crew(ctx, member.id, repairs)?;
        }
    }
    Ok(())
}

/// Put `id` back as it was in the snapshot, or without a crew when its old
/// crew is gone or has no room left.
fn roll_back_member(ctx: &mut SimContext, base: &WorldStore, id: CharacterId, repairs: &mut CrewRepairs) -> SimResult<()> {
    let Some(row) = base.characters.get(id).cloned() else {
        return leave_crew(ctx, id, repairs);
    };
    let home = row.crew_id;
    ctx.store.characters.put(row);
    let fits = match home {
        Some(home) if ctx.store.crews.contains(home) => {
            let info = crew_capacity_info(&ctx.store, &ctx.config, home)?;
            info.current_members <= info.max_capacity
        }
        Some(_) => false,
        None => true,
    };
    if fits {
        repairs.rolled_back += 1;
        Ok(())
    } else {
        leave_crew(ctx, id, repairs)
    }
}

fn settle_captains(ctx: &mut SimContext, repairs: &mut CrewRepairs) -> SimResult<()> {
    let rosters = rosters(&ctx.store);
    for crew in ctx.store.crews.ids() {
        let Some(members) = rosters.get(&crew) else {
            if !ctx.is_player_crew(crew) {
                delete_crew(ctx, crew)?;
                repairs.disbanded += 1;
            }
            continue;
        };
        let current = ctx.store.crews.get(crew).and_then(|c| c.captain_id);
        let captain = current
            .filter(|id| members.iter().any(|m| m.id == *id))
            .or_else(|| choose_orphan_captain(members));
        if captain != current {
            ctx.store.crews.update(crew, |c| c.captain_id = captain)?;
            repairs.promoted += 1;
        }
        for member in members {
            let position = if Some(member.id) == captain {
                CrewPosition::Captain
            } else if member.is_captain() {
                CrewPosition::CrewMember
            } else {
                continue;
            };
            if member.position != position {
                ctx.store.characters.update(member.id, |c| c.position = position)?;
            }
        }
    }
    Ok(())
}

fn clear_dangling_claims(ctx: &mut SimContext) -> SimResult<()> {
    let claims: Vec<TerritoryId> = ctx
        .store
        .territories
        .filter(|t| t.crew_id.is_some_and(|crew| !ctx.store.crews.contains(crew)))
        .map(|t| t.id)
        .collect();
    for territory in claims {
        ctx.store.territories.update(territory, |t| t.crew_id = None)?;
    }
    let wrecks: Vec<ShipId> = ctx
        .store
        .ships
        .filter(|s| !ctx.store.crews.contains(s.crew_id))
        .map(|s| s.id)
        .collect();
    for ship in wrecks {
        ctx.store.ships.remove(ship);
    }
    Ok(())
}

// ── Player recruitment ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecruitmentAttempt {
    Joined,
    Refused,
    CrewFull,
}

fn player_crew(ctx: &SimContext) -> SimResult<&Crew> {
    ctx.player
        .crew(&ctx.store)
        .ok_or_else(|| SimError::invalid_state("the player has no crew"))
}

pub fn evaluate_player_recruitment(ctx: &SimContext, target: CharacterId) -> SimResult<RecruitmentOffer> {
    let player = ctx
        .player
        .character(&ctx.store)
        .ok_or_else(|| SimError::invalid_state("no player character"))?;
    let crew = player_crew(ctx)?;
    let target = ctx.store.characters.require(target)?;
    if target.crew_id == Some(crew.id) {
        return Ok(RecruitmentOffer {
            compatible: false,
            chance: 0.0,
        });
    }
    Ok(recruitment::evaluate_player_recruitment(
        crew.kind,
        ctx.store.power_of(player),
        target,
        ctx.store.power_of(target),
    ))
}

/// The player asks `target` to join. Errors if the target would never agree.
pub fn attempt_player_recruitment(ctx: &mut SimContext, target: CharacterId) -> SimResult<RecruitmentAttempt> {
    let offer = evaluate_player_recruitment(ctx, target)?;
    if !offer.compatible {
        return Err(SimError::invalid_state(format!("character {target} will not join the player's crew")));
    }
    let crew = player_crew(ctx)?.id;
    if !crew_capacity_info(&ctx.store, &ctx.config, crew)?.has_space {
        return Ok(RecruitmentAttempt::CrewFull);
    }
    if !roll(offer.chance, &mut ctx.rng) {
        return Ok(RecruitmentAttempt::Refused);
    }

    let previous = ctx.store.characters.require(target)?.crew_id;
    ctx.store.characters.update(target, |c| {
        c.crew_id = Some(crew);
        c.position = CrewPosition::CrewMember;
    })?;
    let name = ctx.store.characters.require(target)?.name.clone();
    ctx.emit(WorldEvent::new(
        WorldEventKind::Recruitment,
        Importance::Medium,
        format!("{name} joins your crew"),
        "",
    ));
    if let Some(old) = previous {
        delete_crew_if_empty(ctx, old)?;
    }
    Ok(RecruitmentAttempt::Joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::Fixture;
    use grandline_logic::config::SimulationTuning;
    use grandline_logic::entities::CharacterType;

    fn always(config: &mut GenerationConfig) {
        config.tuning = SimulationTuning {
            recruit_base_chance: 1.0,
            recruit_stop_chance: 0.0,
            removal_chance: 1.0,
            removal_stop_chance: 0.0,
            ..SimulationTuning::default()
        };
    }

    fn eager_fixture() -> Fixture {
        let mut config = GenerationConfig {
            ship_factor: 3,
            ..GenerationConfig::default()
        };
        always(&mut config);
        Fixture::with_config(config, 7)
    }

    #[test]
    fn capacity_counts_members_and_ship() {
        let mut fx = Fixture::new(1);
        let island = fx.island(1);
        let (crew, _) = fx.crew(CrewType::Pirate, island, 5);
        fx.member(crew, 2, 0);
        let info = crew_capacity_info(&fx.ctx.store, &fx.ctx.config, crew).unwrap();
        assert_eq!(info.current_members, 2);
        assert_eq!(info.max_capacity, 3);
        assert!(info.has_space);
        assert!(crew_capacity_info(&fx.ctx.store, &fx.ctx.config, CrewId(99)).is_err());
    }

    #[test]
    fn full_ship_recruits_nobody() {
        let mut fx = eager_fixture();
        let island = fx.island(1);
        let (winner, _) = fx.crew(CrewType::Pirate, island, 10);
        fx.member(winner, 3, 0);
        fx.member(winner, 3, 0);
        let (loser, _) = fx.crew(CrewType::Pirate, island, 4);
        fx.member(loser, 2, -50);

        let capacity = crew_capacity_info(&fx.ctx.store, &fx.ctx.config, winner).unwrap();
        assert!(!capacity.has_space);
        let recruited = process_recruitment(&mut fx.ctx, winner, loser, capacity).unwrap();
        assert!(recruited.is_empty());
        assert_eq!(fx.ctx.store.member_count(winner), 3);
    }

    #[test]
    fn recruitment_stops_at_capacity_and_spares_captain() {
        let mut fx = eager_fixture();
        let island = fx.island(1);
        let (winner, _) = fx.crew(CrewType::Pirate, island, 10);
        let (loser, loser_captain) = fx.crew(CrewType::Pirate, island, 4);
        let loyal = fx.member(loser, 2, 90);
        let fickle = fx.member(loser, 2, -90);
        let middling = fx.member(loser, 2, 0);

        let capacity = crew_capacity_info(&fx.ctx.store, &fx.ctx.config, winner).unwrap();
        let recruited = process_recruitment(&mut fx.ctx, winner, loser, capacity).unwrap();
        assert_eq!(recruited, vec![fickle, middling]);
        assert_eq!(fx.get(loyal).crew_id, Some(loser));
        assert_eq!(fx.get(loser_captain).crew_id, Some(loser));
        assert_eq!(fx.ctx.store.member_count(winner), 3);
    }

    #[test]
    fn orphans_get_a_new_crew() {
        let mut fx = Fixture::new(1);
        let island = fx.island(4);
        let levels = [3, 7, 5];
        let members: Vec<Character> = levels
            .iter()
            .map(|&level| {
                let id = fx.character(CharacterType::Pirate, level);
                fx.get(id).clone()
            })
            .collect();

        let crew = create_crew_for_orphan_members(&mut fx.ctx, &members, island, CrewType::Pirate)
            .unwrap()
            .unwrap();
        let row = fx.ctx.store.crews.get(crew).unwrap();
        assert_eq!(row.captain_id, Some(members[1].id));
        assert_eq!(row.current_island, island);
        assert!(row.docked);
        assert_eq!(fx.get(members[1].id).position, CrewPosition::Captain);
        assert_eq!(fx.ctx.store.member_count(crew), 3);
        assert_eq!(fx.ctx.store.ship_of(crew).map(|s| s.level), Some(1));

        assert_eq!(create_crew_for_orphan_members(&mut fx.ctx, &[], island, CrewType::Pirate).unwrap(), None);
    }

    #[test]
    fn orphans_beyond_a_sloop_stay_unaffiliated() {
        let mut fx = Fixture::new(1);
        let island = fx.island(4);
        let members: Vec<Character> = [2, 9, 4, 1, 6]
            .iter()
            .map(|&level| {
                let id = fx.character(CharacterType::Pirate, level);
                fx.get(id).clone()
            })
            .collect();

        let crew = create_crew_for_orphan_members(&mut fx.ctx, &members, island, CrewType::Pirate)
            .unwrap()
            .unwrap();
        assert_eq!(fx.ctx.store.member_count(crew), 3);
        let aboard: Vec<u32> = fx.ctx.store.crew_members(crew).map(|c| c.level).collect();
        assert!(aboard.contains(&9) && aboard.contains(&6) && aboard.contains(&4));
        assert_eq!(fx.get(members[0].id).crew_id, None);
        assert_eq!(fx.get(members[3].id).crew_id, None);
    }

    #[test]
    fn removal_then_orphan_crew_then_no_deletion() {
        let mut fx = eager_fixture();
        let island = fx.island(2);
        let (winner, _) = fx.crew(CrewType::Marine, island, 10);
        fx.member(winner, 1, 0);
        fx.member(winner, 1, 0);
        let (loser, captain) = fx.crew(CrewType::Pirate, island, 4);
        fx.member(loser, 3, 10);
        fx.member(loser, 5, 20);

        let outcome = apply_post_battle_membership(&mut fx.ctx, winner, loser, island).unwrap();
        assert!(outcome.recruited.is_empty());
        assert_eq!(outcome.deserted.len(), 2);
        let founded = outcome.founded.unwrap();
        assert_eq!(fx.ctx.store.crews.get(founded).unwrap().kind, CrewType::Pirate);
        assert!(!outcome.disbanded);
        assert_eq!(fx.ctx.store.member_count(loser), 1);
        assert_eq!(fx.get(captain).crew_id, Some(loser));
        let desertions = fx
            .ctx
            .drain_events()
            .into_iter()
            .filter(|e| e.kind == WorldEventKind::Desertion)
            .count();
        assert_eq!(desertions, 2);
    }

    #[test]
    fn overfull_crew_sheds_weakest_when_nothing_to_roll_back() {
        let mut fx = Fixture::new(2);
        let island = fx.island(1);
        let (crew, captain) = fx.crew(CrewType::Pirate, island, 10);
        let strong = fx.member(crew, 8, 0);
        let weak = fx.member(crew, 1, 0);
        let player = fx.member(crew, 1, 0);
        fx.make_player(player);
        let base = fx.ctx.store.clone();
        let before = fx.ctx.store.crew_assignments();

        let repairs = reconcile_merged_crews(&mut fx.ctx, &base, &before).unwrap();
        assert_eq!(repairs.unaffiliated, 1);
        assert_eq!(repairs.total(), 1);
        assert_eq!(fx.get(weak).crew_id, None);
        for kept in [captain, strong, player] {
            assert_eq!(fx.get(kept).crew_id, Some(crew));
        }
    }

    #[test]
    fn sound_crews_need_no_repair() {
        let mut fx = Fixture::new(2);
        let island = fx.island(1);
        let (crew, _) = fx.crew(CrewType::Marine, island, 10);
        fx.member(crew, 3, 0);
        fx.territory(island, Some(crew));
        let base = fx.ctx.store.clone();
        let before = fx.ctx.store.crew_assignments();

        assert_eq!(reconcile_merged_crews(&mut fx.ctx, &base, &before).unwrap(), CrewRepairs::default());
        assert_eq!(fx.ctx.store, base);
    }

    #[test]
    fn player_crew_untouched() {
        let mut fx = eager_fixture();
        let island = fx.island(1);
        let (winner, _) = fx.crew(CrewType::Pirate, island, 10);
        let (player_crew, player) = fx.crew(CrewType::Pirate, island, 4);
        fx.make_player(player);
        let mate = fx.member(player_crew, 2, -100);

        let outcome = apply_post_battle_membership(&mut fx.ctx, winner, player_crew, island).unwrap();
        assert_eq!(outcome, MembershipOutcome::default());
        assert_eq!(fx.get(mate).crew_id, Some(player_crew));
    }

    #[test]
    fn deleting_crew_releases_territory_and_ship() {
        let mut fx = Fixture::new(1);
        let island = fx.island(1);
        let (crew, captain) = fx.crew(CrewType::Pirate, island, 5);
        let territory = fx.territory(island, Some(crew));
        fx.ctx.store.characters.update(captain, |c| c.crew_id = None).unwrap();

        assert!(delete_crew_if_empty(&mut fx.ctx, crew).unwrap());
        assert!(!fx.ctx.store.crews.contains(crew));
        assert!(fx.ctx.store.ship_of(crew).is_none());
        assert_eq!(fx.ctx.store.territories.get(territory).unwrap().crew_id, None);
        assert!(!delete_crew_if_empty(&mut fx.ctx, crew).unwrap());
    }

    #[test]
    fn prune_removes_only_empty_crews() {
        let mut fx = Fixture::new(1);
        let island = fx.island(1);
        let (kept, _) = fx.crew(CrewType::Pirate, island, 5);
        let (emptied, captain) = fx.crew(CrewType::Marine, island, 5);
        fx.ctx.store.characters.remove(captain);

        assert_eq!(prune_empty_crews(&mut fx.ctx).unwrap(), 1);
        assert!(fx.ctx.store.crews.contains(kept));
        assert!(!fx.ctx.store.crews.contains(emptied));
    }

    #[test]
    fn player_recruitment_flow() {
        let mut fx = Fixture::new(4);
        let island = fx.island(1);
        let (crew, player) = fx.crew(CrewType::Pirate, island, 20);
        fx.make_player(player);
        let marine = fx.character(CharacterType::Marine, 3);
        let civilian = fx.character(CharacterType::Civilian, 3);

        assert!(matches!(attempt_player_recruitment(&mut fx.ctx, marine), Err(SimError::InvalidState(_))));

        let offer = evaluate_player_recruitment(&fx.ctx, civilian).unwrap();
        assert!(offer.compatible);
        assert!((0.05..=0.9).contains(&offer.chance));

        let mut joined = false;
        for _ in 0..50 {
            match attempt_player_recruitment(&mut fx.ctx, civilian).unwrap() {
                RecruitmentAttempt::Joined => {
                    joined = true;
                    break;
                }
                RecruitmentAttempt::Refused => continue,
                RecruitmentAttempt::CrewFull => panic!("crew has room"),
            }
        }
        assert!(joined);
        assert_eq!(fx.get(civilian).crew_id, Some(crew));
        assert!(!evaluate_player_recruitment(&fx.ctx, civilian).unwrap().compatible);
    }
}
