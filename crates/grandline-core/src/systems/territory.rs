//! Territorial control: the strongest docked crew on an island holds it.

use std::collections::BTreeMap;

use grandline_logic::entities::Territory;
use grandline_logic::ids::*;

use crate::context::SimContext;
use crate::error::SimResult;
use crate::events::{Importance, WorldEvent, WorldEventKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerritoryChange {
    pub territory: TerritoryId,
    pub island: IslandId,
    pub previous: Option<CrewId>,
    pub current: Option<CrewId>,
}

/// Strongest docked non-player crew per island. Ties keep the lower id.
fn strongest_by_island(ctx: &SimContext, powers: &BTreeMap<CrewId, f64>) -> BTreeMap<IslandId, (CrewId, f64)> {
    let mut strongest: BTreeMap<IslandId, (CrewId, f64)> = BTreeMap::new();
    for crew in ctx.store.crews.iter() {
        if !crew.docked || ctx.is_player_crew(crew.id) {
            continue;
        }
        let power = powers.get(&crew.id).copied().unwrap_or(0.0);
        strongest
            .entry(crew.current_island)
            .and_modify(|best| {
                if power > best.1 {
                    *best = (crew.id, power);
                }
            })
            .or_insert((crew.id, power));
    }
    strongest
}

/// New owner for `territory`, or `None` if it stays as is.
fn contest(
    ctx: &SimContext,
    territory: &Territory,
    strongest: Option<(CrewId, f64)>,
    powers: &BTreeMap<CrewId, f64>,
) -> Option<Option<CrewId>> {
    if territory.crew_id.is_some_and(|owner| ctx.is_player_crew(owner)) {
        return None;
    }
    match (territory.crew_id, strongest) {
        (None, None) => None,
        (Some(_), None) => Some(None),
        (None, Some((challenger, _))) => Some(Some(challenger)),
        (Some(owner), Some((challenger, power))) => {
            // A deleted owner holds with zero power.
            let owner_power = if ctx.store.crews.contains(owner) {
                powers.get(&owner).copied().unwrap_or(0.0)
            } else {
                0.0
            };
            (challenger != owner && power > owner_power).then_some(Some(challenger))
        }
    }
}

fn apply_change(ctx: &mut SimContext, territory: &Territory, current: Option<CrewId>) -> SimResult<TerritoryChange> {
    ctx.store.territories.update(territory.id, |t| t.crew_id = current)?;
    let change = TerritoryChange {
        territory: territory.id,
        island: territory.island_id,
        previous: territory.crew_id,
        current,
    };

    let island = ctx
        .store
        .islands
        .get(territory.island_id)
        .map(|i| i.name.clone())
        .unwrap_or_else(|| format!("island {}", territory.island_id));
    let event = match current.and_then(|crew| ctx.store.crews.get(crew)) {
        Some(crew) => WorldEvent::new(
            WorldEventKind::Territory,
            Importance::Medium,
            format!("The {} take control of {island}", crew.name),
            "",
        ),
        None => WorldEvent::new(
            WorldEventKind::Territory,
            Importance::Low,
            format!("{island} is free"),
            "No crew is left to hold the island.",
        ),
    };
    ctx.emit(event);
    Ok(change)
}

/// Re-check every territory against the crews docked on its island.
pub fn redistribute_territories(ctx: &mut SimContext) -> SimResult<Vec<TerritoryChange>> {
    let powers = ctx.store.crew_powers();
    let strongest = strongest_by_island(ctx, &powers);

    let decisions: Vec<(Territory, Option<CrewId>)> = ctx
        .store
        .territories
        .iter()
        .filter_map(|t| {
            contest(ctx, t, strongest.get(&t.island_id).copied(), &powers).map(|owner| (t.clone(), owner))
        })
        .collect();

    let mut changes = Vec::with_capacity(decisions.len());
    for (territory, owner) in decisions {
        changes.push(apply_change(ctx, &territory, owner)?);
    }
    if !changes.is_empty() {
        log::info!("territory redistribution: {} changes", changes.len());
    }
    Ok(changes)
}

/// The same check limited to one island, run after a fight there.
pub fn reevaluate_island_territory(ctx: &mut SimContext, island: IslandId) -> SimResult<Option<TerritoryChange>> {
    let Some(territory) = ctx.store.territory_of_island(island).cloned() else {
        return Ok(None);
    };

    let mut powers = BTreeMap::new();
    let mut strongest: Option<(CrewId, f64)> = None;
    for crew in ctx.store.crews_at(island) {
        if !crew.docked || ctx.is_player_crew(crew.id) {
            continue;
        }
        let power = ctx.store.crew_power(crew.id);
        if strongest.map_or(true, |(_, best)| power > best) {
            strongest = Some((crew.id, power));
        }
    }
    if let Some(owner) = territory.crew_id {
        powers.insert(owner, ctx.store.crew_power(owner));
    }

    match contest(ctx, &territory, strongest, &powers) {
        Some(owner) => apply_change(ctx, &territory, owner).map(Some),
        None => Ok(None),
    }
}
