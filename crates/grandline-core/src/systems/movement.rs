//! Movement system - docking and sailing between islands

use std::collections::BTreeMap;

use grandline_logic::ids::*;
use grandline_logic::movement::{pick_destination, roll_docked, wants_to_move, DestinationPools, MovementDecision};

use crate::context::SimContext;
use crate::error::{SimError, SimResult};
use crate::events::{Importance, WorldEvent, WorldEventKind};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MovementSummary {
    pub docked: usize,
    pub undocked: usize,
    pub relocated: usize,
    pub rejected: usize,
}

/// Islands one difficulty step around `difficulty`, without `current`.
pub fn destination_pools(
    by_difficulty: &BTreeMap<u8, Vec<IslandId>>,
    current: IslandId,
    difficulty: u8,
) -> DestinationPools {
    let group = |d: Option<u8>| -> Vec<IslandId> {
        d.and_then(|d| by_difficulty.get(&d)).cloned().unwrap_or_default()
    };
    let mut same = group(Some(difficulty));
    same.retain(|&island| island != current);
    DestinationPools {
        easier: group(difficulty.checked_sub(1)),
        same,
        harder: group(difficulty.checked_add(1)),
    }
}

/// Validate and apply one relocation. Nothing changes when the move is
/// rejected. The crew arrives docked.
pub fn move_crew_to(ctx: &mut SimContext, crew: CrewId, destination: IslandId) -> SimResult<MovementDecision> {
    let from = ctx.store.crews.require(crew)?.current_island;
    let from_difficulty = ctx.store.islands.require(from)?.difficulty;
    let to = ctx.store.islands.require(destination)?;
    let decision = MovementDecision::new(crew, from, from_difficulty, to.id, to.difficulty)?;
    let island_name = to.name.clone();

    ctx.store.crews.update(crew, |c| {
        c.current_island = decision.to_island();
        c.docked = true;
    })?;
    log::debug!("crew {crew} sailed {} -> {}", decision.from_island(), decision.to_island());

    if ctx.is_player_crew(crew) {
        ctx.emit(WorldEvent::new(
            WorldEventKind::Movement,
            Importance::Medium,
            format!("Arrived at {island_name}"),
            "",
        ));
    }
    Ok(decision)
}

/// Toggle docking for every eligible crew, then let docked crews wander.
/// The player's crew and territory holders stay put.
pub fn simulate_world_movement(ctx: &mut SimContext) -> SimResult<MovementSummary> {
    let owners = ctx.store.territory_owners();
    let eligible: Vec<CrewId> = ctx
        .store
        .crews
        .ids()
        .into_iter()
        .filter(|crew| !owners.contains(crew) && !ctx.is_player_crew(*crew))
        .collect();
    let docked_factor = ctx.config.docked_factor;
    let tuning = ctx.config.tuning.clone();
    let mut summary = MovementSummary::default();

    for &crew in &eligible {
        let docked = roll_docked(docked_factor, &mut ctx.rng);
        ctx.store.crews.update(crew, |c| c.docked = docked)?;
        if docked {
            summary.docked += 1;
        } else {
            summary.undocked += 1;
        }
    }

    let by_difficulty = ctx.store.islands_by_difficulty();
    for crew in eligible {
        let row = ctx.store.crews.require(crew)?;
        if !row.docked || !wants_to_move(&tuning, &mut ctx.rng) {
            continue;
        }
        let current = row.current_island;
        let Some(difficulty) = ctx.store.islands.get(current).map(|i| i.difficulty) else {
            log::warn!("crew {crew} is at unknown island {current}");
            continue;
        };
        let pools = destination_pools(&by_difficulty, current, difficulty);
        let Some(destination) = pick_destination(&pools, &tuning, &mut ctx.rng) else {
            continue;
        };
        match move_crew_to(ctx, crew, destination) {
            Ok(_) => summary.relocated += 1,
            Err(SimError::Movement(err)) => {
                log::warn!("movement rejected: {err}");
                summary.rejected += 1;
            }
            Err(err) => return Err(err),
        }
    }

    log::debug!("movement: {summary:?}");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::Fixture;
    use grandline_logic::config::{GenerationConfig, SimulationTuning};
    use grandline_logic::entities::CrewType;
    use grandline_logic::movement::MovementError;

    fn restless() -> Fixture {
        let config = GenerationConfig {
            ship_factor: 3,
            docked_factor: 1.0,
            tuning: SimulationTuning {
                move_chance: 1.0,
                ..SimulationTuning::default()
            },
            ..GenerationConfig::default()
        };
        Fixture::with_config(config, 11)
    }

    #[test]
    fn pools_exclude_current_island() {
        let mut groups = BTreeMap::new();
        groups.insert(1, vec![IslandId(1)]);
        groups.insert(2, vec![IslandId(2), IslandId(3)]);
        let pools = destination_pools(&groups, IslandId(2), 2);
        assert_eq!(pools.easier, vec![IslandId(1)]);
        assert_eq!(pools.same, vec![IslandId(3)]);
        assert!(pools.harder.is_empty());
    }

    #[test]
    fn moves_stay_within_one_difficulty_step() {
        let mut fx = restless();
        let islands: Vec<_> = (1..=10).map(|d| fx.island(d)).collect();
        let crews: Vec<_> = (0..6).map(|i| fx.crew(CrewType::Pirate, islands[4 + i % 2], 5).0).collect();

        for _ in 0..20 {
            let before: Vec<u8> = crews
                .iter()
                .map(|&c| {
                    let island = fx.ctx.store.crews.get(c).unwrap().current_island;
                    fx.ctx.store.islands.get(island).unwrap().difficulty
                })
                .collect();
            let summary = simulate_world_movement(&mut fx.ctx).unwrap();
            assert_eq!(summary.rejected, 0);
            for (crew, old) in crews.iter().zip(before) {
                let row = fx.ctx.store.crews.get(*crew).unwrap();
                let new = fx.ctx.store.islands.get(row.current_island).unwrap().difficulty;
                assert!(old.abs_diff(new) <= 1);
                assert!(row.docked);
            }
        }
    }

    #[test]
    fn invalid_jump_rejected_without_change() {
        let mut fx = Fixture::new(1);
        let start = fx.island(3);
        let far = fx.island(7);
        let (crew, _) = fx.crew(CrewType::Marine, start, 5);

        let err = move_crew_to(&mut fx.ctx, crew, far).unwrap_err();
        assert!(matches!(err, SimError::Movement(MovementError::DifficultyJump { from: 3, to: 7, .. })));
        assert_eq!(fx.ctx.store.crews.get(crew).unwrap().current_island, start);
    }

    #[test]
    fn player_and_territory_holders_stay() {
        let mut fx = restless();
        let a = fx.island(1);
        fx.island(1);
        fx.island(2);
        let (player_crew, player) = fx.crew(CrewType::Pirate, a, 1);
        fx.make_player(player);
        let (holder, _) = fx.crew(CrewType::Pirate, a, 5);
        fx.territory(a, Some(holder));
        fx.ctx.store.crews.update(player_crew, |c| c.docked = false).unwrap();

        let summary = simulate_world_movement(&mut fx.ctx).unwrap();
        assert_eq!(summary, MovementSummary::default());
        assert_eq!(fx.ctx.store.crews.get(holder).unwrap().current_island, a);
        assert!(!fx.ctx.store.crews.get(player_crew).unwrap().docked);
    }

    #[test]
    fn no_destination_means_no_move() {
        let mut fx = restless();
        let only = fx.island(15);
        let (crew, _) = fx.crew(CrewType::Pirate, only, 5);
        let summary = simulate_world_movement(&mut fx.ctx).unwrap();
        assert_eq!(summary.relocated, 0);
        assert_eq!(fx.ctx.store.crews.get(crew).unwrap().current_island, only);
    }
}
