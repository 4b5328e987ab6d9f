//! Random meetings between crews docked at the same island.

use grandline_logic::encounter::{determine_encounter_type_only, encounter_budget, sample_pair, EncounterType};
use grandline_logic::entities::Character;
use grandline_logic::ids::*;
use rand::seq::SliceRandom;

use crate::context::SimContext;
use crate::error::{SimError, SimResult};
use crate::systems::battle::{resolve_crew_battle, BattleReport};
use crate::systems::membership::{apply_post_battle_membership, MembershipOutcome};
use crate::systems::territory::reevaluate_island_territory;

#[derive(Debug, Clone, PartialEq)]
pub struct EncounterSummary {
    pub island: IslandId,
    pub hostile: usize,
    pub neutral: usize,
    pub friendly: usize,
    pub battles: Vec<BattleId>,
    pub errors: usize,
}

impl EncounterSummary {
    pub fn encounters(&self) -> usize {
        self.hostile + self.neutral + self.friendly
    }
}

/// A random non-player member speaks for the crew; ordinary members are
/// preferred over the captain.
fn representative(ctx: &mut SimContext, crew: CrewId) -> Option<Character> {
    let members: Vec<&Character> = ctx
        .store
        .crew_members(crew)
        .filter(|m| !ctx.player.is_player_character(m))
        .collect();
    let crewmen: Vec<&Character> = members.iter().copied().filter(|m| !m.is_captain()).collect();
    let pool = if crewmen.is_empty() { &members } else { &crewmen };
    pool.choose(&mut ctx.rng).map(|c| (*c).clone())
}

/// Outcome of a hostile encounter.
#[derive(Debug, Clone, PartialEq)]
pub struct Clash {
    pub battle: BattleReport,
    pub membership: MembershipOutcome,
}

fn encounter(
    ctx: &mut SimContext,
    island: IslandId,
    a: CrewId,
    b: CrewId,
) -> SimResult<Option<(EncounterType, Option<Clash>)>> {
    let (Some(first), Some(second)) = (representative(ctx, a), representative(ctx, b)) else {
        return Ok(None);
    };
    let kind = determine_encounter_type_only(&first, &second, &mut ctx.rng);
    if kind != EncounterType::Hostile {
        return Ok(Some((kind, None)));
    }

    let battle = resolve_crew_battle(ctx, a, b)?;
    let (Some(winner), Some(loser)) = (battle.winner_crew, battle.loser_crew) else {
        return Err(SimError::integrity(format!("crew battle {} lost track of its crews", battle.battle_id)));
    };
    let membership = apply_post_battle_membership(ctx, winner, loser, island)?;
    reevaluate_island_territory(ctx, island)?;
    Ok(Some((kind, Some(Clash { battle, membership }))))
}

/// Sample crew pairs on `island` and play out what happens between them.
/// Failures are logged per encounter and the island carries on.
pub fn simulate_island_encounters(ctx: &mut SimContext, island: IslandId) -> SimResult<EncounterSummary> {
    ctx.store.islands.require(island)?;
    let mut summary = EncounterSummary {
        island,
        hostile: 0,
        neutral: 0,
        friendly: 0,
        battles: Vec::new(),
        errors: 0,
    };

    let crews: Vec<CrewId> = ctx
        .store
        .crews_at(island)
        .filter(|c| c.docked && !ctx.is_player_crew(c.id))
        .map(|c| c.id)
        .collect();
    let budget = encounter_budget(ctx.config.battle_simulated_by_turn as usize, crews.len());

    for _ in 0..budget {
        let Some((i, j)) = sample_pair(crews.len(), &mut ctx.rng) else {
            continue;
        };
        let (a, b) = (crews[i], crews[j]);
        // Earlier fights may have disbanded either crew.
        let present = |crew: CrewId| {
            ctx.store
                .crews
                .get(crew)
                .is_some_and(|c| c.docked && c.current_island == island)
        };
        if !present(a) || !present(b) {
            continue;
        }

        match encounter(ctx, island, a, b) {
            Ok(Some((EncounterType::Hostile, clash))) => {
                summary.hostile += 1;
                summary.battles.extend(clash.map(|c| c.battle.battle_id));
            }
            Ok(Some((EncounterType::Neutral, _))) => summary.neutral += 1,
            Ok(Some((EncounterType::Friendly, _))) => summary.friendly += 1,
            Ok(None) => {}
            Err(err) => {
                log::error!("encounter between crews {a} and {b} on island {island} failed: {err}");
                summary.errors += 1;
            }
        }
    }

    if summary.encounters() > 0 {
        log::debug!(
            "island {island}: {} hostile, {} neutral, {} friendly",
            summary.hostile,
            summary.neutral,
            summary.friendly
        );
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::Fixture;
    use grandline_logic::config::{GenerationConfig, SimulationTuning};
    use grandline_logic::entities::CrewType;

    #[test]
    fn lone_crew_has_no_encounters() {
        let mut fx = Fixture::new(5);
        let island = fx.island(2);
        fx.crew(CrewType::Pirate, island, 5);
        let summary = simulate_island_encounters(&mut fx.ctx, island).unwrap();
        assert_eq!(summary.encounters(), 0);
    }

    #[test]
    fn pirates_and_marines_always_fight() {
        // Nobody changes sides, so representatives keep their type.
        let config = GenerationConfig {
            ship_factor: 3,
            tuning: SimulationTuning {
                recruit_base_chance: 0.0,
                recruit_loyalty_weight: 0.0,
                removal_chance: 0.0,
                ..SimulationTuning::default()
            },
            ..GenerationConfig::default()
        };
        let mut fx = Fixture::with_config(config, 5);
        let island = fx.island(2);
        let (pirates, _) = fx.crew(CrewType::Pirate, island, 8);
        let (marines, _) = fx.crew(CrewType::Marine, island, 8);
        fx.member(pirates, 3, 0);
        fx.member(marines, 3, 0);

        let summary = simulate_island_encounters(&mut fx.ctx, island).unwrap();
        assert!(summary.encounters() <= 4);
        assert_eq!(summary.neutral + summary.friendly, 0);
        assert_eq!(summary.errors, 0);
        assert_eq!(summary.battles.len(), summary.hostile);
        assert_eq!(fx.ctx.store.battles.len(), summary.hostile);
    }

    #[test]
    fn budget_caps_encounters() {
        let config = GenerationConfig {
            ship_factor: 3,
            battle_simulated_by_turn: 1,
            ..GenerationConfig::default()
        };
        let mut fx = Fixture::with_config(config, 9);
        let island = fx.island(2);
        for _ in 0..5 {
            fx.crew(CrewType::Pirate, island, 4);
        }
        let summary = simulate_island_encounters(&mut fx.ctx, island).unwrap();
        assert!(summary.encounters() <= 1);
    }

    #[test]
    fn player_crew_is_left_out() {
        let mut fx = Fixture::new(5);
        let island = fx.island(2);
        let (_, player) = fx.crew(CrewType::Pirate, island, 8);
        fx.make_player(player);
        fx.crew(CrewType::Marine, island, 8);

        let summary = simulate_island_encounters(&mut fx.ctx, island).unwrap();
        assert_eq!(summary.encounters(), 0);
        assert!(fx.ctx.store.battles.is_empty());
    }

    #[test]
    fn broken_crew_is_logged_and_skipped() {
        let config = GenerationConfig {
            ship_factor: 3,
            battle_simulated_by_turn: 10,
            tuning: SimulationTuning {
                recruit_base_chance: 0.0,
                recruit_loyalty_weight: 0.0,
                removal_chance: 0.0,
                ..SimulationTuning::default()
            },
            ..GenerationConfig::default()
        };
        let (mut errors, mut fought) = (0, 0);
        for seed in 0..20 {
            let mut fx = Fixture::with_config(config.clone(), seed);
            let island = fx.island(2);
            let (broken, captain) = fx.crew(CrewType::Pirate, island, 8);
            fx.member(broken, 3, 0);
            let (marines, _) = fx.crew(CrewType::Marine, island, 8);
            let (pirates, _) = fx.crew(CrewType::Pirate, island, 8);
            fx.member(marines, 3, 0);
            fx.member(pirates, 3, 0);
            fx.ctx.store.crews.update(broken, |c| c.captain_id = None).unwrap();
            fx.ctx.store.characters.update(captain, |c| c.crew_id = None).unwrap();

            let summary = simulate_island_encounters(&mut fx.ctx, island).unwrap();
            assert!(summary.encounters() + summary.errors <= 6);
            assert_eq!(summary.battles.len(), summary.hostile);
            for battle in fx.ctx.store.battles.iter() {
                assert_ne!(battle.challenger_crew_id, Some(broken));
                assert_ne!(battle.opponent_crew_id, Some(broken));
            }
            assert!(fx.ctx.store.crews.contains(broken));
            errors += summary.errors;
            fought += summary.battles.len();
        }
        assert!(errors >= 1);
        assert!(fought >= 1);
    }

    #[test]
    fn unknown_island_is_an_error() {
        let mut fx = Fixture::new(5);
        assert!(simulate_island_encounters(&mut fx.ctx, IslandId(404)).is_err());
    }
}
