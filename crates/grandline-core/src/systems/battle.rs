//! Battle resolution against the store.
//!
//! Every battle follows compute-then-commit: the fighters and their crews are
//! read once, all rewards, loyalty swings, level-ups and stat growth are
//! computed on copies, and the resulting records land in one [`WriteBatch`]
//! together with the battle record. An error before the commit leaves the
//! world unchanged.

use std::sync::Arc;

use grandline_logic::combat::{self, BattleMode, DuelInput, Side};
use grandline_logic::config::GenerationConfig;
use grandline_logic::entities::{Battle, Character, CharacterType, StyleCombat, StyleWeights};
use grandline_logic::ids::*;
use grandline_logic::progression::{
    adjust_loyalty, apply_experience, calculate_bounty_gain, calculate_experience_gain,
    defeat_loyalty_loss, shared_reward, victory_loyalty_gain, Combatant,
};
use grandline_logic::stats::increase_stats;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::context::SimContext;
use crate::error::{SimError, SimResult};
use crate::events::{now_ms, Importance, WorldEvent, WorldEventKind};
use crate::store::{WorldStore, WriteBatch};

#[derive(Debug, Clone, PartialEq)]
pub struct BattleReport {
    pub battle_id: BattleId,
    pub mode: BattleMode,
    pub winner_id: CharacterId,
    pub loser_id: CharacterId,
    pub winner_crew: Option<CrewId>,
    pub loser_crew: Option<CrewId>,
    pub experience_gained: u64,
    pub bounty_gained: u64,
    pub damage: u32,
    /// Odds the winner had after luck.
    pub winner_odds: f64,
    pub levels_gained: u32,
    pub devil_fruit: Option<DevilFruitId>,
    pub log: Vec<String>,
}

/// One-on-one fight between two characters. Fails if either is missing or
/// misses its combat style.
pub fn simulate_battle(ctx: &mut SimContext, challenger: CharacterId, opponent: CharacterId) -> SimResult<BattleReport> {
    if challenger == opponent {
        return Err(SimError::invalid_state(format!("character {challenger} cannot fight itself")));
    }
    fight(ctx, challenger, opponent, BattleMode::Duel)
}

/// Captain against captain, each backed by their crew.
pub fn resolve_crew_battle(ctx: &mut SimContext, attacker: CrewId, defender: CrewId) -> SimResult<BattleReport> {
    let attacker_captain = captain_of(&ctx.store, attacker)?;
    let defender_captain = captain_of(&ctx.store, defender)?;
    fight(ctx, attacker_captain, defender_captain, BattleMode::CrewBattle)
}

fn captain_of(store: &WorldStore, crew: CrewId) -> SimResult<CharacterId> {
    let crew_row = store.crews.require(crew)?;
    let captain = crew_row
        .captain_id
        .ok_or_else(|| SimError::integrity(format!("crew {crew} has no captain")))?;
    match store.characters.get(captain) {
        Some(c) if c.crew_id == Some(crew) => Ok(captain),
        Some(_) => Err(SimError::integrity(format!("captain {captain} does not sail with crew {crew}"))),
        None => Err(SimError::integrity(format!("captain {captain} of crew {crew} does not exist"))),
    }
}

pub(crate) fn style_of<'a>(store: &'a WorldStore, character: &Character) -> SimResult<&'a StyleCombat> {
    store.style_combats.get(character.style_combat_id).ok_or_else(|| {
        SimError::integrity(format!(
            "combat style {} of character {} does not exist",
            character.style_combat_id, character.id
        ))
    })
}

fn helper_powers(store: &WorldStore, fighter: &Character) -> Vec<f64> {
    match fighter.crew_id {
        Some(crew) => store
            .crew_members(crew)
            .filter(|m| m.id != fighter.id)
            .map(|m| store.power_of(m))
            .collect(),
        None => Vec::new(),
    }
}

fn fight(ctx: &mut SimContext, attacker_id: CharacterId, defender_id: CharacterId, mode: BattleMode) -> SimResult<BattleReport> {
    let attacker = ctx.store.characters.require(attacker_id)?.clone();
    let defender = ctx.store.characters.require(defender_id)?.clone();
    let attacker_style: StyleWeights = style_of(&ctx.store, &attacker)?.weights;
    let defender_style: StyleWeights = style_of(&ctx.store, &defender)?.weights;

    let attacker_power = ctx.store.power_of(&attacker);
    let defender_power = ctx.store.power_of(&defender);
    let help = ctx.config.regular_crew_help;
    let help_scale = combat::defender_help_scale(defender.kind, defender.level, attacker.level);
    let input = DuelInput {
        attacker_power,
        defender_power,
        attacker_help: combat::crew_assist(helper_powers(&ctx.store, &attacker), help),
        defender_help: combat::crew_assist(helper_powers(&ctx.store, &defender), help) * help_scale,
        type_advantage: combat::type_advantage(attacker.kind, defender.kind),
        style_advantage: combat::style_advantage(&attacker_style, &defender_style),
        mode,
    };

    let outcome = combat::resolve(&input, ctx.config.tuning.luck_spread, &mut ctx.rng);
    let log = combat::battle_log(&attacker.name, &defender.name, &outcome, &mut ctx.rng);
    let (winner, loser, winner_power, loser_power) = match outcome.winner {
        Side::Attacker => (&attacker, &defender, attacker_power, defender_power),
        Side::Defender => (&defender, &attacker, defender_power, attacker_power),
    };

    let experience = calculate_experience_gain(Combatant::new(winner, winner_power), Combatant::new(loser, loser_power));
    let bounty = calculate_bounty_gain(Combatant::new(winner, winner_power), Combatant::new(loser, loser_power));

    let mut rewards = compute_rewards(ctx, winner, loser, experience, bounty)?;

    let player_involved = ctx.player.is_player_character(&attacker) || ctx.player.is_player_character(&defender);
    let mut batch = WriteBatch::new();
    let mut devil_fruit = None;
    // Only the player can find a fruit, and only by winning.
    if mode == BattleMode::Duel && ctx.player.is_player_character(winner) {
        if let Some(fruit) = roll_devil_fruit_drop(ctx, &mut rewards.updated[0]) {
            devil_fruit = Some(fruit.id);
            batch.put_devil_fruit(fruit);
        }
    }

    let levels_gained = rewards.winner_levels;
    for character in rewards.updated {
        batch.put_character(character);
    }
    batch.append_battle(Battle {
        id: BattleId(0),
        challenger_id: attacker.id,
        opponent_id: defender.id,
        winner_id: winner.id,
        loser_id: loser.id,
        challenger_crew_id: attacker.crew_id,
        opponent_crew_id: defender.crew_id,
        experience_gained: experience,
        bounty_gained: bounty,
        damage: outcome.damage,
        log: log.clone(),
        timestamp: now_ms(),
    });

    let battle_id = ctx
        .store
        .commit(batch)?
        .first()
        .copied()
        .ok_or_else(|| SimError::invalid_state("battle record was not appended"))?;

    let importance = if player_involved {
        Importance::High
    } else if mode == BattleMode::Duel {
        Importance::Medium
    } else {
        Importance::Low
    };
    ctx.emit(WorldEvent::new(
        WorldEventKind::Battle,
        importance,
        format!("{} defeats {}", winner.name, loser.name),
        format!("{} gains {experience} experience and a {bounty} berry reward.", winner.name),
    ));
    for (name, level) in rewards.player_level_ups {
        ctx.emit(WorldEvent::new(
            WorldEventKind::LevelUp,
            Importance::Medium,
            format!("{name} reached level {level}"),
            "",
        ));
    }
    for name in rewards.king_haki {
        log::info!("{name} awakened the Conqueror's haki");
        ctx.emit(WorldEvent::new(
            WorldEventKind::KingHaki,
            Importance::High,
            format!("{name} awakens the Conqueror's haki"),
            "A wave of willpower sweeps the island.",
        ));
    }
    if let Some(id) = devil_fruit {
        ctx.emit(WorldEvent::new(
            WorldEventKind::DevilFruit,
            Importance::High,
            format!("{} obtained a devil fruit", winner.name),
            format!("Devil fruit #{id} found a new owner."),
        ));
    }

    Ok(BattleReport {
        battle_id,
        mode,
        winner_id: winner.id,
        loser_id: loser.id,
        winner_crew: winner.crew_id,
        loser_crew: loser.crew_id,
        experience_gained: experience,
        bounty_gained: bounty,
        damage: outcome.damage,
        winner_odds: outcome.winner_probability(),
        levels_gained,
        devil_fruit,
        log,
    })
}

struct Rewards {
    /// Updated records; the winner always comes first.
    updated: Vec<Character>,
    winner_levels: u32,
    player_level_ups: Vec<(String, u32)>,
    king_haki: Vec<String>,
}

/// The winner takes the full reward, crew-mates a share; the losing crew
/// loses some loyalty.
fn compute_rewards(ctx: &mut SimContext, winner: &Character, loser: &Character, experience: u64, bounty: u64) -> SimResult<Rewards> {
    let config: Arc<GenerationConfig> = Arc::clone(&ctx.config);
    let shared_experience = shared_reward(experience, config.regular_crew_shared_gain);
    let shared_bounty = shared_reward(bounty, config.regular_crew_shared_gain);

    let winner_mates: Vec<Character> = match winner.crew_id {
        Some(crew) => ctx.store.crew_members(crew).filter(|m| m.id != winner.id).cloned().collect(),
        None => Vec::new(),
    };
    let losing_side: Vec<Character> = match loser.crew_id {
        Some(crew) if loser.crew_id != winner.crew_id => ctx.store.crew_members(crew).cloned().collect(),
        _ => Vec::new(),
    };

    let mut rewards = Rewards {
        updated: Vec::with_capacity(1 + winner_mates.len() + losing_side.len()),
        winner_levels: 0,
        player_level_ups: Vec::new(),
        king_haki: Vec::new(),
    };

    let mut recipients = vec![(winner.clone(), experience, bounty, 0)];
    for mate in winner_mates {
        let gain = victory_loyalty_gain(&mut ctx.rng);
        recipients.push((mate, shared_experience, shared_bounty, gain));
    }

    for (mut character, exp, berries, loyalty) in recipients {
        character.loyalty = adjust_loyalty(character.loyalty, loyalty);
        if character.kind == CharacterType::Pirate {
            character.bounty = character.bounty.saturating_add(berries);
        }
        let check = apply_experience(&mut character, exp);
        if check.levels_gained > 0 {
            let style = style_of(&ctx.store, &character)?.clone();
            let growth = increase_stats(&mut character, &style, check.levels_gained, &config, &mut ctx.rng);
            if growth.king_haki_awakened {
                rewards.king_haki.push(character.name.clone());
            }
            if ctx.player.is_player_character(&character) {
                rewards.player_level_ups.push((character.name.clone(), character.level));
            }
        }
        if character.id == winner.id {
            rewards.winner_levels = check.levels_gained;
        }
        rewards.updated.push(character);
    }

    for mut member in losing_side {
        let loss = defeat_loyalty_loss(&mut ctx.rng);
        member.loyalty = adjust_loyalty(member.loyalty, loss);
        rewards.updated.push(member);
    }

    Ok(rewards)
}

/// Bind a random unowned fruit to a fruitless winner, with the configured
/// drop rate. `None` when the roll fails or no fruit is free.
fn roll_devil_fruit_drop(ctx: &mut SimContext, winner: &mut Character) -> Option<grandline_logic::entities::DevilFruit> {
    if winner.owns_devil_fruit() || ctx.rng.gen::<f64>() >= ctx.config.devil_fruit_drop_rate {
        return None;
    }
    let unowned: Vec<_> = ctx.store.devil_fruits.filter(|f| f.owner_id.is_none()).map(|f| f.id).collect();
    let id = *unowned.choose(&mut ctx.rng)?;
    let mut fruit = ctx.store.devil_fruits.get(id)?.clone();
    fruit.owner_id = Some(winner.id);
    winner.devil_fruit_id = Some(fruit.id);
    winner.stats.devil_fruit = winner.stats.devil_fruit.max(1);
    Some(fruit)
}
