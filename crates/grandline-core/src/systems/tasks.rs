//! Timed tasks: starting them and paying out when they finish.

use grandline_logic::entities::{CharacterType, StatAxis, MAX_SHIP_LEVEL};
use grandline_logic::ids::*;
use grandline_logic::progression::apply_experience;
use grandline_logic::stats::increase_stats;
use grandline_logic::tasks::{Task, TaskKind, TaskReward};

use crate::context::SimContext;
use crate::error::{SimError, SimResult};
use crate::events::{Importance, WorldEvent, WorldEventKind};
use crate::systems::battle::style_of;
use crate::systems::movement::move_crew_to;

const MIN_KINDNESS: i32 = -100;
const MAX_KINDNESS: i32 = 100;

/// Berries found per point of island difficulty.
pub const EXPLORATION_TREASURE_PER_DIFFICULTY: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEffect {
    Trained { axis: StatAxis, points: u32 },
    Relocated { island: IslandId },
    ShipUpgraded { level: u32 },
    Liberated { island: IslandId, previous: Option<CrewId> },
    Explored { island: IslandId, treasure: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskCompletion {
    pub task: TaskId,
    pub levels_gained: u32,
    pub effect: TaskEffect,
}

pub fn start_task(
    ctx: &mut SimContext,
    character: CharacterId,
    kind: TaskKind,
    reward: TaskReward,
    now: u64,
    duration_ms: u64,
) -> SimResult<TaskId> {
    ctx.store.characters.require(character)?;
    let label = kind.label();
    let id = ctx.store.tasks.insert(Task::new(character, kind, reward, now, duration_ms))?;
    log::debug!("task {id} ({label}) started for character {character}");
    Ok(id)
}

fn crew_of(ctx: &SimContext, character: CharacterId) -> SimResult<CrewId> {
    ctx.store
        .characters
        .require(character)?
        .crew_id
        .ok_or_else(|| SimError::invalid_state(format!("character {character} has no crew")))
}

/// World-side effect of a finished task. Runs before any reward is granted
/// so a failing effect leaves the character untouched.
fn apply_effect(ctx: &mut SimContext, task: &Task) -> SimResult<TaskEffect> {
    match task.kind {
        TaskKind::Training { focus, points } => Ok(TaskEffect::Trained { axis: focus, points }),
        TaskKind::Navigation { destination } => {
            let crew = crew_of(ctx, task.character_id)?;
            let decision = move_crew_to(ctx, crew, destination)?;
            Ok(TaskEffect::Relocated {
                island: decision.to_island(),
            })
        }
        TaskKind::ShipUpgrade { target_level } => {
            let crew = crew_of(ctx, task.character_id)?;
            let ship = ctx
                .store
                .ship_of(crew)
                .ok_or_else(|| SimError::NotFound(format!("ship of crew {crew}")))?;
            let level = target_level.min(MAX_SHIP_LEVEL).max(ship.level);
            let ship_id = ship.id;
            ctx.store.ships.update(ship_id, |s| {
                s.level = level;
                s.need_repair = false;
            })?;
            Ok(TaskEffect::ShipUpgraded { level })
        }
        TaskKind::Liberation { island } => {
            let territory = ctx
                .store
                .territory_of_island(island)
                .cloned()
                .ok_or_else(|| SimError::NotFound(format!("territory of island {island}")))?;
            ctx.store.territories.update(territory.id, |t| t.crew_id = None)?;
            if territory.crew_id.is_some() {
                let name = ctx.store.islands.require(island)?.name.clone();
                ctx.emit(WorldEvent::new(
                    WorldEventKind::Territory,
                    Importance::High,
                    format!("{name} has been liberated"),
                    "",
                ));
            }
            Ok(TaskEffect::Liberated {
                island,
                previous: territory.crew_id,
            })
        }
        TaskKind::Exploration { island } => {
            let difficulty = ctx.store.islands.require(island)?.difficulty;
            let treasure = difficulty as u64 * EXPLORATION_TREASURE_PER_DIFFICULTY;
            if let Some(crew) = ctx.store.characters.require(task.character_id)?.crew_id {
                ctx.store.crews.update(crew, |c| c.treasury = c.treasury.saturating_add(treasure))?;
            }
            Ok(TaskEffect::Explored { island, treasure })
        }
    }
}

/// Finish `task_id` at `now`: apply its effect, then pay its reward.
pub fn complete_task(ctx: &mut SimContext, task_id: TaskId, now: u64) -> SimResult<TaskCompletion> {
    let task = ctx.store.tasks.require(task_id)?.clone();
    if task.is_completed {
        return Err(SimError::invalid_state(format!("task {task_id} is already completed")));
    }
    if !task.is_finished(now) {
        return Err(SimError::TaskNotFinished(task_id));
    }
    let character = ctx.store.characters.require(task.character_id)?;
    let style = style_of(&ctx.store, character)?.clone();

    let effect = apply_effect(ctx, &task)?;

    let mut character = ctx.store.characters.require(task.character_id)?.clone();
    if let TaskEffect::Trained { axis, points } = effect {
        character.stats.add(axis, points);
    }
    let check = apply_experience(&mut character, task.reward.experience);
    let mut king_haki = false;
    if check.levels_gained > 0 {
        let config = ctx.config.clone();
        king_haki = increase_stats(&mut character, &style, check.levels_gained, &config, &mut ctx.rng).king_haki_awakened;
    }
    if character.kind == CharacterType::Pirate {
        character.bounty = character.bounty.saturating_add(task.reward.bounty);
    }
    character.kindness = (character.kindness + task.reward.kindness).clamp(MIN_KINDNESS, MAX_KINDNESS);

    let is_player = ctx.player.is_player_character(&character);
    let name = character.name.clone();
    let level = character.level;
    ctx.store.characters.put(character);
    ctx.store.tasks.update(task_id, |t| t.is_completed = true)?;

    ctx.emit(WorldEvent::new(
        WorldEventKind::Task,
        if is_player { Importance::Medium } else { Importance::Low },
        format!("{name} completed {}", task.kind.label()),
        format!("+{} experience", task.reward.experience),
    ));
    if is_player && check.levels_gained > 0 {
        ctx.emit(WorldEvent::new(
            WorldEventKind::LevelUp,
            Importance::Medium,
            format!("{name} reached level {level}"),
            "",
        ));
    }
    if king_haki {
        ctx.emit(WorldEvent::new(
            WorldEventKind::KingHaki,
            Importance::High,
            format!("{name} awakens the Conqueror's haki"),
            "",
        ));
    }

    Ok(TaskCompletion {
        task: task_id,
        levels_gained: check.levels_gained,
        effect,
    })
}
