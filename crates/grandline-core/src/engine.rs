//! World engine - main entry point for running the simulation
//!
//! Owns the caller-thread [`SimContext`] and the [`BackgroundCoordinator`].
//! Player actions run immediately and return their result; world passes run
//! in the background and advance from [`WorldEngine::poll`].

use std::io::{Read, Write};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use grandline_logic::config::GenerationConfig;
use grandline_logic::ids::{CharacterId, IslandId, TaskId};
use grandline_logic::movement::MovementDecision;
use grandline_logic::recruitment::RecruitmentOffer;
use grandline_logic::tasks::{TaskKind, TaskReward};

use crate::context::{PlayerIdentity, SimContext};
use crate::coordinator::{BackgroundCoordinator, CoordinatorConfig, UpdateRequestOutcome, UpdateStats, UpdateStatus};
use crate::error::{SimError, SimResult};
use crate::events::WorldEvent;
use crate::executor::{ExecutorError, PassOutcome};
use crate::generation::{generate_world, WorldGenConfig};
use crate::persistence::{load_world, save_world, SaveData, SaveError};
use crate::store::WorldStore;
use crate::systems::{self, BattleReport, EncounterSummary, RecruitmentAttempt, TaskCompletion, TerritoryChange};

/// What happened on the island the player just reached.
#[derive(Debug, Clone, PartialEq)]
pub struct IslandArrival {
    pub encounters: EncounterSummary,
    pub territory: Option<TerritoryChange>,
}

pub struct WorldEngine {
    ctx: SimContext,
    coordinator: BackgroundCoordinator,
}

impl WorldEngine {
    pub fn new(ctx: SimContext, coordinator: CoordinatorConfig) -> Self {
        Self {
            ctx,
            coordinator: BackgroundCoordinator::new(coordinator),
        }
    }

    /// Generate a fresh world from `seed`.
    pub fn generate(
        config: GenerationConfig,
        gen: &WorldGenConfig,
        seed: u64,
        coordinator: CoordinatorConfig,
    ) -> SimResult<Self> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let world = generate_world(gen, &config, &mut rng)?;
        let ctx = SimContext::new(world.store, Arc::new(config), world.player, seed.wrapping_add(1));
        Ok(Self::new(ctx, coordinator))
    }

    pub fn context(&self) -> &SimContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut SimContext {
        &mut self.ctx
    }

    pub fn store(&self) -> &WorldStore {
        &self.ctx.store
    }

    pub fn player(&self) -> PlayerIdentity {
        self.ctx.player
    }

    pub fn player_island(&self) -> Option<IslandId> {
        self.ctx.player.crew(&self.ctx.store).map(|c| c.current_island)
    }

    // ── Player actions ─────────────────────────────────────────────────

    /// Duel between two characters, usually the player and an opponent.
    pub fn simulate_battle(&mut self, challenger: CharacterId, opponent: CharacterId) -> SimResult<BattleReport> {
        let report = systems::simulate_battle(&mut self.ctx, challenger, opponent);
        self.coordinator.flush_events(&mut self.ctx);
        report
    }

    /// Play out encounters on the player's island, then ask for a world pass.
    /// Returns `None` when the player has no crew to anchor an island.
    pub fn update_world_after_player_action(&mut self, now: Instant) -> SimResult<Option<EncounterSummary>> {
        let Some(island) = self.player_island() else {
            return Ok(None);
        };
        let summary = systems::simulate_island_encounters(&mut self.ctx, island);
        self.coordinator.flush_events(&mut self.ctx);
        let summary = summary?;
        self.request_background(now);
        Ok(Some(summary))
    }

    /// Encounters and a territory check on the island the player now stands
    /// on, then a world pass request.
    pub fn on_player_island_change(&mut self, now: Instant) -> SimResult<Option<IslandArrival>> {
        let Some(island) = self.player_island() else {
            return Ok(None);
        };
        let arrival = systems::simulate_island_encounters(&mut self.ctx, island).and_then(|encounters| {
            let territory = systems::reevaluate_island_territory(&mut self.ctx, island)?;
            Ok(IslandArrival { encounters, territory })
        });
        self.coordinator.flush_events(&mut self.ctx);
        let arrival = arrival?;
        self.request_background(now);
        Ok(Some(arrival))
    }

    /// Sail the player's crew to `destination` and run the arrival checks.
    pub fn sail_to(&mut self, destination: IslandId, now: Instant) -> SimResult<IslandArrival> {
        let crew = self
            .ctx
            .player
            .crew_id(&self.ctx.store)
            .ok_or_else(|| SimError::invalid_state("the player has no crew"))?;
        let decision: MovementDecision = systems::move_crew_to(&mut self.ctx, crew, destination)?;
        log::info!("player crew sailed from island {} to {}", decision.from_island(), decision.to_island());
        self.on_player_island_change(now)?
            .ok_or_else(|| SimError::invalid_state("the player lost their crew on the way"))
    }

    pub fn start_task(
        &mut self,
        character: CharacterId,
        kind: TaskKind,
        reward: TaskReward,
        now_ms: u64,
        duration_ms: u64,
    ) -> SimResult<TaskId> {
        systems::start_task(&mut self.ctx, character, kind, reward, now_ms, duration_ms)
    }

    pub fn complete_task(&mut self, task: TaskId, now_ms: u64) -> SimResult<TaskCompletion> {
        let completion = systems::complete_task(&mut self.ctx, task, now_ms);
        self.coordinator.flush_events(&mut self.ctx);
        completion
    }

    pub fn evaluate_recruitment(&self, target: CharacterId) -> SimResult<RecruitmentOffer> {
        systems::evaluate_player_recruitment(&self.ctx, target)
    }

    pub fn recruit(&mut self, target: CharacterId) -> SimResult<RecruitmentAttempt> {
        let attempt = systems::attempt_player_recruitment(&mut self.ctx, target);
        self.coordinator.flush_events(&mut self.ctx);
        attempt
    }

    // ── Background passes ──────────────────────────────────────────────

    pub fn update_world_background(&mut self, force: bool, now: Instant) -> Result<UpdateRequestOutcome, ExecutorError> {
        self.coordinator.update_world_background(&mut self.ctx, force, now)
    }

    /// Host idle callback.
    pub fn poll(&mut self, now: Instant) -> Option<PassOutcome> {
        self.coordinator.poll(&mut self.ctx, now)
    }

    /// Poll until the running pass ends or `timeout` passes. Returns the
    /// outcome if one finished.
    pub fn run_until_idle(&mut self, timeout: Duration) -> Option<PassOutcome> {
        let deadline = Instant::now() + timeout;
        let mut finished = None;
        while self.coordinator.status().is_updating && Instant::now() < deadline {
            match self.coordinator.poll(&mut self.ctx, Instant::now()) {
                Some(outcome) => finished = Some(outcome),
                None => thread::sleep(Duration::from_millis(1)),
            }
        }
        finished
    }

    fn request_background(&mut self, now: Instant) {
        match self.coordinator.update_world_background(&mut self.ctx, false, now) {
            Ok(outcome) => log::debug!("background update after player action: {outcome:?}"),
            Err(err) => log::error!("background update could not start: {err}"),
        }
    }

    // ── Readouts ───────────────────────────────────────────────────────

    pub fn status(&self) -> &UpdateStatus {
        self.coordinator.status()
    }

    pub fn stats(&self) -> UpdateStats {
        self.coordinator.stats()
    }

    pub fn subscribe(&mut self) -> Receiver<WorldEvent> {
        self.coordinator.subscribe()
    }

    pub fn recent_events(&self) -> impl Iterator<Item = &WorldEvent> + '_ {
        self.coordinator.recent_events()
    }

    // ── Save/Load ──────────────────────────────────────────────────────

    pub fn save<W: Write>(&self, writer: W) -> Result<(), SaveError> {
        save_world(writer, &self.ctx.store, self.ctx.player, &self.ctx.config)
    }

    pub fn load<R: Read>(reader: R, seed: u64, coordinator: CoordinatorConfig) -> Result<Self, SaveError> {
        let SaveData { config, player, store, .. } = load_world(reader)?;
        let ctx = SimContext::new(store, Arc::new(config), player, seed);
        Ok(Self::new(ctx, coordinator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grandline_logic::entities::CharacterType;

    fn small_world() -> WorldGenConfig {
        WorldGenConfig {
            island_count: 30,
            npc_crews: 40,
            government_agents: 10,
            devil_fruits: 10,
            ..WorldGenConfig::default()
        }
    }

    fn caller_thread_only() -> CoordinatorConfig {
        CoordinatorConfig {
            prefer_worker: false,
            ..CoordinatorConfig::default()
        }
    }

    fn engine(seed: u64) -> WorldEngine {
        WorldEngine::generate(GenerationConfig::default(), &small_world(), seed, caller_thread_only()).unwrap()
    }

    #[test]
    fn player_battle_reaches_the_feed() {
        let mut engine = engine(1);
        let events = engine.subscribe();
        let player = engine.player().character_id.unwrap();
        let opponent = engine
            .store()
            .characters
            .find(|c| c.kind == CharacterType::Government)
            .map(|c| c.id)
            .unwrap();

        let report = engine.simulate_battle(player, opponent).unwrap();
        assert!(report.winner_id == player || report.winner_id == opponent);
        assert!(engine.store().battles.contains(report.battle_id));
        assert!(events.try_recv().is_ok());
    }

    #[test]
    fn player_action_requests_a_pass() {
        let mut engine = engine(2);
        let t0 = Instant::now();
        let summary = engine.update_world_after_player_action(t0).unwrap().unwrap();
        assert_eq!(Some(summary.island), engine.player_island());
        assert!(engine.status().is_updating);

        let outcome = engine.run_until_idle(Duration::from_secs(30)).unwrap();
        assert_eq!(outcome.report.failed_phases, 0);
        assert_eq!(engine.stats().fallback_updates, 1);
        assert!(!engine.store().yonkou.is_empty());
    }

    #[test]
    fn island_change_inside_cooldown_does_not_restart() {
        let mut engine = engine(3);
        let t0 = Instant::now();
        engine.update_world_background(true, t0).unwrap();
        engine.run_until_idle(Duration::from_secs(30));

        engine.on_player_island_change(t0 + Duration::from_secs(1)).unwrap().unwrap();
        assert!(!engine.status().is_updating);
    }

    #[test]
    fn sailing_too_far_is_rejected() {
        let mut engine = engine(4);
        let far = engine
            .store()
            .islands
            .find(|i| i.difficulty >= 10)
            .map(|i| i.id)
            .unwrap();
        let home = engine.player_island();
        assert!(matches!(engine.sail_to(far, Instant::now()), Err(SimError::Movement(_))));
        assert_eq!(engine.player_island(), home);
    }

    #[test]
    fn save_and_load_preserve_the_world() {
        let engine = engine(5);
        let mut buffer = Vec::new();
        engine.save(&mut buffer).unwrap();
        let loaded = WorldEngine::load(&buffer[..], 9, caller_thread_only()).unwrap();
        assert_eq!(loaded.store(), engine.store());
        assert_eq!(loaded.player(), engine.player());
    }
}
