//! A world pass and the phases it is cut into.
//!
//! A pass moves crews, plays out encounters island by island, settles
//! territory, rebuilds ranks and prunes empty crews. Each phase is a unit the
//! background executors can run on their own, so the fallback executor can
//! yield between them. A failing phase is logged and the pass goes on.

use grandline_logic::ids::IslandId;

use crate::context::SimContext;
use crate::error::SimResult;
use crate::systems::encounters::{simulate_island_encounters, EncounterSummary};
use crate::systems::membership::prune_empty_crews;
use crate::systems::movement::{simulate_world_movement, MovementSummary};
use crate::systems::ranks::{redistribute_ranks, RankSummary};
use crate::systems::territory::{redistribute_territories, TerritoryChange};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassPhase {
    Movement,
    Encounters { islands: Vec<IslandId> },
    Territory,
    Ranks,
    Cleanup,
}

impl PassPhase {
    pub fn label(&self) -> &'static str {
        match self {
            PassPhase::Movement => "Moving crews",
            PassPhase::Encounters { .. } => "Simulating encounters",
            PassPhase::Territory => "Redistributing territories",
            PassPhase::Ranks => "Redistributing ranks",
            PassPhase::Cleanup => "Disbanding empty crews",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldPassPlan {
    phases: Vec<PassPhase>,
}

impl WorldPassPlan {
    /// Every phase over every island, encounters chunked by
    /// `encounter_islands_per_step`.
    pub fn full(ctx: &SimContext) -> Self {
        let islands = ctx.store.islands.ids();
        let per_step = ctx.config.tuning.encounter_islands_per_step.max(1);
        let mut phases = vec![PassPhase::Movement];
        phases.extend(islands.chunks(per_step).map(|chunk| PassPhase::Encounters {
            islands: chunk.to_vec(),
        }));
        phases.extend([PassPhase::Territory, PassPhase::Ranks, PassPhase::Cleanup]);
        Self { phases }
    }

    pub fn from_phases(phases: Vec<PassPhase>) -> Self {
        Self { phases }
    }

    pub fn phases(&self) -> &[PassPhase] {
        &self.phases
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PhaseOutcome {
    Movement(MovementSummary),
    Encounters(Vec<EncounterSummary>),
    Territory(Vec<TerritoryChange>),
    Ranks(RankSummary),
    Cleanup { pruned: usize },
}

pub fn run_phase(ctx: &mut SimContext, phase: &PassPhase) -> SimResult<PhaseOutcome> {
    Ok(match phase {
        PassPhase::Movement => PhaseOutcome::Movement(simulate_world_movement(ctx)?),
        PassPhase::Encounters { islands } => {
            let mut summaries = Vec::with_capacity(islands.len());
            for &island in islands {
                match simulate_island_encounters(ctx, island) {
                    Ok(summary) => summaries.push(summary),
                    Err(err) => log::error!("encounters on island {island} failed: {err}"),
                }
            }
            PhaseOutcome::Encounters(summaries)
        }
        PassPhase::Territory => PhaseOutcome::Territory(redistribute_territories(ctx)?),
        PassPhase::Ranks => PhaseOutcome::Ranks(redistribute_ranks(ctx)?),
        PassPhase::Cleanup => PhaseOutcome::Cleanup {
            pruned: prune_empty_crews(ctx)?,
        },
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassProgress {
    pub phase: &'static str,
    /// 0..=100
    pub percent: f64,
}

impl PassProgress {
    pub fn after(done: usize, total: usize, phase: &'static str) -> Self {
        let percent = if total == 0 {
            100.0
        } else {
            done as f64 / total as f64 * 100.0
        };
        Self { phase, percent }
    }
}

/// Totals over a whole pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassReport {
    pub movement: MovementSummary,
    pub encounters: usize,
    pub battles: usize,
    pub encounter_errors: usize,
    pub territory_changes: usize,
    pub ranks: RankSummary,
    pub pruned: usize,
    pub failed_phases: usize,
}

impl PassReport {
    pub fn record(&mut self, outcome: &PhaseOutcome) {
        match outcome {
            PhaseOutcome::Movement(summary) => self.movement = *summary,
            PhaseOutcome::Encounters(summaries) => {
                for summary in summaries {
                    self.encounters += summary.encounters();
                    self.battles += summary.battles.len();
                    self.encounter_errors += summary.errors;
                }
            }
            PhaseOutcome::Territory(changes) => self.territory_changes += changes.len(),
            PhaseOutcome::Ranks(summary) => self.ranks = *summary,
            PhaseOutcome::Cleanup { pruned } => self.pruned += pruned,
        }
    }

    pub fn record_failure(&mut self, phase: &PassPhase, err: &dyn std::fmt::Display) {
        log::error!("world pass phase '{}' failed: {err}", phase.label());
        self.failed_phases += 1;
    }
}

/// Run `plan` to the end in one go, reporting progress after each phase.
pub fn run_world_pass<F: FnMut(PassProgress)>(ctx: &mut SimContext, plan: &WorldPassPlan, mut on_progress: F) -> PassReport {
    let mut report = PassReport::default();
    for (done, phase) in plan.phases().iter().enumerate() {
        match run_phase(ctx, phase) {
            Ok(outcome) => report.record(&outcome),
            Err(err) => report.record_failure(phase, &err),
        }
        on_progress(PassProgress::after(done + 1, plan.len(), phase.label()));
    }
    log::info!(
        "world pass: {} encounters, {} battles, {} territory changes, {} crews pruned",
        report.encounters,
        report.battles,
        report.territory_changes,
        report.pruned
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::Fixture;
    use grandline_logic::config::{GenerationConfig, SimulationTuning};
    use grandline_logic::entities::CrewType;

    #[test]
    fn plan_chunks_islands() {
        let config = GenerationConfig {
            tuning: SimulationTuning {
                encounter_islands_per_step: 2,
                ..SimulationTuning::default()
            },
            ..GenerationConfig::default()
        };
        let mut fx = Fixture::with_config(config, 1);
        for d in 1..=5 {
            fx.island(d);
        }
        let plan = WorldPassPlan::full(&fx.ctx);
        assert_eq!(plan.len(), 1 + 3 + 3);
        assert_eq!(plan.phases()[0], PassPhase::Movement);
        assert_eq!(plan.phases()[3], PassPhase::Encounters { islands: vec![IslandId(5)] });
        assert_eq!(plan.phases().last(), Some(&PassPhase::Cleanup));
    }

    #[test]
    fn progress_reaches_hundred() {
        let mut fx = Fixture::new(2);
        let island = fx.island(1);
        fx.crew(CrewType::Pirate, island, 5);
        fx.crew(CrewType::Marine, island, 5);
        let plan = WorldPassPlan::full(&fx.ctx);

        let mut seen = Vec::new();
        let report = run_world_pass(&mut fx.ctx, &plan, |p| seen.push(p.percent));
        assert_eq!(seen.len(), plan.len());
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(seen.last().copied(), Some(100.0));
        assert_eq!(report.failed_phases, 0);
        assert_eq!(report.ranks.yonkou, 1);
    }

    #[test]
    fn bad_island_does_not_stop_the_pass() {
        let mut fx = Fixture::new(2);
        fx.island(1);
        let plan = WorldPassPlan::from_phases(vec![
            PassPhase::Encounters {
                islands: vec![IslandId(99), IslandId(1)],
            },
            PassPhase::Ranks,
        ]);
        let report = run_world_pass(&mut fx.ctx, &plan, |_| {});
        assert_eq!(report.failed_phases, 0);
        assert_eq!(report.encounters, 0);
    }

    #[test]
    fn empty_plan_is_complete() {
        assert_eq!(PassProgress::after(0, 0, "idle").percent, 100.0);
        assert!(WorldPassPlan::from_phases(Vec::new()).is_empty());
    }
}
