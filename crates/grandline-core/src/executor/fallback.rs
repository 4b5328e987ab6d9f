//! World pass on the caller thread, one phase per scheduler dispatch.

use std::cell::RefCell;
use std::convert::Infallible;
use std::rc::Rc;
use std::time::Duration;

use super::{ExecutorError, ExecutorPoll, PassOutcome, SimulationExecutor, UpdateMethod};
use crate::context::SimContext;
use crate::pass::{run_phase, PassPhase, PassProgress, PassReport, PhaseOutcome, WorldPassPlan};
use crate::scheduler::{CooperativeScheduler, Priority, ProgressFn, SequenceStep, TaskHandle};
use crate::store::MergeCounts;

/// Background passes yield to anything the host schedules at default priority.
pub const PASS_PRIORITY: Priority = -10;

type PhaseResult = Result<PhaseOutcome, String>;

pub struct FallbackExecutor {
    scheduler: CooperativeScheduler<SimContext>,
    handle: Option<TaskHandle<Vec<PhaseResult>>>,
    phases: Vec<PassPhase>,
    progress: Rc<RefCell<PassProgress>>,
}

impl Default for FallbackExecutor {
    fn default() -> Self {
        Self {
            scheduler: CooperativeScheduler::new(),
            handle: None,
            phases: Vec::new(),
            progress: Rc::new(RefCell::new(PassProgress::after(0, 1, "Idle"))),
        }
    }
}

impl FallbackExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn collect(&self, results: Vec<PhaseResult>) -> PassReport {
        let mut report = PassReport::default();
        for (phase, result) in self.phases.iter().zip(results) {
            match result {
                Ok(outcome) => report.record(&outcome),
                Err(message) => report.record_failure(phase, &message),
            }
        }
        report
    }
}

impl SimulationExecutor for FallbackExecutor {
    fn method(&self) -> UpdateMethod {
        UpdateMethod::Fallback
    }

    fn start(&mut self, _ctx: &mut SimContext, plan: WorldPassPlan) -> Result<(), ExecutorError> {
        if self.handle.is_some() {
            return Err(ExecutorError::Busy);
        }
        self.phases = plan.phases().to_vec();
        let labels: Vec<&'static str> = self.phases.iter().map(PassPhase::label).collect();
        *self.progress.borrow_mut() = PassProgress::after(0, labels.len(), labels.first().copied().unwrap_or("Idle"));

        let steps: Vec<SequenceStep<SimContext, PhaseResult, Infallible>> = self
            .phases
            .iter()
            .cloned()
            .map(|phase| -> SequenceStep<SimContext, PhaseResult, Infallible> {
                // A failing phase is recorded, not fatal to the sequence.
                Box::new(move |ctx: &mut SimContext| Ok(run_phase(ctx, &phase).map_err(|err| err.to_string())))
            })
            .collect();

        let progress = Rc::clone(&self.progress);
        let total = labels.len();
        let on_progress: ProgressFn = Box::new(move |percent: f64| {
            let done = ((percent / 100.0) * total as f64).round() as usize;
            let phase = labels.get(done.saturating_sub(1)).copied().unwrap_or("Finishing");
            *progress.borrow_mut() = PassProgress { phase, percent };
        });
        self.handle = Some(self.scheduler.execute_sequence(steps, PASS_PRIORITY, Some(on_progress)));
        Ok(())
    }

    fn poll(&mut self, ctx: &mut SimContext, budget: Duration) -> ExecutorPoll {
        let Some(handle) = self.handle.as_mut() else {
            return ExecutorPoll::Idle;
        };
        self.scheduler.pump(ctx, budget);
        match handle.poll() {
            None => ExecutorPoll::Running(*self.progress.borrow()),
            Some(Ok(results)) => {
                self.handle = None;
                ExecutorPoll::Finished(PassOutcome {
                    report: self.collect(results),
                    method: UpdateMethod::Fallback,
                    merge: MergeCounts::default(),
                })
            }
            Some(Err(err)) => {
                self.handle = None;
                ExecutorPoll::Failed(ExecutorError::Fallback(err))
            }
        }
    }

    fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}
