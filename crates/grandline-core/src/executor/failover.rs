//! Worker first, fallback when the worker cannot be used.

use std::time::Duration;

use super::{ExecutorError, ExecutorPoll, FallbackExecutor, SimulationExecutor, UpdateMethod, WorkerExecutor};
use crate::context::SimContext;
use crate::pass::{PassProgress, WorldPassPlan};

/// Once the worker fails it is dropped for good and every later pass runs
/// on the fallback. A pass that failed on the worker is retried there once.
pub struct FailoverExecutor {
    worker: Option<WorkerExecutor>,
    fallback: FallbackExecutor,
    active: Option<UpdateMethod>,
    retry_plan: Option<WorldPassPlan>,
}

impl FailoverExecutor {
    /// Spawn the worker when `prefer_worker` is set. A worker that cannot
    /// start leaves only the fallback.
    pub fn new(prefer_worker: bool) -> Self {
        let worker = if prefer_worker {
            match WorkerExecutor::spawn() {
                Ok(worker) => Some(worker),
                Err(err) => {
                    log::warn!("{err}; world passes will run on the caller thread");
                    None
                }
            }
        } else {
            None
        };
        Self::with_worker(worker)
    }

    pub fn with_worker(worker: Option<WorkerExecutor>) -> Self {
        Self {
            worker,
            fallback: FallbackExecutor::new(),
            active: None,
            retry_plan: None,
        }
    }

    pub fn worker_available(&self) -> bool {
        self.worker.is_some()
    }

    fn disable_worker(&mut self, reason: &ExecutorError) {
        log::warn!("world worker disabled: {reason}");
        self.worker = None;
    }

    fn retry_on_fallback(&mut self, ctx: &mut SimContext, failure: ExecutorError) -> ExecutorPoll {
        self.disable_worker(&failure);
        let Some(plan) = self.retry_plan.take() else {
            self.active = None;
            return ExecutorPoll::Failed(failure);
        };
        match self.fallback.start(ctx, plan) {
            Ok(()) => {
                log::info!("retrying world pass on the fallback executor");
                self.active = Some(UpdateMethod::Fallback);
                ExecutorPoll::Running(PassProgress::after(0, 1, "Retrying"))
            }
            Err(err) => {
                self.active = None;
                ExecutorPoll::Failed(err)
            }
        }
    }
}

impl SimulationExecutor for FailoverExecutor {
    fn method(&self) -> UpdateMethod {
        match (self.active, self.worker_available()) {
            (Some(method), _) => method,
            (None, true) => UpdateMethod::Worker,
            (None, false) => UpdateMethod::Fallback,
        }
    }

    fn start(&mut self, ctx: &mut SimContext, plan: WorldPassPlan) -> Result<(), ExecutorError> {
        if self.is_running() {
            return Err(ExecutorError::Busy);
        }
        if let Some(worker) = self.worker.as_mut() {
            match worker.start(ctx, plan.clone()) {
                Ok(()) => {
                    self.active = Some(UpdateMethod::Worker);
                    self.retry_plan = Some(plan);
                    return Ok(());
                }
                Err(err) => self.disable_worker(&err),
            }
        }
        self.fallback.start(ctx, plan)?;
        self.active = Some(UpdateMethod::Fallback);
        Ok(())
    }

    fn poll(&mut self, ctx: &mut SimContext, budget: Duration) -> ExecutorPoll {
        let polled = match (self.active, self.worker.as_mut()) {
            (None, _) => return ExecutorPoll::Idle,
            (Some(UpdateMethod::Worker), Some(worker)) => worker.poll(ctx, budget),
            (Some(UpdateMethod::Worker), None) => ExecutorPoll::Failed(ExecutorError::WorkerCrashed),
            (Some(UpdateMethod::Fallback), _) => self.fallback.poll(ctx, budget),
        };
        match polled {
            ExecutorPoll::Failed(err) if self.active == Some(UpdateMethod::Worker) => self.retry_on_fallback(ctx, err),
            ExecutorPoll::Finished(outcome) => {
                self.active = None;
                self.retry_plan = None;
                ExecutorPoll::Finished(outcome)
            }
            ExecutorPoll::Failed(err) => {
                self.active = None;
                ExecutorPoll::Failed(err)
            }
            ExecutorPoll::Idle => {
                self.active = None;
                ExecutorPoll::Idle
            }
            running => running,
        }
    }

    fn is_running(&self) -> bool {
        self.active.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::Fixture;
    use crate::pass::PassReport;
    use grandline_logic::entities::CrewType;
    use std::time::Instant;

    fn failing(_: &mut SimContext, _: &WorldPassPlan, _: &mut dyn FnMut(PassProgress)) -> Result<PassReport, String> {
        Err("mutiny".into())
    }

    fn run(executor: &mut FailoverExecutor, ctx: &mut SimContext) -> ExecutorPoll {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            match executor.poll(ctx, Duration::from_millis(5)) {
                ExecutorPoll::Running(_) if Instant::now() < deadline => std::thread::sleep(Duration::from_millis(1)),
                other => return other,
            }
        }
    }

    #[test]
    fn worker_failure_retries_on_fallback() {
        let mut fx = Fixture::new(4);
        let island = fx.island(1);
        fx.crew(CrewType::Pirate, island, 7);
        let worker = WorkerExecutor::spawn_with(failing).unwrap();
        let mut executor = FailoverExecutor::with_worker(Some(worker));
        assert_eq!(executor.method(), UpdateMethod::Worker);

        let plan = WorldPassPlan::full(&fx.ctx);
        executor.start(&mut fx.ctx, plan).unwrap();
        match run(&mut executor, &mut fx.ctx) {
            ExecutorPoll::Finished(outcome) => assert_eq!(outcome.method, UpdateMethod::Fallback),
            other => panic!("unexpected {other:?}"),
        }
        assert!(!executor.worker_available());
        assert_eq!(executor.method(), UpdateMethod::Fallback);
        assert_eq!(fx.ctx.store.yonkou.len(), 1);
    }

    #[test]
    fn without_worker_everything_runs_on_fallback() {
        let mut fx = Fixture::new(4);
        fx.island(1);
        let mut executor = FailoverExecutor::new(false);
        let plan = WorldPassPlan::full(&fx.ctx);
        executor.start(&mut fx.ctx, plan).unwrap();
        assert_eq!(executor.method(), UpdateMethod::Fallback);
        assert!(matches!(run(&mut executor, &mut fx.ctx), ExecutorPoll::Finished(_)));
        assert!(!executor.is_running());
    }

    #[test]
    fn healthy_worker_is_used() {
        let mut fx = Fixture::new(4);
        fx.island(1);
        let mut executor = FailoverExecutor::new(true);
        let plan = WorldPassPlan::full(&fx.ctx);
        executor.start(&mut fx.ctx, plan).unwrap();
        match run(&mut executor, &mut fx.ctx) {
            ExecutorPoll::Finished(outcome) => assert_eq!(outcome.method, UpdateMethod::Worker),
            other => panic!("unexpected {other:?}"),
        }
        assert!(executor.worker_available());
    }
}
