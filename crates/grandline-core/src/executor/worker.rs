//! World pass on a dedicated thread.
//!
//! The worker owns nothing but the snapshot it is handed. Requests and
//! replies carry a task id so a late reply from an abandoned pass is never
//! mistaken for the current one. Results come back as the worker's final
//! store, which is diffed against the snapshot and merged on the caller.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use rand::Rng;

use super::{ExecutorError, ExecutorPoll, PassOutcome, SimulationExecutor, UpdateMethod};
use crate::context::SimContext;
use crate::pass::{run_world_pass, PassProgress, PassReport, WorldPassPlan};
use crate::store::WorldStore;
use crate::systems::membership::reconcile_merged_crews;

/// What the worker thread runs for each request.
pub type PassRunner = fn(&mut SimContext, &WorldPassPlan, &mut dyn FnMut(PassProgress)) -> Result<PassReport, String>;

fn full_pass(ctx: &mut SimContext, plan: &WorldPassPlan, on_progress: &mut dyn FnMut(PassProgress)) -> Result<PassReport, String> {
    Ok(run_world_pass(ctx, plan, on_progress))
}

enum Request {
    RunPass {
        task_id: u64,
        ctx: Box<SimContext>,
        plan: WorldPassPlan,
    },
    Shutdown,
}

enum Reply {
    Progress {
        task_id: u64,
        progress: PassProgress,
    },
    Completed {
        task_id: u64,
        ctx: Box<SimContext>,
        report: PassReport,
    },
    Failed {
        task_id: u64,
        message: String,
    },
}

fn worker_loop(requests: Receiver<Request>, replies: Sender<Reply>, runner: PassRunner) {
    for request in requests.iter() {
        let (task_id, mut ctx, plan) = match request {
            Request::RunPass { task_id, ctx, plan } => (task_id, ctx, plan),
            Request::Shutdown => break,
        };
        log::debug!("worker: pass {task_id} started with {} phases", plan.len());
        let progress_tx = replies.clone();
        let mut on_progress = |progress: PassProgress| {
            let _ = progress_tx.send(Reply::Progress { task_id, progress });
        };
        let reply = match runner(ctx.as_mut(), &plan, &mut on_progress) {
            Ok(report) => Reply::Completed { task_id, ctx, report },
            Err(message) => Reply::Failed { task_id, message },
        };
        if replies.send(reply).is_err() {
            break;
        }
    }
    log::debug!("worker: shutting down");
}

struct RunningPass {
    task_id: u64,
    base: WorldStore,
    progress: PassProgress,
}

pub struct WorkerExecutor {
    requests: Sender<Request>,
    replies: Receiver<Reply>,
    handle: Option<JoinHandle<()>>,
    running: Option<RunningPass>,
    next_task_id: u64,
}

impl WorkerExecutor {
    pub fn spawn() -> Result<Self, ExecutorError> {
        Self::spawn_with(full_pass)
    }

    /// Worker that runs `runner` instead of a plain world pass.
    pub fn spawn_with(runner: PassRunner) -> Result<Self, ExecutorError> {
        let (requests, request_rx) = unbounded();
        let (reply_tx, replies) = unbounded();
        let handle = thread::Builder::new()
            .name("grandline-world-worker".into())
            .spawn(move || worker_loop(request_rx, reply_tx, runner))
            .map_err(|err| ExecutorError::Spawn(err.to_string()))?;
        log::info!("world worker thread started");
        Ok(Self {
            requests,
            replies,
            handle: Some(handle),
            running: None,
            next_task_id: 1,
        })
    }

    pub fn is_alive(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn finish(&mut self, ctx: &mut SimContext, running: RunningPass, mut worker_ctx: Box<SimContext>, report: PassReport) -> ExecutorPoll {
        let changes = WorldStore::diff(&running.base, &worker_ctx.store);
        let changed = changes.len();
        let before = ctx.store.crew_assignments();
        let mut merge = ctx.store.apply_changeset(&running.base, changes);
        ctx.store.settle_worker_ids(&running.base, &worker_ctx.store);
        match reconcile_merged_crews(ctx, &running.base, &before) {
            Ok(repairs) => merge.repaired = repairs.total(),
            Err(err) => log::error!("pass {}: crew repair after merge failed: {err}", running.task_id),
        }
        if merge.conflicts > 0 {
            log::warn!(
                "pass {}: {} rows changed on the caller during the pass were kept",
                running.task_id,
                merge.conflicts
            );
        }
        for event in worker_ctx.drain_events() {
            ctx.emit(event);
        }
        log::debug!("pass {}: merged {} of {changed} changes", running.task_id, merge.applied);
        ExecutorPoll::Finished(PassOutcome {
            report,
            method: UpdateMethod::Worker,
            merge,
        })
    }
}

impl SimulationExecutor for WorkerExecutor {
    fn method(&self) -> UpdateMethod {
        UpdateMethod::Worker
    }

    fn start(&mut self, ctx: &mut SimContext, plan: WorldPassPlan) -> Result<(), ExecutorError> {
        if self.running.is_some() {
            return Err(ExecutorError::Busy);
        }
        let snapshot = ctx.store.fork_for_worker();
        let base = snapshot.clone();
        let seed = ctx.rng.gen();
        let worker_ctx = Box::new(ctx.for_snapshot(snapshot, seed));

        let task_id = self.next_task_id;
        self.next_task_id += 1;
        self.requests
            .send(Request::RunPass {
                task_id,
                ctx: worker_ctx,
                plan,
            })
            .map_err(|_| ExecutorError::WorkerCrashed)?;
        self.running = Some(RunningPass {
            task_id,
            base,
            progress: PassProgress::after(0, 1, "Starting"),
        });
        Ok(())
    }

    fn poll(&mut self, ctx: &mut SimContext, _budget: Duration) -> ExecutorPoll {
        let Some(mut running) = self.running.take() else {
            return ExecutorPoll::Idle;
        };
        loop {
            match self.replies.try_recv() {
                Ok(Reply::Progress { task_id, progress }) if task_id == running.task_id => {
                    running.progress = progress;
                }
                Ok(Reply::Completed { task_id, ctx: worker_ctx, report }) if task_id == running.task_id => {
                    return self.finish(ctx, running, worker_ctx, report);
                }
                Ok(Reply::Failed { task_id, message }) if task_id == running.task_id => {
                    ctx.store.settle_worker_ids(&running.base, &running.base);
                    return ExecutorPoll::Failed(ExecutorError::PassFailed(message));
                }
                Ok(_) => log::debug!("dropping reply from an abandoned pass"),
                Err(TryRecvError::Empty) => {
                    let progress = running.progress;
                    self.running = Some(running);
                    return ExecutorPoll::Running(progress);
                }
                Err(TryRecvError::Disconnected) => {
                    log::error!("world worker disconnected during pass {}", running.task_id);
                    ctx.store.settle_worker_ids(&running.base, &running.base);
                    return ExecutorPoll::Failed(ExecutorError::WorkerCrashed);
                }
            }
        }
    }

    fn is_running(&self) -> bool {
        self.running.is_some()
    }
}

impl Drop for WorkerExecutor {
    fn drop(&mut self) {
        let _ = self.requests.send(Request::Shutdown);
        // Joining mid-pass would block the caller until the pass ends.
        if self.running.is_none() {
            if let Some(handle) = self.handle.take() {
                let _ = handle.join();
            }
        }
    }
}
