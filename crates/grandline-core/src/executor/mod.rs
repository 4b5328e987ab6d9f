//! Backends that run a world pass away from the host's hot path.
//!
//! | Executor | Where the pass runs |
//! |----------|---------------------|
//! | [`WorkerExecutor`] | Dedicated thread on a store snapshot, merged back as a changeset |
//! | [`FallbackExecutor`] | Caller thread, phase by phase through the cooperative scheduler |
//! | [`FailoverExecutor`] | Worker first, one retry on the fallback when the worker fails |

mod failover;
mod fallback;
mod worker;

use std::time::Duration;

use thiserror::Error;

use crate::context::SimContext;
use crate::pass::{PassProgress, PassReport, WorldPassPlan};
use crate::scheduler::SchedulerError;
use crate::store::MergeCounts;

pub use failover::FailoverExecutor;
pub use fallback::FallbackExecutor;
pub use worker::{PassRunner, WorkerExecutor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMethod {
    Worker,
    Fallback,
}

impl UpdateMethod {
    pub fn label(self) -> &'static str {
        match self {
            UpdateMethod::Worker => "worker",
            UpdateMethod::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorError {
    #[error("a world pass is already running")]
    Busy,
    #[error("failed to start worker thread: {0}")]
    Spawn(String),
    #[error("worker thread stopped responding")]
    WorkerCrashed,
    #[error("world pass failed: {0}")]
    PassFailed(String),
    #[error("fallback pass failed: {0}")]
    Fallback(#[from] SchedulerError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PassOutcome {
    pub report: PassReport,
    pub method: UpdateMethod,
    /// Rows merged back from a worker snapshot. Zero for the fallback.
    pub merge: MergeCounts,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutorPoll {
    Idle,
    Running(PassProgress),
    Finished(PassOutcome),
    Failed(ExecutorError),
}

/// One way of running a world pass. `poll` is called from the host's idle
/// callback and gets `budget` of time to spend on the caller thread.
pub trait SimulationExecutor {
    fn method(&self) -> UpdateMethod;
    fn start(&mut self, ctx: &mut SimContext, plan: WorldPassPlan) -> Result<(), ExecutorError>;
    fn poll(&mut self, ctx: &mut SimContext, budget: Duration) -> ExecutorPoll;
    fn is_running(&self) -> bool;
}
