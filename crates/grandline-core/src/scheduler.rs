//! Cooperative task scheduler.
//!
//! Jobs run on the caller's thread in small steps whenever the host has idle
//! time (`pump`). The queue is ordered by priority, highest first, and equal
//! priorities keep submission order. One job is in flight at a time; a job
//! that yields stays in flight until it completes.

use std::collections::VecDeque;
use std::fmt::Display;
use std::marker::PhantomData;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use thiserror::Error;

pub type Priority = i32;

pub const DEFAULT_PRIORITY: Priority = 0;

/// Progress callback, percent in `0..=100`.
pub type ProgressFn = Box<dyn FnMut(f64)>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("task was cancelled before it ran")]
    Cancelled,
    #[error("task failed: {0}")]
    Failed(String),
    #[error("scheduler dropped the task")]
    Dropped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStep {
    Complete,
    Yield,
}

/// A unit of work the scheduler steps through.
pub trait Job<C> {
    fn step(&mut self, ctx: &mut C) -> JobStep;
    /// Called instead of `step` when the job is cancelled while queued.
    fn cancel(self: Box<Self>);
}

/// Receiving end of a scheduled job's result.
pub struct TaskHandle<T> {
    result: Receiver<Result<T, SchedulerError>>,
    finished: bool,
}

impl<T> TaskHandle<T> {
    /// The result once, when it is ready.
    pub fn poll(&mut self) -> Option<Result<T, SchedulerError>> {
        if self.finished {
            return None;
        }
        match self.result.try_recv() {
            Ok(result) => {
                self.finished = true;
                Some(result)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.finished = true;
                Some(Err(SchedulerError::Dropped))
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

fn channel<T>() -> (Sender<Result<T, SchedulerError>>, TaskHandle<T>) {
    let (tx, rx) = bounded(1);
    (
        tx,
        TaskHandle {
            result: rx,
            finished: false,
        },
    )
}

fn report(on_progress: &mut Option<ProgressFn>, percent: f64) {
    if let Some(callback) = on_progress.as_mut() {
        callback(percent);
    }
}

struct OneShot<C, T, F> {
    work: Option<F>,
    reply: Sender<Result<T, SchedulerError>>,
    on_progress: Option<ProgressFn>,
    _ctx: PhantomData<fn(&mut C)>,
}

impl<C, T, E, F> Job<C> for OneShot<C, T, F>
where
    E: Display,
    F: FnOnce(&mut C, &mut dyn FnMut(f64)) -> Result<T, E>,
{
    fn step(&mut self, ctx: &mut C) -> JobStep {
        if let Some(work) = self.work.take() {
            let on_progress = &mut self.on_progress;
            let mut forward = |percent: f64| report(on_progress, percent);
            let result = work(ctx, &mut forward).map_err(|err| SchedulerError::Failed(err.to_string()));
            // The handle may already be gone; nobody is left to tell.
            let _ = self.reply.send(result);
        }
        JobStep::Complete
    }

    fn cancel(self: Box<Self>) {
        let _ = self.reply.send(Err(SchedulerError::Cancelled));
    }
}

pub type SequenceStep<C, T, E> = Box<dyn FnOnce(&mut C) -> Result<T, E>>;

struct Sequence<C, T, E> {
    steps: VecDeque<SequenceStep<C, T, E>>,
    total: usize,
    results: Vec<T>,
    reply: Sender<Result<Vec<T>, SchedulerError>>,
    on_progress: Option<ProgressFn>,
}

impl<C, T, E: Display> Job<C> for Sequence<C, T, E> {
    fn step(&mut self, ctx: &mut C) -> JobStep {
        let Some(step) = self.steps.pop_front() else {
            report(&mut self.on_progress, 100.0);
            let _ = self.reply.send(Ok(std::mem::take(&mut self.results)));
            return JobStep::Complete;
        };
        match step(ctx) {
            Ok(value) => self.results.push(value),
            Err(err) => {
                let _ = self.reply.send(Err(SchedulerError::Failed(err.to_string())));
                return JobStep::Complete;
            }
        }
        report(&mut self.on_progress, self.results.len() as f64 / self.total as f64 * 100.0);
        if self.steps.is_empty() {
            let _ = self.reply.send(Ok(std::mem::take(&mut self.results)));
            JobStep::Complete
        } else {
            JobStep::Yield
        }
    }

    fn cancel(self: Box<Self>) {
        let _ = self.reply.send(Err(SchedulerError::Cancelled));
    }
}

struct Entry<C> {
    priority: Priority,
    job: Box<dyn Job<C>>,
}

pub struct CooperativeScheduler<C> {
    queue: VecDeque<Entry<C>>,
    in_flight: Option<Entry<C>>,
}

impl<C> Default for CooperativeScheduler<C> {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
            in_flight: None,
        }
    }
}

impl<C: 'static> CooperativeScheduler<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `job` behind every job of equal or higher priority.
    pub fn submit(&mut self, job: Box<dyn Job<C>>, priority: Priority) {
        let at = self
            .queue
            .iter()
            .position(|entry| entry.priority < priority)
            .unwrap_or(self.queue.len());
        self.queue.insert(at, Entry { priority, job });
    }

    /// Run `work` once when its turn comes. `work` receives a progress
    /// callback it may call with percentages.
    pub fn schedule_task<T, E, F>(&mut self, work: F, priority: Priority, on_progress: Option<ProgressFn>) -> TaskHandle<T>
    where
        T: 'static,
        E: Display + 'static,
        F: FnOnce(&mut C, &mut dyn FnMut(f64)) -> Result<T, E> + 'static,
    {
        let (reply, handle) = channel();
        self.submit(
            Box::new(OneShot {
                work: Some(work),
                reply,
                on_progress,
                _ctx: PhantomData,
            }),
            priority,
        );
        handle
    }

    /// Run `steps` strictly in order, one per dispatch. The first failing
    /// step fails the whole sequence.
    pub fn execute_sequence<T, E>(
        &mut self,
        steps: Vec<SequenceStep<C, T, E>>,
        priority: Priority,
        on_progress: Option<ProgressFn>,
    ) -> TaskHandle<Vec<T>>
    where
        T: 'static,
        E: Display + 'static,
    {
        let (reply, handle) = channel();
        let total = steps.len();
        self.submit(
            Box::new(Sequence {
                steps: steps.into(),
                total,
                results: Vec::with_capacity(total),
                reply,
                on_progress,
            }),
            priority,
        );
        handle
    }

    /// Step jobs until the queue drains or `budget` is spent. Always runs at
    /// least one step when there is work. Returns the number of steps run.
    pub fn pump(&mut self, ctx: &mut C, budget: Duration) -> usize {
        let started = Instant::now();
        let mut steps = 0;
        while let Some(mut entry) = self.in_flight.take().or_else(|| self.queue.pop_front()) {
            if entry.job.step(ctx) == JobStep::Yield {
                self.in_flight = Some(entry);
            }
            steps += 1;
            if started.elapsed() >= budget {
                break;
            }
        }
        steps
    }

    pub fn run_until_idle(&mut self, ctx: &mut C) -> usize {
        let mut steps = 0;
        while !self.is_idle() {
            steps += self.pump(ctx, Duration::MAX);
        }
        steps
    }

    /// Reject every queued job with [`SchedulerError::Cancelled`]. The job in
    /// flight keeps running. Returns how many jobs were cancelled.
    pub fn cancel_all_tasks(&mut self) -> usize {
        let cancelled = self.queue.len();
        for entry in self.queue.drain(..) {
            entry.job.cancel();
        }
        if cancelled > 0 {
            log::debug!("cancelled {cancelled} queued tasks");
        }
        cancelled
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_none() && self.queue.is_empty()
    }

    pub fn is_processing(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}
