//! Background world updates.
//!
//! The coordinator decides when a world pass may start, drives the executor
//! from the host's idle callback and keeps the books: status for the UI,
//! counters and a running average of pass durations, and the event feed.
//!
//! Only one pass runs at a time. A request that arrives during a pass is
//! counted and turned into one forced pass shortly after the current one
//! ends. Unforced requests inside the cooldown after a pass are ignored.

use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;

use crate::context::SimContext;
use crate::events::{EventFeed, Importance, WorldEvent, WorldEventKind, DEFAULT_FEED_CAPACITY};
use crate::executor::{ExecutorError, ExecutorPoll, FailoverExecutor, PassOutcome, SimulationExecutor, UpdateMethod};
use crate::pass::{PassProgress, WorldPassPlan};

#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorConfig {
    pub cooldown: Duration,
    pub queued_retry_delay: Duration,
    pub event_capacity: usize,
    pub prefer_worker: bool,
    /// Caller-thread time the fallback may use per poll.
    pub slice_budget: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(5),
            queued_retry_delay: Duration::from_secs(2),
            event_capacity: DEFAULT_FEED_CAPACITY,
            prefer_worker: true,
            slice_budget: Duration::from_millis(8),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateStatus {
    pub is_updating: bool,
    pub current_phase: Option<&'static str>,
    /// 0..=100
    pub progress: f64,
    pub start_time: Option<Instant>,
    pub estimated_time_remaining: Option<Duration>,
    pub method: Option<UpdateMethod>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UpdateStats {
    pub worker_updates: u64,
    pub fallback_updates: u64,
    pub failed_updates: u64,
    /// Moving average, each new pass weighted 0.2.
    pub average_duration: Option<Duration>,
    pub queued_requests: u32,
}

impl UpdateStats {
    fn record_duration(&mut self, duration: Duration) {
        self.average_duration = Some(match self.average_duration {
            Some(average) => average.mul_f64(0.8) + duration.mul_f64(0.2),
            None => duration,
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateRequestOutcome {
    Started,
    Queued,
    CoolingDown,
}

pub struct BackgroundCoordinator {
    config: CoordinatorConfig,
    executor: Option<Box<dyn SimulationExecutor>>,
    status: UpdateStatus,
    stats: UpdateStats,
    feed: EventFeed,
    last_finished: Option<Instant>,
    retry_at: Option<Instant>,
}

impl BackgroundCoordinator {
    /// The executor is created on the first update request.
    pub fn new(config: CoordinatorConfig) -> Self {
        let feed = EventFeed::with_capacity(config.event_capacity);
        Self {
            config,
            executor: None,
            status: UpdateStatus::default(),
            stats: UpdateStats::default(),
            feed,
            last_finished: None,
            retry_at: None,
        }
    }

    pub fn with_executor(config: CoordinatorConfig, executor: Box<dyn SimulationExecutor>) -> Self {
        let mut coordinator = Self::new(config);
        coordinator.executor = Some(executor);
        coordinator
    }

    pub fn status(&self) -> &UpdateStatus {
        &self.status
    }

    pub fn stats(&self) -> UpdateStats {
        self.stats
    }

    pub fn subscribe(&mut self) -> Receiver<WorldEvent> {
        self.feed.subscribe()
    }

    pub fn recent_events(&self) -> impl Iterator<Item = &WorldEvent> + '_ {
        self.feed.recent()
    }

    /// Ask for a world pass at `now`. `force` skips the cooldown but never
    /// starts a second pass while one is running.
    pub fn update_world_background(
        &mut self,
        ctx: &mut SimContext,
        force: bool,
        now: Instant,
    ) -> Result<UpdateRequestOutcome, ExecutorError> {
        if self.status.is_updating {
            self.stats.queued_requests += 1;
            log::debug!("world update queued ({} waiting)", self.stats.queued_requests);
            return Ok(UpdateRequestOutcome::Queued);
        }
        if !force && self.last_finished.is_some_and(|t| now.saturating_duration_since(t) < self.config.cooldown) {
            return Ok(UpdateRequestOutcome::CoolingDown);
        }

        let prefer_worker = self.config.prefer_worker;
        let executor = self
            .executor
            .get_or_insert_with(|| Box::new(FailoverExecutor::new(prefer_worker)));
        let plan = WorldPassPlan::full(ctx);
        if let Err(err) = executor.start(ctx, plan) {
            self.stats.failed_updates += 1;
            self.report_failure(ctx, &err);
            self.flush_events(ctx);
            return Err(err);
        }

        self.status = UpdateStatus {
            is_updating: true,
            current_phase: Some("Starting"),
            progress: 0.0,
            start_time: Some(now),
            estimated_time_remaining: self.stats.average_duration,
            method: Some(executor.method()),
        };
        log::info!("world update started ({})", executor.method().label());
        Ok(UpdateRequestOutcome::Started)
    }

    /// Idle-time callback. Advances the running pass, publishes pending
    /// events and starts a queued pass when its delay is up. Returns the
    /// outcome of a pass that finished during this call.
    pub fn poll(&mut self, ctx: &mut SimContext, now: Instant) -> Option<PassOutcome> {
        let mut finished = None;
        if self.status.is_updating {
            let polled = match self.executor.as_mut() {
                Some(executor) => executor.poll(ctx, self.config.slice_budget),
                None => ExecutorPoll::Idle,
            };
            match polled {
                ExecutorPoll::Running(progress) => self.track(progress, now),
                ExecutorPoll::Finished(outcome) => {
                    self.complete(&outcome, now);
                    finished = Some(outcome);
                }
                ExecutorPoll::Failed(err) => {
                    self.stats.failed_updates += 1;
                    self.report_failure(ctx, &err);
                    self.end_pass(now);
                }
                ExecutorPoll::Idle => self.end_pass(now),
            }
        }

        self.flush_events(ctx);

        if !self.status.is_updating && self.retry_at.is_some_and(|at| now >= at) {
            self.retry_at = None;
            if let Err(err) = self.update_world_background(ctx, true, now) {
                log::error!("queued world update could not start: {err}");
            }
        }
        finished
    }

    /// Move events raised on the caller thread into the feed.
    pub fn flush_events(&mut self, ctx: &mut SimContext) {
        self.feed.publish_all(ctx.drain_events());
    }

    fn track(&mut self, progress: PassProgress, now: Instant) {
        let elapsed = self
            .status
            .start_time
            .map(|start| now.saturating_duration_since(start))
            .unwrap_or_default();
        self.status.current_phase = Some(progress.phase);
        self.status.progress = progress.percent;
        self.status.estimated_time_remaining = if progress.percent > 0.0 {
            Some(elapsed.mul_f64((100.0 - progress.percent).max(0.0) / progress.percent))
        } else {
            self.stats.average_duration.map(|avg| avg.saturating_sub(elapsed))
        };
        if let Some(executor) = self.executor.as_ref() {
            self.status.method = Some(executor.method());
        }
    }

    fn complete(&mut self, outcome: &PassOutcome, now: Instant) {
        let duration = self
            .status
            .start_time
            .map(|start| now.saturating_duration_since(start))
            .unwrap_or_default();
        self.stats.record_duration(duration);
        match outcome.method {
            UpdateMethod::Worker => self.stats.worker_updates += 1,
            UpdateMethod::Fallback => self.stats.fallback_updates += 1,
        }
        log::info!(
            "world update finished via {} in {:?}: {} battles, {} territory changes",
            outcome.method.label(),
            duration,
            outcome.report.battles,
            outcome.report.territory_changes
        );
        self.end_pass(now);
    }

    fn end_pass(&mut self, now: Instant) {
        self.status = UpdateStatus {
            method: self.status.method,
            ..UpdateStatus::default()
        };
        self.last_finished = Some(now);
        if self.stats.queued_requests > 0 {
            self.stats.queued_requests = 0;
            self.retry_at = Some(now + self.config.queued_retry_delay);
        }
    }

    fn report_failure(&mut self, ctx: &mut SimContext, err: &ExecutorError) {
        log::error!("world update failed: {err}");
        ctx.emit(WorldEvent::new(
            WorldEventKind::Error,
            Importance::High,
            "Error during simulation",
            err.to_string(),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::Fixture;
    use crate::executor::FallbackExecutor;
    use crate::pass::PassReport;
    use crate::store::MergeCounts;
    use grandline_logic::entities::CrewType;

    fn fallback_only() -> BackgroundCoordinator {
        BackgroundCoordinator::with_executor(CoordinatorConfig::default(), Box::new(FallbackExecutor::new()))
    }

    fn drive(coordinator: &mut BackgroundCoordinator, ctx: &mut SimContext, now: Instant) -> PassOutcome {
        for _ in 0..1_000 {
            if let Some(outcome) = coordinator.poll(ctx, now) {
                return outcome;
            }
        }
        panic!("pass never finished");
    }

    /// Executor that fails every pass on the first poll.
    struct Broken {
        running: bool,
    }

    impl SimulationExecutor for Broken {
        fn method(&self) -> UpdateMethod {
            UpdateMethod::Fallback
        }
        fn start(&mut self, _: &mut SimContext, _: WorldPassPlan) -> Result<(), ExecutorError> {
            self.running = true;
            Ok(())
        }
        fn poll(&mut self, _: &mut SimContext, _: Duration) -> ExecutorPoll {
            self.running = false;
            ExecutorPoll::Failed(ExecutorError::PassFailed("kraken".into()))
        }
        fn is_running(&self) -> bool {
            self.running
        }
    }

    #[test]
    fn cooldown_and_force() {
        let mut fx = Fixture::new(6);
        fx.island(1);
        let mut coordinator = fallback_only();
        let t0 = Instant::now();

        assert_eq!(coordinator.update_world_background(&mut fx.ctx, false, t0), Ok(UpdateRequestOutcome::Started));
        assert!(coordinator.status().is_updating);
        drive(&mut coordinator, &mut fx.ctx, t0 + Duration::from_secs(1));
        assert!(!coordinator.status().is_updating);

        let soon = t0 + Duration::from_secs(3);
        assert_eq!(coordinator.update_world_background(&mut fx.ctx, false, soon), Ok(UpdateRequestOutcome::CoolingDown));
        assert_eq!(coordinator.update_world_background(&mut fx.ctx, true, soon), Ok(UpdateRequestOutcome::Started));
        drive(&mut coordinator, &mut fx.ctx, soon);

        let later = soon + Duration::from_secs(6);
        assert_eq!(coordinator.update_world_background(&mut fx.ctx, false, later), Ok(UpdateRequestOutcome::Started));
    }

    #[test]
    fn request_during_pass_is_queued_then_retried() {
        let mut fx = Fixture::new(6);
        fx.island(1);
        let mut coordinator = fallback_only();
        let t0 = Instant::now();

        coordinator.update_world_background(&mut fx.ctx, true, t0).unwrap();
        assert_eq!(coordinator.update_world_background(&mut fx.ctx, true, t0), Ok(UpdateRequestOutcome::Queued));
        assert_eq!(coordinator.update_world_background(&mut fx.ctx, false, t0), Ok(UpdateRequestOutcome::Queued));
        assert_eq!(coordinator.stats().queued_requests, 2);

        drive(&mut coordinator, &mut fx.ctx, t0);
        assert_eq!(coordinator.stats().queued_requests, 0);
        assert!(!coordinator.status().is_updating);

        coordinator.poll(&mut fx.ctx, t0 + Duration::from_secs(1));
        assert!(!coordinator.status().is_updating);
        coordinator.poll(&mut fx.ctx, t0 + Duration::from_secs(2));
        assert!(coordinator.status().is_updating);
        drive(&mut coordinator, &mut fx.ctx, t0 + Duration::from_secs(3));
        assert_eq!(coordinator.stats().fallback_updates, 2);
    }

    #[test]
    fn durations_average_with_weight() {
        let mut stats = UpdateStats::default();
        stats.record_duration(Duration::from_secs(10));
        assert_eq!(stats.average_duration, Some(Duration::from_secs(10)));
        stats.record_duration(Duration::from_secs(20));
        assert_eq!(stats.average_duration, Some(Duration::from_secs(12)));
    }

    #[test]
    fn failure_raises_error_event() {
        let mut fx = Fixture::new(6);
        let mut coordinator =
            BackgroundCoordinator::with_executor(CoordinatorConfig::default(), Box::new(Broken { running: false }));
        let events = coordinator.subscribe();
        let t0 = Instant::now();

        coordinator.update_world_background(&mut fx.ctx, true, t0).unwrap();
        assert!(coordinator.poll(&mut fx.ctx, t0).is_none());
        assert_eq!(coordinator.stats().failed_updates, 1);
        assert!(!coordinator.status().is_updating);

        let event = events.try_recv().unwrap();
        assert_eq!(event.kind, WorldEventKind::Error);
        assert_eq!(event.importance, Importance::High);
        assert_eq!(event.title, "Error during simulation");
        assert_eq!(coordinator.recent_events().count(), 1);
    }

    #[test]
    fn events_reach_feed_newest_first() {
        let mut fx = Fixture::new(6);
        let island = fx.island(1);
        for level in [5, 10] {
            fx.crew(CrewType::Pirate, island, level);
        }
        let mut coordinator = fallback_only();
        let t0 = Instant::now();
        coordinator.update_world_background(&mut fx.ctx, true, t0).unwrap();
        let outcome = drive(&mut coordinator, &mut fx.ctx, t0);

        assert_eq!(outcome.merge, MergeCounts::default());
        assert_ne!(outcome.report, PassReport::default());
        let stamps: Vec<u64> = coordinator.recent_events().map(|e| e.timestamp).collect();
        assert!(!stamps.is_empty());
        assert!(stamps.windows(2).all(|w| w[0] >= w[1]));
    }
}
