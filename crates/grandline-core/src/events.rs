//! World events: the newsfeed of battles, recruitments, rank changes and
//! simulation failures.
//!
//! Systems push events into the [`SimContext`](crate::context::SimContext);
//! the coordinator drains them into an [`EventFeed`], which keeps the most
//! recent ones and forwards every event to subscribers.

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorldEventKind {
    Battle,
    Recruitment,
    Desertion,
    CrewFounded,
    CrewDisbanded,
    Territory,
    Rank,
    Movement,
    LevelUp,
    KingHaki,
    DevilFruit,
    Task,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Importance {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldEvent {
    pub kind: WorldEventKind,
    pub title: String,
    pub description: String,
    /// Unix milliseconds.
    pub timestamp: u64,
    pub importance: Importance,
}

impl WorldEvent {
    pub fn new(
        kind: WorldEventKind,
        importance: Importance,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            title: title.into(),
            description: description.into(),
            timestamp: now_ms(),
            importance,
        }
    }
}

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub const DEFAULT_FEED_CAPACITY: usize = 50;

/// Newest-first ring buffer of recent events with fan-out to subscribers.
#[derive(Debug)]
pub struct EventFeed {
    recent: VecDeque<WorldEvent>,
    capacity: usize,
    subscribers: Vec<Sender<WorldEvent>>,
}

impl Default for EventFeed {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_FEED_CAPACITY)
    }
}

impl EventFeed {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            recent: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            subscribers: Vec::new(),
        }
    }

    pub fn publish(&mut self, event: WorldEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        self.recent.push_front(event);
        self.recent.truncate(self.capacity);
    }

    pub fn publish_all<I: IntoIterator<Item = WorldEvent>>(&mut self, events: I) {
        for event in events {
            self.publish(event);
        }
    }

    /// Receive every event published from now on. Dropping the receiver
    /// unsubscribes.
    pub fn subscribe(&mut self) -> Receiver<WorldEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Recent events, newest first.
    pub fn recent(&self) -> impl Iterator<Item = &WorldEvent> + '_ {
        self.recent.iter()
    }

    pub fn len(&self) -> usize {
        self.recent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(title: &str) -> WorldEvent {
        WorldEvent::new(WorldEventKind::Battle, Importance::Low, title, "")
    }

    #[test]
    fn feed_keeps_newest_first_and_caps() {
        let mut feed = EventFeed::with_capacity(3);
        for i in 0..5 {
            feed.publish(event(&format!("e{i}")));
        }
        let titles: Vec<_> = feed.recent().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["e4", "e3", "e2"]);
    }

    #[test]
    fn subscribers_receive_and_unsubscribe_on_drop() {
        let mut feed = EventFeed::default();
        let rx = feed.subscribe();
        let dropped = feed.subscribe();
        drop(dropped);

        feed.publish(event("Marineford"));
        assert_eq!(rx.try_recv().map(|e| e.title).ok().as_deref(), Some("Marineford"));
        assert_eq!(feed.subscribers.len(), 1);
    }
}
