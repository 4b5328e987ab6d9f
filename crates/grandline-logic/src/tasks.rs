//! Timed activities a character can undertake.

use serde::{Deserialize, Serialize};

use crate::entities::StatAxis;
use crate::ids::{CharacterId, IslandId, TaskId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskReward {
    pub experience: u64,
    pub bounty: u64,
    pub kindness: i32,
}

/// What a task does on completion. Each variant carries only its own fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskKind {
    Training { focus: StatAxis, points: u32 },
    Navigation { destination: IslandId },
    ShipUpgrade { target_level: u32 },
    Liberation { island: IslandId },
    Exploration { island: IslandId },
}

impl TaskKind {
    pub fn label(&self) -> &'static str {
        match self {
            TaskKind::Training { .. } => "Training",
            TaskKind::Navigation { .. } => "Navigation",
            TaskKind::ShipUpgrade { .. } => "Ship upgrade",
            TaskKind::Liberation { .. } => "Liberation",
            TaskKind::Exploration { .. } => "Exploration",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub character_id: CharacterId,
    /// Unix milliseconds.
    pub start_time: u64,
    pub end_time: u64,
    pub is_completed: bool,
    pub kind: TaskKind,
    pub reward: TaskReward,
}

impl Task {
    pub fn new(character_id: CharacterId, kind: TaskKind, reward: TaskReward, start_time: u64, duration_ms: u64) -> Self {
        Task {
            id: TaskId(0),
            character_id,
            start_time,
            end_time: start_time.saturating_add(duration_ms),
            is_completed: false,
            kind,
            reward,
        }
    }

    pub fn is_finished(&self, now: u64) -> bool {
        now >= self.end_time
    }

    /// Fraction of the task's duration elapsed at `now`, in `0..=1`.
    pub fn progress(&self, now: u64) -> f64 {
        let duration = self.end_time.saturating_sub(self.start_time);
        if duration == 0 {
            return 1.0;
        }
        (now.saturating_sub(self.start_time) as f64 / duration as f64).min(1.0)
    }
}
