//! Systems - logic that operates on the world store

pub mod battle;
pub mod encounters;
pub mod membership;
pub mod movement;
pub mod ranks;
pub mod tasks;
pub mod territory;

pub use battle::{resolve_crew_battle, simulate_battle, BattleReport};
pub use encounters::{simulate_island_encounters, EncounterSummary};
pub use membership::{
    apply_post_battle_membership, attempt_player_recruitment, crew_capacity_info, evaluate_player_recruitment,
    prune_empty_crews, MembershipOutcome, RecruitmentAttempt,
};
pub use movement::{move_crew_to, simulate_world_movement, MovementSummary};
pub use ranks::{redistribute_ranks, RankSummary};
pub use tasks::{complete_task, start_task, TaskCompletion, TaskEffect};
pub use territory::{redistribute_territories, reevaluate_island_territory, TerritoryChange};
