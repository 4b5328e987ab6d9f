//! Pure simulation logic for Grand Line.
//!
//! Everything in this crate is independent of the entity store and of any
//! threading. Functions take plain records plus an injected `rand::Rng` and
//! return results, so every formula can be tested in isolation and the engine
//! crate can call them from the caller thread or from a worker snapshot alike.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`ids`] | Typed identifiers for every collection |
//! | [`entities`] | Characters, crews, ships, islands, territories, fruits, styles, battles, rank rows |
//! | [`config`] | `GenerationConfig` and simulation tuning knobs |
//! | [`power`] | Weighted power of a character and of a crew |
//! | [`progression`] | Experience and bounty rewards, level thresholds, loyalty |
//! | [`stats`] | Stat growth budgets, random stat rolls, king's haki gate |
//! | [`combat`] | Win probability, matchups, crew assist, damage, narration |
//! | [`encounter`] | Hostile / neutral / friendly classification, pair sampling |
//! | [`movement`] | Docking rolls, destination pools, validated moves |
//! | [`recruitment`] | Crew capacity, poaching odds, player recruitment offers |
//! | [`ranking`] | Rank candidate ordering and CypherPol postings |
//! | [`tasks`] | Timed activities and their rewards |

pub mod combat;
pub mod config;
pub mod encounter;
pub mod entities;
pub mod ids;
pub mod movement;
pub mod power;
pub mod progression;
pub mod ranking;
pub mod recruitment;
pub mod stats;
pub mod tasks;
