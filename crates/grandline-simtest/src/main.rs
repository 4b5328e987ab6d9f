//! Grand Line Headless Simulation Harness
//!
//! Generates a world, runs world passes through the background coordinator
//! on both backends and checks the rules every pass must keep. Runs entirely
//! in-process with no rendering.
//!
//! Usage:
//!   cargo run -p grandline-simtest
//!   cargo run -p grandline-simtest -- --verbose
//!   cargo run -p grandline-simtest -- --passes 10 --seed 7 --json

use std::time::{Duration, Instant};

use grandline_core::config::{load_config_from_env, read_config_from_str, BUILTIN_GENERATION_CONFIG};
use grandline_core::coordinator::{CoordinatorConfig, UpdateRequestOutcome};
use grandline_core::engine::WorldEngine;
use grandline_core::executor::UpdateMethod;
use grandline_core::generation::WorldGenConfig;
use grandline_core::pass::{run_world_pass, PassPhase, WorldPassPlan};
use grandline_core::store::WorldStore;
use grandline_logic::config::GenerationConfig;
use grandline_logic::entities::{Character, CharacterType};
use grandline_logic::ids::StyleCombatId;
use grandline_logic::progression::apply_experience;
use serde::Serialize;

const PASS_TIMEOUT: Duration = Duration::from_secs(120);

// ── Test harness ────────────────────────────────────────────────────────

#[derive(Serialize)]
struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

impl TestResult {
    fn new(name: &str, passed: bool, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed,
            detail: detail.into(),
        }
    }
}

#[derive(Serialize)]
struct Summary<'a> {
    seed: u64,
    passes: usize,
    passed: usize,
    failed: usize,
    results: &'a [TestResult],
}

struct Options {
    verbose: bool,
    json: bool,
    seed: u64,
    passes: usize,
}

fn parse_options() -> Options {
    let args: Vec<String> = std::env::args().collect();
    let value_of = |flag: &str| {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .and_then(|v| v.parse().ok())
    };
    Options {
        verbose: args.iter().any(|a| a == "--verbose"),
        json: args.iter().any(|a| a == "--json"),
        seed: value_of("--seed").unwrap_or(42),
        passes: value_of("--passes").map(|p: u64| p as usize).unwrap_or(5),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let options = parse_options();
    if !options.json {
        println!("=== Grand Line Simulation Harness ===\n");
    }

    let (config, source) = load_config_from_env();
    log::info!(
        "using generation config from {}",
        source.map(|p| p.display().to_string()).unwrap_or_else(|| "built-in defaults".into())
    );

    let mut results = Vec::new();

    // 1. Config parsing
    results.extend(validate_config(&options));

    // 2. Level-up cascade
    results.extend(validate_progression(&options));

    // 3. Generated world
    results.extend(validate_generation(&config, &options));

    // 4. Passes on the caller thread
    results.extend(validate_fallback_passes(&config, &options));

    // 5. Pass on the worker thread
    results.extend(validate_worker_pass(&config, &options));

    // 6. Coordinator gating
    results.extend(validate_coordinator_gating(&config, &options));

    // 7. Save/load
    results.extend(validate_persistence(&config, &options));

    // ── Summary ──
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.len() - passed;

    if options.json {
        let summary = Summary {
            seed: options.seed,
            passes: options.passes,
            passed,
            failed,
            results: &results,
        };
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{json}"),
            Err(err) => eprintln!("failed to encode summary: {err}"),
        }
    } else {
        println!();
        for r in &results {
            let icon = if r.passed { "✓" } else { "✗" };
            if !r.passed || options.verbose {
                println!("  {} {}: {}", icon, r.name, r.detail);
            }
        }
        println!("\n=== RESULT: {}/{} passed, {} failed ===", passed, results.len(), failed);
    }

    if failed > 0 {
        std::process::exit(1);
    }
}

fn section(options: &Options, title: &str) {
    if !options.json {
        println!("--- {title} ---");
    }
}

fn small_world() -> WorldGenConfig {
    WorldGenConfig {
        island_count: 40,
        npc_crews: 150,
        government_agents: 24,
        devil_fruits: 30,
        ..WorldGenConfig::default()
    }
}

fn engine(config: &GenerationConfig, seed: u64, prefer_worker: bool) -> Result<WorldEngine, TestResult> {
    let coordinator = CoordinatorConfig {
        prefer_worker,
        ..CoordinatorConfig::default()
    };
    WorldEngine::generate(config.clone(), &small_world(), seed, coordinator)
        .map_err(|err| TestResult::new("world_generates", false, err.to_string()))
}

/// Every rule a world must satisfy between passes. Returns the violations.
fn world_violations(store: &WorldStore, config: &GenerationConfig) -> Vec<String> {
    let mut violations = Vec::new();
    for crew in store.crews.iter() {
        let members = store.member_count(crew.id);
        if members == 0 {
            violations.push(format!("crew {} has no members", crew.id));
        }
        let capacity = store
            .ship_of(crew.id)
            .map(|s| s.capacity(config.ship_factor))
            .unwrap_or(config.ship_factor);
        if members > capacity {
            violations.push(format!("crew {} carries {members} on a ship for {capacity}", crew.id));
        }
        if !store.islands.contains(crew.current_island) {
            violations.push(format!("crew {} is at unknown island {}", crew.id, crew.current_island));
        }
    }
    for territory in store.territories.iter() {
        if let Some(owner) = territory.crew_id.filter(|owner| !store.crews.contains(*owner)) {
            violations.push(format!("territory {} held by missing crew {owner}", territory.id));
        }
    }
    if store.yonkou.len() > config.yonkou_count || store.admirals.len() > config.admiral_count {
        violations.push("rank tables exceed their slots".into());
    }
    violations
}

fn violations_result(name: &str, violations: &[String], ok_detail: String) -> TestResult {
    if violations.is_empty() {
        TestResult::new(name, true, ok_detail)
    } else {
        TestResult::new(name, false, format!("{} violations, first: {}", violations.len(), violations[0]))
    }
}

// ── 1. Config ───────────────────────────────────────────────────────────

fn validate_config(options: &Options) -> Vec<TestResult> {
    section(options, "Config");
    let mut results = Vec::new();

    match read_config_from_str(BUILTIN_GENERATION_CONFIG) {
        Ok(config) => {
            results.push(TestResult::new(
                "config_builtin_parses",
                true,
                format!("{} yonkou, {} shichibukai slots", config.yonkou_count, config.shichibukai_count),
            ));
        }
        Err(err) => results.push(TestResult::new("config_builtin_parses", false, err.to_string())),
    }

    let legacy = r#"{ "schichibukai": 3 }"#;
    let alias = read_config_from_str(legacy).map(|c| c.shichibukai_count);
    results.push(TestResult::new(
        "config_legacy_alias",
        matches!(alias, Ok(3)),
        format!("schichibukai -> {alias:?}"),
    ));

    let broken = read_config_from_str(r#"{ "dockedFactor": 4.0 }"#);
    results.push(TestResult::new(
        "config_rejects_bad_probability",
        broken.is_err(),
        broken.err().map(|e| e.to_string()).unwrap_or_else(|| "accepted".into()),
    ));
    results
}

// ── 2. Progression ──────────────────────────────────────────────────────

fn validate_progression(options: &Options) -> Vec<TestResult> {
    section(options, "Progression");
    let mut rookie = Character::new("Rookie", CharacterType::Pirate, 1, StyleCombatId(1));
    let check = apply_experience(&mut rookie, 1000);
    vec![TestResult::new(
        "level_up_cascade",
        rookie.level == 3 && rookie.experience == 49 && check.levels_gained == 2,
        format!("level {} with {} experience left", rookie.level, rookie.experience),
    )]
}

// ── 3. Generation ───────────────────────────────────────────────────────

fn validate_generation(config: &GenerationConfig, options: &Options) -> Vec<TestResult> {
    section(options, "Generation");
    let engine = match engine(config, options.seed, false) {
        Ok(engine) => engine,
        Err(failure) => return vec![failure],
    };
    let store = engine.store();
    let mut results = Vec::new();

    let difficulties = store.islands_by_difficulty();
    results.push(TestResult::new(
        "islands_span_difficulties",
        difficulties.keys().next() == Some(&1) && difficulties.keys().all(|&d| (1..=30).contains(&d)),
        format!("{} islands over {} difficulties", store.islands.len(), difficulties.len()),
    ));

    let player = engine.player().character(store);
    results.push(TestResult::new(
        "player_exists",
        player.is_some_and(|p| p.is_player && p.crew_id.is_some()),
        player.map(|p| p.name.clone()).unwrap_or_else(|| "missing".into()),
    ));

    let violations = world_violations(store, config);
    results.push(violations_result(
        "generated_world_sound",
        &violations,
        format!("{} crews, {} characters", store.crews.len(), store.characters.len()),
    ));
    results
}

// ── 4. Fallback passes ──────────────────────────────────────────────────

fn validate_fallback_passes(config: &GenerationConfig, options: &Options) -> Vec<TestResult> {
    section(options, "Caller-thread passes");
    let mut engine = match engine(config, options.seed, false) {
        Ok(engine) => engine,
        Err(failure) => return vec![failure],
    };
    let home = engine.player_island();
    let mut results = Vec::new();
    let mut violations = Vec::new();
    let mut battles = 0;
    let mut finished = 0;

    let start = Instant::now();
    for _ in 0..options.passes {
        if engine.update_world_background(true, Instant::now()).is_err() {
            break;
        }
        if let Some(outcome) = engine.run_until_idle(PASS_TIMEOUT) {
            finished += 1;
            battles += outcome.report.battles;
            if outcome.method != UpdateMethod::Fallback {
                violations.push(format!("pass ran on {}", outcome.method.label()));
            }
        }
        violations.extend(world_violations(engine.store(), config));
    }
    results.push(TestResult::new(
        "fallback_passes_finish",
        finished == options.passes,
        format!("{finished}/{} passes, {battles} battles in {:?}", options.passes, start.elapsed()),
    ));
    results.push(violations_result(
        "fallback_world_sound",
        &violations,
        format!("{} crews remain", engine.store().crews.len()),
    ));
    results.push(TestResult::new(
        "player_crew_stays_put",
        engine.player_island() == home,
        format!("home island {home:?}"),
    ));

    // Ranks rebuilt twice from the same world must agree.
    let ctx = engine.context_mut();
    let ranks = WorldPassPlan::from_phases(vec![PassPhase::Ranks]);
    run_world_pass(ctx, &ranks, |_| {});
    let first = (ctx.store.yonkou.clone(), ctx.store.cypher_pol.clone());
    run_world_pass(ctx, &ranks, |_| {});
    results.push(TestResult::new(
        "ranks_idempotent",
        first == (ctx.store.yonkou.clone(), ctx.store.cypher_pol.clone()),
        format!("{} yonkou, {} cypher pol", first.0.len(), first.1.len()),
    ));
    results
}

// ── 5. Worker pass ──────────────────────────────────────────────────────

fn validate_worker_pass(config: &GenerationConfig, options: &Options) -> Vec<TestResult> {
    section(options, "Worker pass");
    let mut engine = match engine(config, options.seed.wrapping_add(1), true) {
        Ok(engine) => engine,
        Err(failure) => return vec![failure],
    };
    let events = engine.subscribe();

    if let Err(err) = engine.update_world_background(true, Instant::now()) {
        return vec![TestResult::new("worker_pass_finishes", false, err.to_string())];
    }
    let Some(outcome) = engine.run_until_idle(PASS_TIMEOUT) else {
        return vec![TestResult::new("worker_pass_finishes", false, "timed out")];
    };

    let violations = world_violations(engine.store(), config);
    vec![
        TestResult::new(
            "worker_pass_finishes",
            true,
            format!(
                "{} battles via {}, {} merged, {} conflicts, {} repaired",
                outcome.report.battles,
                outcome.method.label(),
                outcome.merge.applied,
                outcome.merge.conflicts,
                outcome.merge.repaired
            ),
        ),
        TestResult::new(
            "worker_events_published",
            events.try_iter().count() > 0,
            format!("{} events in the feed", engine.recent_events().count()),
        ),
        violations_result("worker_world_sound", &violations, "merged world is sound".into()),
    ]
}

// ── 6. Coordinator gating ───────────────────────────────────────────────

fn validate_coordinator_gating(config: &GenerationConfig, options: &Options) -> Vec<TestResult> {
    section(options, "Coordinator");
    let mut engine = match engine(config, options.seed, false) {
        Ok(engine) => engine,
        Err(failure) => return vec![failure],
    };
    let t0 = Instant::now();
    let first = engine.update_world_background(false, t0);
    let during = engine.update_world_background(false, t0);
    engine.run_until_idle(PASS_TIMEOUT);
    let cooled = engine.update_world_background(false, Instant::now());

    vec![
        TestResult::new("first_request_starts", first == Ok(UpdateRequestOutcome::Started), format!("{first:?}")),
        TestResult::new("overlapping_request_queued", during == Ok(UpdateRequestOutcome::Queued), format!("{during:?}")),
        TestResult::new(
            "cooldown_enforced",
            cooled == Ok(UpdateRequestOutcome::CoolingDown),
            format!("{cooled:?}"),
        ),
    ]
}

// ── 7. Persistence ──────────────────────────────────────────────────────

fn validate_persistence(config: &GenerationConfig, options: &Options) -> Vec<TestResult> {
    section(options, "Persistence");
    let engine = match engine(config, options.seed, false) {
        Ok(engine) => engine,
        Err(failure) => return vec![failure],
    };
    let mut buffer = Vec::new();
    if let Err(err) = engine.save(&mut buffer) {
        return vec![TestResult::new("save_load_roundtrip", false, err.to_string())];
    }
    match WorldEngine::load(&buffer[..], options.seed, CoordinatorConfig::default()) {
        Ok(loaded) => vec![TestResult::new(
            "save_load_roundtrip",
            loaded.store() == engine.store() && loaded.player() == engine.player(),
            format!("{} bytes", buffer.len()),
        )],
        Err(err) => vec![TestResult::new("save_load_roundtrip", false, err.to_string())],
    }
}
