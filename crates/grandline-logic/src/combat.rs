//! Probabilistic combat resolution.
//!
//! A fight is reduced to two effective powers. The attacker's power is scaled
//! by affiliation and style matchups, both sides add a share of their crew's
//! power, and a single uniform draw against the (luck-perturbed, clamped) win
//! probability picks the winner.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::entities::{CharacterType, StyleWeights};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattleMode {
    /// One-on-one fight, usually player initiated.
    Duel,
    /// Captain against captain with crew support.
    CrewBattle,
}

impl BattleMode {
    /// Bounds applied to the attacker's win probability.
    pub fn probability_bounds(self) -> (f64, f64) {
        match self {
            BattleMode::Duel => (0.05, 0.95),
            BattleMode::CrewBattle => (0.1, 0.9),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Attacker,
    Defender,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DuelInput {
    pub attacker_power: f64,
    pub defender_power: f64,
    pub attacker_help: f64,
    pub defender_help: f64,
    pub type_advantage: f64,
    pub style_advantage: f64,
    pub mode: BattleMode,
}

impl DuelInput {
    /// Plain duel between two powers, no modifiers or help.
    pub fn even(attacker_power: f64, defender_power: f64, mode: BattleMode) -> Self {
        Self {
            attacker_power,
            defender_power,
            attacker_help: 0.0,
            defender_help: 0.0,
            type_advantage: 1.0,
            style_advantage: 1.0,
            mode,
        }
    }

    pub fn final_attacker_power(&self) -> f64 {
        self.attacker_power * self.type_advantage * self.style_advantage + self.attacker_help
    }

    pub fn final_defender_power(&self) -> f64 {
        self.defender_power + self.defender_help
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DuelOutcome {
    pub winner: Side,
    /// Attacker's win probability after luck and clamping.
    pub win_probability: f64,
    pub roll: f64,
    pub damage: u32,
    pub winner_power: f64,
    pub loser_power: f64,
}

impl DuelOutcome {
    /// Probability the winning side had going in.
    pub fn winner_probability(&self) -> f64 {
        match self.winner {
            Side::Attacker => self.win_probability,
            Side::Defender => 1.0 - self.win_probability,
        }
    }
}

/// Attacker's win probability before luck.
pub fn win_probability(input: &DuelInput) -> f64 {
    let attacker = input.final_attacker_power().max(0.0);
    let total = attacker + input.final_defender_power().max(0.0);
    if total <= 0.0 {
        0.5
    } else {
        attacker / total
    }
}

pub fn resolve<R: Rng + ?Sized>(input: &DuelInput, luck_spread: f64, rng: &mut R) -> DuelOutcome {
    let (low, high) = input.mode.probability_bounds();
    let spread = luck_spread.abs();
    let luck = if spread > 0.0 { rng.gen_range(-spread..=spread) } else { 0.0 };
    let probability = (win_probability(input) + luck).clamp(low, high);

    let roll = rng.gen::<f64>();
    let attacker = input.final_attacker_power();
    let defender = input.final_defender_power();
    let (winner, winner_power, loser_power) = if roll < probability {
        (Side::Attacker, attacker, defender)
    } else {
        (Side::Defender, defender, attacker)
    };

    DuelOutcome {
        winner,
        win_probability: probability,
        roll,
        damage: damage(winner_power, loser_power),
        winner_power,
        loser_power,
    }
}

pub fn damage(winner_power: f64, loser_power: f64) -> u32 {
    let base = ((winner_power.max(0.0) * 0.1).floor() as u32).max(10);
    base + ((winner_power - loser_power).abs() * 0.05).floor() as u32
}

pub fn type_advantage(attacker: CharacterType, defender: CharacterType) -> f64 {
    match (attacker, defender) {
        (CharacterType::Government, CharacterType::Pirate) => 1.1,
        (CharacterType::Marine, CharacterType::Pirate) => 1.05,
        (CharacterType::BountyHunter, CharacterType::Pirate) => 1.05,
        _ => 1.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stance {
    Attack,
    Defense,
    Speed,
}

impl Stance {
    /// Cycle: attack > speed > defense > attack.
    fn beats(self, other: Stance) -> bool {
        matches!(
            (self, other),
            (Stance::Attack, Stance::Speed) | (Stance::Speed, Stance::Defense) | (Stance::Defense, Stance::Attack)
        )
    }
}

fn dominant_stance(weights: &StyleWeights) -> Stance {
    let mut best = (Stance::Attack, weights.attack);
    for candidate in [(Stance::Defense, weights.defense), (Stance::Speed, weights.speed)] {
        if candidate.1 > best.1 {
            best = candidate;
        }
    }
    best.0
}

pub fn style_advantage(attacker: &StyleWeights, defender: &StyleWeights) -> f64 {
    let a = dominant_stance(attacker);
    let d = dominant_stance(defender);
    if a.beats(d) {
        1.1
    } else if d.beats(a) {
        0.9
    } else {
        1.0
    }
}

/// Power a fighter borrows from crew-mates.
pub fn crew_assist<I: IntoIterator<Item = f64>>(member_powers: I, help_fraction: f64) -> f64 {
    member_powers.into_iter().map(|p| p.max(0.0)).sum::<f64>() * help_fraction.max(0.0)
}

/// Scale on the defender's crew help. A Marine far above the attacker's level
/// fights alone.
pub fn defender_help_scale(defender: CharacterType, defender_level: u32, attacker_level: u32) -> f64 {
    if defender != CharacterType::Marine {
        return 1.0;
    }
    let gap = defender_level.saturating_sub(attacker_level);
    if gap >= 10 {
        0.0
    } else if gap >= 5 {
        0.5
    } else {
        1.0
    }
}

// ── Narration ───────────────────────────────────────────────────────────

const CLOSE_LINES: &[&str] = &[
    "{winner} and {loser} trade blows until neither can stand, but {winner} rises first.",
    "It comes down to the last swing: {winner} edges out {loser}.",
    "{loser} pushes {winner} to the limit before falling.",
];
const DOMINANT_LINES: &[&str] = &[
    "{winner} overwhelms {loser} without breaking a sweat.",
    "{loser} never lands a clean hit on {winner}.",
    "{winner} ends the fight almost as soon as it begins.",
];
const UPSET_LINES: &[&str] = &[
    "Against all odds, {winner} brings down {loser}!",
    "Nobody expected it: {loser} is defeated by {winner}.",
    "{winner} finds an opening {loser} never saw coming.",
];
const STEADY_LINES: &[&str] = &[
    "{winner} wears {loser} down and claims victory.",
    "After a hard fight, {winner} stands over {loser}.",
];

/// Narrative lines for a fight, picked by how lopsided it was.
pub fn battle_log<R: Rng + ?Sized>(
    attacker_name: &str,
    defender_name: &str,
    outcome: &DuelOutcome,
    rng: &mut R,
) -> Vec<String> {
    let (winner, loser) = match outcome.winner {
        Side::Attacker => (attacker_name, defender_name),
        Side::Defender => (defender_name, attacker_name),
    };
    let odds = outcome.winner_probability();
    let pool = if (outcome.win_probability - 0.5).abs() < 0.1 {
        CLOSE_LINES
    } else if odds >= 0.75 {
        DOMINANT_LINES
    } else if odds < 0.35 {
        UPSET_LINES
    } else {
        STEADY_LINES
    };

    let mut log = vec![format!("{attacker_name} challenges {defender_name}.")];
    if let Some(line) = pool.choose(rng) {
        log.push(line.replace("{winner}", winner).replace("{loser}", loser));
    }
    log.push(format!("{winner} deals {} damage.", outcome.damage));
    log
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn weights(attack: u32, defense: u32, speed: u32) -> StyleWeights {
        StyleWeights {
            attack,
            defense,
            speed,
            ..StyleWeights::default()
        }
    }

    #[test]
    fn probability_matches_power_share() {
        let input = DuelInput::even(300.0, 100.0, BattleMode::Duel);
        assert!((win_probability(&input) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn help_and_advantage_shift_odds() {
        let mut input = DuelInput::even(100.0, 100.0, BattleMode::CrewBattle);
        input.type_advantage = 1.1;
        input.attacker_help = 20.0;
        input.defender_help = 10.0;
        // (110 + 20) / (130 + 110)
        assert!((win_probability(&input) - 130.0 / 240.0).abs() < 1e-9);
    }

    #[test]
    fn probability_clamped_per_mode() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        for _ in 0..200 {
            let duel = resolve(&DuelInput::even(1e9, 1.0, BattleMode::Duel), 0.05, &mut rng);
            assert!(duel.win_probability <= 0.95);
            let crew = resolve(&DuelInput::even(1.0, 1e9, BattleMode::CrewBattle), 0.05, &mut rng);
            assert!(crew.win_probability >= 0.1);
        }
    }

    #[test]
    fn stronger_side_wins_more_often() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let input = DuelInput::even(400.0, 100.0, BattleMode::Duel);
        let wins = (0..1000)
            .filter(|_| resolve(&input, 0.05, &mut rng).winner == Side::Attacker)
            .count();
        assert!(wins > 700, "wins {wins}");
    }

    #[test]
    fn damage_formula() {
        assert_eq!(damage(50.0, 50.0), 10);
        // 30 + floor(400 * 0.05)
        assert_eq!(damage(300.0, 700.0), 50);
    }

    #[test]
    fn type_advantages() {
        assert!((type_advantage(CharacterType::Government, CharacterType::Pirate) - 1.1).abs() < 1e-9);
        assert!((type_advantage(CharacterType::Pirate, CharacterType::Marine) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn style_cycle() {
        let attack = weights(5, 1, 1);
        let defense = weights(1, 5, 1);
        let speed = weights(1, 1, 5);
        assert!((style_advantage(&attack, &speed) - 1.1).abs() < 1e-9);
        assert!((style_advantage(&speed, &defense) - 1.1).abs() < 1e-9);
        assert!((style_advantage(&defense, &attack) - 1.1).abs() < 1e-9);
        assert!((style_advantage(&speed, &attack) - 0.9).abs() < 1e-9);
        assert!((style_advantage(&attack, &attack) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn marine_help_scale() {
        assert_eq!(defender_help_scale(CharacterType::Marine, 30, 20), 0.0);
        assert_eq!(defender_help_scale(CharacterType::Marine, 26, 20), 0.5);
        assert_eq!(defender_help_scale(CharacterType::Marine, 21, 20), 1.0);
        assert_eq!(defender_help_scale(CharacterType::Pirate, 60, 1), 1.0);
    }

    #[test]
    fn crew_assist_fraction() {
        assert!((crew_assist([100.0, 50.0], 0.2) - 30.0).abs() < 1e-9);
    }

    #[test]
    fn battle_log_names_winner() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let outcome = resolve(&DuelInput::even(100.0, 90.0, BattleMode::Duel), 0.05, &mut rng);
        let log = battle_log("Zoro", "Mihawk", &outcome, &mut rng);
        assert_eq!(log.len(), 3);
        let winner = if outcome.winner == Side::Attacker { "Zoro" } else { "Mihawk" };
        assert!(log[2].starts_with(winner));
    }
}
