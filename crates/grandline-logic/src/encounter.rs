//! Encounter classification and sampling bounds.

use rand::Rng;

use crate::entities::{Character, CharacterType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncounterType {
    Hostile,
    Neutral,
    Friendly,
}

/// Average kindness below which strangers fight, and above which they get along.
pub const KINDNESS_THRESHOLD: f64 = 20.0;

/// Pairs of affiliations that always come to blows.
pub fn is_always_hostile(a: CharacterType, b: CharacterType) -> bool {
    use CharacterType::*;
    matches!(
        (a, b),
        (Pirate, Marine)
            | (Marine, Pirate)
            | (BountyHunter, Pirate)
            | (Pirate, BountyHunter)
            | (Government, Pirate)
            | (Pirate, Government)
    )
}

/// Decide how two characters meeting on an island react to each other.
pub fn determine_encounter_type_only<R: Rng + ?Sized>(a: &Character, b: &Character, rng: &mut R) -> EncounterType {
    use CharacterType::*;

    if is_always_hostile(a.kind, b.kind) {
        return EncounterType::Hostile;
    }

    if a.kind == Civilian || b.kind == Civilian {
        return weighted(rng.gen::<f64>(), [0.70, 0.95], [EncounterType::Friendly, EncounterType::Neutral, EncounterType::Hostile]);
    }

    if matches!((a.kind, b.kind), (Marine, Government) | (Government, Marine)) {
        return weighted(rng.gen::<f64>(), [0.50, 0.95], [EncounterType::Friendly, EncounterType::Neutral, EncounterType::Hostile]);
    }

    if a.kind == b.kind {
        return weighted(rng.gen::<f64>(), [0.70, 0.90], [EncounterType::Neutral, EncounterType::Hostile, EncounterType::Friendly]);
    }

    let average_kindness = (a.kindness as f64 + b.kindness as f64) / 2.0;
    if average_kindness < -KINDNESS_THRESHOLD {
        EncounterType::Hostile
    } else if average_kindness > KINDNESS_THRESHOLD {
        EncounterType::Friendly
    } else {
        EncounterType::Neutral
    }
}

fn weighted(roll: f64, thresholds: [f64; 2], outcomes: [EncounterType; 3]) -> EncounterType {
    if roll < thresholds[0] {
        outcomes[0]
    } else if roll < thresholds[1] {
        outcomes[1]
    } else {
        outcomes[2]
    }
}

/// Number of pairs sampled on an island hosting `crew_count` crews.
pub fn encounter_budget(max_encounters: usize, crew_count: usize) -> usize {
    if crew_count < 2 {
        return 0;
    }
    max_encounters.min(crew_count.saturating_mul(2))
}

/// Draw two indices into a list of `count` crews. Self-pairs come back as
/// `None` and are skipped by the caller rather than redrawn.
pub fn sample_pair<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Option<(usize, usize)> {
    if count < 2 {
        return None;
    }
    let a = rng.gen_range(0..count);
    let b = rng.gen_range(0..count);
    (a != b).then_some((a, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::StyleCombatId;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn person(kind: CharacterType, kindness: i32) -> Character {
        let mut c = Character::new("Someone", kind, 5, StyleCombatId(1));
        c.kindness = kindness;
        c
    }

    #[test]
    fn pirates_and_marines_always_fight() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let pirate = person(CharacterType::Pirate, 100);
        let marine = person(CharacterType::Marine, 100);
        for _ in 0..100 {
            assert_eq!(determine_encounter_type_only(&pirate, &marine, &mut rng), EncounterType::Hostile);
            assert_eq!(determine_encounter_type_only(&marine, &pirate, &mut rng), EncounterType::Hostile);
        }
    }

    #[test]
    fn always_hostile_pairs() {
        assert!(is_always_hostile(CharacterType::BountyHunter, CharacterType::Pirate));
        assert!(is_always_hostile(CharacterType::Pirate, CharacterType::Government));
        assert!(!is_always_hostile(CharacterType::Marine, CharacterType::Government));
        assert!(!is_always_hostile(CharacterType::Pirate, CharacterType::Pirate));
    }

    #[test]
    fn kindness_decides_strangers() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mean_hunter = person(CharacterType::BountyHunter, -60);
        let mean_agent = person(CharacterType::Government, -30);
        assert_eq!(determine_encounter_type_only(&mean_hunter, &mean_agent, &mut rng), EncounterType::Hostile);

        let kind_hunter = person(CharacterType::BountyHunter, 50);
        let kind_marine = person(CharacterType::Marine, 10);
        assert_eq!(determine_encounter_type_only(&kind_hunter, &kind_marine, &mut rng), EncounterType::Friendly);

        let plain = person(CharacterType::BountyHunter, 0);
        assert_eq!(determine_encounter_type_only(&plain, &kind_marine, &mut rng), EncounterType::Neutral);
    }

    #[test]
    fn same_type_mostly_neutral() {
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let a = person(CharacterType::Pirate, 0);
        let b = person(CharacterType::Pirate, 0);
        let neutral = (0..1000)
            .filter(|_| determine_encounter_type_only(&a, &b, &mut rng) == EncounterType::Neutral)
            .count();
        assert!((600..800).contains(&neutral), "neutral {neutral}");
    }

    #[test]
    fn civilians_mostly_friendly() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let civ = person(CharacterType::Civilian, -90);
        let marine = person(CharacterType::Marine, -90);
        let friendly = (0..1000)
            .filter(|_| determine_encounter_type_only(&civ, &marine, &mut rng) == EncounterType::Friendly)
            .count();
        assert!(friendly > 600, "friendly {friendly}");
    }

    #[test]
    fn budget_bounds() {
        assert_eq!(encounter_budget(12, 1), 0);
        assert_eq!(encounter_budget(12, 3), 6);
        assert_eq!(encounter_budget(12, 40), 12);
    }

    #[test]
    fn sample_pair_never_returns_self_pair() {
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        assert_eq!(sample_pair(1, &mut rng), None);
        for _ in 0..200 {
            if let Some((a, b)) = sample_pair(3, &mut rng) {
                assert_ne!(a, b);
                assert!(a < 3 && b < 3);
            }
        }
    }
}
