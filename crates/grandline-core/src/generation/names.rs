//! Name generation utilities

use rand::seq::SliceRandom;
use rand::Rng;

/// Random character name, sometimes with an epithet.
pub fn character_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    let given = pick(GIVEN_NAMES, rng);
    let family = pick(FAMILY_NAMES, rng);
    if rng.gen_bool(0.25) {
        format!("\"{}\" {given} {family}", pick(EPITHETS, rng))
    } else {
        format!("{given} {family}")
    }
}

pub fn island_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("{} {}", pick(ISLAND_PREFIXES, rng), pick(ISLAND_SUFFIXES, rng))
}

pub fn devil_fruit_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    let sound = pick(FRUIT_SOUNDS, rng);
    format!("{sound}-{} no Mi", sound.to_lowercase())
}

pub fn ship_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("{} {}", pick(SHIP_ADJECTIVES, rng), pick(SHIP_NOUNS, rng))
}

fn pick<R: Rng + ?Sized>(list: &'static [&'static str], rng: &mut R) -> &'static str {
    list.choose(rng).copied().unwrap_or("Nameless")
}

static GIVEN_NAMES: &[&str] = &[
    "Kuro", "Shanks", "Hina", "Rokki", "Tashigi", "Bartolo", "Kaya", "Izo", "Marco", "Vivi",
    "Zeff", "Nojiko", "Buggy", "Koby", "Helme", "Smoker", "Jinbe", "Lola", "Urouge", "Bonney",
    "Basil", "Apoo", "Killer", "Drake", "Hawkins", "Perona", "Absa", "Kalifa", "Lucci", "Kumadori",
    "Jabra", "Fukuro", "Blueno", "Kaku", "Momonga", "Onigumo", "Doberman", "Strawberry", "Yamakaji", "Tsuru",
];

static FAMILY_NAMES: &[&str] = &[
    "D. Rain", "Gol", "Monkey", "Portgas", "Vinsmoke", "Charlotte", "Donquixote", "Trafalgar", "Roronoa", "Nico",
    "Silvers", "Newgate", "Kozuki", "Boa", "Dracule", "Bartholomew", "Edward", "Marshall", "Capone", "Eustass",
    "Jewelry", "Scratchmen", "Basil", "Cavendish", "Bellamy", "Wapol", "Crocus", "Laboon", "Kuzan", "Borsalino",
];

static EPITHETS: &[&str] = &[
    "Red Hair", "Iron Fist", "Sea Devil", "White Hunter", "Storm Caller", "Black Leg", "Fire Fist", "Hawk Eye",
    "Surgeon", "Mad Monk", "Big Eater", "Magician", "Gentleman", "Scarlet", "Sand King",
];

static ISLAND_PREFIXES: &[&str] = &[
    "Shells", "Syrup", "Loguetown", "Drum", "Whisky", "Little", "Jaya", "Water", "Thriller", "Sabaody",
    "Fish-Man", "Punk", "Dress", "Zou", "Wano", "Baratie", "Cactus", "Skypiea", "Long Ring", "Enies",
];

static ISLAND_SUFFIXES: &[&str] = &[
    "Town", "Island", "Peak", "Harbor", "Atoll", "Reef", "Cove", "Isle", "Archipelago", "Keys",
];

static FRUIT_SOUNDS: &[&str] = &[
    "Gomu", "Mera", "Hie", "Pika", "Yami", "Gura", "Ope", "Bara", "Suna", "Moku",
    "Goro", "Hana", "Bomu", "Sube", "Doru", "Ito", "Magu", "Mochi", "Nikyu", "Kilo",
];

static SHIP_ADJECTIVES: &[&str] = &[
    "Red", "Black", "Thousand", "Flying", "Silent", "Golden", "Laughing", "Iron", "Crimson", "Wandering",
];

static SHIP_NOUNS: &[&str] = &[
    "Force", "Pearl", "Sunny", "Dutchman", "Gull", "Moby", "Tide", "Serpent", "Lance", "Dawn",
];

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn fruit_names_repeat_their_sound() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let name = devil_fruit_name(&mut rng);
        let (sound, rest) = name.split_once('-').unwrap();
        assert!(rest.starts_with(&sound.to_lowercase()));
        assert!(name.ends_with("no Mi"));
    }

    #[test]
    fn names_are_deterministic_per_seed() {
        let a: Vec<String> = {
            let mut rng = ChaCha8Rng::seed_from_u64(9);
            (0..5).map(|_| character_name(&mut rng)).collect()
        };
        let b: Vec<String> = {
            let mut rng = ChaCha8Rng::seed_from_u64(9);
            (0..5).map(|_| character_name(&mut rng)).collect()
        };
        assert_eq!(a, b);
        assert!(a.iter().all(|n| !n.is_empty()));
    }
}
