//! Display names for bots.

use rand::Rng;
use rand::seq::SliceRandom;

const NAMES: [&str; 16] = [
    "Amara", "Bilal", "Chen", "Dara", "Esme", "Farid", "Gita", "Hugo", "Ines", "Jonah", "Kofi",
    "Lena", "Mateo", "Nadia", "Omar", "Priya",
];

const MAX_SUFFIX: u32 = 9;

/// Picks a bot name not in `taken` (compared case-insensitively).
///
/// Tries the pool in random order, then pool names with a numeric suffix
/// ("Esme 2"), then random "Bot-xxxx" names.
pub fn unique_bot_name<R: Rng + ?Sized>(taken: &[&str], rng: &mut R) -> String {
    let is_free = |candidate: &str| !taken.iter().any(|t| t.eq_ignore_ascii_case(candidate));

    let mut pool = NAMES;
    pool.shuffle(rng);

    if let Some(name) = pool.iter().copied().find(|n| is_free(*n)) {
        return name.to_owned();
    }

    for suffix in 2..=MAX_SUFFIX {
        if let Some(name) = pool
            .iter()
            .map(|n| format!("{n} {suffix}"))
            .find(|n| is_free(n.as_str()))
        {
            return name;
        }
    }

    loop {
        let name = format!("Bot-{:04x}", rng.random::<u16>());
        if is_free(name.as_str()) {
            return name;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_name_avoids_taken_case_insensitive() {
        let mut rng = StdRng::seed_from_u64(3);
        let taken: Vec<String> = NAMES[1..].iter().map(|n| n.to_lowercase()).collect();
        let taken: Vec<&str> = taken.iter().map(String::as_str).collect();
        assert_eq!(unique_bot_name(&taken, &mut rng), "Amara");
    }

    #[test]
    fn test_exhausted_pool_uses_suffix() {
        let mut rng = StdRng::seed_from_u64(3);
        let name = unique_bot_name(&NAMES, &mut rng);
        assert!(name.ends_with(" 2"), "got {name}");
    }

    #[test]
    fn test_exhausted_suffixes_fall_back_to_random() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut taken: Vec<String> = NAMES.iter().map(|n| n.to_string()).collect();
        for suffix in 2..=MAX_SUFFIX {
            taken.extend(NAMES.iter().map(|n| format!("{n} {suffix}")));
        }
        let taken: Vec<&str> = taken.iter().map(String::as_str).collect();
        let name = unique_bot_name(&taken, &mut rng);
        assert!(name.starts_with("Bot-"), "got {name}");
    }
}
