//! Politique de sélection : séquentielle, permutation par chargement ou tirage uniforme

use crate::{Error, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use std::fmt;
use std::str::FromStr;

/// Mode de sélection d'un ordonnanceur de playlist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShuffleMode {
    /// Ordre de chargement, du début à la fin
    Normal,
    /// Tirage uniforme sur toute la file à chaque sélection, sans retrait
    Random,
    /// Une permutation complète calculée à chaque chargement
    #[default]
    Randomize,
}

impl ShuffleMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShuffleMode::Normal => "normal",
            ShuffleMode::Random => "random",
            ShuffleMode::Randomize => "randomize",
        }
    }

    /// Lit une valeur de configuration, `randomize` si elle est invalide
    pub fn from_config(value: &str) -> Self {
        value.parse().unwrap_or_else(|e| {
            tracing::error!("{}, falling back to {}", e, ShuffleMode::default());
            ShuffleMode::default()
        })
    }

    /// Vrai si la sélection retire l'élément choisi de la file
    pub fn consumes(&self) -> bool {
        !matches!(self, ShuffleMode::Random)
    }

    /// Transformation appliquée au chargement
    pub fn on_load<T>(&self, mut items: Vec<T>) -> Vec<T> {
        if let ShuffleMode::Randomize = self {
            items.shuffle(&mut rand::rng());
        }
        items
    }

    /// Index choisi parmi `len` éléments (`None` si la file est vide)
    pub fn pick_index(&self, len: usize) -> Option<usize> {
        match (self, len) {
            (_, 0) => None,
            (ShuffleMode::Random, n) => Some(rand::rng().random_range(0..n)),
            _ => Some(0),
        }
    }
}

impl fmt::Display for ShuffleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShuffleMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(ShuffleMode::Normal),
            "random" => Ok(ShuffleMode::Random),
            "randomize" => Ok(ShuffleMode::Randomize),
            _ => Err(Error::InvalidConfig {
                option: "mode",
                value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modes() {
        assert_eq!("normal".parse::<ShuffleMode>().unwrap(), ShuffleMode::Normal);
        assert_eq!("RANDOM".parse::<ShuffleMode>().unwrap(), ShuffleMode::Random);
        assert_eq!(
            "randomize".parse::<ShuffleMode>().unwrap(),
            ShuffleMode::Randomize
        );
        assert!("shuffle".parse::<ShuffleMode>().is_err());
    }

    #[test]
    fn test_invalid_mode_falls_back_to_randomize() {
        assert_eq!(ShuffleMode::from_config("bogus"), ShuffleMode::Randomize);
        assert_eq!(ShuffleMode::from_config("normal"), ShuffleMode::Normal);
    }

    #[test]
    fn test_randomize_keeps_the_multiset() {
        let items: Vec<u32> = (0..50).collect();
        let mut shuffled = ShuffleMode::Randomize.on_load(items.clone());
        shuffled.sort();
        assert_eq!(shuffled, items);

        assert_eq!(ShuffleMode::Normal.on_load(items.clone()), items);
        assert_eq!(ShuffleMode::Random.on_load(items.clone()), items);
    }

    #[test]
    fn test_pick_index() {
        assert_eq!(ShuffleMode::Normal.pick_index(0), None);
        assert_eq!(ShuffleMode::Randomize.pick_index(5), Some(0));
        for _ in 0..100 {
            let i = ShuffleMode::Random.pick_index(3).unwrap();
            assert!(i < 3);
        }
    }
}
