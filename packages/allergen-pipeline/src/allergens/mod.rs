//! The fixed 14-category allergen taxonomy, its keyword dictionary and the
//! false-positive guard.

pub mod dictionary;
pub mod guard;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub use dictionary::AllergenDictionary;
pub use guard::FalsePositiveGuard;

/// One of the 14 regulated allergen categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Allergen {
    Gluten,
    Milk,
    Egg,
    Fish,
    Crustaceans,
    Molluscs,
    TreeNuts,
    Peanuts,
    Soy,
    Sesame,
    Celery,
    Mustard,
    Lupin,
    Sulphites,
}

impl Allergen {
    /// All categories in canonical order.
    pub const ALL: [Allergen; 14] = [
        Allergen::Gluten,
        Allergen::Milk,
        Allergen::Egg,
        Allergen::Fish,
        Allergen::Crustaceans,
        Allergen::Molluscs,
        Allergen::TreeNuts,
        Allergen::Peanuts,
        Allergen::Soy,
        Allergen::Sesame,
        Allergen::Celery,
        Allergen::Mustard,
        Allergen::Lupin,
        Allergen::Sulphites,
    ];

    /// Canonical display name, as stored in the database and dictionary.
    pub fn as_str(&self) -> &'static str {
        match self {
            Allergen::Gluten => "Gluten",
            Allergen::Milk => "Milk",
            Allergen::Egg => "Egg",
            Allergen::Fish => "Fish",
            Allergen::Crustaceans => "Crustaceans",
            Allergen::Molluscs => "Molluscs",
            Allergen::TreeNuts => "Tree Nuts",
            Allergen::Peanuts => "Peanuts",
            Allergen::Soy => "Soy",
            Allergen::Sesame => "Sesame",
            Allergen::Celery => "Celery",
            Allergen::Mustard => "Mustard",
            Allergen::Lupin => "Lupin",
            Allergen::Sulphites => "Sulphites",
        }
    }

    /// Comma-separated canonical names, used in the schema CHECK constraint
    /// and in error messages.
    pub fn quoted_list() -> String {
        Self::ALL
            .iter()
            .map(|a| format!("'{}'", a.as_str()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Allergen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a name outside the taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown allergen '{0}'")]
pub struct UnknownAllergen(pub String);

impl FromStr for Allergen {
    type Err = UnknownAllergen;

    /// Exact canonical names only; callers trim before parsing.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| UnknownAllergen(s.to_string()))
    }
}

impl Serialize for Allergen {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Allergen {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Parse a semicolon-joined label cell (`"Milk; Egg"`).
///
/// Blank cells and pandas-style `nan` mean the empty set. Unknown names are
/// returned separately so callers decide whether they are fatal.
pub fn parse_label_list(cell: &str) -> (Vec<Allergen>, Vec<String>) {
    let cell = cell.trim();
    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
        return (Vec::new(), Vec::new());
    }

    let mut known = Vec::new();
    let mut unknown = Vec::new();
    for part in cell.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        match part.parse::<Allergen>() {
            Ok(a) => {
                if !known.contains(&a) {
                    known.push(a);
                }
            }
            Err(_) => unknown.push(part.to_string()),
        }
    }
    (known, unknown)
}
