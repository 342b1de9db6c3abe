//! Keyword dictionary: allergen → ordered keyword phrases.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, info};

use super::Allergen;
use crate::error::{PipelineError, Result};

/// Static keyword knowledge, loaded once per process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllergenDictionary {
    entries: BTreeMap<Allergen, Vec<String>>,
}

impl AllergenDictionary {
    /// Build from `(allergen, keywords)` pairs. Blank keywords are dropped and
    /// duplicates removed while keeping first-seen order.
    pub fn new<I, K, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Allergen, K)>,
        K: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut map: BTreeMap<Allergen, Vec<String>> = BTreeMap::new();
        for (allergen, keywords) in entries {
            let list = map.entry(allergen).or_default();
            for keyword in keywords {
                let keyword = keyword.into().trim().to_lowercase();
                if !keyword.is_empty() && !list.contains(&keyword) {
                    list.push(keyword);
                }
            }
        }
        Self { entries: map }
    }

    /// Parse the JSON form: an object keyed by canonical allergen name.
    ///
    /// Any key outside the 14-name taxonomy is a config error.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, Vec<String>> = serde_json::from_str(json)
            .map_err(|e| PipelineError::Config(format!("invalid allergen dictionary: {}", e)))?;

        let mut entries = Vec::with_capacity(raw.len());
        for (name, keywords) in raw {
            let allergen: Allergen = name.trim().parse().map_err(|_| {
                PipelineError::Config(format!(
                    "unknown allergen '{}' in dictionary (expected one of {})",
                    name,
                    Allergen::quoted_list()
                ))
            })?;
            entries.push((allergen, keywords));
        }

        let dict = Self::new(entries);
        if dict.keyword_count() == 0 {
            return Err(PipelineError::Config(
                "allergen dictionary contains no keywords".to_string(),
            ));
        }
        Ok(dict)
    }

    /// Load the dictionary file. A missing file is a config error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!(
                "cannot read allergen dictionary {}: {}",
                path.display(),
                e
            ))
        })?;
        let dict = Self::from_json_str(&json)?;
        info!(
            path = %path.display(),
            allergens = dict.entries.len(),
            keywords = dict.keyword_count(),
            "Loaded allergen dictionary"
        );
        Ok(dict)
    }

    /// Write the dictionary as pretty JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(path, json).map_err(|e| PipelineError::io(path, e))?;
        debug!(path = %path.display(), "Wrote allergen dictionary");
        Ok(())
    }

    /// Keywords for one allergen (empty when absent).
    pub fn keywords(&self, allergen: Allergen) -> &[String] {
        self.entries
            .get(&allergen)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Entries in canonical allergen order.
    pub fn iter(&self) -> impl Iterator<Item = (Allergen, &[String])> {
        self.entries.iter().map(|(a, k)| (*a, k.as_slice()))
    }

    pub fn keyword_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

impl Default for AllergenDictionary {
    /// The built-in keyword set for the 14 major allergens.
    fn default() -> Self {
        Self::new([
            (
                Allergen::Gluten,
                vec![
                    "wheat", "flour", "barley", "rye", "oats", "spelt", "kamut", "semolina",
                    "malt", "triticale",
                ],
            ),
            (
                Allergen::Milk,
                vec![
                    "milk", "dairy", "cheese", "cream", "yogurt", "yoghurt", "buttermilk",
                    "casein", "whey", "lactose", "butter", "ghee",
                ],
            ),
            (
                Allergen::Egg,
                vec!["egg", "eggs", "egg white", "egg yolk", "albumin", "ovalbumin"],
            ),
            (
                Allergen::Fish,
                vec![
                    "fish", "cod", "salmon", "tuna", "trout", "bass", "flounder", "anchovy",
                    "anchovies", "snapper",
                ],
            ),
            (
                Allergen::Crustaceans,
                vec![
                    "crustacean", "crustaceans", "shrimp", "prawn", "prawns", "crab", "lobster",
                    "crayfish", "krill",
                ],
            ),
            (
                Allergen::Molluscs,
                vec![
                    "mollusc", "mollusks", "oyster", "oysters", "mussel", "mussels", "clam",
                    "clams", "scallop", "scallops", "squid", "octopus", "snail", "escargot",
                ],
            ),
            (
                Allergen::TreeNuts,
                vec![
                    "almond", "hazelnut", "walnut", "cashew", "pecan", "pistachio", "macadamia",
                    "brazil nut", "brazil nuts", "chestnut", "pine nut", "pine nuts",
                ],
            ),
            (
                Allergen::Peanuts,
                vec!["peanut", "peanuts", "groundnut", "groundnuts", "arachis"],
            ),
            (
                Allergen::Soy,
                vec![
                    "soy", "soya", "soybean", "soybeans", "edamame", "tofu", "tempeh", "miso",
                    "natto", "tamari", "soy sauce",
                ],
            ),
            (
                Allergen::Sesame,
                vec!["sesame", "sesame seed", "sesame seeds", "tahini", "sesame oil"],
            ),
            (Allergen::Celery, vec!["celery", "celeriac", "celery salt"]),
            (
                Allergen::Mustard,
                vec![
                    "mustard", "mustard seed", "mustard seeds", "mustard powder", "dijon mustard",
                ],
            ),
            (Allergen::Lupin, vec!["lupin", "lupine", "lupin flour"]),
            (
                Allergen::Sulphites,
                vec![
                    "sulphite", "sulphites", "sulfite", "sulfites", "sulfur dioxide",
                    "sulphur dioxide", "metabisulfite", "metabisulphite",
                ],
            ),
        ])
    }
}
