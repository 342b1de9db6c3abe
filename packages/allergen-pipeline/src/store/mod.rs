//! Persistent storage for raw pages, recipes, normalized ingredients and
//! allergen tags.
//!
//! - `RecipeStore` - SQLite-backed store (file or in-memory)

pub mod sqlite;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::allergens::Allergen;

pub use sqlite::RecipeStore;

/// A fetched page, stored once per URL and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    pub id: i64,
    pub site_name: String,
    pub url: String,
    pub html: String,
}

/// A stored recipe, unique on `(site_name, title)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recipe {
    pub id: i64,
    pub raw_page_id: Option<i64>,
    pub site_name: String,
    pub title: String,
    /// Ingredient lines joined with `\n`
    pub ingredients: String,
    /// Instruction lines joined with `\n`
    pub instructions: String,
    /// Site tags joined with `", "`
    pub tags: String,
    pub scraped_at: DateTime<Utc>,
}

/// One normalized ingredient row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedIngredient {
    pub id: i64,
    pub recipe_id: i64,
    pub text: String,
}

/// A normalized ingredient waiting to be written by a rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIngredient {
    pub recipe_id: i64,
    pub text: String,
}

impl NewIngredient {
    pub fn new(recipe_id: i64, text: impl Into<String>) -> Self {
        Self {
            recipe_id,
            text: text.into(),
        }
    }
}

/// Which classification layer produced a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagSource {
    Rule,
    Ml,
}

impl TagSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagSource::Rule => "rule",
            TagSource::Ml => "ml",
        }
    }
}

impl fmt::Display for TagSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TagSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rule" => Ok(TagSource::Rule),
            "ml" => Ok(TagSource::Ml),
            other => Err(format!("unknown tag source '{}'", other)),
        }
    }
}

/// A stored allergen tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllergenTag {
    pub id: i64,
    pub ingredient_id: i64,
    pub recipe_id: i64,
    pub allergen: Allergen,
    pub source: TagSource,
}

/// Per-ingredient tagging lifecycle, derived from stored tags.
///
/// Storage cannot tell "rule pass ran and found nothing" from "never
/// classified", so both read as `Untagged`. A normalization rebuild returns
/// every ingredient to `Untagged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagState {
    Untagged,
    RuleTagged,
    MlTagged,
}

impl TagState {
    pub fn from_tags(tags: &[AllergenTag]) -> Self {
        if tags.is_empty() {
            TagState::Untagged
        } else if tags.iter().any(|t| t.source == TagSource::Rule) {
            TagState::RuleTagged
        } else {
            TagState::MlTagged
        }
    }

    /// Only untagged ingredients are candidates for the ML pass.
    pub fn accepts_ml(&self) -> bool {
        matches!(self, TagState::Untagged)
    }
}

/// Row counts per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub raw_pages: i64,
    pub recipes: i64,
    pub ingredients: i64,
    pub tags: i64,
}
