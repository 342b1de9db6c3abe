//! Deterministic keyword tagging.

use regex::Regex;
use tracing::{debug, info};

use super::{store_tags, ClassificationSummary};
use crate::allergens::{Allergen, AllergenDictionary, FalsePositiveGuard};
use crate::error::{PipelineError, Result};
use crate::store::{RecipeStore, TagSource};

/// Pattern body for one keyword phrase, without anchors or flags.
///
/// Words may be separated by any run of non-word characters, and a trailing
/// plural "s" is optional unless the phrase already ends in "s".
fn phrase_body(phrase: &str) -> Option<String> {
    let words: Vec<String> = phrase
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(regex::escape)
        .collect();
    if words.is_empty() {
        return None;
    }

    let mut body = words.join(r"[\W_]+");
    if !phrase.trim_end().ends_with('s') {
        body.push_str("s?");
    }
    Some(body)
}

/// Compile keyword phrases into one case-insensitive, word-anchored
/// alternation. Returns `None` when no phrase has any words.
pub fn compile_keywords<'a>(phrases: impl IntoIterator<Item = &'a str>) -> Result<Option<Regex>> {
    let bodies: Vec<String> = phrases.into_iter().filter_map(phrase_body).collect();
    if bodies.is_empty() {
        return Ok(None);
    }
    let pattern = format!(r"(?i)\b(?:{})\b", bodies.join("|"));
    Regex::new(&pattern)
        .map(Some)
        .map_err(|e| PipelineError::Config(format!("keywords {:?}: {}", bodies, e)))
}

/// Outcome of matching one ingredient text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleMatch {
    /// Allergens that matched and survived the guard
    pub allergens: Vec<Allergen>,
    /// Allergens that matched but were vetoed by the guard
    pub suppressed: Vec<Allergen>,
}

/// Keyword matcher compiled from an [`AllergenDictionary`].
#[derive(Debug, Clone)]
pub struct RuleClassifier {
    // One alternation per allergen, canonical order.
    patterns: Vec<(Allergen, Regex)>,
    guard: FalsePositiveGuard,
}

impl RuleClassifier {
    pub fn new(dictionary: &AllergenDictionary, guard: FalsePositiveGuard) -> Result<Self> {
        let mut patterns = Vec::new();
        for (allergen, keywords) in dictionary.iter() {
            if let Some(regex) = compile_keywords(keywords.iter().map(String::as_str))? {
                patterns.push((allergen, regex));
            }
        }

        debug!(allergens = patterns.len(), "Compiled rule patterns");
        Ok(Self { patterns, guard })
    }

    /// Match one ingredient against every allergen.
    pub fn classify_text(&self, text: &str) -> RuleMatch {
        let mut result = RuleMatch::default();
        for (allergen, regex) in &self.patterns {
            if !regex.is_match(text) {
                continue;
            }
            if self.guard.is_false_positive(*allergen, text) {
                result.suppressed.push(*allergen);
            } else {
                result.allergens.push(*allergen);
            }
        }
        result
    }

    /// Tag every processed ingredient in the store with source `rule`.
    ///
    /// Re-running over an unchanged ingredient set inserts nothing new.
    pub async fn run(&self, store: &RecipeStore) -> Result<ClassificationSummary> {
        let ingredients = store.all_ingredients().await?;
        let mut summary = ClassificationSummary {
            ingredients_scanned: ingredients.len(),
            ..Default::default()
        };

        for ingredient in &ingredients {
            let matched = self.classify_text(&ingredient.text);
            if !matched.suppressed.is_empty() {
                debug!(
                    ingredient_id = ingredient.id,
                    text = %ingredient.text,
                    suppressed = ?matched.suppressed,
                    "Guard vetoed keyword match"
                );
            }
            summary.suppressed += matched.suppressed.len();
            store_tags(store, ingredient, &matched.allergens, TagSource::Rule, &mut summary).await;
        }

        info!(
            scanned = summary.ingredients_scanned,
            inserted = summary.tags_inserted,
            suppressed = summary.suppressed,
            failed = summary.failed,
            "Rule classification complete"
        );
        Ok(summary)
    }
}
