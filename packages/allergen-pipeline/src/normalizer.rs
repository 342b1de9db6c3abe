//! Ingredient line normalization and the wholesale ingredient-table rebuild.
//!
//! `"2 cups all-purpose flour (sifted)"` becomes `"flour"`: lower-cased,
//! parenthetical asides and every non-letter removed, then quantity units and
//! preparation descriptors stripped. Lines that read like instructions are
//! dropped entirely.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::Result;
use crate::store::{NewIngredient, RecipeStore};

lazy_static! {
    static ref PARENTHETICAL: Regex = Regex::new(r"\(.*?\)").unwrap();
    static ref NON_LETTER: Regex = Regex::new(r"[^a-zA-Z\s]").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref UNITS: Regex = Regex::new(
        r"\b(?:cups?|tbsps?|tsps?|tablespoons?|teaspoons?|grams?|g|kg|kilograms?|oz|ounces?|lbs?|pounds?|ml|millilit(?:er|re)s?|lit(?:er|re)s?|l|pinch(?:es)?|dash(?:es)?)\b"
    )
    .unwrap();
    static ref DESCRIPTORS: Regex = Regex::new(
        r"\b(?:all purpose|sifted|chopped|finely|roughly|coarsely|minced|diced|sliced|grated|shredded|melted|softened|beaten|peeled|divided|optional|to taste|large|medium|small|heaping|level|packed)\b"
    )
    .unwrap();
    static ref INSTRUCTION_WORDS: Regex =
        Regex::new(r"\b(?:preheat|bake|cook|minutes|degrees|oven)\b").unwrap();
}

/// Normalize one raw ingredient line. `None` when nothing usable remains or
/// the line is an instruction.
pub fn normalize_line(raw: &str) -> Option<String> {
    let text = raw.to_lowercase();
    let text = PARENTHETICAL.replace_all(&text, " ");
    let text = NON_LETTER.replace_all(&text, " ");
    let mut text = collapse(&text);

    // Stripping can join words into a new removable phrase; repeat until stable.
    loop {
        let stripped = UNITS.replace_all(&text, " ");
        let stripped = collapse(&DESCRIPTORS.replace_all(&stripped, " "));
        if stripped == text {
            break;
        }
        text = stripped;
    }

    if text.is_empty() || INSTRUCTION_WORDS.is_match(&text) {
        return None;
    }
    Some(text)
}

fn collapse(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Normalize every non-blank line of a recipe's ingredient block.
pub fn normalize_block(recipe_id: i64, block: &str) -> Vec<NewIngredient> {
    block
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(normalize_line)
        .map(|text| NewIngredient::new(recipe_id, text))
        .collect()
}

/// Counters for one normalization run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeSummary {
    pub recipes: usize,
    pub lines: usize,
    pub ingredients: usize,
}

/// Rebuild the processed-ingredient table from every stored recipe.
///
/// Truncate-then-insert in one transaction; all existing allergen tags are
/// discarded with the old rows.
pub async fn rebuild(store: &RecipeStore) -> Result<NormalizeSummary> {
    let recipes = store.recipes_for_normalization().await?;

    let mut summary = NormalizeSummary {
        recipes: recipes.len(),
        ..Default::default()
    };
    let mut rows = Vec::new();
    for (recipe_id, block) in &recipes {
        let normalized = normalize_block(*recipe_id, block);
        let lines = block.lines().filter(|l| !l.trim().is_empty()).count();
        debug!(recipe_id, lines, kept = normalized.len(), "Normalized recipe ingredients");
        summary.lines += lines;
        rows.extend(normalized);
    }

    summary.ingredients = store.rebuild_ingredients(&rows).await?;
    info!(
        recipes = summary.recipes,
        lines = summary.lines,
        ingredients = summary.ingredients,
        "Normalization complete"
    );
    Ok(summary)
}
