//! Two-stage allergen classification.
//!
//! The rule pass tags every normalized ingredient it can; the ML pass only
//! sees the residue with zero tags. Both route candidates through the same
//! [`FalsePositiveGuard`](crate::allergens::FalsePositiveGuard) and insert
//! tags conflict-tolerantly.

pub mod ml;
pub mod rules;

use serde::Serialize;
use tracing::warn;

use crate::allergens::Allergen;
use crate::store::{ProcessedIngredient, RecipeStore, TagSource};

pub use rules::RuleClassifier;

/// Counters for one classification pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClassificationSummary {
    pub ingredients_scanned: usize,
    pub tags_inserted: usize,
    /// Candidates vetoed by the false-positive guard
    pub suppressed: usize,
    /// Tag writes that failed and were skipped
    pub failed: usize,
}

/// Insert accepted labels for one ingredient, counting outcomes.
///
/// A failed write is logged and skipped; the pass continues.
pub(crate) async fn store_tags(
    store: &RecipeStore,
    ingredient: &ProcessedIngredient,
    allergens: &[Allergen],
    source: TagSource,
    summary: &mut ClassificationSummary,
) {
    for &allergen in allergens {
        match store
            .insert_tag(ingredient.id, ingredient.recipe_id, allergen, source)
            .await
        {
            Ok(true) => summary.tags_inserted += 1,
            Ok(false) => {}
            Err(e) => {
                summary.failed += 1;
                warn!(
                    ingredient_id = ingredient.id,
                    recipe_id = ingredient.recipe_id,
                    allergen = %allergen,
                    source = %source,
                    error = %e,
                    "Failed to store allergen tag"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NewIngredient;
    use recipe_crawler::RecipeRecord;

    #[tokio::test]
    async fn test_failed_tag_write_is_counted_and_skipped() {
        let store = RecipeStore::in_memory().await.unwrap();
        let record = RecipeRecord::new("X", "Toast").with_ingredients(["butter"]);
        let recipe_id = store.upsert_recipe(None, &record).await.unwrap();
        store
            .rebuild_ingredients(&[NewIngredient::new(recipe_id, "butter")])
            .await
            .unwrap();
        let valid = store.all_ingredients().await.unwrap().remove(0);
        let dangling = ProcessedIngredient {
            id: 999,
            recipe_id,
            text: "ghost".into(),
        };

        let mut summary = ClassificationSummary::default();
        store_tags(&store, &dangling, &[Allergen::Milk], TagSource::Rule, &mut summary).await;
        store_tags(&store, &valid, &[Allergen::Milk], TagSource::Rule, &mut summary).await;

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.tags_inserted, 1);
        let stored = store.all_tags().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].ingredient_id, valid.id);
        assert_eq!(stored[0].allergen, Allergen::Milk);
    }
}
