//! Shared fixtures for pipeline integration tests.

#![allow(dead_code)]

use allergen_pipeline::classify::ml::{self, TrainOptions, TrainingExample};
use allergen_pipeline::{
    Allergen, AllergenDictionary, AllergenModel, FalsePositiveGuard, RecipeStore, RuleClassifier,
};
use recipe_crawler::RecipeRecord;

/// Route pipeline logs to the test harness output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("allergen_pipeline=debug,recipe_crawler=debug")
        .try_init();
}

pub async fn store() -> RecipeStore {
    init_tracing();
    RecipeStore::in_memory().await.expect("in-memory store")
}

/// Store one recipe directly, bypassing the crawler.
pub async fn seed_recipe(store: &RecipeStore, site: &str, title: &str, lines: &[&str]) -> i64 {
    let record = RecipeRecord::new(site, title).with_ingredients(lines.iter().copied());
    store.upsert_recipe(None, &record).await.expect("seed recipe")
}

pub fn rules() -> RuleClassifier {
    RuleClassifier::new(&AllergenDictionary::default(), FalsePositiveGuard::new())
        .expect("default dictionary compiles")
}

/// Small model that knows a few residue ingredients.
pub fn small_model() -> AllergenModel {
    let examples = vec![
        TrainingExample::new("mystery paste", [Allergen::Sesame]),
        TrainingExample::new("halva", [Allergen::Sesame]),
        TrainingExample::new("nam pla", [Allergen::Fish]),
        TrainingExample::new("worcestershire", [Allergen::Fish]),
        TrainingExample::new("water", Vec::<Allergen>::new()),
        TrainingExample::new("sugar", Vec::<Allergen>::new()),
    ];
    ml::train(&examples, &TrainOptions::default()).expect("train small model")
}
