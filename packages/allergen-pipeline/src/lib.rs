//! Allergen tagging pipeline for scraped recipes.
//!
//! Recipes crawled by [`recipe_crawler`] are stored idempotently, their
//! ingredient lines normalized, and each normalized ingredient tagged with
//! allergens from a fixed 14-category taxonomy: first by tolerant keyword
//! rules with false-positive suppression, then by a trained multi-label model
//! for whatever the rules left untagged. Stored tags can be scored against a
//! hand-labeled gold set.
//!
//! # Modules
//!
//! - [`allergens`] - Taxonomy, keyword dictionary, false-positive guard
//! - [`store`] - SQLite persistence
//! - [`normalizer`] - Ingredient line normalization and table rebuild
//! - [`classify`] - Rule and ML classification passes
//! - [`evaluate`] - Precision / recall / F1 against gold labels
//! - [`pipeline`] - Stage orchestration
//! - [`config`] - Environment configuration

pub mod allergens;
pub mod classify;
pub mod config;
pub mod error;
pub mod evaluate;
pub mod normalizer;
pub mod pipeline;
pub mod store;

pub use allergens::{Allergen, AllergenDictionary, FalsePositiveGuard};
pub use classify::ml::{AllergenModel, MlClassifier, TrainOptions, TrainingExample};
pub use classify::{ClassificationSummary, RuleClassifier};
pub use config::Config;
pub use error::{PipelineError, Result};
pub use evaluate::{evaluate, EvaluationReport, GoldSet};
pub use store::{RecipeStore, TagSource, TagState};
