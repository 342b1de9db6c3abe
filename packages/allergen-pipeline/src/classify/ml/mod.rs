//! Statistical fallback for ingredients the rule pass leaves untagged.
//!
//! Training is an explicit offline step that turns a labeled CSV into a JSON
//! artifact. Inference loads that artifact read-only and tags only the
//! ingredients with zero stored tags.

pub mod logistic;
pub mod model;
pub mod vectorizer;

use std::collections::BTreeSet;
use std::path::Path;

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{store_tags, ClassificationSummary};
use crate::allergens::{parse_label_list, Allergen, FalsePositiveGuard};
use crate::error::{PipelineError, Result};
use crate::store::{RecipeStore, TagSource};

pub use logistic::{BinaryClassifier, TrainParams};
pub use model::{file_fingerprint, fingerprint, AllergenModel, ARTIFACT_VERSION};
pub use vectorizer::TfidfVectorizer;

/// Default probability a label must reach to be accepted.
pub const DEFAULT_THRESHOLD: f64 = 0.30;

/// Default document-frequency ceiling for the vectorizer.
pub const DEFAULT_MAX_DF: f64 = 0.9;

/// One labeled training row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingExample {
    pub ingredient: String,
    pub labels: Vec<Allergen>,
}

impl TrainingExample {
    pub fn new(ingredient: impl Into<String>, labels: impl IntoIterator<Item = Allergen>) -> Self {
        Self {
            ingredient: ingredient.into(),
            labels: labels.into_iter().collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TrainingRow {
    ingredient: String,
    #[serde(default)]
    labels: Option<String>,
}

/// Read `ingredient,labels` rows. Labels are semicolon-joined canonical
/// names; an empty cell is a negative example. Any unknown label is fatal.
pub fn load_training_csv(path: impl AsRef<Path>) -> Result<Vec<TrainingExample>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path).map_err(|e| {
        PipelineError::Model(format!("cannot read training data {}: {}", path.display(), e))
    })?;

    let mut examples = Vec::new();
    for (line, row) in reader.deserialize::<TrainingRow>().enumerate() {
        let row = row?;
        let (labels, unknown) = parse_label_list(row.labels.as_deref().unwrap_or(""));
        if !unknown.is_empty() {
            return Err(PipelineError::Model(format!(
                "row {} of {}: unknown labels {:?} (expected one of {})",
                line + 2,
                path.display(),
                unknown,
                Allergen::quoted_list()
            )));
        }
        examples.push(TrainingExample {
            ingredient: row.ingredient,
            labels,
        });
    }

    info!(path = %path.display(), rows = examples.len(), "Loaded training data");
    Ok(examples)
}

/// Training configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainOptions {
    pub max_df: f64,
    pub threshold: f64,
    pub params: TrainParams,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            max_df: DEFAULT_MAX_DF,
            threshold: DEFAULT_THRESHOLD,
            params: TrainParams::default(),
        }
    }
}

/// Fit the vectorizer and one binary classifier per label seen in the data.
pub fn train(examples: &[TrainingExample], options: &TrainOptions) -> Result<AllergenModel> {
    if examples.is_empty() {
        return Err(PipelineError::Model("no training examples".into()));
    }

    let mut labels: Vec<Allergen> = examples
        .iter()
        .flat_map(|e| e.labels.iter().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    labels.sort_by_key(|label| label.as_str());
    if labels.is_empty() {
        return Err(PipelineError::Model(
            "training data carries no labels to learn".into(),
        ));
    }

    let texts: Vec<&str> = examples.iter().map(|e| e.ingredient.as_str()).collect();
    let vectorizer = TfidfVectorizer::fit(&texts, options.max_df)?;
    let rows: Vec<_> = texts.iter().map(|t| vectorizer.transform(t)).collect();

    let classifiers = labels
        .iter()
        .map(|label| {
            let targets: Vec<bool> = examples.iter().map(|e| e.labels.contains(label)).collect();
            let clf = BinaryClassifier::fit(&rows, &targets, vectorizer.len(), &options.params);
            if let BinaryClassifier::Constant { probability } = clf {
                warn!(label = %label, probability, "Label never varies in training data, using constant predictor");
            }
            clf
        })
        .collect();

    info!(
        samples = examples.len(),
        vocabulary = vectorizer.len(),
        labels = ?labels,
        "Trained allergen model"
    );

    Ok(AllergenModel {
        version: ARTIFACT_VERSION,
        labels,
        vectorizer,
        classifiers,
        threshold: options.threshold,
        training_samples: examples.len(),
        trained_at: Utc::now(),
    })
}

/// Inference pass over the rule residue.
pub struct MlClassifier {
    model: AllergenModel,
    guard: FalsePositiveGuard,
    threshold: f64,
}

impl MlClassifier {
    /// Without an explicit `threshold`, the one recorded in the artifact
    /// applies.
    pub fn new(
        model: AllergenModel,
        guard: FalsePositiveGuard,
        threshold: Option<f64>,
    ) -> Result<Self> {
        let threshold = threshold.unwrap_or(model.threshold);
        if !(0.0..=1.0).contains(&threshold) {
            return Err(PipelineError::Config(format!(
                "ML threshold {} outside [0, 1]",
                threshold
            )));
        }
        Ok(Self {
            model,
            guard,
            threshold,
        })
    }

    /// Acceptance threshold in effect.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Accepted labels for one text, split into kept and guard-vetoed.
    pub fn classify_text(&self, text: &str) -> (Vec<Allergen>, Vec<Allergen>) {
        self.model
            .predict(text, self.threshold)
            .into_iter()
            .partition(|allergen| !self.guard.is_false_positive(*allergen, text))
    }

    /// Tag every ingredient that currently has no tags, with source `ml`.
    pub async fn run(&self, store: &RecipeStore) -> Result<ClassificationSummary> {
        let candidates = store.untagged_ingredients().await?;
        let mut summary = ClassificationSummary {
            ingredients_scanned: candidates.len(),
            ..Default::default()
        };
        if candidates.is_empty() {
            info!("No untagged ingredients for the ML pass");
            return Ok(summary);
        }

        for ingredient in &candidates {
            let (accepted, vetoed) = self.classify_text(&ingredient.text);
            if !accepted.is_empty() || !vetoed.is_empty() {
                debug!(
                    ingredient_id = ingredient.id,
                    text = %ingredient.text,
                    accepted = ?accepted,
                    vetoed = ?vetoed,
                    "ML prediction"
                );
            }
            summary.suppressed += vetoed.len();
            store_tags(store, ingredient, &accepted, TagSource::Ml, &mut summary).await;
        }

        info!(
            scanned = summary.ingredients_scanned,
            inserted = summary.tags_inserted,
            suppressed = summary.suppressed,
            failed = summary.failed,
            threshold = self.threshold,
            "ML classification complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example(text: &str, labels: &[Allergen]) -> TrainingExample {
        TrainingExample::new(text, labels.iter().copied())
    }

    fn corpus() -> Vec<TrainingExample> {
        vec![
            example("tahini paste", &[Allergen::Sesame]),
            example("hummus with tahini", &[Allergen::Sesame]),
            example("halva bar", &[Allergen::Sesame]),
            example("worcestershire sauce", &[Allergen::Fish]),
            example("nam pla sauce", &[Allergen::Fish]),
            example("caesar dressing", &[Allergen::Fish, Allergen::Egg]),
            example("vegetable stock", &[]),
            example("tomato passata", &[]),
        ]
    }

    #[test]
    fn test_label_vocabulary_is_sorted_union() {
        let model = train(&corpus(), &TrainOptions::default()).unwrap();
        assert_eq!(
            model.labels,
            vec![Allergen::Egg, Allergen::Fish, Allergen::Sesame]
        );
        assert_eq!(model.classifiers.len(), 3);
        assert_eq!(model.training_samples, 8);

        // Sorted by name, not by position in the allergen list.
        let examples = vec![
            example("bread", &[Allergen::Gluten]),
            example("mayonnaise", &[Allergen::Egg]),
            example("water", &[]),
        ];
        let model = train(&examples, &TrainOptions::default()).unwrap();
        assert_eq!(model.labels, vec![Allergen::Egg, Allergen::Gluten]);
    }

    #[test]
    fn test_predictions_favor_training_signal() {
        let model = train(&corpus(), &TrainOptions::default()).unwrap();
        let proba = model.predict_proba("tahini");
        let sesame = proba.iter().find(|(a, _)| *a == Allergen::Sesame).unwrap().1;
        let fish = proba.iter().find(|(a, _)| *a == Allergen::Fish).unwrap().1;
        assert!(sesame > fish, "sesame {} fish {}", sesame, fish);
    }

    #[test]
    fn test_untrainable_inputs_rejected() {
        assert!(train(&[], &TrainOptions::default()).is_err());
        let unlabeled = vec![example("water", &[])];
        assert!(matches!(
            train(&unlabeled, &TrainOptions::default()),
            Err(PipelineError::Model(_))
        ));
    }

    #[test]
    fn test_guard_applies_to_predictions() {
        let examples = vec![
            example("oat milk", &[Allergen::Milk]),
            example("whole milk", &[Allergen::Milk]),
            example("rice", &[]),
        ];
        let model = train(&examples, &TrainOptions::default()).unwrap();
        let classifier = MlClassifier::new(model, FalsePositiveGuard::new(), Some(0.0)).unwrap();

        let (accepted, vetoed) = classifier.classify_text("oat milk");
        assert!(accepted.is_empty());
        assert_eq!(vetoed, vec![Allergen::Milk]);
    }

    #[test]
    fn test_threshold_must_be_probability() {
        let model = train(&corpus(), &TrainOptions::default()).unwrap();
        assert!(MlClassifier::new(model, FalsePositiveGuard::new(), Some(1.5)).is_err());
    }

    #[test]
    fn test_recorded_threshold_applies_without_override() {
        let options = TrainOptions {
            threshold: 0.99,
            ..TrainOptions::default()
        };
        let model = train(&corpus(), &options).unwrap();
        let best = model
            .predict_proba("tahini paste")
            .into_iter()
            .map(|(_, p)| p)
            .fold(0.0, f64::max);
        assert!(best < 0.99, "best probability {}", best);

        let recorded = MlClassifier::new(model.clone(), FalsePositiveGuard::new(), None).unwrap();
        assert_eq!(recorded.threshold(), 0.99);
        assert!(recorded.classify_text("tahini paste").0.is_empty());

        let overridden = MlClassifier::new(model, FalsePositiveGuard::new(), Some(0.0)).unwrap();
        assert!(!overridden.classify_text("tahini paste").0.is_empty());
    }

    #[test]
    fn test_artifact_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("allergen_classifier.json");

        let model = train(&corpus(), &TrainOptions::default()).unwrap();
        let digest = model.save(&path).unwrap();
        let loaded = AllergenModel::load(&path).unwrap();

        assert_eq!(digest, file_fingerprint(&path).unwrap());
        assert_eq!(loaded.labels, model.labels);
        for text in ["tahini paste", "fish sauce", "water", "caesar salad"] {
            assert_eq!(
                loaded.predict(text, DEFAULT_THRESHOLD),
                model.predict(text, DEFAULT_THRESHOLD)
            );
            for ((_, a), (_, b)) in loaded.predict_proba(text).iter().zip(model.predict_proba(text)) {
                assert!((a - b).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_load_rejects_bad_artifacts() {
        let dir = tempfile::tempdir().unwrap();

        let missing = AllergenModel::load(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(missing, PipelineError::Model(_)));

        let garbage = dir.path().join("garbage.json");
        std::fs::write(&garbage, "{\"labels\": 3}").unwrap();
        assert!(matches!(AllergenModel::load(&garbage), Err(PipelineError::Model(_))));

        let mut model = train(&corpus(), &TrainOptions::default()).unwrap();
        model.classifiers.pop();
        let mismatched = dir.path().join("mismatched.json");
        model.save(&mismatched).unwrap();
        assert!(matches!(AllergenModel::load(&mismatched), Err(PipelineError::Model(_))));
    }

    #[test]
    fn test_training_csv_parsing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.csv");
        std::fs::write(
            &path,
            "ingredient,labels\ntahini paste,Sesame\ncaesar dressing,Fish; Egg\nvegetable stock,\n",
        )
        .unwrap();

        let examples = load_training_csv(&path).unwrap();
        assert_eq!(examples.len(), 3);
        assert_eq!(examples[1].labels, vec![Allergen::Fish, Allergen::Egg]);
        assert!(examples[2].labels.is_empty());

        std::fs::write(&path, "ingredient,labels\nshrimp paste,Shellfish\n").unwrap();
        assert!(matches!(load_training_csv(&path), Err(PipelineError::Model(_))));
    }
}
