//! The persisted model artifact: vectorizer, per-label classifiers, label
//! vocabulary and threshold metadata in one JSON file.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use super::logistic::BinaryClassifier;
use super::vectorizer::TfidfVectorizer;
use crate::allergens::Allergen;
use crate::error::{PipelineError, Result};

/// Artifact format version written by this build.
pub const ARTIFACT_VERSION: u32 = 1;

/// A trained multi-label allergen model. Read-only once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllergenModel {
    pub version: u32,
    /// Label vocabulary, one classifier per entry, in this order
    pub labels: Vec<Allergen>,
    pub vectorizer: TfidfVectorizer,
    pub classifiers: Vec<BinaryClassifier>,
    /// Default acceptance threshold recorded at training time
    pub threshold: f64,
    pub training_samples: usize,
    pub trained_at: DateTime<Utc>,
}

impl AllergenModel {
    /// Per-label probabilities, in label order.
    pub fn predict_proba(&self, text: &str) -> Vec<(Allergen, f64)> {
        let row = self.vectorizer.transform(text);
        self.labels
            .iter()
            .zip(&self.classifiers)
            .map(|(label, clf)| (*label, clf.probability(&row)))
            .collect()
    }

    /// Labels whose probability reaches `threshold`.
    pub fn predict(&self, text: &str, threshold: f64) -> Vec<Allergen> {
        self.predict_proba(text)
            .into_iter()
            .filter(|(_, p)| *p >= threshold)
            .map(|(label, _)| label)
            .collect()
    }

    /// Write the artifact as JSON. Returns its SHA-256 fingerprint.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }
        let bytes = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, &bytes).map_err(|e| PipelineError::io(path, e))?;

        let digest = fingerprint(&bytes);
        info!(
            path = %path.display(),
            sha256 = %digest,
            labels = self.labels.len(),
            vocabulary = self.vectorizer.len(),
            "Saved model artifact"
        );
        Ok(digest)
    }

    /// Load and validate an artifact. The file identity is logged.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            PipelineError::Model(format!("cannot read model artifact {}: {}", path.display(), e))
        })?;
        let model: AllergenModel = serde_json::from_slice(&bytes).map_err(|e| {
            PipelineError::Model(format!("malformed model artifact {}: {}", path.display(), e))
        })?;
        model.validate()?;

        info!(
            path = %path.display(),
            sha256 = %fingerprint(&bytes),
            labels = ?model.labels,
            trained_at = %model.trained_at,
            "Loaded model artifact"
        );
        Ok(model)
    }

    fn validate(&self) -> Result<()> {
        if self.version != ARTIFACT_VERSION {
            return Err(PipelineError::Model(format!(
                "unsupported artifact version {} (expected {})",
                self.version, ARTIFACT_VERSION
            )));
        }
        if self.labels.len() != self.classifiers.len() {
            return Err(PipelineError::Model(format!(
                "{} labels but {} classifiers",
                self.labels.len(),
                self.classifiers.len()
            )));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(PipelineError::Model(format!(
                "threshold {} outside [0, 1]",
                self.threshold
            )));
        }
        self.vectorizer.validate()?;
        let dim = self.vectorizer.len();
        if self
            .classifiers
            .iter()
            .filter_map(BinaryClassifier::dimension)
            .any(|d| d != dim)
        {
            return Err(PipelineError::Model(
                "classifier weights do not match vocabulary size".into(),
            ));
        }
        Ok(())
    }
}

/// Hex SHA-256 of the artifact bytes.
pub fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Fingerprint of an artifact file on disk.
pub fn file_fingerprint(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| PipelineError::io(path, e))?;
    Ok(fingerprint(&bytes))
}
