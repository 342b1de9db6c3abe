//! Unigram + bigram TF-IDF text vectorizer.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

lazy_static! {
    // Runs of two or more word characters.
    static ref TOKEN: Regex = Regex::new(r"\b\w\w+\b").unwrap();
}

/// Sparse row: `(feature index, value)` sorted by index.
pub type SparseVector = Vec<(usize, f64)>;

/// Lower-cased tokens followed by adjacent-token bigrams.
pub fn analyze(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let tokens: Vec<&str> = TOKEN.find_iter(&lower).map(|m| m.as_str()).collect();

    let mut terms: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
    terms.extend(tokens.windows(2).map(|pair| format!("{} {}", pair[0], pair[1])));
    terms
}

/// Fitted vocabulary and inverse document frequencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f64>,
    max_df: f64,
}

impl TfidfVectorizer {
    /// Learn the vocabulary and smoothed idf from a corpus.
    ///
    /// Terms present in more than `max_df` of the documents are dropped, but
    /// only when the corpus has more than one document.
    pub fn fit<S: AsRef<str>>(documents: &[S], max_df: f64) -> Result<Self> {
        if documents.is_empty() {
            return Err(PipelineError::Model("cannot fit vectorizer on an empty corpus".into()));
        }
        if !(0.0..=1.0).contains(&max_df) || max_df == 0.0 {
            return Err(PipelineError::Model(format!("max_df must be in (0, 1], got {}", max_df)));
        }

        let n_docs = documents.len();
        let mut doc_freq: BTreeMap<String, usize> = BTreeMap::new();
        for doc in documents {
            let unique: BTreeSet<String> = analyze(doc.as_ref()).into_iter().collect();
            for term in unique {
                *doc_freq.entry(term).or_default() += 1;
            }
        }

        let ceiling = if n_docs > 1 {
            max_df * n_docs as f64
        } else {
            n_docs as f64
        };

        let mut vocabulary = BTreeMap::new();
        let mut idf = Vec::new();
        for (term, df) in doc_freq {
            if df as f64 > ceiling {
                continue;
            }
            vocabulary.insert(term, idf.len());
            idf.push(((1.0 + n_docs as f64) / (1.0 + df as f64)).ln() + 1.0);
        }

        if vocabulary.is_empty() {
            return Err(PipelineError::Model(
                "vocabulary is empty after document-frequency pruning".into(),
            ));
        }

        Ok(Self {
            vocabulary,
            idf,
            max_df,
        })
    }

    /// TF-IDF weights for one document, L2-normalized. Unknown terms are
    /// ignored; a document with no known terms yields an empty vector.
    pub fn transform(&self, text: &str) -> SparseVector {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for term in analyze(text) {
            if let Some(&index) = self.vocabulary.get(&term) {
                *counts.entry(index).or_default() += 1.0;
            }
        }

        let mut row: SparseVector = counts
            .into_iter()
            .map(|(index, tf)| (index, tf * self.idf[index]))
            .collect();
        row.sort_by_key(|(index, _)| *index);

        let norm = row.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, v) in &mut row {
                *v /= norm;
            }
        }
        row
    }

    pub fn len(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vocabulary.is_empty()
    }

    pub fn contains(&self, term: &str) -> bool {
        self.vocabulary.contains_key(term)
    }

    /// Internal consistency check after deserialization.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.idf.len() != self.vocabulary.len()
            || self.vocabulary.values().any(|&i| i >= self.idf.len())
        {
            return Err(PipelineError::Model(
                "vectorizer vocabulary and idf table disagree".into(),
            ));
        }
        Ok(())
    }
}
