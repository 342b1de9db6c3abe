//! Binary L2-regularized logistic regression over sparse rows.

use serde::{Deserialize, Serialize};

use super::vectorizer::SparseVector;

/// Full-batch gradient descent settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainParams {
    /// Inverse regularization strength
    pub c: f64,
    pub learning_rate: f64,
    pub max_iter: usize,
    /// Stop once every gradient component is below this
    pub tolerance: f64,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            learning_rate: 1.0,
            max_iter: 1000,
            tolerance: 1e-6,
        }
    }
}

/// One label's decision function.
///
/// A label whose training column is all-negative or all-positive cannot be
/// fit and predicts a fixed probability instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BinaryClassifier {
    Constant { probability: f64 },
    Logistic { weights: Vec<f64>, bias: f64 },
}

impl BinaryClassifier {
    /// Fit from zero weights. Deterministic for identical input.
    pub fn fit(rows: &[SparseVector], targets: &[bool], dim: usize, params: &TrainParams) -> Self {
        let positives = targets.iter().filter(|&&t| t).count();
        if positives == 0 || positives == targets.len() {
            return BinaryClassifier::Constant {
                probability: if positives == 0 { 0.0 } else { 1.0 },
            };
        }

        let n = rows.len() as f64;
        let lambda = 1.0 / (params.c * n);
        let mut weights = vec![0.0; dim];
        let mut bias = 0.0;
        let mut grad = vec![0.0; dim];

        for _ in 0..params.max_iter {
            grad.iter_mut().for_each(|g| *g = 0.0);
            let mut grad_bias = 0.0;

            for (row, &target) in rows.iter().zip(targets) {
                let error = sigmoid(dot(&weights, row) + bias) - if target { 1.0 } else { 0.0 };
                for &(j, value) in row {
                    grad[j] += error * value;
                }
                grad_bias += error;
            }

            let mut largest = (grad_bias / n).abs();
            for (g, w) in grad.iter_mut().zip(&weights) {
                *g = *g / n + lambda * w;
                largest = largest.max(g.abs());
            }
            if largest < params.tolerance {
                break;
            }

            for (w, g) in weights.iter_mut().zip(&grad) {
                *w -= params.learning_rate * g;
            }
            bias -= params.learning_rate * grad_bias / n;
        }

        BinaryClassifier::Logistic { weights, bias }
    }

    pub fn probability(&self, row: &SparseVector) -> f64 {
        match self {
            BinaryClassifier::Constant { probability } => *probability,
            BinaryClassifier::Logistic { weights, bias } => sigmoid(dot(weights, row) + bias),
        }
    }

    pub(crate) fn dimension(&self) -> Option<usize> {
        match self {
            BinaryClassifier::Constant { .. } => None,
            BinaryClassifier::Logistic { weights, .. } => Some(weights.len()),
        }
    }
}

fn dot(weights: &[f64], row: &SparseVector) -> f64 {
    row.iter()
        .filter_map(|&(j, v)| weights.get(j).map(|w| w * v))
        .sum()
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<SparseVector> {
        vec![
            vec![(0, 1.0)],
            vec![(0, 0.8), (2, 0.6)],
            vec![(1, 1.0)],
            vec![(1, 0.6), (2, 0.8)],
        ]
    }

    #[test]
    fn test_constant_when_label_never_varies() {
        let params = TrainParams::default();
        assert_eq!(
            BinaryClassifier::fit(&rows(), &[false; 4], 3, &params),
            BinaryClassifier::Constant { probability: 0.0 }
        );
        assert_eq!(
            BinaryClassifier::fit(&rows(), &[true; 4], 3, &params).probability(&vec![]),
            1.0
        );
    }

    #[test]
    fn test_separates_simple_classes() {
        let targets = [true, true, false, false];
        let clf = BinaryClassifier::fit(&rows(), &targets, 3, &TrainParams::default());

        let positive = clf.probability(&vec![(0, 1.0)]);
        let negative = clf.probability(&vec![(1, 1.0)]);
        assert!(positive > 0.5, "positive = {}", positive);
        assert!(negative < 0.5, "negative = {}", negative);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let targets = [true, false, false, true];
        let a = BinaryClassifier::fit(&rows(), &targets, 3, &TrainParams::default());
        let b = BinaryClassifier::fit(&rows(), &targets, 3, &TrainParams::default());
        assert_eq!(a, b);
    }

    #[test]
    fn test_sigmoid_is_stable_at_extremes() {
        assert_eq!(sigmoid(1000.0), 1.0);
        assert_eq!(sigmoid(-1000.0), 0.0);
        assert!((sigmoid(0.0) - 0.5).abs() < f64::EPSILON);
    }
}
