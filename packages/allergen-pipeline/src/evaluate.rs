//! Precision / recall / F1 of stored tags against a hand-labeled gold set.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::{self, Write as _};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::allergens::{parse_label_list, Allergen};
use crate::error::{PipelineError, Result};

/// Gold labels: recipe id → true allergen set.
pub type GoldSet = BTreeMap<i64, BTreeSet<Allergen>>;

/// Predicted labels: recipe id → stored allergen set.
pub type Predictions = HashMap<i64, BTreeSet<Allergen>>;

#[derive(Debug, Deserialize)]
struct GoldRow {
    id: String,
    #[serde(default)]
    true_allergens: Option<String>,
}

/// Read an `id,true_allergens` CSV.
///
/// Unknown allergen names are logged and ignored; blank or `nan` cells mean
/// the empty set. Rows whose id is not an integer are skipped with a warning.
pub fn load_gold_csv(path: impl AsRef<Path>) -> Result<GoldSet> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path).map_err(|e| {
        PipelineError::Config(format!("cannot read gold labels {}: {}", path.display(), e))
    })?;

    let mut gold = GoldSet::new();
    for row in reader.deserialize::<GoldRow>() {
        let row = row?;
        let id: i64 = match row.id.trim().parse() {
            Ok(id) => id,
            Err(_) => {
                warn!(id = %row.id, "Skipping gold row with non-integer id");
                continue;
            }
        };

        let (labels, unknown) = parse_label_list(row.true_allergens.as_deref().unwrap_or(""));
        for name in &unknown {
            warn!(recipe_id = id, allergen = %name, "Ignoring unknown allergen in gold labels");
        }
        gold.entry(id).or_default().extend(labels);
    }

    info!(path = %path.display(), recipes = gold.len(), "Loaded gold labels");
    Ok(gold)
}

/// Scores for one allergen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelScores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

impl LabelScores {
    fn from_counts(tp: usize, fp: usize, fn_: usize) -> Self {
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self {
            precision,
            recall,
            f1,
            support: tp + fn_,
        }
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Counts {
    tp: usize,
    fp: usize,
    fn_: usize,
}

/// Full evaluation result across the 14 categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub recipes: usize,
    pub per_allergen: BTreeMap<Allergen, LabelScores>,
    pub micro: LabelScores,
    pub macro_avg: LabelScores,
    pub weighted: LabelScores,
}

/// Compare predictions with gold labels, recipe by recipe.
///
/// A gold recipe missing from `predictions` predicts the empty set.
/// Zero denominators score 0.
pub fn evaluate(gold: &GoldSet, predictions: &Predictions) -> EvaluationReport {
    let empty = BTreeSet::new();
    let mut counts: BTreeMap<Allergen, Counts> =
        Allergen::ALL.iter().map(|a| (*a, Counts::default())).collect();

    for (recipe_id, truth) in gold {
        let predicted = predictions.get(recipe_id).unwrap_or(&empty);
        for allergen in Allergen::ALL {
            let c = counts.entry(allergen).or_default();
            match (truth.contains(&allergen), predicted.contains(&allergen)) {
                (true, true) => c.tp += 1,
                (false, true) => c.fp += 1,
                (true, false) => c.fn_ += 1,
                (false, false) => {}
            }
        }
    }

    let per_allergen: BTreeMap<Allergen, LabelScores> = counts
        .iter()
        .map(|(a, c)| (*a, LabelScores::from_counts(c.tp, c.fp, c.fn_)))
        .collect();

    let total = counts.values().fold(Counts::default(), |acc, c| Counts {
        tp: acc.tp + c.tp,
        fp: acc.fp + c.fp,
        fn_: acc.fn_ + c.fn_,
    });
    let micro = LabelScores::from_counts(total.tp, total.fp, total.fn_);

    let n = per_allergen.len() as f64;
    let support: usize = per_allergen.values().map(|s| s.support).sum();
    let macro_avg = LabelScores {
        precision: per_allergen.values().map(|s| s.precision).sum::<f64>() / n,
        recall: per_allergen.values().map(|s| s.recall).sum::<f64>() / n,
        f1: per_allergen.values().map(|s| s.f1).sum::<f64>() / n,
        support,
    };
    let weighted = LabelScores {
        precision: weighted_mean(&per_allergen, |s| s.precision),
        recall: weighted_mean(&per_allergen, |s| s.recall),
        f1: weighted_mean(&per_allergen, |s| s.f1),
        support,
    };

    EvaluationReport {
        recipes: gold.len(),
        per_allergen,
        micro,
        macro_avg,
        weighted,
    }
}

/// Support-weighted mean of one score.
fn weighted_mean(
    scores: &BTreeMap<Allergen, LabelScores>,
    field: fn(&LabelScores) -> f64,
) -> f64 {
    let support: usize = scores.values().map(|s| s.support).sum();
    if support == 0 {
        return 0.0;
    }
    scores
        .values()
        .map(|s| field(s) * s.support as f64)
        .sum::<f64>()
        / support as f64
}

impl EvaluationReport {
    pub fn scores(&self, allergen: Allergen) -> LabelScores {
        self.per_allergen.get(&allergen).copied().unwrap_or_default()
    }

    /// Fixed-width text table.
    pub fn render_table(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:>14} {:>10} {:>10} {:>10} {:>10}",
            "", "precision", "recall", "f1-score", "support"
        );
        let _ = writeln!(out);
        for (allergen, s) in &self.per_allergen {
            let _ = writeln!(out, "{}", Row(allergen.as_str(), s));
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", Row("micro avg", &self.micro));
        let _ = writeln!(out, "{}", Row("macro avg", &self.macro_avg));
        let _ = writeln!(out, "{}", Row("weighted avg", &self.weighted));
        let _ = writeln!(out);
        let _ = write!(out, "recipes evaluated: {}", self.recipes);
        out
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

struct Row<'a>(&'a str, &'a LabelScores);

impl fmt::Display for Row<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Row(name, s) = self;
        write!(
            f,
            "{:>14} {:>10.2} {:>10.2} {:>10.2} {:>10}",
            name, s.precision, s.recall, s.f1, s.support
        )
    }
}
