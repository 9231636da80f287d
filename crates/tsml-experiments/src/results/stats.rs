use ndarray::Array2;

use crate::error::ResultsError;
use crate::results::Prediction;

/// Probabilities are floored here before taking logs.
const MIN_PROB: f64 = 1e-15;

/// Summary statistics over a finalised set of predictions.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryStats {
    pub accuracy: f64,
    pub balanced_accuracy: f64,
    /// Mean negative log2 likelihood of the true class.
    pub nll: f64,
    /// One-vs-rest AUROC averaged with class prevalence weights.
    pub mean_auroc: f64,
    pub macro_f1: f64,
    /// `[actual, predicted]` counts.
    pub confusion_matrix: Array2<usize>,
}

impl SummaryStats {
    pub fn compute(predictions: &[Prediction], num_classes: usize) -> Result<Self, ResultsError> {
        let mut labels = Vec::with_capacity(predictions.len());
        for (i, p) in predictions.iter().enumerate() {
            labels.push(p.true_label.ok_or(ResultsError::MissingTrueLabel(i))?);
        }

        let mut confusion = Array2::<usize>::zeros((num_classes, num_classes));
        let mut correct = 0usize;
        for (p, &actual) in predictions.iter().zip(&labels) {
            if actual == p.predicted {
                correct += 1;
            }
            if actual < num_classes && p.predicted < num_classes {
                confusion[[actual, p.predicted]] += 1;
            }
        }

        let n = predictions.len() as f64;
        Ok(Self {
            accuracy: correct as f64 / n,
            balanced_accuracy: balanced_accuracy(&confusion),
            nll: nll(predictions, &labels),
            mean_auroc: mean_auroc(predictions, &labels, num_classes),
            macro_f1: macro_f1(&confusion),
            confusion_matrix: confusion,
        })
    }
}

fn balanced_accuracy(confusion: &Array2<usize>) -> f64 {
    let recalls: Vec<f64> = (0..confusion.nrows())
        .filter_map(|c| {
            let support: usize = confusion.row(c).sum();
            (support > 0).then(|| confusion[[c, c]] as f64 / support as f64)
        })
        .collect();
    if recalls.is_empty() {
        return f64::NAN;
    }
    recalls.iter().sum::<f64>() / recalls.len() as f64
}

fn macro_f1(confusion: &Array2<usize>) -> f64 {
    let f1s: Vec<f64> = (0..confusion.nrows())
        .filter_map(|c| {
            let support: usize = confusion.row(c).sum();
            if support == 0 {
                return None;
            }
            let predicted: usize = confusion.column(c).sum();
            let tp = confusion[[c, c]] as f64;
            let recall = tp / support as f64;
            let precision = if predicted == 0 { 0.0 } else { tp / predicted as f64 };
            Some(if precision + recall == 0.0 {
                0.0
            } else {
                2.0 * precision * recall / (precision + recall)
            })
        })
        .collect();
    if f1s.is_empty() {
        return f64::NAN;
    }
    f1s.iter().sum::<f64>() / f1s.len() as f64
}

fn nll(predictions: &[Prediction], labels: &[usize]) -> f64 {
    let total: f64 = predictions
        .iter()
        .zip(labels)
        .map(|(p, &actual)| {
            let prob = p.distribution.get(actual).copied().unwrap_or(0.0);
            -prob.max(MIN_PROB).log2()
        })
        .sum();
    total / predictions.len() as f64
}

fn mean_auroc(predictions: &[Prediction], labels: &[usize], num_classes: usize) -> f64 {
    let mut weighted = 0.0;
    let mut weight = 0usize;
    for c in 0..num_classes {
        let scores: Vec<(f64, bool)> = predictions
            .iter()
            .zip(labels)
            .map(|(p, &actual)| (p.distribution.get(c).copied().unwrap_or(0.0), actual == c))
            .collect();
        let positives = scores.iter().filter(|(_, pos)| *pos).count();
        if positives == 0 || positives == scores.len() {
            continue;
        }
        weighted += auroc(scores) * positives as f64;
        weight += positives;
    }
    if weight == 0 {
        return f64::NAN;
    }
    weighted / weight as f64
}

/// Mann-Whitney estimate of the area under the ROC curve, with tied scores
/// given their average rank.
fn auroc(mut scores: Vec<(f64, bool)>) -> f64 {
    scores.sort_by(|a, b| a.0.total_cmp(&b.0));
    let mut rank_sum = 0.0;
    let mut i = 0;
    while i < scores.len() {
        let mut j = i;
        while j + 1 < scores.len() && scores[j + 1].0 == scores[i].0 {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        rank_sum += avg_rank * scores[i..=j].iter().filter(|(_, pos)| *pos).count() as f64;
        i = j + 1;
    }
    let pos = scores.iter().filter(|(_, p)| *p).count() as f64;
    let neg = scores.len() as f64 - pos;
    (rank_sum - pos * (pos + 1.0) / 2.0) / (pos * neg)
}
