//! Train-set performance estimation strategies and test-set prediction.

pub mod cross_validation;
pub mod early;
pub mod holdout;
pub mod resampling;

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::data::TimeSeriesInstances;
use crate::error::ExperimentError;
use crate::models::Classifier;
use crate::results::ClassifierResults;

pub use cross_validation::CrossValidation;
pub use early::evaluate_early;
pub use holdout::Holdout;
pub use resampling::StratifiedResamples;

/// Creates a fresh, fully configured classifier for each internal fit.
pub type ClassifierBuilder<'a> = dyn Fn() -> Result<Box<dyn Classifier>> + 'a;

/// Produces a result record estimating how a classifier performs on data it
/// was not trained on, using only the given training data.
pub trait Evaluator {
    /// Short method string written to results files, e.g. `cv_10`.
    fn method_name(&self) -> String;

    fn evaluate(&self, build: &ClassifierBuilder<'_>, data: &TimeSeriesInstances) -> Result<ClassifierResults>;
}

const DEFAULT_FOLDS: usize = 10;
const DEFAULT_RESAMPLES: usize = 30;
const DEFAULT_TRAIN_PROPORTION: f64 = 0.5;

/// A parsed train estimate method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EvaluationMethod {
    CrossValidation { folds: usize },
    Holdout { train_proportion: f64 },
    StratifiedResamples { resamples: usize, train_proportion: f64 },
}

impl Default for EvaluationMethod {
    fn default() -> Self {
        EvaluationMethod::CrossValidation { folds: DEFAULT_FOLDS }
    }
}

impl EvaluationMethod {
    /// Evaluator for this method, seeded for reproducible splits.
    pub fn evaluator(&self, seed: u64) -> Box<dyn Evaluator> {
        match *self {
            EvaluationMethod::CrossValidation { folds } => Box::new(CrossValidation::new(folds, seed)),
            EvaluationMethod::Holdout { train_proportion } => {
                Box::new(Holdout::new(train_proportion, seed))
            }
            EvaluationMethod::StratifiedResamples {
                resamples,
                train_proportion,
            } => Box::new(StratifiedResamples::new(resamples, train_proportion, seed)),
        }
    }
}

impl FromStr for EvaluationMethod {
    type Err = ExperimentError;

    /// Accepts `cv[_k]`, `hov[_p]` and `sr[_r[_p]]`, case-insensitive on the
    /// prefix, plus the long evaluator names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || ExperimentError::UnknownEvaluationMethod(s.to_string());
        let mut parts = s.trim().split('_');
        let head = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();

        let count = |i: usize, default: usize| -> Result<usize, ExperimentError> {
            match args.get(i) {
                None => Ok(default),
                Some(a) => a.parse::<usize>().ok().filter(|&v| v > 0).ok_or_else(unknown),
            }
        };
        let proportion = |i: usize| -> Result<f64, ExperimentError> {
            match args.get(i) {
                None => Ok(DEFAULT_TRAIN_PROPORTION),
                Some(a) => a
                    .parse::<f64>()
                    .ok()
                    .filter(|p| *p > 0.0 && *p < 1.0)
                    .ok_or_else(unknown),
            }
        };

        let method = match head.to_lowercase().as_str() {
            "cv" | "crossvalidationevaluator" => EvaluationMethod::CrossValidation {
                folds: count(0, DEFAULT_FOLDS)?,
            },
            "hov" | "singletestsetevaluator" => EvaluationMethod::Holdout {
                train_proportion: proportion(0)?,
            },
            "sr" | "stratifiedresamplesevaluator" => EvaluationMethod::StratifiedResamples {
                resamples: count(0, DEFAULT_RESAMPLES)?,
                train_proportion: proportion(1)?,
            },
            _ => return Err(unknown()),
        };
        if let EvaluationMethod::CrossValidation { folds } = method {
            if folds < 2 {
                return Err(unknown());
            }
        }
        Ok(method)
    }
}

impl fmt::Display for EvaluationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationMethod::CrossValidation { folds } => write!(f, "cv_{}", folds),
            EvaluationMethod::Holdout { train_proportion } => write!(f, "hov_{}", train_proportion),
            EvaluationMethod::StratifiedResamples {
                resamples,
                train_proportion,
            } => write!(f, "sr_{}_{}", resamples, train_proportion),
        }
    }
}

impl TryFrom<String> for EvaluationMethod {
    type Error = ExperimentError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<EvaluationMethod> for String {
    fn from(method: EvaluationMethod) -> Self {
        method.to_string()
    }
}

/// Predict every instance of `data`, timing each call, and append the
/// predictions to `results`. Returns the total prediction time.
pub fn predict_all(
    classifier: &dyn Classifier,
    data: &TimeSeriesInstances,
    results: &mut ClassifierResults,
) -> Result<Duration> {
    let mut total = Duration::ZERO;
    for inst in data {
        let start = Instant::now();
        let dist = classifier.distribution(inst)?;
        let elapsed = start.elapsed();
        total += elapsed;
        results.add_prediction(inst.label_index(), dist, Some(elapsed), "")?;
    }
    Ok(total)
}

fn class_labels_of(data: &TimeSeriesInstances) -> Result<Vec<usize>> {
    if !data.is_classification() {
        bail!("train estimates are only defined for classification data");
    }
    if data.is_empty() {
        bail!("cannot estimate performance on an empty dataset");
    }
    Ok(data.class_indexes())
}

/// Fold number for every instance: each class is shuffled and dealt round
/// robin, continuing the fold counter across classes.
pub(crate) fn stratified_folds(labels: &[usize], folds: usize, rng: &mut StdRng) -> Vec<usize> {
    let num_classes = labels.iter().max().map_or(0, |m| m + 1);
    let mut assignment = vec![0; labels.len()];
    let mut next = 0;
    for class in 0..num_classes {
        let mut members: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == class).collect();
        members.shuffle(rng);
        for i in members {
            assignment[i] = next % folds;
            next += 1;
        }
    }
    assignment
}

/// Split instance positions so each class keeps `proportion` of its
/// members (rounded, at least one when the class has two or more) in the
/// first part.
pub(crate) fn stratified_split(labels: &[usize], proportion: f64, rng: &mut StdRng) -> (Vec<usize>, Vec<usize>) {
    let num_classes = labels.iter().max().map_or(0, |m| m + 1);
    let mut train = Vec::new();
    let mut test = Vec::new();
    for class in 0..num_classes {
        let mut members: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == class).collect();
        if members.is_empty() {
            continue;
        }
        members.shuffle(rng);
        let mut keep = (proportion * members.len() as f64).round() as usize;
        if members.len() > 1 {
            keep = keep.clamp(1, members.len() - 1);
        } else {
            keep = 1;
        }
        test.extend_from_slice(&members[keep..]);
        train.extend_from_slice(&members[..keep]);
    }
    train.sort_unstable();
    test.sort_unstable();
    (train, test)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn parse_defaults_and_parameters() {
        assert_eq!("cv".parse::<EvaluationMethod>().unwrap(), EvaluationMethod::CrossValidation { folds: 10 });
        assert_eq!("CV_5".parse::<EvaluationMethod>().unwrap(), EvaluationMethod::CrossValidation { folds: 5 });
        assert_eq!(
            "hov_0.3".parse::<EvaluationMethod>().unwrap(),
            EvaluationMethod::Holdout { train_proportion: 0.3 }
        );
        assert_eq!(
            "sr".parse::<EvaluationMethod>().unwrap(),
            EvaluationMethod::StratifiedResamples { resamples: 30, train_proportion: 0.5 }
        );
        assert_eq!(
            "StratifiedResamplesEvaluator_10_0.7".parse::<EvaluationMethod>().unwrap(),
            EvaluationMethod::StratifiedResamples { resamples: 10, train_proportion: 0.7 }
        );
    }

    #[test]
    fn parse_rejects_unknown() {
        for bad in ["loocv", "cv_x", "cv_1", "hov_1.5", ""] {
            let err = bad.parse::<EvaluationMethod>().unwrap_err();
            assert!(matches!(err, ExperimentError::UnknownEvaluationMethod(_)), "{}", bad);
        }
    }

    #[test]
    fn display_round_trips() {
        for s in ["cv_10", "hov_0.5", "sr_30_0.5"] {
            assert_eq!(s.parse::<EvaluationMethod>().unwrap().to_string(), s);
        }
    }

    #[test]
    fn stratified_folds_balance_classes() {
        let labels = vec![0, 0, 0, 0, 1, 1, 1, 1];
        let folds = stratified_folds(&labels, 4, &mut StdRng::seed_from_u64(1));
        for f in 0..4 {
            let members: Vec<usize> = (0..8).filter(|&i| folds[i] == f).collect();
            assert_eq!(members.len(), 2);
            assert_eq!(members.iter().filter(|&&i| labels[i] == 0).count(), 1);
        }
    }

    #[test]
    fn stratified_split_keeps_every_class_on_both_sides() {
        let labels = vec![0, 0, 1, 1, 1, 1, 2, 2];
        let (train, test) = stratified_split(&labels, 0.5, &mut StdRng::seed_from_u64(0));
        assert_eq!(train.len() + test.len(), 8);
        for c in 0..3 {
            assert!(train.iter().any(|&i| labels[i] == c));
            assert!(test.iter().any(|&i| labels[i] == c));
        }
    }
}
