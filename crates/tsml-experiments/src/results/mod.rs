//! Per-split prediction records and the tsml results file format.

pub mod file;
pub mod stats;

use std::time::Duration;

use crate::error::ResultsError;

pub use file::{read_results_file, validate_results_file, ResultsFormat};
pub use stats::SummaryStats;

/// Index of the largest probability; ties resolve to the lowest index.
pub fn argmax(distribution: &[f64]) -> usize {
    let mut best = 0;
    for (i, &p) in distribution.iter().enumerate() {
        if p > distribution[best] {
            best = i;
        }
    }
    best
}

/// One predicted case.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// `None` when the true class is unknown.
    pub true_label: Option<usize>,
    pub predicted: usize,
    pub distribution: Vec<f64>,
    pub prediction_time: Option<Duration>,
    pub extra_info: String,
}

/// Predictions and cost measurements for one split (train estimate or test)
/// of one classifier on one dataset fold.
///
/// Predictions may only be added until [`finalise`](Self::finalise) has
/// computed the summary statistics.
#[derive(Debug, Clone)]
pub struct ClassifierResults {
    pub dataset_name: String,
    pub classifier_name: String,
    pub split: String,
    pub fold: u64,
    pub description: String,
    pub parameters: String,
    pub num_classes: usize,
    pub build_time: Option<Duration>,
    pub test_time: Option<Duration>,
    pub benchmark_time: Option<Duration>,
    pub memory: Option<u64>,
    pub error_estimate_method: String,
    pub error_estimate_time: Option<Duration>,
    pub build_plus_estimate_time: Option<Duration>,
    predictions: Vec<Prediction>,
    stats: Option<SummaryStats>,
}

impl ClassifierResults {
    pub fn new(num_classes: usize) -> Self {
        Self {
            dataset_name: String::new(),
            classifier_name: String::new(),
            split: String::new(),
            fold: 0,
            description: String::new(),
            parameters: String::new(),
            num_classes,
            build_time: None,
            test_time: None,
            benchmark_time: None,
            memory: None,
            error_estimate_method: String::new(),
            error_estimate_time: None,
            build_plus_estimate_time: None,
            predictions: Vec::new(),
            stats: None,
        }
    }

    /// Set the identifying fields written on the first line of a results file.
    pub fn set_identity(&mut self, dataset: &str, classifier: &str, split: &str, fold: u64) {
        self.dataset_name = dataset.to_string();
        self.classifier_name = classifier.to_string();
        self.split = split.to_string();
        self.fold = fold;
    }

    pub fn add_prediction(
        &mut self,
        true_label: Option<usize>,
        distribution: Vec<f64>,
        prediction_time: Option<Duration>,
        extra_info: impl Into<String>,
    ) -> Result<(), ResultsError> {
        let predicted = argmax(&distribution);
        self.add_prediction_with_label(true_label, predicted, distribution, prediction_time, extra_info)
    }

    /// Add a prediction whose label was decided elsewhere, e.g. read back
    /// from a results file, instead of taking the argmax of `distribution`.
    pub fn add_prediction_with_label(
        &mut self,
        true_label: Option<usize>,
        predicted: usize,
        distribution: Vec<f64>,
        prediction_time: Option<Duration>,
        extra_info: impl Into<String>,
    ) -> Result<(), ResultsError> {
        if self.stats.is_some() {
            return Err(ResultsError::AlreadyFinalised(self.label()));
        }
        self.predictions.push(Prediction {
            true_label,
            predicted,
            distribution,
            prediction_time,
            extra_info: extra_info.into(),
        });
        Ok(())
    }

    pub fn predictions(&self) -> &[Prediction] {
        &self.predictions
    }

    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }

    pub fn is_finalised(&self) -> bool {
        self.stats.is_some()
    }

    /// Compute summary statistics. Runs once; later calls return the cached
    /// statistics.
    pub fn finalise(&mut self) -> Result<&SummaryStats, ResultsError> {
        if self.stats.is_none() {
            self.stats = Some(SummaryStats::compute(&self.predictions, self.num_classes)?);
        }
        self.stats
            .as_ref()
            .ok_or_else(|| ResultsError::NotFinalised(self.label()))
    }

    pub fn stats(&self) -> Option<&SummaryStats> {
        self.stats.as_ref()
    }

    pub fn accuracy(&self) -> Option<f64> {
        self.stats.as_ref().map(|s| s.accuracy)
    }

    /// Sum of per-prediction times, when every prediction was timed.
    pub fn total_prediction_time(&self) -> Option<Duration> {
        self.predictions.iter().map(|p| p.prediction_time).sum()
    }

    fn label(&self) -> String {
        format!(
            "{}/{}/{} fold {}",
            self.classifier_name, self.dataset_name, self.split, self.fold
        )
    }
}
