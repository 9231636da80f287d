use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::error::ExperimentError;
use crate::evaluation::EvaluationMethod;
use crate::experiment::batch::resolve_threads;
use crate::results::ResultsFormat;

/// A wall-clock span such as a train contract or checkpoint interval.
///
/// Parses `"500ms"`, `"30s"`, `"5 minutes"`, `"1h"`, `"2 days"`; a bare
/// number is seconds. Displays in the largest whole unit, e.g. `90m`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeSpan(Duration);

impl TimeSpan {
    pub fn new(duration: Duration) -> Self {
        Self(duration)
    }

    pub fn duration(&self) -> Duration {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl FromStr for TimeSpan {
    type Err = ExperimentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ExperimentError::Configuration(format!("invalid time span '{}'", s));
        let s_trim = s.trim();
        let split = s_trim
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(s_trim.len());
        let amount: f64 = s_trim[..split].trim().parse().map_err(|_| invalid())?;
        let seconds_per_unit = match s_trim[split..].trim().to_lowercase().as_str() {
            "ms" | "millis" | "millisecond" | "milliseconds" => 1e-3,
            "" | "s" | "sec" | "secs" | "second" | "seconds" => 1.0,
            "m" | "min" | "mins" | "minute" | "minutes" => 60.0,
            "h" | "hr" | "hrs" | "hour" | "hours" => 3600.0,
            "d" | "day" | "days" => 86400.0,
            _ => return Err(invalid()),
        };
        Duration::try_from_secs_f64(amount * seconds_per_unit)
            .map(TimeSpan)
            .map_err(|_| invalid())
    }
}

impl fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = self.0.as_millis();
        if ms == 0 {
            return write!(f, "0s");
        }
        for (unit, per) in [("d", 86_400_000), ("h", 3_600_000), ("m", 60_000), ("s", 1000)] {
            if ms % per == 0 {
                return write!(f, "{}{}", ms / per, unit);
            }
        }
        write!(f, "{}ms", ms)
    }
}

impl TryFrom<String> for TimeSpan {
    type Error = ExperimentError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TimeSpan> for String {
    fn from(span: TimeSpan) -> Self {
        span.to_string()
    }
}

/// Everything that defines one experiment invocation: which classifier on
/// which dataset fold, where data and results live, and the optional
/// behaviours to switch on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub data_path: PathBuf,
    pub results_path: PathBuf,
    pub classifier_name: String,
    pub dataset_name: String,
    /// Resample id; also the seed for everything random in the unit.
    pub fold: u64,

    pub force_overwrite: bool,
    pub generate_train_estimate: bool,
    pub train_estimate_method: EvaluationMethod,

    pub checkpointing: bool,
    pub checkpoint_interval: Option<TimeSpan>,
    /// Remove a smaller contract's checkpoint once copied forward.
    pub remove_checkpoint: bool,
    /// Train contracts; zero entries mean unconstrained.
    pub train_time_limits: Vec<TimeSpan>,

    /// Threads for the classifier (or the batch pool): 0 = all cores,
    /// negative = all but one.
    pub num_threads: i32,
    pub single_parameter_id: Option<usize>,
    pub results_format: ResultsFormat,
    /// Stop after training and post-train hooks.
    pub train_only: bool,
    pub serialise_classifier: bool,
    pub visualise: bool,

    pub early_classification: bool,
    /// Fraction of the series revealed per early classification step.
    pub earliness_step: f64,
    pub normalise: bool,
    /// Keep only this fraction of every series before training and testing.
    pub truncation: Option<f64>,

    pub benchmark: bool,
    pub supporting_path: Option<PathBuf>,
    pub log_level: String,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::new(),
            results_path: PathBuf::new(),
            classifier_name: String::new(),
            dataset_name: String::new(),
            fold: 0,
            force_overwrite: false,
            generate_train_estimate: false,
            train_estimate_method: EvaluationMethod::default(),
            checkpointing: false,
            checkpoint_interval: None,
            remove_checkpoint: false,
            train_time_limits: Vec::new(),
            num_threads: 1,
            single_parameter_id: None,
            results_format: ResultsFormat::Predictions,
            train_only: false,
            serialise_classifier: false,
            visualise: false,
            early_classification: false,
            earliness_step: 0.05,
            normalise: false,
            truncation: None,
            benchmark: false,
            supporting_path: None,
            log_level: "info".to_string(),
        }
    }
}

impl ExperimentConfig {
    pub fn new(
        data_path: impl AsRef<Path>,
        results_path: impl AsRef<Path>,
        classifier_name: &str,
        dataset_name: &str,
        fold: u64,
    ) -> Self {
        Self {
            data_path: data_path.as_ref().to_path_buf(),
            results_path: results_path.as_ref().to_path_buf(),
            classifier_name: classifier_name.to_string(),
            dataset_name: dataset_name.to_string(),
            fold,
            ..Self::default()
        }
    }

    /// Reject missing required fields and out-of-range values.
    pub fn validate(&self) -> Result<(), ExperimentError> {
        let missing = |field: &str| Err(ExperimentError::Configuration(format!("{} is required", field)));
        if self.data_path.as_os_str().is_empty() {
            return missing("data_path");
        }
        if self.results_path.as_os_str().is_empty() {
            return missing("results_path");
        }
        if self.classifier_name.trim().is_empty() {
            return missing("classifier_name");
        }
        if self.dataset_name.trim().is_empty() {
            return missing("dataset_name");
        }
        if !(self.earliness_step > 0.0 && self.earliness_step <= 1.0) {
            return Err(ExperimentError::Configuration(format!(
                "earliness_step must be in (0, 1], got {}",
                self.earliness_step
            )));
        }
        if let Some(t) = self.truncation {
            if !(t > 0.0 && t <= 1.0) {
                return Err(ExperimentError::Configuration(format!(
                    "truncation must be in (0, 1], got {}",
                    t
                )));
            }
        }
        if self.checkpoint_interval.map_or(false, |i| i.is_zero()) {
            return Err(ExperimentError::Configuration(
                "checkpoint_interval must be positive".to_string(),
            ));
        }
        self.log_level_filter()?;
        Ok(())
    }

    pub fn log_level_filter(&self) -> Result<LevelFilter, ExperimentError> {
        LevelFilter::from_str(&self.log_level).map_err(|_| {
            ExperimentError::Configuration(format!("unknown log level '{}'", self.log_level))
        })
    }

    /// Train contracts to run, ascending and without duplicates. Zero
    /// contracts are dropped; with none left there is one unconstrained run.
    pub fn resolved_train_time_limits(&self) -> Vec<Option<TimeSpan>> {
        let mut limits: Vec<TimeSpan> = self
            .train_time_limits
            .iter()
            .copied()
            .filter(|t| !t.is_zero())
            .collect();
        limits.sort();
        limits.dedup();
        if limits.is_empty() {
            vec![None]
        } else {
            limits.into_iter().map(Some).collect()
        }
    }

    /// Classifier name used for the results directory of a contract run.
    pub fn results_name(&self, limit: Option<TimeSpan>) -> String {
        match limit {
            Some(t) => format!("{}_{}", self.classifier_name, t),
            None => self.classifier_name.clone(),
        }
    }

    pub fn resolved_threads(&self) -> usize {
        resolve_threads(self.num_threads)
    }

    /// A train file is produced when asked for, and always in parameter
    /// search mode.
    pub fn estimate_requested(&self) -> bool {
        self.generate_train_estimate || self.single_parameter_id.is_some()
    }
}
