//! Run many experiments (classifier x dataset x fold) on a local thread
//! pool. Pre-flight errors abort the whole batch before anything runs;
//! failures inside a unit are collected and the rest of the batch goes on.
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};

use rayon::prelude::*;

use crate::error::ExperimentError;
use crate::experiment::config::ExperimentConfig;
use crate::experiment::controller::{Experiment, UnitReport};
use crate::models::ClassifierRegistry;

/// Thread count from a user setting: positive values are taken as is,
/// `0` means every core and negative values leave one core free.
pub fn resolve_threads(requested: i32) -> usize {
    let cores = std::thread::available_parallelism().map_or(1, |n| n.get());
    match requested {
        n if n > 0 => n as usize,
        0 => cores,
        _ => cores.saturating_sub(1).max(1),
    }
}

#[derive(Debug, Clone)]
pub struct BatchRunner {
    template: ExperimentConfig,
    classifiers: Vec<String>,
    datasets: Vec<String>,
    folds: Range<u64>,
    threads: usize,
}

impl BatchRunner {
    /// `template` supplies every setting except classifier, dataset and fold.
    pub fn new(
        template: ExperimentConfig,
        classifiers: Vec<String>,
        datasets: Vec<String>,
        folds: Range<u64>,
    ) -> Self {
        let threads = template.resolved_threads();
        Self {
            template,
            classifiers,
            datasets,
            folds,
            threads,
        }
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// One config per classifier, dataset and fold. Each experiment runs
    /// single threaded; parallelism comes from running them side by side.
    pub fn configs(&self) -> Vec<ExperimentConfig> {
        let mut configs = Vec::new();
        for classifier in &self.classifiers {
            for dataset in &self.datasets {
                for fold in self.folds.clone() {
                    let mut config = self.template.clone();
                    config.classifier_name = classifier.clone();
                    config.dataset_name = dataset.clone();
                    config.fold = fold;
                    config.num_threads = 1;
                    configs.push(config);
                }
            }
        }
        configs
    }

    pub fn run(&self, registry: &ClassifierRegistry) -> Result<BatchReport, ExperimentError> {
        let configs = self.configs();
        for config in &configs {
            Experiment::new(config.clone(), registry).preflight()?;
        }
        log::info!(
            "Running {} experiments on {} threads",
            configs.len(),
            self.threads
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()
            .map_err(|e| ExperimentError::Configuration(format!("Failed to create thread pool: {}", e)))?;

        let units: Vec<UnitReport> = pool.install(|| {
            configs
                .into_par_iter()
                .flat_map(|config| run_guarded(config, registry))
                .collect()
        });

        let report = BatchReport { units };
        log::info!(
            "Batch finished: {} completed, {} skipped, {} failed",
            report.completed(),
            report.skipped(),
            report.failed()
        );
        Ok(report)
    }
}

/// Run one experiment, turning a panic inside a classifier into a failed
/// unit so the rest of the batch keeps going. Lock guards are released
/// while unwinding.
fn run_guarded(config: ExperimentConfig, registry: &ClassifierRegistry) -> Vec<UnitReport> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        Experiment::new(config.clone(), registry).execute(None)
    }));
    match outcome {
        Ok(units) => units,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown cause".to_string());
            let error = ExperimentError::TrainingFailure(format!("classifier panicked: {}", message));
            log::error!("Experiment failed: {}\nConfiguration: {:?}", error, config);
            vec![UnitReport::failed(&config, error)]
        }
    }
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub units: Vec<UnitReport>,
}

impl BatchReport {
    pub fn completed(&self) -> usize {
        self.units.iter().filter(|u| !u.is_failed() && !u.is_skipped()).count()
    }

    pub fn skipped(&self) -> usize {
        self.units.iter().filter(|u| u.is_skipped()).count()
    }

    pub fn failed(&self) -> usize {
        self.units.iter().filter(|u| u.is_failed()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &UnitReport> {
        self.units.iter().filter(|u| u.is_failed())
    }

    pub fn all_successful(&self) -> bool {
        self.failed() == 0
    }
}
