//! One experiment invocation: a classifier on one fold of one dataset,
//! possibly under several train contracts.
//!
//! Each contract is a unit of work that moves through
//! `Init -> (ResultsExist | Training -> PostTrainHooks -> Testing) -> Done`,
//! or ends in `Error`. Units are idempotent (existing valid results are
//! never recomputed unless forced) and hold an exclusive lock on their
//! result slot while they run.
use std::borrow::Cow;
use std::time::{Duration, Instant};

use crate::data::TimeSeriesInstances;
use crate::error::{DataError, ExperimentError};
use crate::evaluation::{evaluate_early, predict_all, Evaluator};
use crate::experiment::checkpoint::{copy_forward, CheckpointSource};
use crate::experiment::config::{ExperimentConfig, TimeSpan};
use crate::experiment::finalise::{finalise_train_results, TrainMeasurements};
use crate::experiment::lock::FileLock;
use crate::experiment::monitor::{benchmark_time, experiment_description, MemoryWatcher};
use crate::experiment::paths::ResultPaths;
use crate::io::{sample_dataset, DatasetSplit};
use crate::models::{Capability, Classifier, ClassifierFactory, ClassifierRegistry};
use crate::results::{read_results_file, validate_results_file, ClassifierResults};

const MEMORY_SAMPLE_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExperimentState {
    Init,
    ResultsExist,
    Training,
    PostTrainHooks,
    Testing,
    Done,
    Error,
}

#[derive(Debug)]
pub enum UnitOutcome {
    /// Valid results were already on disk.
    Skipped,
    Completed {
        train: ClassifierResults,
        test: Option<ClassifierResults>,
    },
    Failed(ExperimentError),
}

/// What happened to one unit of work.
#[derive(Debug)]
pub struct UnitReport {
    pub results_name: String,
    pub dataset: String,
    pub fold: u64,
    pub train_time_limit: Option<TimeSpan>,
    /// States visited, in order.
    pub states: Vec<ExperimentState>,
    pub outcome: UnitOutcome,
}

impl UnitReport {
    fn new(config: &ExperimentConfig, limit: Option<TimeSpan>) -> Self {
        Self {
            results_name: config.results_name(limit),
            dataset: config.dataset_name.clone(),
            fold: config.fold,
            train_time_limit: limit,
            states: vec![ExperimentState::Init],
            outcome: UnitOutcome::Skipped,
        }
    }

    /// Report for a unit that could not start at all.
    pub(crate) fn failed(config: &ExperimentConfig, error: ExperimentError) -> Self {
        let mut report = Self::new(config, None);
        report.states.push(ExperimentState::Error);
        report.outcome = UnitOutcome::Failed(error);
        report
    }

    fn enter(&mut self, state: ExperimentState) {
        log::trace!("{} {} fold {}: {:?}", self.results_name, self.dataset, self.fold, state);
        self.states.push(state);
    }

    pub fn final_state(&self) -> ExperimentState {
        self.states.last().copied().unwrap_or(ExperimentState::Init)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, UnitOutcome::Skipped)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, UnitOutcome::Failed(_))
    }
}

/// Drives the units of one [`ExperimentConfig`].
pub struct Experiment<'r> {
    config: ExperimentConfig,
    registry: &'r ClassifierRegistry,
}

impl<'r> Experiment<'r> {
    pub fn new(config: ExperimentConfig, registry: &'r ClassifierRegistry) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Checks that must pass before any work starts. Every error returned
    /// here is a pre-flight error.
    pub fn preflight(&self) -> Result<(), ExperimentError> {
        self.config.validate()?;
        let probe = self.registry.create(&self.config.classifier_name)?;
        let name = &self.config.classifier_name;

        let contracted = self.config.train_time_limits.iter().any(|t| !t.is_zero());
        if contracted && !probe.has_capability(Capability::Contractable) {
            return Err(ExperimentError::Configuration(format!(
                "a train time limit was set but {} is not contractable",
                name
            )));
        }
        if self.config.single_parameter_id.is_some()
            && !probe.has_capability(Capability::ParameterSplittable)
        {
            return Err(ExperimentError::Configuration(format!(
                "a parameter id was set but {} has no parameter grid",
                name
            )));
        }
        if self.config.early_classification && !probe.has_capability(Capability::EarlyDecision) {
            return Err(ExperimentError::Configuration(format!(
                "early classification requested but {} cannot decide early",
                name
            )));
        }
        if self.config.checkpointing && !probe.has_capability(Capability::Checkpointable) {
            log::warn!("{} is not checkpointable; checkpointing is ignored", name);
        }
        Ok(())
    }

    /// Run every unit, loading the dataset from `data_path`.
    pub fn run(&self) -> Result<Vec<UnitReport>, ExperimentError> {
        self.preflight()?;
        Ok(self.execute(None))
    }

    /// Run every unit on an already loaded split.
    pub fn run_with_split(&self, split: &DatasetSplit) -> Result<Vec<UnitReport>, ExperimentError> {
        self.preflight()?;
        Ok(self.execute(Some(split)))
    }

    /// Run every unit after pre-flight has passed. Unit failures are
    /// recorded in the reports, never returned.
    pub(crate) fn execute(&self, provided: Option<&DatasetSplit>) -> Vec<UnitReport> {
        let limits = self.config.resolved_train_time_limits();
        let benchmark = self.config.benchmark.then(benchmark_time);
        let mut loaded: Option<DatasetSplit> = None;
        let mut reports = Vec::with_capacity(limits.len());

        for (position, &limit) in limits.iter().enumerate() {
            let mut report = UnitReport::new(&self.config, limit);
            let paths = ResultPaths::new(&self.config, &report.results_name);

            if self.results_exist(&paths) {
                log::info!(
                    "Results already exist for {} on {} fold {}, skipping",
                    report.results_name,
                    self.config.dataset_name,
                    self.config.fold
                );
                report.enter(ExperimentState::ResultsExist);
                reports.push(report);
                continue;
            }

            let outcome = self
                .dataset(provided, &mut loaded)
                .map_err(ExperimentError::from)
                .and_then(|split| {
                    self.run_unit(split, limit, &limits[..position], &paths, benchmark, &mut report)
                });
            match outcome {
                Ok(outcome) => report.outcome = outcome,
                Err(e) => {
                    log::error!("Experiment failed: {:#}\nConfiguration: {:?}", e, self.config);
                    report.enter(ExperimentState::Error);
                    report.outcome = UnitOutcome::Failed(e);
                }
            }
            reports.push(report);
        }
        reports
    }

    fn dataset<'s>(
        &self,
        provided: Option<&'s DatasetSplit>,
        cache: &'s mut Option<DatasetSplit>,
    ) -> Result<&'s DatasetSplit, DataError> {
        if let Some(split) = provided {
            return Ok(split);
        }
        if cache.is_none() {
            *cache = Some(sample_dataset(
                &self.config.data_path,
                &self.config.dataset_name,
                self.config.fold,
            )?);
        }
        cache.as_ref().ok_or(DataError::EmptyDataset)
    }

    /// Skip rule: nothing is recomputed when every file this unit would
    /// write is already valid.
    fn results_exist(&self, paths: &ResultPaths) -> bool {
        let cfg = &self.config;
        if cfg.force_overwrite {
            return false;
        }
        if cfg.single_parameter_id.is_some() {
            return validate_results_file(&paths.train_file);
        }
        let train_valid = || validate_results_file(&paths.train_file);
        let test_valid = || validate_results_file(&paths.test_file);
        match (cfg.estimate_requested(), cfg.train_only) {
            (true, true) => train_valid(),
            (false, true) => false,
            (true, false) => train_valid() && test_valid(),
            (false, false) => test_valid(),
        }
    }

    fn run_unit(
        &self,
        split: &DatasetSplit,
        limit: Option<TimeSpan>,
        smaller_limits: &[Option<TimeSpan>],
        paths: &ResultPaths,
        benchmark: Option<Duration>,
        report: &mut UnitReport,
    ) -> Result<UnitOutcome, ExperimentError> {
        let _lock = FileLock::try_acquire(&paths.lock_file)?;
        // another process may have finished this slot while we waited to start
        if self.results_exist(paths) {
            report.enter(ExperimentState::ResultsExist);
            return Ok(UnitOutcome::Skipped);
        }

        let factory = self.registry.factory(&self.config.classifier_name)?;
        let estimate_needed = self.config.estimate_requested()
            && (self.config.force_overwrite || !validate_results_file(&paths.train_file));

        let mut classifier = factory();
        self.configure(classifier.as_mut(), limit, estimate_needed)?;
        self.configure_checkpointing(classifier.as_mut(), paths, smaller_limits)?;

        report.enter(ExperimentState::Training);
        let train = self.train(classifier.as_mut(), &factory, limit, split, paths, estimate_needed, benchmark)?;

        report.enter(ExperimentState::PostTrainHooks);
        self.post_train(classifier.as_ref(), paths);

        if self.config.train_only || self.config.single_parameter_id.is_some() {
            report.enter(ExperimentState::Done);
            return Ok(UnitOutcome::Completed { train, test: None });
        }

        report.enter(ExperimentState::Testing);
        let test = self.test(classifier.as_ref(), split, paths, &train)?;
        report.enter(ExperimentState::Done);
        Ok(UnitOutcome::Completed {
            train,
            test: Some(test),
        })
    }

    /// Apply seed, threads, log level, parameter index, contract and
    /// self-estimation to a fresh classifier.
    fn configure(
        &self,
        classifier: &mut dyn Classifier,
        limit: Option<TimeSpan>,
        self_estimate: bool,
    ) -> Result<(), ExperimentError> {
        let cfg = &self.config;
        match classifier.as_seedable() {
            Some(s) => s.set_seed(cfg.fold),
            None => log::debug!("{} is not seedable", cfg.classifier_name),
        }
        match classifier.as_multi_threadable() {
            Some(m) => m.set_threads(cfg.resolved_threads()),
            None if cfg.num_threads != 1 => {
                log::info!("{} is single threaded; ignoring thread count", cfg.classifier_name)
            }
            None => {}
        }
        if let Some(l) = classifier.as_loggable() {
            l.set_log_level(cfg.log_level_filter()?);
        }
        if let Some(id) = cfg.single_parameter_id {
            let splittable = classifier.as_parameter_splittable().ok_or_else(|| {
                ExperimentError::Configuration(format!("{} has no parameter grid", cfg.classifier_name))
            })?;
            splittable
                .set_parameters_from_index(id)
                .map_err(|e| ExperimentError::Configuration(format!("{:#}", e)))?;
        }
        if let Some(limit) = limit {
            let contractable = classifier.as_contractable().ok_or_else(|| {
                ExperimentError::Configuration(format!("{} is not contractable", cfg.classifier_name))
            })?;
            contractable.set_train_time_limit(limit.duration());
        }
        if let Some(s) = classifier.as_self_estimating() {
            s.set_estimate_own_performance(self_estimate);
        }
        Ok(())
    }

    fn configure_checkpointing(
        &self,
        classifier: &mut dyn Classifier,
        paths: &ResultPaths,
        smaller_limits: &[Option<TimeSpan>],
    ) -> Result<(), ExperimentError> {
        let cfg = &self.config;
        if !cfg.checkpointing {
            return Ok(());
        }
        if cfg.single_parameter_id.is_some() {
            log::warn!("Checkpointing is disabled while running a single parameter setting");
            return Ok(());
        }
        let Some(checkpointable) = classifier.as_checkpointable() else {
            return Ok(());
        };

        let sources: Vec<CheckpointSource> = smaller_limits
            .iter()
            .rev()
            .map(|&smaller| {
                let p = ResultPaths::new(cfg, &cfg.results_name(smaller));
                CheckpointSource {
                    checkpoint_dir: p.checkpoint_dir,
                    lock_file: p.lock_file,
                }
            })
            .collect();
        copy_forward(&paths.checkpoint_dir, &sources, cfg.remove_checkpoint)?;

        checkpointable
            .set_checkpoint_path(&paths.checkpoint_dir)
            .map_err(|e| ExperimentError::Configuration(format!("{:#}", e)))?;
        if let Some(interval) = cfg.checkpoint_interval {
            checkpointable.set_checkpoint_interval(interval.duration());
        }
        Ok(())
    }

    /// Truncation then normalisation, copying only when either is on.
    fn prepare<'d>(&self, data: &'d TimeSeriesInstances) -> Result<Cow<'d, TimeSeriesInstances>, DataError> {
        let mut prepared = Cow::Borrowed(data);
        if let Some(p) = self.config.truncation {
            prepared = Cow::Owned(prepared.truncated(p)?);
        }
        if self.config.normalise {
            prepared = Cow::Owned(prepared.z_normalised()?);
        }
        Ok(prepared)
    }

    #[allow(clippy::too_many_arguments)]
    fn train(
        &self,
        classifier: &mut dyn Classifier,
        factory: &ClassifierFactory,
        limit: Option<TimeSpan>,
        split: &DatasetSplit,
        paths: &ResultPaths,
        estimate_needed: bool,
        benchmark: Option<Duration>,
    ) -> Result<ClassifierResults, ExperimentError> {
        let cfg = &self.config;
        let train_data = self.prepare(&split.train)?;
        let training_failure = |e: anyhow::Error| ExperimentError::TrainingFailure(format!("{:#}", e));

        let mut external = None;
        if estimate_needed && !classifier.has_capability(Capability::SelfEstimating) {
            let evaluator = cfg.train_estimate_method.evaluator(cfg.fold);
            log::info!("Estimating train performance with {}", evaluator.method_name());
            let build = || -> anyhow::Result<Box<dyn Classifier>> {
                let mut fresh = factory();
                self.configure(fresh.as_mut(), limit, false)?;
                Ok(fresh)
            };
            external = Some(evaluator.evaluate(&build, &train_data).map_err(training_failure)?);
        }

        let watcher = MemoryWatcher::start(MEMORY_SAMPLE_INTERVAL);
        watcher.sample_now();
        let start = Instant::now();
        classifier.build(&train_data).map_err(training_failure)?;
        let build_time = start.elapsed();
        watcher.sample_now();
        let memory = watcher.finish();
        log::info!(
            "Built {} on {} fold {} in {:?}",
            cfg.classifier_name,
            cfg.dataset_name,
            cfg.fold,
            build_time
        );

        let measured = TrainMeasurements {
            build_time,
            memory,
            benchmark_time: benchmark,
        };
        let mut results = finalise_train_results(
            classifier,
            external,
            estimate_needed,
            split.train.num_classes(),
            &measured,
        )?;
        results.set_identity(&cfg.dataset_name, &cfg.results_name(limit), "train", cfg.fold);
        results.description = experiment_description();
        if !results.is_empty() {
            results.finalise()?;
        }
        if estimate_needed {
            self.write_results(&results, &paths.train_file)?;
        }
        Ok(results)
    }

    /// Serialisation and visualisation failures are logged, never fatal.
    fn post_train(&self, classifier: &dyn Classifier, paths: &ResultPaths) {
        let cfg = &self.config;
        if !cfg.serialise_classifier && !cfg.visualise {
            return;
        }
        if let Err(e) = std::fs::create_dir_all(&paths.workspace_dir) {
            log::warn!("Cannot create workspace {}: {}", paths.workspace_dir.display(), e);
            return;
        }
        if cfg.serialise_classifier {
            let outcome = match classifier.as_serializable() {
                Some(s) => s.save(&paths.serialised_file),
                None => Err(anyhow::anyhow!("{} is not serializable", cfg.classifier_name)),
            };
            if let Err(e) = outcome {
                log::warn!("{}", ExperimentError::Serialization(format!("{:#}", e)));
            }
        }
        if cfg.visualise {
            let outcome = match classifier.as_visualisable() {
                Some(v) => v.create_visualisation(&paths.visualisation_dir),
                None => Err(anyhow::anyhow!("{} is not visualisable", cfg.classifier_name)),
            };
            if let Err(e) = outcome {
                log::warn!("{}", ExperimentError::Visualisation(format!("{:#}", e)));
            }
        }
    }

    fn test(
        &self,
        classifier: &dyn Classifier,
        split: &DatasetSplit,
        paths: &ResultPaths,
        train: &ClassifierResults,
    ) -> Result<ClassifierResults, ExperimentError> {
        let cfg = &self.config;
        if !cfg.force_overwrite && validate_results_file(&paths.test_file) {
            log::info!(
                "Test results {} were written by another process, loading them",
                paths.test_file.display()
            );
            return Ok(read_results_file(&paths.test_file)?);
        }

        let testing_failure = |e: anyhow::Error| ExperimentError::TestingFailure(format!("{:#}", e));
        let mut results = if cfg.early_classification {
            evaluate_early(classifier, &split.test, cfg.earliness_step, cfg.normalise)
                .map_err(testing_failure)?
        } else {
            let test_data = self.prepare(&split.test)?;
            let mut results = ClassifierResults::new(split.test.num_classes());
            let total = predict_all(classifier, &test_data, &mut results).map_err(testing_failure)?;
            results.test_time = Some(total);
            results
        };

        results.set_identity(&cfg.dataset_name, &train.classifier_name, "test", cfg.fold);
        results.description = experiment_description();
        results.parameters = train.parameters.clone();
        results.build_time = train.build_time;
        results.benchmark_time = train.benchmark_time;
        results.memory = train.memory;
        results.error_estimate_method = train.error_estimate_method.clone();
        results.error_estimate_time = train.error_estimate_time;
        results.build_plus_estimate_time = train.build_plus_estimate_time;
        if !results.is_empty() {
            results.finalise()?;
        }
        if let Some(acc) = results.accuracy() {
            log::info!(
                "{} on {} fold {}: test accuracy {:.4}",
                train.classifier_name,
                cfg.dataset_name,
                cfg.fold,
                acc
            );
        }
        self.write_results(&results, &paths.test_file)?;
        Ok(results)
    }

    fn write_results(&self, results: &ClassifierResults, path: &std::path::Path) -> Result<(), ExperimentError> {
        if !self.config.force_overwrite && validate_results_file(path) {
            return Err(ExperimentError::ResultsAlreadyExist(path.to_path_buf()));
        }
        results.write_to_file(path, self.config.results_format)?;
        Ok(())
    }
}
