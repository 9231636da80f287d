//! End-to-end tests of the experiment controller on small generated
//! problems written to a temporary directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tsml_experiments::error::ExperimentError;
use tsml_experiments::experiment::{ExperimentState, ResultPaths, TimeSpan, UnitOutcome, UnitReport};
use tsml_experiments::models::{Classifier, MajorityClass};
use tsml_experiments::results::{read_results_file, validate_results_file};
use tsml_experiments::{ClassifierRegistry, Experiment, ExperimentConfig, TimeSeriesInstance, TimeSeriesInstances};

const PROBLEM: &str = "Blobs";

/// Two well separated classes. Train is 6/4 so the majority class is 0;
/// test is balanced 5/5.
fn write_problem(data_dir: &Path) {
    let dir = data_dir.join(PROBLEM);
    fs::create_dir_all(&dir).unwrap();
    let row = |label: &str, offset: f64, i: usize| {
        let values: Vec<String> = (0..12).map(|t| format!("{:.2}", offset + (t + i) as f64 * 0.01)).collect();
        format!("{}\t{}\n", label, values.join("\t"))
    };
    let mut train = String::new();
    for i in 0..6 {
        train.push_str(&row("a", 0.0, i));
    }
    for i in 0..4 {
        train.push_str(&row("b", 5.0, i));
    }
    let mut test = String::new();
    for i in 0..5 {
        test.push_str(&row("a", 0.0, i));
        test.push_str(&row("b", 5.0, i));
    }
    fs::write(dir.join(format!("{}_TRAIN.tsv", PROBLEM)), train).unwrap();
    fs::write(dir.join(format!("{}_TEST.tsv", PROBLEM)), test).unwrap();
}

struct Setup {
    _dir: tempfile::TempDir,
    data: PathBuf,
    results: PathBuf,
}

fn setup() -> Setup {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    let results = dir.path().join("results");
    write_problem(&data);
    Setup {
        _dir: dir,
        data,
        results,
    }
}

fn config(s: &Setup, classifier: &str) -> ExperimentConfig {
    ExperimentConfig::new(&s.data, &s.results, classifier, PROBLEM, 0)
}

fn paths(config: &ExperimentConfig, name: &str) -> ResultPaths {
    ResultPaths::new(config, name)
}

fn only(mut reports: Vec<UnitReport>) -> UnitReport {
    assert_eq!(reports.len(), 1);
    reports.remove(0)
}

fn completed(report: &UnitReport) -> (&tsml_experiments::ClassifierResults, Option<&tsml_experiments::ClassifierResults>) {
    match &report.outcome {
        UnitOutcome::Completed { train, test } => (train, test.as_ref()),
        other => panic!("unit did not complete: {:?}", other),
    }
}

/// Majority class that counts how often it is built.
struct CountingMajority {
    inner: MajorityClass,
    builds: Arc<AtomicUsize>,
}

impl Classifier for CountingMajority {
    fn name(&self) -> &str {
        "Counting"
    }

    fn build(&mut self, data: &TimeSeriesInstances) -> anyhow::Result<()> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        self.inner.build(data)
    }

    fn distribution(&self, inst: &TimeSeriesInstance) -> anyhow::Result<Vec<f64>> {
        self.inner.distribution(inst)
    }
}

fn counting_registry() -> (ClassifierRegistry, Arc<AtomicUsize>) {
    let builds = Arc::new(AtomicUsize::new(0));
    let mut registry = ClassifierRegistry::new();
    let counter = builds.clone();
    registry.register("Counting", move || {
        Box::new(CountingMajority {
            inner: MajorityClass::new(),
            builds: counter.clone(),
        })
    });
    (registry, builds)
}

// ---------------------------------------------------------------------------
// Basic runs
// ---------------------------------------------------------------------------

#[test]
fn majority_class_scores_half_on_balanced_test() {
    let s = setup();
    let registry = ClassifierRegistry::with_defaults();
    let cfg = config(&s, "MajorityClass");
    let report = only(Experiment::new(cfg.clone(), &registry).run().unwrap());

    assert_eq!(
        report.states,
        vec![
            ExperimentState::Init,
            ExperimentState::Training,
            ExperimentState::PostTrainHooks,
            ExperimentState::Testing,
            ExperimentState::Done
        ]
    );
    let (_, test) = completed(&report);
    let test = test.unwrap();
    assert_eq!(test.len(), 10);
    assert!((test.accuracy().unwrap() - 0.5).abs() < 1e-12);
    assert_eq!(test.parameters, "majorityClass,0");

    let p = paths(&cfg, "MajorityClass");
    assert!(validate_results_file(&p.test_file));
    assert!(!p.train_file.exists());
    assert!(!p.lock_file.exists(), "lock must be released");
}

#[test]
fn nearest_neighbour_separates_blobs() {
    let s = setup();
    let registry = ClassifierRegistry::with_defaults();
    let report = only(Experiment::new(config(&s, "1NN"), &registry).run().unwrap());
    let (_, test) = completed(&report);
    assert_eq!(test.unwrap().accuracy(), Some(1.0));
}

#[test]
fn resampled_fold_keeps_split_sizes() {
    let s = setup();
    let registry = ClassifierRegistry::with_defaults();
    let mut cfg = config(&s, "1NN");
    cfg.fold = 3;
    let report = only(Experiment::new(cfg.clone(), &registry).run().unwrap());
    let (_, test) = completed(&report);
    assert_eq!(test.unwrap().len(), 10);
    assert_eq!(test.unwrap().fold, 3);
    assert!(paths(&cfg, "1NN").test_file.ends_with("testFold3.csv"));
}

#[test]
fn missing_dataset_fails_the_unit_not_the_run() {
    let s = setup();
    let registry = ClassifierRegistry::with_defaults();
    let mut cfg = config(&s, "MajorityClass");
    cfg.dataset_name = "Nowhere".to_string();
    let report = only(Experiment::new(cfg, &registry).run().unwrap());
    assert!(report.is_failed());
    assert_eq!(report.final_state(), ExperimentState::Error);
    match report.outcome {
        UnitOutcome::Failed(ExperimentError::Data(_)) => {}
        other => panic!("expected a data error, got {:?}", other),
    }
}

// ---------------------------------------------------------------------------
// Idempotence and locking
// ---------------------------------------------------------------------------

#[test]
fn existing_results_are_not_recomputed() {
    let s = setup();
    let (registry, builds) = counting_registry();
    let cfg = config(&s, "Counting");

    Experiment::new(cfg.clone(), &registry).run().unwrap();
    assert_eq!(builds.load(Ordering::SeqCst), 1);

    let report = only(Experiment::new(cfg, &registry).run().unwrap());
    assert!(report.is_skipped());
    assert_eq!(report.states, vec![ExperimentState::Init, ExperimentState::ResultsExist]);
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}

#[test]
fn force_overwrite_recomputes() {
    let s = setup();
    let (registry, builds) = counting_registry();
    let mut cfg = config(&s, "Counting");
    Experiment::new(cfg.clone(), &registry).run().unwrap();

    cfg.force_overwrite = true;
    let report = only(Experiment::new(cfg, &registry).run().unwrap());
    assert!(!report.is_skipped());
    assert_eq!(builds.load(Ordering::SeqCst), 2);
}

#[test]
fn partial_results_file_is_recomputed() {
    let s = setup();
    let (registry, builds) = counting_registry();
    let cfg = config(&s, "Counting");
    let p = paths(&cfg, "Counting");
    fs::create_dir_all(&p.predictions_dir).unwrap();
    fs::write(&p.test_file, "Blobs,Counting,test\n").unwrap();

    let report = only(Experiment::new(cfg, &registry).run().unwrap());
    assert!(!report.is_skipped());
    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert!(validate_results_file(&p.test_file));
}

#[test]
fn held_lock_fails_the_unit() {
    let s = setup();
    let (registry, builds) = counting_registry();
    let cfg = config(&s, "Counting");
    let p = paths(&cfg, "Counting");
    fs::create_dir_all(&p.predictions_dir).unwrap();
    fs::write(&p.lock_file, "pid,1\nhost,elsewhere\n").unwrap();

    let report = only(Experiment::new(cfg, &registry).run().unwrap());
    match &report.outcome {
        UnitOutcome::Failed(ExperimentError::LockContention(path)) => assert_eq!(path, &p.lock_file),
        other => panic!("expected lock contention, got {:?}", other),
    }
    assert_eq!(builds.load(Ordering::SeqCst), 0);
    assert!(p.lock_file.exists(), "a lock we do not own is left alone");
    assert!(!p.test_file.exists());
}

#[test]
fn test_file_written_elsewhere_is_loaded() {
    let s = setup();
    let registry = ClassifierRegistry::with_defaults();
    let mut cfg = config(&s, "1NN");
    Experiment::new(cfg.clone(), &registry).run().unwrap();

    let p = paths(&cfg, "1NN");
    let header = "Blobs,1NN,test,0,NANOSECONDS,written elsewhere".to_string();
    let text = fs::read_to_string(&p.test_file).unwrap();
    let mut lines: Vec<&str> = text.lines().collect();
    lines[0] = &header;
    fs::write(&p.test_file, lines.join("\n") + "\n").unwrap();

    // asking for a train estimate means the unit is no longer complete
    cfg.generate_train_estimate = true;
    let report = only(Experiment::new(cfg, &registry).run().unwrap());
    let (train, test) = completed(&report);
    assert_eq!(train.error_estimate_method, "LOOCV");
    assert_eq!(test.unwrap().description, "written elsewhere");
    assert!(validate_results_file(&p.train_file));
    assert!(fs::read_to_string(&p.test_file).unwrap().contains("written elsewhere"));
}

// ---------------------------------------------------------------------------
// Pre-flight
// ---------------------------------------------------------------------------

#[test]
fn contract_on_uncontractable_classifier_is_rejected_before_training() {
    let s = setup();
    let (registry, builds) = counting_registry();
    let mut cfg = config(&s, "Counting");
    cfg.train_time_limits = vec!["1h".parse().unwrap()];

    let err = Experiment::new(cfg, &registry).run().unwrap_err();
    assert!(matches!(err, ExperimentError::Configuration(_)));
    assert!(err.is_preflight());
    assert_eq!(builds.load(Ordering::SeqCst), 0);
    assert!(!s.results.exists());
}

#[test]
fn zero_contract_means_unconstrained() {
    let s = setup();
    let (registry, builds) = counting_registry();
    let mut cfg = config(&s, "Counting");
    cfg.train_time_limits = vec![TimeSpan::new(std::time::Duration::ZERO)];

    let report = only(Experiment::new(cfg.clone(), &registry).run().unwrap());
    assert_eq!(report.results_name, "Counting");
    assert_eq!(report.train_time_limit, None);
    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert!(validate_results_file(paths(&cfg, "Counting").test_file));
}

#[test]
fn unknown_classifier_is_rejected() {
    let s = setup();
    let registry = ClassifierRegistry::with_defaults();
    let err = Experiment::new(config(&s, "NoSuchThing"), &registry).run().unwrap_err();
    assert!(matches!(err, ExperimentError::UnknownClassifier(_)));
}

#[test]
fn parameter_id_needs_a_parameter_grid() {
    let s = setup();
    let registry = ClassifierRegistry::with_defaults();
    let mut cfg = config(&s, "MajorityClass");
    cfg.single_parameter_id = Some(1);
    let err = Experiment::new(cfg, &registry).run().unwrap_err();
    assert!(matches!(err, ExperimentError::Configuration(_)));
}

#[test]
fn early_mode_needs_an_early_classifier() {
    let s = setup();
    let registry = ClassifierRegistry::with_defaults();
    let mut cfg = config(&s, "1NN");
    cfg.early_classification = true;
    let err = Experiment::new(cfg, &registry).run().unwrap_err();
    assert!(err.is_preflight());
}

// ---------------------------------------------------------------------------
// Contracts, parameter search and optional behaviours
// ---------------------------------------------------------------------------

#[test]
fn each_contract_gets_its_own_results() {
    let s = setup();
    let registry = ClassifierRegistry::with_defaults();
    let mut cfg = config(&s, "1NN");
    cfg.train_time_limits = vec!["2s".parse().unwrap(), "1s".parse().unwrap(), "1s".parse().unwrap()];

    let reports = Experiment::new(cfg.clone(), &registry).run().unwrap();
    let names: Vec<&str> = reports.iter().map(|r| r.results_name.as_str()).collect();
    assert_eq!(names, vec!["1NN_1s", "1NN_2s"]);
    for report in &reports {
        let (_, test) = completed(report);
        assert_eq!(test.unwrap().classifier_name, report.results_name);
        assert!(validate_results_file(paths(&cfg, &report.results_name).test_file));
    }
}

#[test]
fn single_parameter_mode_writes_only_the_parameter_file() {
    let s = setup();
    let registry = ClassifierRegistry::with_defaults();
    let mut cfg = config(&s, "1NN");
    cfg.single_parameter_id = Some(2);

    let report = only(Experiment::new(cfg.clone(), &registry).run().unwrap());
    let (train, test) = completed(&report);
    assert!(test.is_none());
    assert!(train.parameters.starts_with("k,5,"));

    let p = paths(&cfg, "1NN");
    assert!(p.train_file.ends_with("fold0_2.csv"));
    assert!(validate_results_file(&p.train_file));
    assert!(!p.test_file.exists());

    let again = only(Experiment::new(cfg, &registry).run().unwrap());
    assert!(again.is_skipped());
}

#[test]
fn external_train_estimate_for_non_self_estimating_classifier() {
    let s = setup();
    let registry = ClassifierRegistry::with_defaults();
    let mut cfg = config(&s, "MajorityClass");
    cfg.generate_train_estimate = true;
    cfg.train_estimate_method = "cv_5".parse().unwrap();

    let report = only(Experiment::new(cfg.clone(), &registry).run().unwrap());
    let (train, _) = completed(&report);
    assert_eq!(train.len(), 10);
    assert_eq!(train.error_estimate_method, "cv_5");
    assert!(train.build_plus_estimate_time >= train.build_time);

    let written = read_results_file(paths(&cfg, "MajorityClass").train_file).unwrap();
    assert_eq!(written.split, "train");
    assert_eq!(written.len(), 10);

    // the test file reports the training estimate cost too
    let tested = read_results_file(paths(&cfg, "MajorityClass").test_file).unwrap();
    assert_eq!(tested.split, "test");
    assert_eq!(tested.error_estimate_method, "cv_5");
    assert_eq!(tested.error_estimate_time, written.error_estimate_time);
    assert_eq!(tested.build_plus_estimate_time, written.build_plus_estimate_time);
    assert!(tested.error_estimate_time.is_some());
    assert!(tested.build_plus_estimate_time.is_some());
}

#[test]
fn train_only_skips_testing() {
    let s = setup();
    let registry = ClassifierRegistry::with_defaults();
    let mut cfg = config(&s, "1NN");
    cfg.train_only = true;
    cfg.generate_train_estimate = true;

    let report = only(Experiment::new(cfg.clone(), &registry).run().unwrap());
    assert!(!report.states.contains(&ExperimentState::Testing));
    let p = paths(&cfg, "1NN");
    assert!(validate_results_file(&p.train_file));
    assert!(!p.test_file.exists());
}

#[test]
fn early_classification_records_earliness() {
    let s = setup();
    let registry = ClassifierRegistry::with_defaults();
    let mut cfg = config(&s, "EarlyKNN");
    cfg.early_classification = true;
    cfg.earliness_step = 0.25;

    let report = only(Experiment::new(cfg, &registry).run().unwrap());
    let (_, test) = completed(&report);
    let test = test.unwrap();
    assert_eq!(test.len(), 10);
    for prediction in test.predictions() {
        let earliness: f64 = prediction.extra_info.parse().unwrap();
        assert!(earliness > 0.0 && earliness <= 1.0);
    }
}

#[test]
fn checkpointing_and_serialisation_use_the_workspace() {
    let s = setup();
    let registry = ClassifierRegistry::with_defaults();
    let mut cfg = config(&s, "1NN");
    cfg.checkpointing = true;
    cfg.serialise_classifier = true;
    // 1NN cannot visualise; that is logged and the unit still completes
    cfg.visualise = true;

    let report = only(Experiment::new(cfg.clone(), &registry).run().unwrap());
    completed(&report);
    let p = paths(&cfg, "1NN");
    assert!(p.checkpoint_dir.join("knn_checkpoint.json").is_file());
    assert!(p.serialised_file.is_file());
    assert!(!p.visualisation_dir.exists());
}

#[test]
fn normalised_and_truncated_runs_complete() {
    let s = setup();
    let registry = ClassifierRegistry::with_defaults();
    let mut cfg = config(&s, "1NN");
    cfg.normalise = true;
    cfg.truncation = Some(0.5);
    let report = only(Experiment::new(cfg, &registry).run().unwrap());
    let (_, test) = completed(&report);
    assert_eq!(test.unwrap().len(), 10);
}
