//! Integration tests for running many experiments at once.

use std::fs;
use std::path::Path;

use tsml_experiments::error::ExperimentError;
use tsml_experiments::experiment::{BatchRunner, UnitOutcome};
use tsml_experiments::models::Classifier;
use tsml_experiments::{ClassifierRegistry, ExperimentConfig, TimeSeriesInstance, TimeSeriesInstances};

/// Third-party style classifier that panics instead of returning an error.
struct Explodes;

impl Classifier for Explodes {
    fn name(&self) -> &str {
        "Explodes"
    }

    fn build(&mut self, _data: &TimeSeriesInstances) -> anyhow::Result<()> {
        panic!("index out of bounds in build");
    }

    fn distribution(&self, _inst: &TimeSeriesInstance) -> anyhow::Result<Vec<f64>> {
        Ok(vec![1.0, 0.0])
    }
}

fn write_problem(data_dir: &Path, name: &str) {
    let dir = data_dir.join(name);
    fs::create_dir_all(&dir).unwrap();
    let mut rows = String::new();
    for i in 0..6 {
        let label = if i < 3 { "0" } else { "1" };
        let offset = if i < 3 { 0.0 } else { 3.0 };
        rows.push_str(&format!("{},{},{},{}\n", label, offset + i as f64, offset, offset - 1.0));
    }
    fs::write(dir.join(format!("{}_TRAIN.csv", name)), &rows).unwrap();
    fs::write(dir.join(format!("{}_TEST.csv", name)), &rows).unwrap();
}

#[test]
fn batch_collects_unit_failures_and_keeps_going() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    write_problem(&data, "First");
    write_problem(&data, "Second");

    let template = ExperimentConfig::new(&data, dir.path().join("results"), "", "", 0);
    let runner = BatchRunner::new(
        template,
        vec!["MajorityClass".into(), "1NN".into()],
        vec!["First".into(), "Missing".into(), "Second".into()],
        0..2,
    )
    .threads(2);

    let registry = ClassifierRegistry::with_defaults();
    let report = runner.run(&registry).unwrap();
    assert_eq!(report.units.len(), 12);
    assert_eq!(report.failed(), 4);
    assert_eq!(report.completed(), 8);
    assert!(report.failures().all(|u| u.dataset == "Missing"));
    assert!(!report.all_successful());

    let again = runner.run(&registry).unwrap();
    assert_eq!(again.skipped(), 8);
    assert_eq!(again.failed(), 4);
}

#[test]
fn panicking_classifier_fails_only_its_own_unit() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    let results = dir.path().join("results");
    write_problem(&data, "First");

    let mut registry = ClassifierRegistry::with_defaults();
    registry.register("Explodes", || Box::new(Explodes));
    let template = ExperimentConfig::new(&data, &results, "", "", 0);
    let runner = BatchRunner::new(
        template,
        vec!["Explodes".into(), "MajorityClass".into()],
        vec!["First".into()],
        0..1,
    )
    .threads(2);

    let report = runner.run(&registry).unwrap();
    assert_eq!(report.units.len(), 2);
    assert_eq!(report.completed(), 1);
    let failed: Vec<_> = report.failures().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].results_name, "Explodes");
    match &failed[0].outcome {
        UnitOutcome::Failed(ExperimentError::TrainingFailure(msg)) => {
            assert!(msg.contains("index out of bounds in build"), "{}", msg)
        }
        other => panic!("expected a training failure, got {:?}", other),
    }
    // the slot lock was dropped while unwinding
    assert!(!results.join("Explodes/Predictions/First/fold0.lock").exists());
}
