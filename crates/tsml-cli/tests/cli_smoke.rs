//! CLI binary smoke tests using assert_cmd.
//!
//! These tests exercise the compiled `tsml` binary to verify that
//! argument parsing, help text, error handling and a full run work
//! end-to-end.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

fn cmd() -> Command {
    Command::cargo_bin("tsml").unwrap()
}

fn write_problem(data_dir: &Path) {
    let dir = data_dir.join("Toy");
    fs::create_dir_all(&dir).unwrap();
    let rows = "a,0.0,0.1,0.2,0.3\na,0.1,0.2,0.3,0.4\nb,5.0,5.1,5.2,5.3\nb,5.1,5.2,5.3,5.4\n";
    fs::write(dir.join("Toy_TRAIN.csv"), rows).unwrap();
    fs::write(dir.join("Toy_TEST.csv"), rows).unwrap();
}

// ---------------------------------------------------------------------------
// Top-level
// ---------------------------------------------------------------------------

#[test]
fn no_args_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn help_flag() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("batch"))
        .stdout(predicate::str::contains("classifiers"));
}

#[test]
fn version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn unknown_subcommand_fails() {
    cmd().arg("bogus").assert().failure();
}

// ---------------------------------------------------------------------------
// classifiers / config
// ---------------------------------------------------------------------------

#[test]
fn classifiers_lists_registry() {
    cmd()
        .arg("classifiers")
        .assert()
        .success()
        .stdout(predicate::str::contains("MajorityClass"))
        .stdout(predicate::str::contains("1NN"))
        .stdout(predicate::str::contains("EarlyDecision"));
}

#[test]
fn config_prints_json_template() {
    let output = cmd().arg("config").output().unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["fold"], 0);
    assert_eq!(json["train_estimate_method"], "cv_10");
    assert_eq!(json["num_threads"], 1);
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

#[test]
fn run_help_lists_flags() {
    cmd()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--train-time-limit"))
        .stdout(predicate::str::contains("--train-estimate"));
}

#[test]
fn run_without_required_fields_exits_nonzero() {
    cmd()
        .args(["run", "--classifier", "1NN"])
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty());
}

#[test]
fn run_with_unknown_classifier_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    write_problem(dir.path());
    cmd()
        .args(["run", "--classifier", "Nope", "--dataset", "Toy", "--fold", "0"])
        .arg("--data-path")
        .arg(dir.path())
        .arg("--results-path")
        .arg(dir.path().join("results"))
        .assert()
        .code(1);
    assert!(!dir.path().join("results").exists());
}

#[test]
fn run_writes_results_and_then_skips() {
    let dir = tempfile::tempdir().unwrap();
    write_problem(dir.path());
    let results = dir.path().join("results");
    let run = || {
        let mut c = cmd();
        c.args(["run", "-c", "1NN", "-p", "Toy", "-f", "0", "--train-estimate"])
            .arg("-d")
            .arg(dir.path())
            .arg("-r")
            .arg(&results);
        c
    };

    run()
        .assert()
        .success()
        .stdout(predicate::str::contains("completed, test accuracy 1.0000"));
    let predictions = results.join("1NN").join("Predictions").join("Toy");
    assert!(predictions.join("testFold0.csv").is_file());
    assert!(predictions.join("trainFold0.csv").is_file());

    run()
        .assert()
        .success()
        .stdout(predicate::str::contains("skipped"));
}

#[test]
fn config_file_supplies_fields() {
    let dir = tempfile::tempdir().unwrap();
    write_problem(dir.path());
    let config = serde_json::json!({
        "data_path": dir.path(),
        "results_path": dir.path().join("out"),
        "classifier_name": "MajorityClass",
        "dataset_name": "Toy",
        "results_format": 1
    });
    let config_path = dir.path().join("experiment.json");
    fs::write(&config_path, config.to_string()).unwrap();

    cmd()
        .args(["run", "--config"])
        .arg(&config_path)
        .assert()
        .success();
    let test_file = dir.path().join("out/MajorityClass/Predictions/Toy/testFold0.csv");
    let text = fs::read_to_string(test_file).unwrap();
    assert!(text.contains("accuracy,"));
}

// ---------------------------------------------------------------------------
// batch
// ---------------------------------------------------------------------------

#[test]
fn batch_reports_failures_and_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    write_problem(dir.path());
    cmd()
        .args(["batch", "--classifiers", "MajorityClass,1NN", "--datasets", "Toy,Absent"])
        .args(["--min-fold", "0", "--max-fold", "2", "--threads", "2"])
        .arg("--data-path")
        .arg(dir.path())
        .arg("--results-path")
        .arg(dir.path().join("results"))
        .assert()
        .success()
        .stdout(predicate::str::contains("4 completed, 0 skipped, 4 failed"));
}

#[test]
fn batch_with_bad_fold_range_fails() {
    let dir = tempfile::tempdir().unwrap();
    cmd()
        .args(["batch", "--classifiers", "1NN", "--datasets", "Toy"])
        .args(["--min-fold", "3", "--max-fold", "3"])
        .arg("--data-path")
        .arg(dir.path())
        .arg("--results-path")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("--max-fold"));
}
