use anyhow::{Context, Result};

use tsml_experiments::experiment::{BatchReport, BatchRunner, UnitOutcome, UnitReport};
use tsml_experiments::{ClassifierRegistry, Experiment, ExperimentConfig};

use crate::experiment::input::BatchSelection;

/// Run one experiment invocation. Pre-flight errors are returned; unit
/// failures are reported in the returned list.
pub fn run_experiment(config: ExperimentConfig, registry: &ClassifierRegistry) -> Result<Vec<UnitReport>> {
    let label = format!(
        "{} on {} fold {}",
        config.classifier_name, config.dataset_name, config.fold
    );
    log::info!("[tsml] Running {}", label);
    Experiment::new(config, registry)
        .run()
        .with_context(|| format!("Experiment {} could not start", label))
}

pub fn run_batch(
    template: ExperimentConfig,
    selection: BatchSelection,
    registry: &ClassifierRegistry,
) -> Result<BatchReport> {
    let threads = template.resolved_threads();
    let runner = BatchRunner::new(template, selection.classifiers, selection.datasets, selection.folds)
        .threads(threads);
    runner.run(registry).context("Batch could not start")
}

/// One line per unit, then the totals.
pub fn summarise(units: &[UnitReport]) -> String {
    let mut out = String::new();
    let (mut completed, mut skipped, mut failed) = (0, 0, 0);
    for unit in units {
        let status = match &unit.outcome {
            UnitOutcome::Skipped => {
                skipped += 1;
                "skipped (results exist)".to_string()
            }
            UnitOutcome::Completed { test, .. } => {
                completed += 1;
                match test.as_ref().and_then(|t| t.accuracy()) {
                    Some(acc) => format!("completed, test accuracy {:.4}", acc),
                    None => "completed".to_string(),
                }
            }
            UnitOutcome::Failed(e) => {
                failed += 1;
                format!("FAILED: {}", e)
            }
        };
        out.push_str(&format!(
            "{}\t{}\tfold {}\t{}\n",
            unit.results_name, unit.dataset, unit.fold, status
        ));
    }
    out.push_str(&format!(
        "{} completed, {} skipped, {} failed\n",
        completed, skipped, failed
    ));
    out
}

/// Registry names with their declared capabilities, one per line.
pub fn describe_registry(registry: &ClassifierRegistry) -> Result<String> {
    let mut out = String::new();
    for name in registry.names() {
        let classifier = registry.create(name)?;
        let capabilities: Vec<String> = classifier
            .capabilities()
            .iter()
            .map(|c| format!("{:?}", c))
            .collect();
        out.push_str(&format!("{}\t{}\n", name, capabilities.join(",")));
    }
    Ok(out)
}
