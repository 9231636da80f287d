use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::ArgMatches;

use tsml_experiments::evaluation::EvaluationMethod;
use tsml_experiments::experiment::TimeSpan;
use tsml_experiments::results::ResultsFormat;
use tsml_experiments::ExperimentConfig;

/// Load an experiment configuration from a JSON file. Missing fields take
/// their defaults.
pub fn load_experiment_config<P: AsRef<Path>>(path: P) -> Result<ExperimentConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    let config: ExperimentConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;
    Ok(config)
}

/// Pretty JSON of the default configuration, used as a starting template.
pub fn default_config_template() -> Result<String> {
    serde_json::to_string_pretty(&ExperimentConfig::default())
        .context("Failed to serialise the default configuration")
}

/// Configuration from an optional `--config` file with command line
/// overrides applied on top.
pub fn config_from_arguments(matches: &ArgMatches) -> Result<ExperimentConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => {
            log::info!("[tsml] Loading configuration from {:?}", path);
            load_experiment_config(path)?
        }
        None => ExperimentConfig::default(),
    };

    if let Some(p) = matches.get_one::<PathBuf>("data_path") {
        config.data_path = p.clone();
    }
    if let Some(p) = matches.get_one::<PathBuf>("results_path") {
        config.results_path = p.clone();
    }
    if let Some(p) = matches.get_one::<PathBuf>("supporting_path") {
        config.supporting_path = Some(p.clone());
    }
    if let Some(name) = try_string(matches, "classifier") {
        config.classifier_name = name;
    }
    if let Some(name) = try_string(matches, "dataset") {
        config.dataset_name = name;
    }
    if let Some(fold) = try_one::<u64>(matches, "fold") {
        config.fold = fold;
    }

    if flag(matches, "force") {
        config.force_overwrite = true;
    }
    if let Some(method) = matches.get_one::<String>("train_estimate") {
        config.generate_train_estimate = true;
        config.train_estimate_method = method
            .parse::<EvaluationMethod>()
            .with_context(|| format!("Invalid --train-estimate value '{}'", method))?;
    }
    if flag(matches, "checkpoint") {
        config.checkpointing = true;
    }
    if let Some(interval) = matches.get_one::<String>("checkpoint_interval") {
        config.checkpoint_interval = Some(parse_time_span(interval)?);
    }
    if flag(matches, "remove_checkpoint") {
        config.remove_checkpoint = true;
    }
    if let Some(limits) = matches.get_many::<String>("train_time_limit") {
        config.train_time_limits = limits.map(|l| parse_time_span(l)).collect::<Result<_>>()?;
    }
    if let Some(&threads) = matches.get_one::<i32>("threads") {
        config.num_threads = threads;
    }
    if let Some(&id) = matches.get_one::<usize>("single_parameter_id") {
        config.single_parameter_id = Some(id);
    }
    if let Some(&format) = matches.get_one::<i32>("results_format") {
        config.results_format = ResultsFormat::from(format);
    }
    if flag(matches, "train_only") {
        config.train_only = true;
    }
    if flag(matches, "serialise") {
        config.serialise_classifier = true;
    }
    if flag(matches, "visualise") {
        config.visualise = true;
    }
    if flag(matches, "early") {
        config.early_classification = true;
    }
    if let Some(&step) = matches.get_one::<f64>("earliness_step") {
        config.earliness_step = step;
    }
    if flag(matches, "normalise") {
        config.normalise = true;
    }
    if let Some(&proportion) = matches.get_one::<f64>("truncate") {
        config.truncation = Some(proportion);
    }
    if flag(matches, "benchmark") {
        config.benchmark = true;
    }
    if let Some(level) = matches.get_one::<String>("log_level") {
        config.log_level = level.clone();
    }

    Ok(config)
}

/// Classifiers, datasets and fold range for `tsml batch`.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSelection {
    pub classifiers: Vec<String>,
    pub datasets: Vec<String>,
    pub folds: Range<u64>,
}

impl BatchSelection {
    pub fn from_arguments(matches: &ArgMatches, config: &ExperimentConfig) -> Result<Self> {
        let list = |id: &str, fallback: &str| -> Vec<String> {
            match matches.get_many::<String>(id) {
                Some(values) => values
                    .flat_map(|v| v.split(','))
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(String::from)
                    .collect(),
                None if fallback.is_empty() => Vec::new(),
                None => vec![fallback.to_string()],
            }
        };
        let classifiers = list("classifiers", &config.classifier_name);
        let datasets = list("datasets", &config.dataset_name);
        if classifiers.is_empty() {
            bail!("No classifiers given; use --classifiers");
        }
        if datasets.is_empty() {
            bail!("No datasets given; use --datasets");
        }

        let min_fold = matches.get_one::<u64>("min_fold").copied().unwrap_or(config.fold);
        let max_fold = matches.get_one::<u64>("max_fold").copied().unwrap_or(min_fold + 1);
        if max_fold <= min_fold {
            bail!("--max-fold ({}) must be greater than --min-fold ({})", max_fold, min_fold);
        }
        Ok(Self {
            classifiers,
            datasets,
            folds: min_fold..max_fold,
        })
    }
}

fn parse_time_span(value: &str) -> Result<TimeSpan> {
    value
        .parse::<TimeSpan>()
        .with_context(|| format!("Invalid time span '{}'", value))
}

// `run` and `batch` share most arguments but not all; unknown ids read as absent.
fn try_one<T: Clone + Send + Sync + 'static>(matches: &ArgMatches, id: &str) -> Option<T> {
    matches.try_get_one::<T>(id).ok().flatten().cloned()
}

fn try_string(matches: &ArgMatches, id: &str) -> Option<String> {
    try_one::<String>(matches, id).filter(|s| !s.trim().is_empty())
}

fn flag(matches: &ArgMatches, id: &str) -> bool {
    matches.try_get_one::<bool>(id).ok().flatten().copied().unwrap_or(false)
}
