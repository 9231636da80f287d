use std::path::PathBuf;

use clap::{Arg, ArgAction, Command, ValueHint};

/// The `tsml` command line: `run`, `batch`, `classifiers` and `config`.
pub fn build_cli() -> Command {
    Command::new("tsml")
        .version(clap::crate_version!())
        .about("Time series classification experiments: train, estimate, test and record")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("run")
                .about("Run one classifier on one fold of one dataset")
                .arg(
                    Arg::new("classifier")
                        .short('c')
                        .long("classifier")
                        .help("Registered classifier name. Overrides the configuration file.")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .value_hint(ValueHint::Other),
                )
                .arg(
                    Arg::new("dataset")
                        .short('p')
                        .long("dataset")
                        .help("Problem name, read from <data-path>/<dataset>/<dataset>_TRAIN/_TEST")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .value_hint(ValueHint::Other),
                )
                .arg(
                    Arg::new("fold")
                        .short('f')
                        .long("fold")
                        .help("Resample id; 0 is the published split")
                        .value_parser(clap::value_parser!(u64)),
                )
                .args(shared_args()),
        )
        .subcommand(
            Command::new("batch")
                .about("Run every classifier on every dataset and fold in a thread pool")
                .arg(
                    Arg::new("classifiers")
                        .long("classifiers")
                        .help("Comma separated classifier names")
                        .action(ArgAction::Append)
                        .value_parser(clap::builder::NonEmptyStringValueParser::new()),
                )
                .arg(
                    Arg::new("datasets")
                        .long("datasets")
                        .help("Comma separated problem names")
                        .action(ArgAction::Append)
                        .value_parser(clap::builder::NonEmptyStringValueParser::new()),
                )
                .arg(
                    Arg::new("min_fold")
                        .long("min-fold")
                        .help("First fold, inclusive")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    Arg::new("max_fold")
                        .long("max-fold")
                        .help("Last fold, exclusive")
                        .value_parser(clap::value_parser!(u64)),
                )
                .args(shared_args()),
        )
        .subcommand(Command::new("classifiers").about("List registered classifiers and their capabilities"))
        .subcommand(Command::new("config").about("Print the default JSON configuration template"))
}

fn shared_args() -> Vec<Arg> {
    vec![
        Arg::new("config")
            .long("config")
            .help("JSON configuration file; command line flags override its values")
            .value_parser(clap::value_parser!(PathBuf))
            .value_hint(ValueHint::FilePath),
        Arg::new("data_path")
            .short('d')
            .long("data-path")
            .help("Directory holding one sub-directory per problem")
            .value_parser(clap::value_parser!(PathBuf))
            .value_hint(ValueHint::DirPath),
        Arg::new("results_path")
            .short('r')
            .long("results-path")
            .help("Directory results are written under")
            .value_parser(clap::value_parser!(PathBuf))
            .value_hint(ValueHint::DirPath),
        Arg::new("supporting_path")
            .long("supporting-path")
            .help("Directory for checkpoints, serialised models and visualisations")
            .value_parser(clap::value_parser!(PathBuf))
            .value_hint(ValueHint::DirPath),
        Arg::new("force")
            .long("force")
            .help("Recompute results even when valid files exist")
            .action(ArgAction::SetTrue),
        Arg::new("train_estimate")
            .long("train-estimate")
            .help("Write a train estimate, optionally naming the method (cv_10, hov_0.5, sr_30_0.5)")
            .num_args(0..=1)
            .default_missing_value("cv_10")
            .value_hint(ValueHint::Other),
        Arg::new("checkpoint")
            .long("checkpoint")
            .help("Enable checkpointing for classifiers that support it")
            .action(ArgAction::SetTrue),
        Arg::new("checkpoint_interval")
            .long("checkpoint-interval")
            .help("Minimum time between checkpoints, e.g. 10m")
            .value_hint(ValueHint::Other),
        Arg::new("remove_checkpoint")
            .long("remove-checkpoint")
            .help("Delete a checkpoint once it has been copied to the next contract")
            .action(ArgAction::SetTrue),
        Arg::new("train_time_limit")
            .long("train-time-limit")
            .help("Train contract, e.g. 1h; repeat for several contracts")
            .action(ArgAction::Append)
            .value_hint(ValueHint::Other),
        Arg::new("threads")
            .short('t')
            .long("threads")
            .help("Thread count; 0 uses every core, negative leaves one free")
            .value_parser(clap::value_parser!(i32))
            .allow_hyphen_values(true),
        Arg::new("single_parameter_id")
            .long("single-parameter-id")
            .help("Evaluate one parameter setting of the classifier's grid")
            .value_parser(clap::value_parser!(usize)),
        Arg::new("results_format")
            .long("results-format")
            .help("0: predictions, 1: metrics only, 2: compact predictions")
            .value_parser(clap::value_parser!(i32).range(0..=2)),
        Arg::new("train_only")
            .long("train-only")
            .help("Stop after training and the train estimate")
            .action(ArgAction::SetTrue),
        Arg::new("serialise")
            .long("serialise")
            .help("Save the trained classifier to the supporting path")
            .action(ArgAction::SetTrue),
        Arg::new("visualise")
            .long("visualise")
            .help("Write the classifier's visualisation to the supporting path")
            .action(ArgAction::SetTrue),
        Arg::new("early")
            .long("early")
            .help("Test as an early classifier, revealing series prefixes")
            .action(ArgAction::SetTrue),
        Arg::new("earliness_step")
            .long("earliness-step")
            .help("Fraction of the series revealed per early decision step")
            .value_parser(clap::value_parser!(f64)),
        Arg::new("normalise")
            .long("normalise")
            .help("Z-normalise every series before training and testing")
            .action(ArgAction::SetTrue),
        Arg::new("truncate")
            .long("truncate")
            .help("Keep this fraction of every series")
            .value_parser(clap::value_parser!(f64)),
        Arg::new("benchmark")
            .long("benchmark")
            .help("Record a machine benchmark time with the results")
            .action(ArgAction::SetTrue),
        Arg::new("log_level")
            .long("log-level")
            .help("Log level forwarded to classifiers")
            .value_parser(["off", "error", "warn", "info", "debug", "trace"]),
    ]
}

