use anyhow::Result;
use clap::ArgMatches;
use log::LevelFilter;

use tsml_cli::cli::build_cli;
use tsml_cli::experiment::input::{config_from_arguments, default_config_template, BatchSelection};
use tsml_cli::experiment::runner::{describe_registry, run_batch, run_experiment, summarise};
use tsml_experiments::ClassifierRegistry;

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("TSML_LOG", "error,tsml=info"))
        .init();

    let matches = build_cli().get_matches();

    let registry = ClassifierRegistry::with_defaults();
    match matches.subcommand() {
        Some(("run", sub_m)) => handle_run(sub_m, &registry),
        Some(("batch", sub_m)) => handle_batch(sub_m, &registry),
        Some(("classifiers", _)) => {
            print!("{}", describe_registry(&registry)?);
            Ok(())
        }
        Some(("config", _)) => {
            println!("{}", default_config_template()?);
            Ok(())
        }
        _ => unreachable!("Subcommand is required by CLI configuration"),
    }
}

fn handle_run(matches: &ArgMatches, registry: &ClassifierRegistry) -> Result<()> {
    let config = config_from_arguments(matches)?;
    match run_experiment(config, registry) {
        Ok(units) => {
            print!("{}", summarise(&units));
            Ok(())
        }
        Err(e) => {
            log::error!("Experiment failed: {:#}", e);
            std::process::exit(1)
        }
    }
}

fn handle_batch(matches: &ArgMatches, registry: &ClassifierRegistry) -> Result<()> {
    let template = config_from_arguments(matches)?;
    let selection = BatchSelection::from_arguments(matches, &template)?;
    match run_batch(template, selection, registry) {
        Ok(report) => {
            print!("{}", summarise(&report.units));
            Ok(())
        }
        Err(e) => {
            log::error!("Batch failed: {:#}", e);
            std::process::exit(1)
        }
    }
}
