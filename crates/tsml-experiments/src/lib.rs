//! Experiment harness for time series classification.
//!
//! The crate is organised around one unit of work: train a named
//! classifier on one resample (fold) of one dataset, optionally estimate its
//! train-set performance, predict the test split and write the results in
//! the tsml results file format. Units are idempotent, guarded by a lock
//! file, and can be run in bulk through [`experiment::batch::BatchRunner`].

pub mod data;
pub mod error;
pub mod evaluation;
pub mod experiment;
pub mod io;
pub mod models;
pub mod preprocessing;
pub mod results;

pub use data::{TimeSeries, TimeSeriesInstance, TimeSeriesInstances};
pub use error::{DataError, ExperimentError, ResultsError};
pub use experiment::config::ExperimentConfig;
pub use experiment::controller::Experiment;
pub use models::{Classifier, ClassifierRegistry};
pub use results::ClassifierResults;
