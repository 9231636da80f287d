//! The experiment controller and everything it coordinates.

pub mod batch;
pub mod checkpoint;
pub mod config;
pub mod controller;
pub mod finalise;
pub mod lock;
pub mod monitor;
pub mod paths;

pub use batch::{resolve_threads, BatchReport, BatchRunner};
pub use config::{ExperimentConfig, TimeSpan};
pub use controller::{Experiment, ExperimentState, UnitOutcome, UnitReport};
pub use paths::ResultPaths;
