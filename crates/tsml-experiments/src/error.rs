use std::path::PathBuf;

use thiserror::Error;

/// Failures raised while building, slicing or loading time series data.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("{axis} index {index} out of range (bound {bound})")]
    IndexOutOfRange {
        axis: &'static str,
        index: usize,
        bound: usize,
    },

    #[error("operation requires a non-empty dataset")]
    EmptyDataset,

    #[error("class label index {label} out of range for {num_classes} classes")]
    LabelOutOfRange { label: usize, num_classes: usize },

    #[error("dataset file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("failed to parse {} at line {line}: {reason}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures raised by result records and result files.
#[derive(Error, Debug)]
pub enum ResultsError {
    #[error("results for {0} are already finalised; no more predictions may be added")]
    AlreadyFinalised(String),

    #[error("results for {0} have not been finalised")]
    NotFinalised(String),

    #[error("prediction {0} has no true label; summary statistics need labelled predictions")]
    MissingTrueLabel(usize),

    #[error("malformed results file {} at line {line}: {reason}", .path.display())]
    Malformed {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures raised by the experiment controller and batch runner.
///
/// `Configuration`, `UnknownClassifier` and `UnknownEvaluationMethod` are
/// pre-flight errors: they abort a run before any training starts. The
/// other variants are scoped to the unit of work that raised them.
#[derive(Error, Debug)]
pub enum ExperimentError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("unknown classifier '{0}'")]
    UnknownClassifier(String),

    #[error("unknown train estimate method '{0}'")]
    UnknownEvaluationMethod(String),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("training failed: {0}")]
    TrainingFailure(String),

    #[error("testing failed: {0}")]
    TestingFailure(String),

    #[error("results file already exists and overwriting is disabled: {}", .0.display())]
    ResultsAlreadyExist(PathBuf),

    #[error("another process holds the lock {}", .0.display())]
    LockContention(PathBuf),

    #[error("serialisation failed: {0}")]
    Serialization(String),

    #[error("visualisation failed: {0}")]
    Visualisation(String),

    #[error(transparent)]
    Results(#[from] ResultsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExperimentError {
    /// True for errors that must abort a run before any unit executes.
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            ExperimentError::Configuration(_)
                | ExperimentError::UnknownClassifier(_)
                | ExperimentError::UnknownEvaluationMethod(_)
        )
    }
}
