use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use log::LevelFilter;

use crate::data::{TimeSeriesInstance, TimeSeriesInstances};
use crate::results::{argmax, ClassifierResults};

/// Optional behaviours a classifier may declare. The controller checks the
/// declared set before configuring or running anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    SelfEstimating,
    Contractable,
    Checkpointable,
    Seedable,
    MultiThreadable,
    Loggable,
    Serializable,
    Visualisable,
    EarlyDecision,
    ParameterSplittable,
}

/// Cost figures a classifier measured for itself during `build`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrainCost {
    pub build_time: Duration,
    /// Time spent on an internal train estimate, already included in
    /// `build_time`.
    pub error_estimate_time: Option<Duration>,
    pub memory: Option<u64>,
}

/// A trainable and predictable time series classifier.
///
/// Only `name`, `build` and `distribution` are required. Every optional
/// behaviour is reached through an `as_*` accessor that returns `None`
/// unless the implementation overrides it, and is listed in
/// [`capabilities`](Classifier::capabilities).
pub trait Classifier: Send {
    fn name(&self) -> &str;

    /// Train on `data`, replacing any previous model.
    fn build(&mut self, data: &TimeSeriesInstances) -> Result<()>;

    /// Class probability distribution for one instance.
    fn distribution(&self, inst: &TimeSeriesInstance) -> Result<Vec<f64>>;

    /// Most probable class, lowest index on ties.
    fn classify(&self, inst: &TimeSeriesInstance) -> Result<usize> {
        Ok(argmax(&self.distribution(inst)?))
    }

    /// Parameter description written to results files.
    fn parameters(&self) -> String {
        String::new()
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[]
    }

    fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Costs measured by the classifier during the last `build`, if it
    /// tracks them.
    fn reported_cost(&self) -> Option<TrainCost> {
        None
    }

    fn as_self_estimating(&mut self) -> Option<&mut dyn SelfEstimating> {
        None
    }

    fn as_contractable(&mut self) -> Option<&mut dyn Contractable> {
        None
    }

    fn as_checkpointable(&mut self) -> Option<&mut dyn Checkpointable> {
        None
    }

    fn as_seedable(&mut self) -> Option<&mut dyn Seedable> {
        None
    }

    fn as_multi_threadable(&mut self) -> Option<&mut dyn MultiThreadable> {
        None
    }

    fn as_loggable(&mut self) -> Option<&mut dyn Loggable> {
        None
    }

    fn as_parameter_splittable(&mut self) -> Option<&mut dyn ParameterSplittable> {
        None
    }

    fn as_serializable(&self) -> Option<&dyn Serializable> {
        None
    }

    fn as_visualisable(&self) -> Option<&dyn Visualisable> {
        None
    }

    fn as_early(&self) -> Option<&dyn EarlyClassifier> {
        None
    }
}

/// Produces its own train-set performance estimate as part of `build`.
pub trait SelfEstimating {
    fn set_estimate_own_performance(&mut self, estimate: bool);

    /// Train predictions from the last `build`, if an estimate was requested.
    fn train_results(&self) -> Option<ClassifierResults>;
}

/// Honours a wall-clock limit on `build` by polling its own elapsed time.
pub trait Contractable {
    fn set_train_time_limit(&mut self, limit: Duration);
}

/// Persists progress during `build` and resumes from it.
pub trait Checkpointable {
    fn set_checkpoint_path(&mut self, dir: &Path) -> Result<()>;

    fn set_checkpoint_interval(&mut self, interval: Duration);
}

pub trait Seedable {
    fn set_seed(&mut self, seed: u64);
}

pub trait MultiThreadable {
    fn set_threads(&mut self, threads: usize);
}

pub trait Loggable {
    fn set_log_level(&mut self, level: LevelFilter);
}

pub trait Serializable {
    fn save(&self, path: &Path) -> Result<()>;
}

pub trait Visualisable {
    /// Write visual summaries of the trained model into `dir`.
    fn create_visualisation(&self, dir: &Path) -> Result<()>;
}

/// Can commit to a decision before the whole series has been seen.
pub trait EarlyClassifier {
    /// Distribution for a revealed prefix, or `None` to wait for more
    /// data. `full_length` is the length of the complete series.
    fn early_distribution(
        &self,
        prefix: &TimeSeriesInstance,
        full_length: usize,
    ) -> Result<Option<Vec<f64>>>;
}

/// Exposes an indexed grid of parameter settings for distributed tuning.
pub trait ParameterSplittable {
    fn num_parameter_settings(&self) -> usize;

    fn set_parameters_from_index(&mut self, index: usize) -> Result<()>;
}
