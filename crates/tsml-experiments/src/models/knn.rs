//! k nearest neighbour classifiers under Euclidean distance.
//!
//! Distances are taken over the shared prefix of each pair of dimensions,
//! so the same model can score unequal length series and early prefixes.
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use log::LevelFilter;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::data::{TimeSeriesInstance, TimeSeriesInstances};
use crate::models::{
    Capability, Checkpointable, Classifier, Contractable, EarlyClassifier, Loggable,
    ParameterSplittable, Seedable, SelfEstimating, Serializable, TrainCost,
};
use crate::results::ClassifierResults;

const CHECKPOINT_FILE: &str = "knn_checkpoint.json";
const K_GRID: [usize; 6] = [1, 3, 5, 7, 9, 11];

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Prototype {
    values: Vec<Vec<f64>>,
    label: usize,
}

/// Snapshot written to the checkpoint directory. `selected` are positions
/// in the seeded visiting order, so a resumed build continues where the
/// previous one stopped.
#[derive(Debug, Serialize, Deserialize)]
struct Checkpoint {
    seed: u64,
    num_train: usize,
    selected: usize,
}

/// Serialised form of a trained model.
#[derive(Debug, Serialize)]
struct SavedModel<'a> {
    name: &'a str,
    k: usize,
    num_classes: usize,
    prototypes: &'a [Prototype],
}

fn squared_distance(a: &[Vec<f64>], b: &[Vec<f64>]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            x.iter()
                .zip(y)
                .filter(|(u, v)| !u.is_nan() && !v.is_nan())
                .map(|(u, v)| (u - v) * (u - v))
                .sum::<f64>()
        })
        .sum()
}

/// k-NN with seeded prototype selection. Under a train time contract the
/// training cases are visited in seeded random order and added as
/// prototypes until the contract runs out.
#[derive(Debug, Clone)]
pub struct KNearestNeighbours {
    name: String,
    k: usize,
    seed: u64,
    contract: Option<Duration>,
    checkpoint_dir: Option<PathBuf>,
    checkpoint_interval: Option<Duration>,
    estimate_own_performance: bool,
    log_level: LevelFilter,
    num_classes: usize,
    prototypes: Vec<Prototype>,
    train_results: Option<ClassifierResults>,
    cost: Option<TrainCost>,
}

impl KNearestNeighbours {
    pub fn new(k: usize) -> Self {
        Self {
            name: format!("{}NN", k),
            k: k.max(1),
            seed: 0,
            contract: None,
            checkpoint_dir: None,
            checkpoint_interval: None,
            estimate_own_performance: false,
            log_level: LevelFilter::Info,
            num_classes: 0,
            prototypes: Vec::new(),
            train_results: None,
            cost: None,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn num_prototypes(&self) -> usize {
        self.prototypes.len()
    }

    /// Vote shares among the `k` nearest prototypes, optionally leaving one
    /// prototype out.
    fn vote(&self, values: &[Vec<f64>], exclude: Option<usize>) -> Result<Vec<f64>> {
        if self.prototypes.is_empty() {
            bail!("{} has not been built", self.name);
        }
        let mut neighbours: Vec<(f64, usize)> = self
            .prototypes
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != exclude)
            .map(|(_, p)| (squared_distance(values, &p.values), p.label))
            .collect();
        neighbours.sort_by(|a, b| a.0.total_cmp(&b.0));

        let k = self.k.min(neighbours.len());
        let mut dist = vec![0.0; self.num_classes];
        if k == 0 {
            // a single prototype left out of itself
            dist.iter_mut().for_each(|p| *p = 1.0 / self.num_classes as f64);
            return Ok(dist);
        }
        for (_, label) in &neighbours[..k] {
            dist[*label] += 1.0 / k as f64;
        }
        Ok(dist)
    }

    fn load_checkpoint(&self, num_train: usize) -> Result<usize> {
        let Some(dir) = &self.checkpoint_dir else {
            return Ok(0);
        };
        let path = dir.join(CHECKPOINT_FILE);
        if !path.is_file() {
            return Ok(0);
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read checkpoint: {}", path.display()))?;
        let checkpoint: Checkpoint = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse checkpoint: {}", path.display()))?;
        if checkpoint.seed != self.seed || checkpoint.num_train != num_train {
            log::warn!("Ignoring checkpoint {} from a different training set", path.display());
            return Ok(0);
        }
        Ok(checkpoint.selected.min(num_train))
    }

    fn save_checkpoint(&self, num_train: usize) -> Result<()> {
        let Some(dir) = &self.checkpoint_dir else {
            return Ok(());
        };
        let checkpoint = Checkpoint {
            seed: self.seed,
            num_train,
            selected: self.prototypes.len(),
        };
        let path = dir.join(CHECKPOINT_FILE);
        fs::write(&path, serde_json::to_string(&checkpoint)?)
            .with_context(|| format!("Failed to write checkpoint: {}", path.display()))?;
        Ok(())
    }

    fn leave_one_out(&self, data: &TimeSeriesInstances) -> Result<ClassifierResults> {
        let mut results = ClassifierResults::new(self.num_classes);
        // prototypes are a prefix of the visiting order, so map back by value
        for inst in data {
            let start = Instant::now();
            let values = inst.to_value_array();
            let own = self
                .prototypes
                .iter()
                .position(|p| p.values == values && Some(p.label) == inst.label_index());
            let dist = self.vote(&values, own)?;
            results.add_prediction(inst.label_index(), dist, Some(start.elapsed()), "")?;
        }
        results.error_estimate_method = "LOOCV".to_string();
        Ok(results)
    }
}

impl Classifier for KNearestNeighbours {
    fn name(&self) -> &str {
        &self.name
    }

    fn build(&mut self, data: &TimeSeriesInstances) -> Result<()> {
        if !data.is_classification() || data.is_empty() {
            bail!("{} needs a non-empty classification dataset", self.name);
        }
        let start = Instant::now();
        self.num_classes = data.num_classes();
        self.prototypes.clear();
        self.train_results = None;

        let mut order: Vec<usize> = (0..data.len()).collect();
        order.shuffle(&mut StdRng::seed_from_u64(self.seed));

        let resume = self.load_checkpoint(data.len())?;
        if resume > 0 && self.log_level >= LevelFilter::Debug {
            log::debug!("{} resuming from checkpoint with {} prototypes", self.name, resume);
        }

        let mut last_save = Instant::now();
        for (visited, &idx) in order.iter().enumerate() {
            let inst = data.get(idx)?;
            let label = inst
                .label_index()
                .with_context(|| format!("training instance {} has no label", idx))?;
            self.prototypes.push(Prototype {
                values: inst.to_value_array(),
                label,
            });
            if visited < resume {
                continue;
            }
            if let Some(limit) = self.contract {
                if start.elapsed() >= limit {
                    log::info!(
                        "{} stopped at {} of {} prototypes on its {:?} contract",
                        self.name,
                        self.prototypes.len(),
                        data.len(),
                        limit
                    );
                    break;
                }
            }
            if let Some(interval) = self.checkpoint_interval {
                if last_save.elapsed() >= interval {
                    self.save_checkpoint(data.len())?;
                    last_save = Instant::now();
                }
            }
        }
        self.save_checkpoint(data.len())?;

        let mut error_estimate_time = None;
        if self.estimate_own_performance {
            let estimate_start = Instant::now();
            self.train_results = Some(self.leave_one_out(data)?);
            error_estimate_time = Some(estimate_start.elapsed());
        }

        self.cost = Some(TrainCost {
            build_time: start.elapsed(),
            error_estimate_time,
            memory: None,
        });
        if self.log_level >= LevelFilter::Debug {
            log::debug!("{} built with {} prototypes", self.name, self.prototypes.len());
        }
        Ok(())
    }

    fn distribution(&self, inst: &TimeSeriesInstance) -> Result<Vec<f64>> {
        self.vote(&inst.to_value_array(), None)
    }

    fn parameters(&self) -> String {
        format!(
            "k,{},distance,euclidean,prototypes,{},seed,{}",
            self.k,
            self.prototypes.len(),
            self.seed
        )
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[
            Capability::SelfEstimating,
            Capability::Contractable,
            Capability::Checkpointable,
            Capability::Seedable,
            Capability::Loggable,
            Capability::Serializable,
            Capability::ParameterSplittable,
        ]
    }

    fn reported_cost(&self) -> Option<TrainCost> {
        self.cost
    }

    fn as_self_estimating(&mut self) -> Option<&mut dyn SelfEstimating> {
        Some(self)
    }

    fn as_contractable(&mut self) -> Option<&mut dyn Contractable> {
        Some(self)
    }

    fn as_checkpointable(&mut self) -> Option<&mut dyn Checkpointable> {
        Some(self)
    }

    fn as_seedable(&mut self) -> Option<&mut dyn Seedable> {
        Some(self)
    }

    fn as_loggable(&mut self) -> Option<&mut dyn Loggable> {
        Some(self)
    }

    fn as_parameter_splittable(&mut self) -> Option<&mut dyn ParameterSplittable> {
        Some(self)
    }

    fn as_serializable(&self) -> Option<&dyn Serializable> {
        Some(self)
    }
}

impl SelfEstimating for KNearestNeighbours {
    fn set_estimate_own_performance(&mut self, estimate: bool) {
        self.estimate_own_performance = estimate;
    }

    fn train_results(&self) -> Option<ClassifierResults> {
        self.train_results.clone()
    }
}

impl Contractable for KNearestNeighbours {
    fn set_train_time_limit(&mut self, limit: Duration) {
        self.contract = Some(limit);
    }
}

impl Checkpointable for KNearestNeighbours {
    fn set_checkpoint_path(&mut self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create checkpoint dir: {}", dir.display()))?;
        self.checkpoint_dir = Some(dir.to_path_buf());
        Ok(())
    }

    fn set_checkpoint_interval(&mut self, interval: Duration) {
        self.checkpoint_interval = Some(interval);
    }
}

impl Seedable for KNearestNeighbours {
    fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
    }
}

impl Loggable for KNearestNeighbours {
    fn set_log_level(&mut self, level: LevelFilter) {
        self.log_level = level;
    }
}

impl Serializable for KNearestNeighbours {
    fn save(&self, path: &Path) -> Result<()> {
        let model = SavedModel {
            name: &self.name,
            k: self.k,
            num_classes: self.num_classes,
            prototypes: &self.prototypes,
        };
        let text = serde_json::to_string(&model)?;
        fs::write(path, text).with_context(|| format!("Failed to write model: {}", path.display()))?;
        Ok(())
    }
}

impl ParameterSplittable for KNearestNeighbours {
    fn num_parameter_settings(&self) -> usize {
        K_GRID.len()
    }

    fn set_parameters_from_index(&mut self, index: usize) -> Result<()> {
        let Some(&k) = K_GRID.get(index) else {
            bail!("parameter index {} out of range (0..{})", index, K_GRID.len());
        };
        self.k = k;
        Ok(())
    }
}

/// Early classifier over a 5-NN model: commits once the winning class holds
/// at least `threshold` of the vote, or when the whole series is visible.
#[derive(Debug, Clone)]
pub struct EarlyKnn {
    inner: KNearestNeighbours,
    threshold: f64,
}

impl EarlyKnn {
    pub fn new(k: usize, threshold: f64) -> Self {
        Self {
            inner: KNearestNeighbours::new(k),
            threshold,
        }
    }
}

impl Default for EarlyKnn {
    fn default() -> Self {
        Self::new(5, 0.8)
    }
}

impl Classifier for EarlyKnn {
    fn name(&self) -> &str {
        "EarlyKNN"
    }

    fn build(&mut self, data: &TimeSeriesInstances) -> Result<()> {
        self.inner.build(data)
    }

    fn distribution(&self, inst: &TimeSeriesInstance) -> Result<Vec<f64>> {
        self.inner.distribution(inst)
    }

    fn parameters(&self) -> String {
        format!("threshold,{},{}", self.threshold, self.inner.parameters())
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::Seedable, Capability::EarlyDecision]
    }

    fn reported_cost(&self) -> Option<TrainCost> {
        self.inner.reported_cost()
    }

    fn as_seedable(&mut self) -> Option<&mut dyn Seedable> {
        Some(&mut self.inner)
    }

    fn as_early(&self) -> Option<&dyn EarlyClassifier> {
        Some(self)
    }
}

impl EarlyClassifier for EarlyKnn {
    fn early_distribution(&self, prefix: &TimeSeriesInstance, full_length: usize) -> Result<Option<Vec<f64>>> {
        let dist = self.inner.distribution(prefix)?;
        let confident = dist.iter().any(|&p| p >= self.threshold);
        Ok((confident || prefix.max_length() >= full_length).then_some(dist))
    }
}
