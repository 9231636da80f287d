use std::path::Path;
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use rayon::prelude::*;

use crate::data::{TimeSeriesInstance, TimeSeriesInstances};
use crate::models::{
    Capability, Classifier, KNearestNeighbours, MultiThreadable, Seedable, SelfEstimating,
    TrainCost, Visualisable,
};

/// Weight given to a module whose train estimate is zero, so it still
/// breaks ties.
const MIN_WEIGHT: f64 = 1e-6;

/// One 1-NN module per dimension, each trained on its own H-slice of the
/// data. Modules estimate their own accuracy by leave-one-out while
/// building; the ensemble votes with those accuracies as weights.
///
/// Modules are trained concurrently on a local pool of `threads` workers
/// and all of them finish before the ensemble is usable.
#[derive(Debug, Clone)]
pub struct DimensionEnsemble {
    modules: Vec<KNearestNeighbours>,
    weights: Vec<f64>,
    threads: usize,
    seed: u64,
    num_classes: usize,
    cost: Option<TrainCost>,
}

impl Default for DimensionEnsemble {
    fn default() -> Self {
        Self {
            modules: Vec::new(),
            weights: Vec::new(),
            threads: 1,
            seed: 0,
            num_classes: 0,
            cost: None,
        }
    }
}

impl DimensionEnsemble {
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    fn train_module(&self, data: &TimeSeriesInstances, dim: usize) -> Result<(KNearestNeighbours, f64)> {
        let slice = data.h_slice(dim, dim + 1)?;
        let mut module = KNearestNeighbours::new(1).named(&format!("1NN_dim{}", dim));
        module.set_seed(self.seed.wrapping_add(dim as u64));
        module.set_estimate_own_performance(true);
        module.build(&slice)?;

        let mut estimate = module
            .train_results()
            .ok_or_else(|| anyhow!("module {} produced no train estimate", dim))?;
        let accuracy = estimate.finalise()?.accuracy;
        log::trace!("Dimension {} module train accuracy {:.4}", dim, accuracy);
        Ok((module, accuracy))
    }
}

impl Classifier for DimensionEnsemble {
    fn name(&self) -> &str {
        "DimensionEnsemble"
    }

    fn build(&mut self, data: &TimeSeriesInstances) -> Result<()> {
        let start = Instant::now();
        if !data.is_classification() || data.is_empty() {
            bail!("DimensionEnsemble needs a non-empty classification dataset");
        }
        let dims = data.max_num_dimensions()?;
        self.num_classes = data.num_classes();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()
            .context("Failed to create ensemble thread pool")?;

        let this = &*self;
        let trained: Vec<Result<(KNearestNeighbours, f64)>> =
            pool.install(|| (0..dims).into_par_iter().map(|d| this.train_module(data, d)).collect());

        let (modules, weights): (Vec<_>, Vec<_>) = trained
            .into_iter()
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .map(|(m, acc)| (m, acc.max(MIN_WEIGHT)))
            .unzip();
        self.modules = modules;
        self.weights = weights;
        self.cost = Some(TrainCost {
            build_time: start.elapsed(),
            error_estimate_time: None,
            memory: None,
        });
        log::debug!(
            "DimensionEnsemble trained {} modules on {} threads",
            self.modules.len(),
            self.threads
        );
        Ok(())
    }

    fn distribution(&self, inst: &TimeSeriesInstance) -> Result<Vec<f64>> {
        if self.modules.is_empty() {
            bail!("DimensionEnsemble has not been built");
        }
        let mut dist = vec![0.0; self.num_classes];
        for (d, (module, weight)) in self.modules.iter().zip(&self.weights).enumerate() {
            let module_dist = module.distribution(&inst.h_slice(d, d + 1)?)?;
            for (acc, p) in dist.iter_mut().zip(module_dist) {
                *acc += weight * p;
            }
        }
        let total: f64 = dist.iter().sum();
        if total > 0.0 {
            dist.iter_mut().for_each(|p| *p /= total);
        }
        Ok(dist)
    }

    fn parameters(&self) -> String {
        let weights: Vec<String> = self.weights.iter().map(|w| format!("{:.4}", w)).collect();
        format!("modules,{},weights,{}", self.modules.len(), weights.join(";"))
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::Seedable, Capability::MultiThreadable, Capability::Visualisable]
    }

    fn reported_cost(&self) -> Option<TrainCost> {
        self.cost
    }

    fn as_seedable(&mut self) -> Option<&mut dyn Seedable> {
        Some(self)
    }

    fn as_multi_threadable(&mut self) -> Option<&mut dyn MultiThreadable> {
        Some(self)
    }

    fn as_visualisable(&self) -> Option<&dyn Visualisable> {
        Some(self)
    }
}

impl Seedable for DimensionEnsemble {
    fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
    }
}

impl MultiThreadable for DimensionEnsemble {
    fn set_threads(&mut self, threads: usize) {
        self.threads = threads.max(1);
    }
}

impl Visualisable for DimensionEnsemble {
    /// Writes `dimension_weights.csv` with one row per module.
    fn create_visualisation(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join("dimension_weights.csv");
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        writer.write_record(["dimension", "weight"])?;
        for (d, w) in self.weights.iter().enumerate() {
            writer.write_record([d.to_string(), w.to_string()])?;
        }
        writer.flush()?;
        Ok(())
    }
}
