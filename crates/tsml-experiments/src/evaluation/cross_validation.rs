use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::data::TimeSeriesInstances;
use crate::evaluation::{class_labels_of, stratified_folds, ClassifierBuilder, Evaluator};
use crate::results::ClassifierResults;

/// Stratified k-fold cross-validation. Every training instance is predicted
/// exactly once, by the model that did not see it. `k` is capped at the
/// number of instances.
#[derive(Debug, Clone)]
pub struct CrossValidation {
    folds: usize,
    seed: u64,
}

impl CrossValidation {
    pub fn new(folds: usize, seed: u64) -> Self {
        Self { folds, seed }
    }
}

impl Evaluator for CrossValidation {
    fn method_name(&self) -> String {
        format!("cv_{}", self.folds)
    }

    fn evaluate(&self, build: &ClassifierBuilder<'_>, data: &TimeSeriesInstances) -> Result<ClassifierResults> {
        let labels = class_labels_of(data)?;
        let k = self.folds.min(data.len());
        if k < 2 {
            bail!("cross-validation needs at least two training instances");
        }

        let start = Instant::now();
        let mut rng = StdRng::seed_from_u64(self.seed);
        let assignment = stratified_folds(&labels, k, &mut rng);
        let mut slots: Vec<Option<(Vec<f64>, Duration)>> = vec![None; data.len()];

        for fold in 0..k {
            let (test_idx, train_idx): (Vec<usize>, Vec<usize>) =
                (0..data.len()).partition(|&i| assignment[i] == fold);
            if test_idx.is_empty() {
                continue;
            }
            let train = data.subset(&train_idx)?;
            let mut classifier = build()?;
            classifier.build(&train)?;
            log::trace!("cv fold {}: trained on {} instances", fold, train.len());

            for &i in &test_idx {
                let t = Instant::now();
                let dist = classifier.distribution(data.get(i)?)?;
                slots[i] = Some((dist, t.elapsed()));
            }
        }

        let mut results = ClassifierResults::new(data.num_classes());
        for (i, slot) in slots.into_iter().enumerate() {
            let (dist, time) = slot.ok_or_else(|| anyhow!("instance {} was never predicted", i))?;
            results.add_prediction(Some(labels[i]), dist, Some(time), "")?;
        }
        results.error_estimate_method = self.method_name();
        results.error_estimate_time = Some(start.elapsed());
        Ok(results)
    }
}
