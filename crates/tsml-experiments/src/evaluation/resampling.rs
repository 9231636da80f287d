use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::data::TimeSeriesInstances;
use crate::evaluation::{class_labels_of, stratified_split, ClassifierBuilder, Evaluator};
use crate::results::ClassifierResults;

/// Repeated stratified train/validation splits. Resample `r` is seeded with
/// `seed + r`. Each instance's prediction is the average distribution over
/// the resamples that held it out; instances never held out are omitted.
#[derive(Debug, Clone)]
pub struct StratifiedResamples {
    resamples: usize,
    train_proportion: f64,
    seed: u64,
}

impl StratifiedResamples {
    pub fn new(resamples: usize, train_proportion: f64, seed: u64) -> Self {
        Self {
            resamples,
            train_proportion,
            seed,
        }
    }
}

impl Evaluator for StratifiedResamples {
    fn method_name(&self) -> String {
        format!("sr_{}_{}", self.resamples, self.train_proportion)
    }

    fn evaluate(&self, build: &ClassifierBuilder<'_>, data: &TimeSeriesInstances) -> Result<ClassifierResults> {
        let labels = class_labels_of(data)?;
        let start = Instant::now();
        let num_classes = data.num_classes();
        let mut sums = vec![vec![0.0; num_classes]; data.len()];
        let mut counts = vec![0usize; data.len()];
        let mut times = vec![Duration::ZERO; data.len()];

        for r in 0..self.resamples {
            let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(r as u64));
            let (train_idx, test_idx) = stratified_split(&labels, self.train_proportion, &mut rng);
            let mut classifier = build()?;
            classifier.build(&data.subset(&train_idx)?)?;

            for &i in &test_idx {
                let t = Instant::now();
                let dist = classifier.distribution(data.get(i)?)?;
                times[i] += t.elapsed();
                counts[i] += 1;
                for (acc, p) in sums[i].iter_mut().zip(dist) {
                    *acc += p;
                }
            }
        }

        let mut results = ClassifierResults::new(num_classes);
        for i in 0..data.len() {
            if counts[i] == 0 {
                continue;
            }
            let n = counts[i] as f64;
            let dist = sums[i].iter().map(|s| s / n).collect();
            results.add_prediction(Some(labels[i]), dist, Some(times[i] / counts[i] as u32), "")?;
        }
        if results.is_empty() {
            bail!("no instance was held out in any of {} resamples", self.resamples);
        }
        results.error_estimate_method = self.method_name();
        results.error_estimate_time = Some(start.elapsed());
        Ok(results)
    }
}
