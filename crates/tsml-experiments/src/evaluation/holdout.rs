use std::time::Instant;

use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::data::TimeSeriesInstances;
use crate::evaluation::{class_labels_of, predict_all, stratified_split, ClassifierBuilder, Evaluator};
use crate::results::ClassifierResults;

/// Single stratified train/validation split. Only the held-out part is
/// predicted, so the record covers `1 - train_proportion` of the data.
#[derive(Debug, Clone)]
pub struct Holdout {
    train_proportion: f64,
    seed: u64,
}

impl Holdout {
    pub fn new(train_proportion: f64, seed: u64) -> Self {
        Self {
            train_proportion,
            seed,
        }
    }
}

impl Evaluator for Holdout {
    fn method_name(&self) -> String {
        format!("hov_{}", self.train_proportion)
    }

    fn evaluate(&self, build: &ClassifierBuilder<'_>, data: &TimeSeriesInstances) -> Result<ClassifierResults> {
        let labels = class_labels_of(data)?;
        let start = Instant::now();
        let (train_idx, test_idx) =
            stratified_split(&labels, self.train_proportion, &mut StdRng::seed_from_u64(self.seed));
        if test_idx.is_empty() {
            bail!("holdout split left nothing to validate on");
        }

        let mut classifier = build()?;
        classifier.build(&data.subset(&train_idx)?)?;

        let mut results = ClassifierResults::new(data.num_classes());
        predict_all(classifier.as_ref(), &data.subset(&test_idx)?, &mut results)?;
        results.error_estimate_method = self.method_name();
        results.error_estimate_time = Some(start.elapsed());
        Ok(results)
    }
}
