use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::data::TimeSeriesInstances;
use crate::error::DataError;
use crate::io::{build_dataset, label_table, read_raw};

/// Extensions searched, in order, for `<problem>_TRAIN` / `<problem>_TEST`.
const EXTENSIONS: [&str; 3] = ["json", "tsv", "csv"];

/// A train/test split of one problem.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSplit {
    pub train: TimeSeriesInstances,
    pub test: TimeSeriesInstances,
}

fn locate(data_dir: &Path, problem: &str, split: &str) -> Result<PathBuf, DataError> {
    let base = data_dir.join(problem);
    EXTENSIONS
        .iter()
        .map(|ext| base.join(format!("{}_{}.{}", problem, split, ext)))
        .find(|p| p.is_file())
        .ok_or_else(|| DataError::FileNotFound(base.join(format!("{}_{}.*", problem, split))))
}

/// Load `problem` from `data_dir` and return the split for `fold`. Fold 0
/// is the published split; other folds are stratified resamples seeded by
/// the fold number.
pub fn sample_dataset<P: AsRef<Path>>(data_dir: P, problem: &str, fold: u64) -> Result<DatasetSplit, DataError> {
    let train_path = locate(data_dir.as_ref(), problem, "TRAIN")?;
    let test_path = locate(data_dir.as_ref(), problem, "TEST")?;

    let train_raw = read_raw(&train_path)?;
    let test_raw = read_raw(&test_path)?;
    let labels = label_table(&[&train_raw, &test_raw]);

    let split = DatasetSplit {
        train: build_dataset(train_raw, &labels)?.with_problem_name(problem),
        test: build_dataset(test_raw, &labels)?.with_problem_name(problem),
    };
    if split.train.is_empty() {
        return Err(DataError::EmptyDataset);
    }

    log::debug!(
        "Loaded {}: {} train and {} test instances, {} classes",
        problem,
        split.train.len(),
        split.test.len(),
        labels.len()
    );

    if fold == 0 {
        Ok(split)
    } else {
        resample(&split, fold)
    }
}

/// Pool train and test, shuffle with `seed`, and refill the train split
/// class by class so it keeps the original train class counts.
pub fn resample(split: &DatasetSplit, seed: u64) -> Result<DatasetSplit, DataError> {
    let pooled: Vec<_> = split.train.iter().chain(split.test.iter()).cloned().collect();
    let mut order: Vec<usize> = (0..pooled.len()).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let mut quota = split.train.class_counts().to_vec();
    let mut train = Vec::with_capacity(split.train.len());
    let mut test = Vec::with_capacity(split.test.len());
    for idx in order {
        let inst = pooled[idx].clone();
        match inst.label_index() {
            Some(label) if quota.get(label).copied().unwrap_or(0) > 0 => {
                quota[label] -= 1;
                train.push(inst);
            }
            None if train.len() < split.train.len() => train.push(inst),
            _ => test.push(inst),
        }
    }

    let labels = split.train.class_labels().to_vec();
    let name = split.train.problem_name().to_string();
    Ok(DatasetSplit {
        train: TimeSeriesInstances::from_instances(train, labels.clone())?.with_problem_name(name.clone()),
        test: TimeSeriesInstances::from_instances(test, labels)?.with_problem_name(name),
    })
}
