//! Dataset loading and resampling.

pub mod json;
pub mod sampling;
pub mod ucr;

use std::collections::BTreeSet;
use std::path::Path;

use crate::data::{TimeSeriesInstance, TimeSeriesInstances};
use crate::error::DataError;

pub use sampling::{resample, sample_dataset, DatasetSplit};

/// One case as read from disk, before labels are mapped to indices.
#[derive(Debug, Clone)]
pub(crate) struct RawCase {
    pub label: Option<String>,
    pub dimensions: Vec<Vec<f64>>,
}

/// File contents before label indexing.
#[derive(Debug, Clone, Default)]
pub(crate) struct RawDataset {
    pub problem_name: Option<String>,
    pub class_labels: Option<Vec<String>>,
    pub cases: Vec<RawCase>,
}

/// Load a dataset file, choosing the reader by extension: `.json`, or UCR
/// style `.tsv`/`.csv`.
pub fn load_dataset<P: AsRef<Path>>(path: P) -> Result<TimeSeriesInstances, DataError> {
    let raw = read_raw(path.as_ref())?;
    let labels = label_table(&[&raw]);
    build_dataset(raw, &labels)
}

pub(crate) fn read_raw(path: &Path) -> Result<RawDataset, DataError> {
    if !path.is_file() {
        return Err(DataError::FileNotFound(path.to_path_buf()));
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => json::read_json(path),
        Some("tsv") => ucr::read_delimited(path, b'\t'),
        Some("csv") => ucr::read_delimited(path, b','),
        other => Err(DataError::Parse {
            path: path.to_path_buf(),
            line: 0,
            reason: format!("unsupported dataset extension {:?}", other),
        }),
    }
}

/// Shared label table for one or more files. Declared tables win, in
/// declaration order; otherwise observed labels are sorted, numerically
/// when every label is a number.
pub(crate) fn label_table(raws: &[&RawDataset]) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();
    for raw in raws {
        if let Some(declared) = &raw.class_labels {
            for l in declared {
                if !labels.contains(l) {
                    labels.push(l.clone());
                }
            }
        }
    }

    let observed: BTreeSet<&str> = raws
        .iter()
        .flat_map(|r| r.cases.iter())
        .filter_map(|c| c.label.as_deref())
        .filter(|l| !labels.iter().any(|k| k == l))
        .collect();
    let mut extra: Vec<String> = observed.into_iter().map(str::to_string).collect();
    if extra.iter().all(|l| l.parse::<f64>().is_ok()) {
        extra.sort_by(|a, b| {
            let (x, y) = (a.parse::<f64>().unwrap_or(0.0), b.parse::<f64>().unwrap_or(0.0));
            x.total_cmp(&y)
        });
    }
    labels.extend(extra);
    labels
}

pub(crate) fn build_dataset(raw: RawDataset, labels: &[String]) -> Result<TimeSeriesInstances, DataError> {
    let mut data = TimeSeriesInstances::new(labels.to_vec())?;
    if let Some(name) = raw.problem_name {
        data = data.with_problem_name(name);
    }
    for case in raw.cases {
        let label = match &case.label {
            Some(l) => labels.iter().position(|k| k == l),
            None => None,
        };
        data.add(TimeSeriesInstance::new(
            case.dimensions.into_iter().map(Into::into).collect(),
            label,
        ))?;
    }
    Ok(data)
}
