//! JSON dataset files, used for multivariate and unequal length data.
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::TimeSeriesInstances;
use crate::error::DataError;
use crate::io::{RawCase, RawDataset};

#[derive(Debug, Serialize, Deserialize)]
struct JsonDataset {
    #[serde(default)]
    problem_name: Option<String>,
    #[serde(default)]
    class_labels: Option<Vec<String>>,
    instances: Vec<JsonCase>,
}

#[derive(Debug, Serialize, Deserialize)]
struct JsonCase {
    #[serde(default)]
    label: Option<String>,
    /// `[dimension][time]`; `null` entries are missing values.
    dimensions: Vec<Vec<Option<f64>>>,
}

pub(crate) fn read_json(path: &Path) -> Result<RawDataset, DataError> {
    let content = std::fs::read_to_string(path)?;
    let parsed: JsonDataset = serde_json::from_str(&content).map_err(|e| DataError::Parse {
        path: path.to_path_buf(),
        line: e.line(),
        reason: e.to_string(),
    })?;

    Ok(RawDataset {
        problem_name: parsed.problem_name,
        class_labels: parsed.class_labels,
        cases: parsed
            .instances
            .into_iter()
            .map(|c| RawCase {
                label: c.label,
                dimensions: c
                    .dimensions
                    .into_iter()
                    .map(|d| d.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
                    .collect(),
            })
            .collect(),
    })
}

/// Write a dataset in the JSON layout read by [`load_dataset`](crate::io::load_dataset).
pub fn write_json<P: AsRef<Path>>(data: &TimeSeriesInstances, path: P) -> Result<(), DataError> {
    let doc = JsonDataset {
        problem_name: Some(data.problem_name().to_string()),
        class_labels: Some(data.class_labels().to_vec()),
        instances: data
            .iter()
            .map(|inst| JsonCase {
                label: inst
                    .label_index()
                    .and_then(|i| data.class_labels().get(i).cloned()),
                dimensions: inst
                    .to_value_array()
                    .into_iter()
                    .map(|d| d.into_iter().map(|v| (!v.is_nan()).then_some(v)).collect())
                    .collect(),
            })
            .collect(),
    };
    let text = serde_json::to_string_pretty(&doc)
        .map_err(|e| DataError::InvalidData(format!("cannot encode dataset: {}", e)))?;
    std::fs::write(path, text)?;
    Ok(())
}
