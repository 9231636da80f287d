//! UCR archive style delimited files: one univariate series per row with
//! the class label in the first column.
use std::path::Path;

use csv::StringRecord;

use crate::error::DataError;
use crate::io::{RawCase, RawDataset};

pub(crate) fn read_delimited(path: &Path, delimiter: u8) -> Result<RawDataset, DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| parse_error(path, 0, e.to_string()))?;

    let mut cases = Vec::new();
    let mut record = StringRecord::new();
    let mut line = 0;
    loop {
        line += 1;
        match reader.read_record(&mut record) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => return Err(parse_error(path, line, e.to_string())),
        }
        if record.iter().all(str::is_empty) {
            continue;
        }
        cases.push(parse_row(&record).map_err(|reason| parse_error(path, line, reason))?);
    }

    log::debug!("Read {} series from {}", cases.len(), path.display());
    Ok(RawDataset {
        problem_name: path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s.trim_end_matches("_TRAIN").trim_end_matches("_TEST").to_string()),
        class_labels: None,
        cases,
    })
}

fn parse_row(record: &StringRecord) -> Result<RawCase, String> {
    let mut fields = record.iter();
    let label = fields.next().ok_or("empty row")?.to_string();
    let mut values = fields.map(parse_value).collect::<Result<Vec<f64>, String>>()?;
    // unequal length series are right-padded with missing values in the archive
    while values.last().map_or(false, |v| v.is_nan()) {
        values.pop();
    }
    Ok(RawCase {
        label: Some(label),
        dimensions: vec![values],
    })
}

fn parse_value(field: &str) -> Result<f64, String> {
    match field {
        "" | "?" | "NaN" | "nan" => Ok(f64::NAN),
        s => s
            .parse::<f64>()
            .map_err(|_| format!("'{}' is not a number", s)),
    }
}

fn parse_error(path: &Path, line: usize, reason: String) -> DataError {
    DataError::Parse {
        path: path.to_path_buf(),
        line,
        reason,
    }
}
