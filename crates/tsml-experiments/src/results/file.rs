//! Reading and writing results files.
//!
//! Layout:
//! ```text
//! dataset,classifier,split,fold,NANOSECONDS,description
//! parameter info
//! acc,buildTime,testTime,benchmarkTime,memory,numClasses,estimateMethod,estimateTime,buildPlusEstimateTime
//! actual,predicted,,p0,...,pN,,predictionTime,,extraInfo
//! ```
//! Unset costs are written as `-1`.
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ResultsError;
use crate::results::ClassifierResults;

const TIME_UNIT: &str = "NANOSECONDS";
const NO_PARAMETERS: &str = "No Parameter Info";

/// What follows the three header lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum ResultsFormat {
    /// Every prediction with its distribution, time and extra info.
    #[default]
    Predictions,
    /// Summary metrics only.
    Metrics,
    /// Predictions and distributions without timings.
    Compact,
}

impl From<i32> for ResultsFormat {
    fn from(code: i32) -> Self {
        match code {
            0 => ResultsFormat::Predictions,
            1 => ResultsFormat::Metrics,
            2 => ResultsFormat::Compact,
            other => {
                log::warn!(
                    "Unknown results format {}, writing full predictions instead",
                    other
                );
                ResultsFormat::Predictions
            }
        }
    }
}

impl From<ResultsFormat> for i32 {
    fn from(format: ResultsFormat) -> Self {
        match format {
            ResultsFormat::Predictions => 0,
            ResultsFormat::Metrics => 1,
            ResultsFormat::Compact => 2,
        }
    }
}

fn nanos(d: Option<Duration>) -> i128 {
    d.map_or(-1, |d| d.as_nanos() as i128)
}

fn format_stat(v: Option<f64>) -> String {
    v.map_or_else(|| "-1".to_string(), |v| v.to_string())
}

impl ClassifierResults {
    /// Render the results in `format`.
    pub fn to_file_string(&self, format: ResultsFormat) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{},{},{},{},{},{}",
            self.dataset_name, self.classifier_name, self.split, self.fold, TIME_UNIT, self.description
        );
        let _ = writeln!(
            out,
            "{}",
            if self.parameters.is_empty() { NO_PARAMETERS } else { self.parameters.as_str() }
        );
        let _ = writeln!(
            out,
            "{},{},{},{},{},{},{},{},{}",
            format_stat(self.accuracy()),
            nanos(self.build_time),
            nanos(self.test_time),
            nanos(self.benchmark_time),
            self.memory.map_or(-1, |m| m as i128),
            self.num_classes,
            self.error_estimate_method,
            nanos(self.error_estimate_time),
            nanos(self.build_plus_estimate_time),
        );

        match format {
            ResultsFormat::Metrics => {
                if let Some(s) = self.stats() {
                    let _ = writeln!(out, "accuracy,{}", s.accuracy);
                    let _ = writeln!(out, "balancedAccuracy,{}", s.balanced_accuracy);
                    let _ = writeln!(out, "nll,{}", s.nll);
                    let _ = writeln!(out, "auroc,{}", s.mean_auroc);
                    let _ = writeln!(out, "f1,{}", s.macro_f1);
                }
            }
            ResultsFormat::Predictions | ResultsFormat::Compact => {
                for p in self.predictions() {
                    let actual = p.true_label.map_or(-1, |l| l as i64);
                    // shortest round-trip form, so a reader sees the same distribution
                    let probs: Vec<String> = p.distribution.iter().map(f64::to_string).collect();
                    let _ = write!(out, "{},{},,{}", actual, p.predicted, probs.join(","));
                    if format == ResultsFormat::Predictions {
                        let _ = write!(out, ",,{},,{}", nanos(p.prediction_time), p.extra_info);
                    }
                    out.push('\n');
                }
            }
        }
        out
    }

    /// Write to `path`, creating parent directories.
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P, format: ResultsFormat) -> Result<(), ResultsError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_file_string(format))?;
        log::debug!("Wrote {} results to {}", self.split, path.display());
        Ok(())
    }
}

fn parse_nanos(field: &str) -> Option<Duration> {
    field
        .trim()
        .parse::<i128>()
        .ok()
        .filter(|&v| v >= 0)
        .map(|v| Duration::from_nanos(v as u64))
}

/// Read a results file written in predictions or compact format. Metrics
/// files yield a record without predictions. The returned record is not
/// finalised.
pub fn read_results_file<P: AsRef<Path>>(path: P) -> Result<ClassifierResults, ResultsError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let malformed = |line: usize, reason: &str| ResultsError::Malformed {
        path: path.to_path_buf(),
        line,
        reason: reason.to_string(),
    };

    let mut lines = content.lines();
    let header: Vec<&str> = lines.next().ok_or_else(|| malformed(1, "missing header"))?.split(',').collect();
    if header.len() < 3 {
        return Err(malformed(1, "expected dataset,classifier,split"));
    }
    let parameters = lines.next().ok_or_else(|| malformed(2, "missing parameter line"))?;
    let summary: Vec<&str> = lines.next().ok_or_else(|| malformed(3, "missing summary line"))?.split(',').collect();
    if summary.len() < 6 {
        return Err(malformed(3, "summary line too short"));
    }
    let num_classes = summary[5]
        .trim()
        .parse::<usize>()
        .map_err(|_| malformed(3, "numClasses is not an integer"))?;

    let mut results = ClassifierResults::new(num_classes);
    results.set_identity(
        header[0],
        header[1],
        header[2],
        header.get(3).and_then(|f| f.parse().ok()).unwrap_or(0),
    );
    if header.len() > 5 {
        results.description = header[5..].join(",");
    }
    if parameters != NO_PARAMETERS {
        results.parameters = parameters.to_string();
    }
    results.build_time = parse_nanos(summary[1]);
    results.test_time = parse_nanos(summary[2]);
    results.benchmark_time = parse_nanos(summary[3]);
    results.memory = summary[4].trim().parse::<u64>().ok();
    results.error_estimate_method = summary.get(6).unwrap_or(&"").to_string();
    results.error_estimate_time = summary.get(7).and_then(|f| parse_nanos(f));
    results.build_plus_estimate_time = summary.get(8).and_then(|f| parse_nanos(f));

    for (offset, line) in lines.enumerate() {
        let line_no = offset + 4;
        let fields: Vec<&str> = line.split(',').collect();
        // metrics lines start with a name rather than a class index
        let Ok(actual) = fields[0].trim().parse::<i64>() else {
            continue;
        };
        if fields.len() < 3 {
            return Err(malformed(line_no, "prediction line too short"));
        }
        let predicted = fields[1]
            .trim()
            .parse::<usize>()
            .map_err(|_| malformed(line_no, "predicted class is not an index"))?;
        let mut rest = fields[3..].iter();
        let distribution = rest
            .by_ref()
            .take_while(|f| !f.is_empty())
            .map(|f| f.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| malformed(line_no, "bad probability"))?;
        let prediction_time = rest.next().and_then(|f| parse_nanos(f));
        let extra_info = rest.skip(1).copied().collect::<Vec<_>>().join(",");

        results.add_prediction_with_label(
            (actual >= 0).then_some(actual as usize),
            predicted,
            distribution,
            prediction_time,
            extra_info,
        )?;
    }
    Ok(results)
}

/// True when `path` holds a plausibly complete results file.
pub fn validate_results_file<P: AsRef<Path>>(path: P) -> bool {
    let Ok(content) = fs::read_to_string(path) else {
        return false;
    };
    let lines: Vec<&str> = content.lines().take(3).collect();
    lines.len() == 3
        && lines[0].split(',').count() >= 3
        && lines[2]
            .split(',')
            .next()
            .map_or(false, |acc| acc.trim().parse::<f64>().is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ClassifierResults {
        let mut res = ClassifierResults::new(2);
        res.set_identity("Toy", "1NN", "test", 3);
        res.description = "Generated by tsml".to_string();
        res.parameters = "k,1".to_string();
        res.build_time = Some(Duration::from_nanos(1500));
        res.add_prediction(Some(0), vec![0.75, 0.25], Some(Duration::from_nanos(10)), "").unwrap();
        res.add_prediction(Some(1), vec![0.5, 0.5], Some(Duration::from_nanos(12)), "earliness,0.5").unwrap();
        res.finalise().unwrap();
        res
    }

    #[test]
    fn predictions_layout() {
        let text = sample().to_file_string(ResultsFormat::Predictions);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Toy,1NN,test,3,NANOSECONDS,Generated by tsml");
        assert_eq!(lines[1], "k,1");
        assert!(lines[2].starts_with("0.5,1500,-1,-1,-1,2,"));
        assert_eq!(lines[3], "0,0,,0.75,0.25,,10,,");
        assert_eq!(lines[4], "1,0,,0.5,0.5,,12,,earliness,0.5");
    }

    #[test]
    fn compact_and_metrics_layouts() {
        let res = sample();
        let compact = res.to_file_string(ResultsFormat::Compact);
        assert_eq!(compact.lines().nth(3), Some("0,0,,0.75,0.25"));
        let metrics = res.to_file_string(ResultsFormat::Metrics);
        assert!(metrics.lines().any(|l| l == "accuracy,0.5"));
        assert_eq!(metrics.lines().count(), 8);
    }

    #[test]
    fn read_back_written_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("testFold3.csv");
        sample().write_to_file(&path, ResultsFormat::Predictions).unwrap();

        assert!(validate_results_file(&path));
        let read = read_results_file(&path).unwrap();
        assert_eq!(read.classifier_name, "1NN");
        assert_eq!(read.fold, 3);
        assert_eq!(read.build_time, Some(Duration::from_nanos(1500)));
        assert_eq!(read.predictions(), sample().predictions());
    }

    #[test]
    fn near_tie_survives_a_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("testFold0.csv");
        let mut res = ClassifierResults::new(2);
        res.set_identity("Toy", "1NN", "test", 0);
        res.add_prediction(Some(1), vec![0.4999999, 0.5000001], None, "").unwrap();
        let written_acc = res.finalise().unwrap().accuracy;
        assert_eq!(written_acc, 1.0);
        res.write_to_file(&path, ResultsFormat::Predictions).unwrap();

        let mut read = read_results_file(&path).unwrap();
        assert_eq!(read.predictions()[0].predicted, 1);
        assert_eq!(read.predictions()[0].distribution, vec![0.4999999, 0.5000001]);
        assert_eq!(read.finalise().unwrap().accuracy, written_acc);
    }

    #[test]
    fn written_predicted_column_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("testFold0.csv");
        fs::write(&path, "Toy,1NN,test,0\nNo Parameter Info\n1,-1,-1,-1,-1,2\n1,1,,0.5,0.5\n").unwrap();
        let read = read_results_file(&path).unwrap();
        assert_eq!(read.predictions()[0].predicted, 1);
        fs::write(&path, "Toy,1NN,test,0\nNo Parameter Info\n1,-1,-1,-1,-1,2\n1,x,,0.5,0.5\n").unwrap();
        assert!(matches!(read_results_file(&path), Err(ResultsError::Malformed { line: 4, .. })));
    }

    #[test]
    fn validation_rejects_truncated_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.csv");
        fs::write(&path, "Toy,1NN,test\nNo Parameter Info\n").unwrap();
        assert!(!validate_results_file(&path));
        assert!(!validate_results_file(dir.path().join("absent.csv")));
    }

    #[test]
    fn unknown_format_code_falls_back() {
        assert_eq!(ResultsFormat::from(7), ResultsFormat::Predictions);
        assert_eq!(ResultsFormat::from(2), ResultsFormat::Compact);
        assert_eq!(i32::from(ResultsFormat::Metrics), 1);
    }
}
