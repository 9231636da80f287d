use serde::{Deserialize, Serialize};

use crate::error::DataError;
use crate::preprocessing;

/// One dimension of a time series: an ordered sequence of values with
/// optional timestamps. Missing values are stored as `NaN`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    values: Vec<f64>,
    timestamps: Option<Vec<f64>>,
}

impl TimeSeries {
    pub fn new(values: Vec<f64>) -> Self {
        Self {
            values,
            timestamps: None,
        }
    }

    pub fn with_timestamps(values: Vec<f64>, timestamps: Vec<f64>) -> Result<Self, DataError> {
        if values.len() != timestamps.len() {
            return Err(DataError::InvalidData(format!(
                "{} values but {} timestamps",
                values.len(),
                timestamps.len()
            )));
        }
        Ok(Self {
            values,
            timestamps: Some(timestamps),
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn timestamps(&self) -> Option<&[f64]> {
        self.timestamps.as_deref()
    }

    pub fn value(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    /// True when `index` lies inside the series and holds an observed value.
    pub fn has_valid_value_at(&self, index: usize) -> bool {
        self.value(index).map_or(false, |v| !v.is_nan())
    }

    pub fn has_missing(&self) -> bool {
        self.values.iter().any(|v| v.is_nan())
    }

    /// Values in `[start, end)`; positions past the end of this series are
    /// filled with `NaN`.
    pub fn slice(&self, start: usize, end: usize) -> Vec<f64> {
        (start..end)
            .map(|i| self.value(i).unwrap_or(f64::NAN))
            .collect()
    }

    /// Sub-series over `[start, end)` with timestamps carried along.
    pub fn sub_series(&self, start: usize, end: usize) -> TimeSeries {
        let timestamps = self.timestamps.as_ref().map(|ts| {
            (start..end)
                .map(|i| ts.get(i).copied().unwrap_or(f64::NAN))
                .collect()
        });
        TimeSeries {
            values: self.slice(start, end),
            timestamps,
        }
    }

    /// Sub-series at arbitrary positions, `NaN` where this series is too short.
    pub fn select(&self, indices: &[usize]) -> TimeSeries {
        let pick = |src: &[f64]| {
            indices
                .iter()
                .map(|&i| src.get(i).copied().unwrap_or(f64::NAN))
                .collect::<Vec<_>>()
        };
        TimeSeries {
            values: pick(&self.values),
            timestamps: self.timestamps.as_deref().map(pick),
        }
    }

    /// The first `len` points, without padding.
    pub fn prefix(&self, len: usize) -> TimeSeries {
        let end = len.min(self.values.len());
        TimeSeries {
            values: self.values[..end].to_vec(),
            timestamps: self.timestamps.as_ref().map(|ts| ts[..end].to_vec()),
        }
    }

    /// Z-normalised copy; timestamps are kept.
    pub fn z_normalised(&self) -> TimeSeries {
        TimeSeries {
            values: preprocessing::z_normalise(&self.values),
            timestamps: self.timestamps.clone(),
        }
    }
}

impl From<Vec<f64>> for TimeSeries {
    fn from(values: Vec<f64>) -> Self {
        TimeSeries::new(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_must_match_values() {
        assert!(TimeSeries::with_timestamps(vec![1.0, 2.0], vec![0.0]).is_err());
        let ts = TimeSeries::with_timestamps(vec![1.0, 2.0], vec![0.0, 0.5]).unwrap();
        assert_eq!(ts.timestamps(), Some(&[0.0, 0.5][..]));
    }

    #[test]
    fn slice_pads_with_nan() {
        let ts = TimeSeries::new(vec![1.0, 2.0, 3.0]);
        let s = ts.slice(1, 5);
        assert_eq!(&s[..2], &[2.0, 3.0]);
        assert!(s[2].is_nan() && s[3].is_nan());
    }

    #[test]
    fn z_normalised_keeps_timestamps() {
        let ts = TimeSeries::with_timestamps(vec![2.0, 4.0], vec![0.0, 1.0]).unwrap();
        let z = ts.z_normalised();
        assert_eq!(z.values(), &[-1.0, 1.0]);
        assert_eq!(z.timestamps(), ts.timestamps());
    }

    #[test]
    fn valid_value_checks() {
        let ts = TimeSeries::new(vec![1.0, f64::NAN]);
        assert!(ts.has_valid_value_at(0));
        assert!(!ts.has_valid_value_at(1));
        assert!(!ts.has_valid_value_at(2));
        assert!(ts.has_missing());
    }
}
