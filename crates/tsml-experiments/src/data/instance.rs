use std::fmt;

use crate::data::series::TimeSeries;
use crate::error::DataError;

/// One case of a dataset: one or more dimensions plus an optional class
/// label index (classification) or target value (regression).
///
/// Length and missing-value summaries are computed once at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesInstance {
    dimensions: Vec<TimeSeries>,
    label_index: Option<usize>,
    target_value: Option<f64>,
    min_length: usize,
    max_length: usize,
    has_missing: bool,
}

impl TimeSeriesInstance {
    pub fn new(dimensions: Vec<TimeSeries>, label_index: Option<usize>) -> Self {
        Self::build(dimensions, label_index, None)
    }

    /// Labelled instance from raw `[dimension][time]` values.
    pub fn from_values(values: Vec<Vec<f64>>, label_index: usize) -> Self {
        Self::build(
            values.into_iter().map(TimeSeries::new).collect(),
            Some(label_index),
            None,
        )
    }

    /// Regression instance from raw `[dimension][time]` values.
    pub fn with_target(values: Vec<Vec<f64>>, target: f64) -> Self {
        Self::build(
            values.into_iter().map(TimeSeries::new).collect(),
            None,
            Some(target),
        )
    }

    /// Instance without label or target, as seen at prediction time.
    pub fn unlabelled(values: Vec<Vec<f64>>) -> Self {
        Self::build(values.into_iter().map(TimeSeries::new).collect(), None, None)
    }

    fn build(dimensions: Vec<TimeSeries>, label_index: Option<usize>, target_value: Option<f64>) -> Self {
        let min_length = dimensions.iter().map(TimeSeries::len).min().unwrap_or(0);
        let max_length = dimensions.iter().map(TimeSeries::len).max().unwrap_or(0);
        let has_missing = dimensions.iter().any(TimeSeries::has_missing);
        Self {
            dimensions,
            label_index,
            target_value,
            min_length,
            max_length,
            has_missing,
        }
    }

    fn with_dimensions(&self, dimensions: Vec<TimeSeries>) -> Self {
        Self::build(dimensions, self.label_index, self.target_value)
    }

    pub fn dimensions(&self) -> &[TimeSeries] {
        &self.dimensions
    }

    pub fn dimension(&self, index: usize) -> Result<&TimeSeries, DataError> {
        self.dimensions.get(index).ok_or(DataError::IndexOutOfRange {
            axis: "dimension",
            index,
            bound: self.dimensions.len(),
        })
    }

    pub fn num_dimensions(&self) -> usize {
        self.dimensions.len()
    }

    pub fn label_index(&self) -> Option<usize> {
        self.label_index
    }

    pub fn target_value(&self) -> Option<f64> {
        self.target_value
    }

    pub fn min_length(&self) -> usize {
        self.min_length
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn is_equal_length(&self) -> bool {
        self.min_length == self.max_length
    }

    pub fn is_multivariate(&self) -> bool {
        self.dimensions.len() > 1
    }

    pub fn has_missing(&self) -> bool {
        self.has_missing
    }

    pub fn has_time_stamps(&self) -> bool {
        self.dimensions.iter().any(|d| d.timestamps().is_some())
    }

    /// Time points `[start, end)` of every dimension. `end` may not exceed
    /// the longest dimension; shorter dimensions are padded with `NaN`.
    pub fn v_slice(&self, start: usize, end: usize) -> Result<Self, DataError> {
        check_range("time", start, end, self.max_length)?;
        Ok(self.padded_v_slice(start, end))
    }

    pub fn v_slice_indices(&self, indices: &[usize]) -> Result<Self, DataError> {
        check_indices("time", indices, self.max_length)?;
        Ok(self.padded_select(indices))
    }

    pub(crate) fn padded_v_slice(&self, start: usize, end: usize) -> Self {
        self.with_dimensions(self.dimensions.iter().map(|d| d.sub_series(start, end)).collect())
    }

    pub(crate) fn padded_select(&self, indices: &[usize]) -> Self {
        self.with_dimensions(self.dimensions.iter().map(|d| d.select(indices)).collect())
    }

    /// Dimensions `[start, end)`.
    pub fn h_slice(&self, start: usize, end: usize) -> Result<Self, DataError> {
        check_range("dimension", start, end, self.dimensions.len())?;
        Ok(self.with_dimensions(self.dimensions[start..end].to_vec()))
    }

    pub fn h_slice_indices(&self, indices: &[usize]) -> Result<Self, DataError> {
        check_indices("dimension", indices, self.dimensions.len())?;
        Ok(self.with_dimensions(indices.iter().map(|&i| self.dimensions[i].clone()).collect()))
    }

    /// The first `len` points of every dimension, without padding.
    pub fn truncated(&self, len: usize) -> Self {
        self.with_dimensions(self.dimensions.iter().map(|d| d.prefix(len)).collect())
    }

    /// Every dimension z-normalised independently.
    pub fn z_normalised(&self) -> Self {
        self.with_dimensions(self.dimensions.iter().map(TimeSeries::z_normalised).collect())
    }

    /// Value of every dimension at time `index`, `NaN` where a dimension is
    /// too short.
    pub fn values_at(&self, index: usize) -> Vec<f64> {
        self.dimensions
            .iter()
            .map(|d| d.value(index).unwrap_or(f64::NAN))
            .collect()
    }

    /// Raw `[dimension][time]` values.
    pub fn to_value_array(&self) -> Vec<Vec<f64>> {
        self.dimensions.iter().map(|d| d.values().to_vec()).collect()
    }
}

pub(crate) fn check_range(axis: &'static str, start: usize, end: usize, bound: usize) -> Result<(), DataError> {
    if end > bound {
        return Err(DataError::IndexOutOfRange { axis, index: end, bound });
    }
    if start > end {
        return Err(DataError::IndexOutOfRange { axis, index: start, bound: end });
    }
    Ok(())
}

pub(crate) fn check_indices(axis: &'static str, indices: &[usize], bound: usize) -> Result<(), DataError> {
    match indices.iter().find(|&&i| i >= bound) {
        Some(&index) => Err(DataError::IndexOutOfRange { axis, index, bound }),
        None => Ok(()),
    }
}

impl fmt::Display for TimeSeriesInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.label_index, self.target_value) {
            (Some(label), _) => write!(f, "Label: {} ", label)?,
            (None, Some(target)) => write!(f, "Target: {} ", target)?,
            (None, None) => {}
        }
        let dims: Vec<String> = self
            .dimensions
            .iter()
            .map(|d| {
                let vals: Vec<String> = d.values().iter().map(|v| v.to_string()).collect();
                format!("[{}]", vals.join(","))
            })
            .collect();
        write!(f, "{}", dims.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unequal() -> TimeSeriesInstance {
        TimeSeriesInstance::from_values(vec![vec![1.0, 2.0, 3.0, 4.0], vec![5.0, 6.0]], 1)
    }

    #[test]
    fn length_summaries() {
        let inst = unequal();
        assert_eq!(inst.min_length(), 2);
        assert_eq!(inst.max_length(), 4);
        assert!(!inst.is_equal_length());
        assert!(inst.is_multivariate());
        assert!(!inst.has_missing());
    }

    #[test]
    fn v_slice_pads_short_dimensions() {
        let sliced = unequal().v_slice(1, 4).unwrap();
        assert_eq!(sliced.dimensions()[0].values(), &[2.0, 3.0, 4.0]);
        let second = sliced.dimensions()[1].values();
        assert_eq!(second[0], 6.0);
        assert!(second[1].is_nan() && second[2].is_nan());
        assert_eq!(sliced.label_index(), Some(1));
    }

    #[test]
    fn v_slice_rejects_out_of_range() {
        let err = unequal().v_slice(0, 5).unwrap_err();
        assert!(matches!(err, DataError::IndexOutOfRange { axis: "time", index: 5, bound: 4 }));
        assert!(unequal().v_slice(3, 2).is_err());
    }

    #[test]
    fn h_slice_selects_dimensions() {
        let inst = unequal();
        let second = inst.h_slice(1, 2).unwrap();
        assert_eq!(second.num_dimensions(), 1);
        assert_eq!(second.to_value_array(), vec![vec![5.0, 6.0]]);
        assert!(inst.h_slice(0, 3).is_err());
        assert!(inst.h_slice_indices(&[2]).is_err());
    }

    #[test]
    fn truncation_does_not_pad() {
        let t = unequal().truncated(3);
        assert_eq!(t.to_value_array(), vec![vec![1.0, 2.0, 3.0], vec![5.0, 6.0]]);
    }
}
