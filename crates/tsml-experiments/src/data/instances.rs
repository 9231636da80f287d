use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::OnceLock;

use crate::data::instance::{check_indices, check_range, TimeSeriesInstance};
use crate::error::DataError;
use crate::preprocessing;

/// Length and shape aggregates over a non-empty dataset.
#[derive(Debug, Clone, Copy)]
struct ShapeStats {
    min_length: usize,
    max_length: usize,
    max_num_dimensions: usize,
}

impl ShapeStats {
    fn of(inst: &TimeSeriesInstance) -> Self {
        Self {
            min_length: inst.min_length(),
            max_length: inst.max_length(),
            max_num_dimensions: inst.num_dimensions(),
        }
    }

    fn merge(self, inst: &TimeSeriesInstance) -> Self {
        Self {
            min_length: self.min_length.min(inst.min_length()),
            max_length: self.max_length.max(inst.max_length()),
            max_num_dimensions: self.max_num_dimensions.max(inst.num_dimensions()),
        }
    }
}

/// An ordered collection of [`TimeSeriesInstance`]s sharing one class label
/// table.
///
/// A dataset with a non-empty label table is a classification problem and
/// every instance must carry a label index into that table. Shape
/// aggregates are maintained on every [`add`](Self::add); class counts are
/// computed on first use and then kept up to date.
#[derive(Debug, Clone)]
pub struct TimeSeriesInstances {
    instances: Vec<TimeSeriesInstance>,
    class_labels: Vec<String>,
    problem_name: String,
    description: String,
    shape: Option<ShapeStats>,
    has_missing: bool,
    is_multivariate: bool,
    has_time_stamps: bool,
    class_counts: OnceLock<Vec<usize>>,
}

impl TimeSeriesInstances {
    /// Empty dataset over `class_labels`. Labels must be unique; pass an
    /// empty table for regression data.
    pub fn new(class_labels: Vec<String>) -> Result<Self, DataError> {
        let mut seen = HashSet::new();
        if let Some(dup) = class_labels.iter().find(|l| !seen.insert(l.as_str())) {
            return Err(DataError::InvalidData(format!("duplicate class label '{}'", dup)));
        }
        Ok(Self {
            instances: Vec::new(),
            class_labels,
            problem_name: "default".to_string(),
            description: String::new(),
            shape: None,
            has_missing: false,
            is_multivariate: false,
            has_time_stamps: false,
            class_counts: OnceLock::new(),
        })
    }

    pub fn from_instances(
        instances: Vec<TimeSeriesInstance>,
        class_labels: Vec<String>,
    ) -> Result<Self, DataError> {
        let mut data = Self::new(class_labels)?;
        data.instances.reserve(instances.len());
        for inst in instances {
            data.add(inst)?;
        }
        Ok(data)
    }

    /// Classification dataset from raw `[instance][dimension][time]` values
    /// and one label index per instance.
    pub fn from_raw(
        raw: Vec<Vec<Vec<f64>>>,
        label_indexes: &[usize],
        class_labels: Vec<String>,
    ) -> Result<Self, DataError> {
        if raw.len() != label_indexes.len() {
            return Err(DataError::InvalidData(format!(
                "{} series but {} labels",
                raw.len(),
                label_indexes.len()
            )));
        }
        let instances = raw
            .into_iter()
            .zip(label_indexes)
            .map(|(values, &label)| TimeSeriesInstance::from_values(values, label))
            .collect();
        Self::from_instances(instances, class_labels)
    }

    /// Regression dataset from raw values and one target per instance.
    pub fn regression(raw: Vec<Vec<Vec<f64>>>, targets: &[f64]) -> Result<Self, DataError> {
        if raw.len() != targets.len() {
            return Err(DataError::InvalidData(format!(
                "{} series but {} targets",
                raw.len(),
                targets.len()
            )));
        }
        let instances = raw
            .into_iter()
            .zip(targets)
            .map(|(values, &t)| TimeSeriesInstance::with_target(values, t))
            .collect();
        Self::from_instances(instances, Vec::new())
    }

    pub fn with_problem_name(mut self, name: impl Into<String>) -> Self {
        self.problem_name = name.into();
        self
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    /// Append an instance, updating every cached aggregate.
    pub fn add(&mut self, inst: TimeSeriesInstance) -> Result<(), DataError> {
        if self.is_classification() {
            let label = inst.label_index().ok_or_else(|| {
                DataError::InvalidData("unlabelled instance in a classification dataset".to_string())
            })?;
            if label >= self.class_labels.len() {
                return Err(DataError::LabelOutOfRange {
                    label,
                    num_classes: self.class_labels.len(),
                });
            }
            if let Some(counts) = self.class_counts.get_mut() {
                counts[label] += 1;
            }
        } else if let Some(label) = inst.label_index() {
            return Err(DataError::InvalidData(format!(
                "instance has class label index {} but the dataset has no label table",
                label
            )));
        }

        self.shape = Some(match self.shape {
            Some(s) => s.merge(&inst),
            None => ShapeStats::of(&inst),
        });
        self.has_missing |= inst.has_missing();
        self.is_multivariate |= inst.is_multivariate();
        self.has_time_stamps |= inst.has_time_stamps();
        self.instances.push(inst);
        Ok(())
    }

    pub fn problem_name(&self) -> &str {
        &self.problem_name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn instances(&self) -> &[TimeSeriesInstance] {
        &self.instances
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TimeSeriesInstance> {
        self.instances.iter()
    }

    pub fn get(&self, index: usize) -> Result<&TimeSeriesInstance, DataError> {
        self.instances.get(index).ok_or(DataError::IndexOutOfRange {
            axis: "instance",
            index,
            bound: self.instances.len(),
        })
    }

    pub fn class_labels(&self) -> &[String] {
        &self.class_labels
    }

    pub fn num_classes(&self) -> usize {
        self.class_labels.len()
    }

    pub fn is_classification(&self) -> bool {
        !self.class_labels.is_empty()
    }

    /// Label index of every instance, in order.
    pub fn class_indexes(&self) -> Vec<usize> {
        self.instances.iter().filter_map(|i| i.label_index()).collect()
    }

    /// Number of instances per class label; sums to [`len`](Self::len) for
    /// classification data.
    pub fn class_counts(&self) -> &[usize] {
        self.class_counts.get_or_init(|| {
            let mut counts = vec![0; self.class_labels.len()];
            for label in self.instances.iter().filter_map(|i| i.label_index()) {
                if let Some(count) = counts.get_mut(label) {
                    *count += 1;
                }
            }
            counts
        })
    }

    fn shape(&self) -> Result<ShapeStats, DataError> {
        self.shape.ok_or(DataError::EmptyDataset)
    }

    pub fn min_length(&self) -> Result<usize, DataError> {
        Ok(self.shape()?.min_length)
    }

    pub fn max_length(&self) -> Result<usize, DataError> {
        Ok(self.shape()?.max_length)
    }

    pub fn max_num_dimensions(&self) -> Result<usize, DataError> {
        Ok(self.shape()?.max_num_dimensions)
    }

    /// True iff every dimension of every instance has the same length.
    pub fn is_equal_length(&self) -> Result<bool, DataError> {
        let shape = self.shape()?;
        Ok(shape.min_length == shape.max_length)
    }

    pub fn is_multivariate(&self) -> bool {
        self.is_multivariate
    }

    pub fn has_missing(&self) -> bool {
        self.has_missing
    }

    pub fn has_time_stamps(&self) -> bool {
        self.has_time_stamps
    }

    /// Count of instances per (longest dimension) length.
    pub fn histogram_of_lengths(&self) -> BTreeMap<usize, usize> {
        let mut hist = BTreeMap::new();
        for inst in &self.instances {
            *hist.entry(inst.max_length()).or_insert(0) += 1;
        }
        hist
    }

    fn derive(&self, instances: Vec<TimeSeriesInstance>) -> Result<Self, DataError> {
        let mut out = Self::from_instances(instances, self.class_labels.clone())?;
        out.problem_name = self.problem_name.clone();
        out.description = self.description.clone();
        Ok(out)
    }

    fn map_instances<F>(&self, f: F) -> Result<Self, DataError>
    where
        F: Fn(&TimeSeriesInstance) -> Result<TimeSeriesInstance, DataError>,
    {
        let instances = self.instances.iter().map(f).collect::<Result<Vec<_>, _>>()?;
        self.derive(instances)
    }

    /// Deep copy of the instances at `indices`, in the given order.
    pub fn subset(&self, indices: &[usize]) -> Result<Self, DataError> {
        check_indices("instance", indices, self.instances.len())?;
        self.derive(indices.iter().map(|&i| self.instances[i].clone()).collect())
    }

    /// New dataset holding time points `[start, end)` of every instance.
    /// `end` is bounded by the dataset's maximum length; instances shorter
    /// than `end` are padded with `NaN`.
    pub fn v_slice(&self, start: usize, end: usize) -> Result<Self, DataError> {
        check_range("time", start, end, self.max_length()?)?;
        self.map_instances(|i| Ok(i.padded_v_slice(start, end)))
    }

    pub fn v_slice_indices(&self, indices: &[usize]) -> Result<Self, DataError> {
        check_indices("time", indices, self.max_length()?)?;
        self.map_instances(|i| Ok(i.padded_select(indices)))
    }

    /// New dataset holding dimensions `[start, end)` of every instance.
    pub fn h_slice(&self, start: usize, end: usize) -> Result<Self, DataError> {
        check_range("dimension", start, end, self.max_num_dimensions()?)?;
        self.map_instances(|i| i.h_slice(start, end))
    }

    pub fn h_slice_indices(&self, indices: &[usize]) -> Result<Self, DataError> {
        check_indices("dimension", indices, self.max_num_dimensions()?)?;
        self.map_instances(|i| i.h_slice_indices(indices))
    }

    /// `[instance][dimension]` values at time `index`, `NaN` where an
    /// instance has no value there.
    pub fn v_slice_array(&self, index: usize) -> Result<Vec<Vec<f64>>, DataError> {
        check_indices("time", &[index], self.max_length()?)?;
        Ok(self.instances.iter().map(|i| i.values_at(index)).collect())
    }

    /// `[instance][time]` values of dimension `dim`.
    pub fn h_slice_array(&self, dim: usize) -> Result<Vec<Vec<f64>>, DataError> {
        self.instances
            .iter()
            .map(|i| Ok(i.dimension(dim)?.values().to_vec()))
            .collect()
    }

    /// Raw `[instance][dimension][time]` values.
    pub fn to_value_array(&self) -> Vec<Vec<Vec<f64>>> {
        self.instances.iter().map(TimeSeriesInstance::to_value_array).collect()
    }

    /// Every instance cut to `proportion` of its own longest dimension.
    pub fn truncated(&self, proportion: f64) -> Result<Self, DataError> {
        self.map_instances(|i| {
            Ok(i.truncated(preprocessing::truncated_length(i.max_length(), proportion)))
        })
    }

    /// Every series of every instance z-normalised.
    pub fn z_normalised(&self) -> Result<Self, DataError> {
        self.map_instances(|i| Ok(i.z_normalised()))
    }
}

impl PartialEq for TimeSeriesInstances {
    fn eq(&self, other: &Self) -> bool {
        self.class_labels == other.class_labels && self.instances == other.instances
    }
}

impl<'a> IntoIterator for &'a TimeSeriesInstances {
    type Item = &'a TimeSeriesInstance;
    type IntoIter = std::slice::Iter<'a, TimeSeriesInstance>;

    fn into_iter(self) -> Self::IntoIter {
        self.instances.iter()
    }
}

impl fmt::Display for TimeSeriesInstances {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Labels: [{}]", self.class_labels.join(","))?;
        for inst in &self.instances {
            writeln!(f, "{}", inst)?;
        }
        Ok(())
    }
}
