use anyhow::{bail, Result};

use crate::data::{TimeSeriesInstance, TimeSeriesInstances};
use crate::models::Classifier;
use crate::results::argmax;

/// Baseline that always predicts the most frequent training class, with
/// ties resolved to the lowest label index.
#[derive(Debug, Clone, Default)]
pub struct MajorityClass {
    num_classes: usize,
    majority: Option<usize>,
}

impl MajorityClass {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Classifier for MajorityClass {
    fn name(&self) -> &str {
        "MajorityClass"
    }

    fn build(&mut self, data: &TimeSeriesInstances) -> Result<()> {
        if !data.is_classification() || data.is_empty() {
            bail!("MajorityClass needs a non-empty classification dataset");
        }
        let counts: Vec<f64> = data.class_counts().iter().map(|&c| c as f64).collect();
        self.num_classes = counts.len();
        self.majority = Some(argmax(&counts));
        log::trace!("MajorityClass picked class {:?} from {:?}", self.majority, counts);
        Ok(())
    }

    fn distribution(&self, _inst: &TimeSeriesInstance) -> Result<Vec<f64>> {
        let Some(majority) = self.majority else {
            bail!("MajorityClass has not been built");
        };
        let mut dist = vec![0.0; self.num_classes];
        dist[majority] = 1.0;
        Ok(dist)
    }

    fn parameters(&self) -> String {
        format!("majorityClass,{}", self.majority.map_or(-1, |m| m as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ties_resolve_to_lowest_label() {
        let data = TimeSeriesInstances::from_raw(
            (0..10).map(|i| vec![vec![i as f64]]).collect(),
            &[1, 1, 1, 1, 1, 0, 0, 0, 0, 0],
            vec!["x".into(), "y".into()],
        )
        .unwrap();
        let mut clf = MajorityClass::new();
        clf.build(&data).unwrap();
        let probe = TimeSeriesInstance::unlabelled(vec![vec![0.0]]);
        assert_eq!(clf.distribution(&probe).unwrap(), vec![1.0, 0.0]);
        assert_eq!(clf.classify(&probe).unwrap(), 0);
    }

    #[test]
    fn predicting_before_build_fails() {
        let probe = TimeSeriesInstance::unlabelled(vec![vec![0.0]]);
        assert!(MajorityClass::new().distribution(&probe).is_err());
    }
}
