use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

use crate::data::{TimeSeriesInstance, TimeSeriesInstances};
use crate::models::Classifier;
use crate::preprocessing::truncated_length;
use crate::results::ClassifierResults;

/// Fractions `step, 2 * step, ...` of the series to reveal, the last one
/// capped at the whole series.
pub(crate) fn reveal_fractions(step: f64) -> Vec<f64> {
    let step = step.min(1.0);
    // tolerance keeps 1 / 0.1 from rounding up to an extra step
    let steps = ((1.0 / step - 1e-9).ceil() as usize).max(1);
    itertools_num::linspace(step, step * steps as f64, steps)
        .map(|f| f.min(1.0))
        .collect()
}

/// Test an early classifier by revealing each series in steps of
/// `step` (a fraction of its length) until the classifier commits. The
/// fraction of the series used is stored as each prediction's extra info.
/// A classifier that never commits is asked for a full-length prediction.
pub fn evaluate_early(
    classifier: &dyn Classifier,
    test: &TimeSeriesInstances,
    step: f64,
    normalise: bool,
) -> Result<ClassifierResults> {
    let early = classifier
        .as_early()
        .ok_or_else(|| anyhow!("{} cannot make early decisions", classifier.name()))?;
    let fractions = reveal_fractions(step);
    let prepare = |inst: TimeSeriesInstance| if normalise { inst.z_normalised() } else { inst };

    let mut results = ClassifierResults::new(test.num_classes());
    let mut total = Duration::ZERO;
    for inst in test {
        let length = inst.max_length();
        let start = Instant::now();

        let mut decision = None;
        for &fraction in &fractions {
            let revealed = truncated_length(length, fraction);
            let prefix = prepare(inst.truncated(revealed));
            if let Some(dist) = early.early_distribution(&prefix, length)? {
                decision = Some((dist, revealed));
                break;
            }
        }
        let (dist, revealed) = match decision {
            Some(d) => d,
            None => (classifier.distribution(&prepare(inst.clone()))?, length),
        };

        let elapsed = start.elapsed();
        total += elapsed;
        let earliness = if length == 0 { 1.0 } else { revealed as f64 / length as f64 };
        results.add_prediction(inst.label_index(), dist, Some(elapsed), earliness.to_string())?;
    }
    results.test_time = Some(total);
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: &[f64], b: &[f64]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-9)
    }

    #[test]
    fn fractions_step_evenly_to_the_end() {
        assert!(close(&reveal_fractions(0.25), &[0.25, 0.5, 0.75, 1.0]));
        assert!(close(&reveal_fractions(0.3), &[0.3, 0.6, 0.9, 1.0]));
        assert_eq!(reveal_fractions(0.1).len(), 10);
        assert!(close(&reveal_fractions(1.0), &[1.0]));
    }
}
