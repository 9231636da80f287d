//! Reconciles a classifier's self-reported costs with the controller's own
//! measurements into the train result record.
use std::time::Duration;

use crate::error::ExperimentError;
use crate::models::Classifier;
use crate::results::ClassifierResults;

/// What the controller measured around the training call.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrainMeasurements {
    pub build_time: Duration,
    pub memory: Option<u64>,
    pub benchmark_time: Option<Duration>,
}

/// Build the train record for a finished `build`.
///
/// - Classifier-reported build time and memory take precedence over the
///   controller's measurements.
/// - With an external estimate, build-plus-estimate time is the build time
///   plus the evaluator's time.
/// - With a self-estimate, the classifier's own train results are used and
///   its build time already covers the estimate.
/// - Without an estimate the record carries costs but no predictions.
pub fn finalise_train_results(
    classifier: &mut dyn Classifier,
    external_estimate: Option<ClassifierResults>,
    estimate_requested: bool,
    num_classes: usize,
    measured: &TrainMeasurements,
) -> Result<ClassifierResults, ExperimentError> {
    let reported = classifier.reported_cost();
    let build_time = reported.map_or(measured.build_time, |c| c.build_time);
    let memory = reported.and_then(|c| c.memory).or(measured.memory);

    let mut results = match (estimate_requested, external_estimate) {
        (true, Some(mut external)) => {
            let estimate_time = external.error_estimate_time.unwrap_or_default();
            external.build_plus_estimate_time = Some(build_time + estimate_time);
            external
        }
        (true, None) => {
            let mut own = classifier
                .as_self_estimating()
                .and_then(|s| s.train_results())
                .ok_or_else(|| {
                    ExperimentError::TrainingFailure(format!(
                        "{} did not produce the requested train estimate",
                        classifier.name()
                    ))
                })?;
            if let Some(t) = reported.and_then(|c| c.error_estimate_time) {
                own.error_estimate_time = Some(t);
            }
            own.build_plus_estimate_time = Some(build_time);
            own
        }
        (false, _) => {
            let mut bare = ClassifierResults::new(num_classes);
            bare.build_plus_estimate_time = Some(build_time);
            bare
        }
    };

    results.num_classes = num_classes;
    results.build_time = Some(build_time);
    results.memory = memory;
    results.benchmark_time = measured.benchmark_time;
    results.parameters = classifier.parameters();
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TimeSeriesInstances;
    use crate::models::{KNearestNeighbours, MajorityClass, SelfEstimating};

    fn data() -> TimeSeriesInstances {
        TimeSeriesInstances::from_raw(
            (0..6).map(|i| vec![vec![i as f64; 3]]).collect(),
            &[0, 0, 0, 1, 1, 1],
            vec!["a".into(), "b".into()],
        )
        .unwrap()
    }

    fn measured() -> TrainMeasurements {
        TrainMeasurements {
            build_time: Duration::from_secs(100),
            memory: Some(42),
            benchmark_time: Some(Duration::from_millis(7)),
        }
    }

    #[test]
    fn reported_build_time_wins() {
        let mut clf = KNearestNeighbours::new(1);
        clf.build(&data()).unwrap();
        let res = finalise_train_results(&mut clf, None, false, 2, &measured()).unwrap();
        assert!(res.build_time.unwrap() < Duration::from_secs(100));
        assert_eq!(res.memory, Some(42));
        assert_eq!(res.benchmark_time, Some(Duration::from_millis(7)));
        assert!(res.is_empty());
        assert!(res.parameters.starts_with("k,1"));
    }

    #[test]
    fn measured_time_used_when_not_reported() {
        let mut clf = MajorityClass::new();
        clf.build(&data()).unwrap();
        let mut external = ClassifierResults::new(2);
        external.error_estimate_time = Some(Duration::from_secs(20));
        let res = finalise_train_results(&mut clf, Some(external), true, 2, &measured()).unwrap();
        assert_eq!(res.build_time, Some(Duration::from_secs(100)));
        assert_eq!(res.build_plus_estimate_time, Some(Duration::from_secs(120)));
    }

    #[test]
    fn self_estimate_is_taken_from_classifier() {
        let mut clf = KNearestNeighbours::new(1);
        clf.set_estimate_own_performance(true);
        clf.build(&data()).unwrap();
        let res = finalise_train_results(&mut clf, None, true, 2, &measured()).unwrap();
        assert_eq!(res.len(), 6);
        assert_eq!(res.error_estimate_method, "LOOCV");
        assert_eq!(res.build_plus_estimate_time, res.build_time);
    }

    #[test]
    fn missing_self_estimate_is_training_failure() {
        let mut clf = MajorityClass::new();
        clf.build(&data()).unwrap();
        let err = finalise_train_results(&mut clf, None, true, 2, &measured()).unwrap_err();
        assert!(matches!(err, ExperimentError::TrainingFailure(_)));
    }
}
