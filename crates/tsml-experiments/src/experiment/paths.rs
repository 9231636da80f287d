use std::path::PathBuf;

use crate::experiment::config::ExperimentConfig;

/// File locations for one unit of work.
///
/// ```text
/// <results>/<name>/Predictions/<dataset>/trainFold<f>.csv
/// <results>/<name>/Predictions/<dataset>/testFold<f>.csv
/// <results>/<name>/Predictions/<dataset>/fold<f>.lock
/// <results>/<name>/Workspace/<dataset>/fold<f>/          checkpoints
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ResultPaths {
    pub predictions_dir: PathBuf,
    pub train_file: PathBuf,
    pub test_file: PathBuf,
    pub lock_file: PathBuf,
    pub workspace_dir: PathBuf,
    pub checkpoint_dir: PathBuf,
    pub serialised_file: PathBuf,
    pub visualisation_dir: PathBuf,
}

impl ResultPaths {
    /// Paths for `config` with results stored under `results_name`.
    pub fn new(config: &ExperimentConfig, results_name: &str) -> Self {
        let fold = config.fold;
        let dataset = &config.dataset_name;
        let predictions_dir = config
            .results_path
            .join(results_name)
            .join("Predictions")
            .join(dataset);
        let workspace_dir = match &config.supporting_path {
            Some(base) => base.join(results_name).join(dataset),
            None => config.results_path.join(results_name).join("Workspace").join(dataset),
        };

        let train_name = match config.single_parameter_id {
            Some(id) => format!("fold{}_{}.csv", fold, id),
            None => format!("trainFold{}.csv", fold),
        };

        Self {
            train_file: predictions_dir.join(train_name),
            test_file: predictions_dir.join(format!("testFold{}.csv", fold)),
            lock_file: predictions_dir.join(format!("fold{}.lock", fold)),
            checkpoint_dir: workspace_dir.join(format!("fold{}", fold)),
            serialised_file: workspace_dir.join(format!("{}_{}_{}.json", results_name, dataset, fold)),
            visualisation_dir: workspace_dir.join(format!("fold{}_visualisation", fold)),
            predictions_dir,
            workspace_dir,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn layout() {
        let cfg = ExperimentConfig::new("data", "res", "1NN", "Toy", 4);
        let p = ResultPaths::new(&cfg, "1NN_1h");
        assert_eq!(p.test_file, Path::new("res/1NN_1h/Predictions/Toy/testFold4.csv"));
        assert_eq!(p.train_file, Path::new("res/1NN_1h/Predictions/Toy/trainFold4.csv"));
        assert_eq!(p.lock_file, Path::new("res/1NN_1h/Predictions/Toy/fold4.lock"));
        assert_eq!(p.checkpoint_dir, Path::new("res/1NN_1h/Workspace/Toy/fold4"));
    }

    #[test]
    fn parameter_search_file_name() {
        let mut cfg = ExperimentConfig::new("data", "res", "1NN", "Toy", 2);
        cfg.single_parameter_id = Some(3);
        let p = ResultPaths::new(&cfg, "1NN");
        assert_eq!(p.train_file, Path::new("res/1NN/Predictions/Toy/fold2_3.csv"));
    }
}
