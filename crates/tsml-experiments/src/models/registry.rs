use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::ExperimentError;
use crate::models::{Classifier, DimensionEnsemble, EarlyKnn, KNearestNeighbours, MajorityClass};

/// Builds a fresh, unconfigured classifier.
pub type ClassifierFactory = Arc<dyn Fn() -> Box<dyn Classifier> + Send + Sync>;

/// Maps classifier names, as used on the command line and in results
/// directories, to factories.
#[derive(Clone, Default)]
pub struct ClassifierRegistry {
    factories: BTreeMap<String, ClassifierFactory>,
}

impl ClassifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in classifiers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("MajorityClass", || Box::new(MajorityClass::new()));
        registry.register("1NN", || Box::new(KNearestNeighbours::new(1).named("1NN")));
        registry.register("5NN", || Box::new(KNearestNeighbours::new(5).named("5NN")));
        registry.register("EarlyKNN", || Box::new(EarlyKnn::default()));
        registry.register("DimensionEnsemble", || Box::new(DimensionEnsemble::default()));
        registry
    }

    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn Classifier> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Arc::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn factory(&self, name: &str) -> Result<ClassifierFactory, ExperimentError> {
        self.factories
            .get(name)
            .cloned()
            .ok_or_else(|| ExperimentError::UnknownClassifier(name.to_string()))
    }

    pub fn create(&self, name: &str) -> Result<Box<dyn Classifier>, ExperimentError> {
        Ok((self.factory(name)?)())
    }
}

impl std::fmt::Debug for ClassifierRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}
