//! Classifier capability traits, the name registry and the built-in
//! classifiers.

pub mod classifier_trait;
pub mod ensemble;
pub mod knn;
pub mod majority;
pub mod registry;

pub use classifier_trait::{
    Capability, Checkpointable, Classifier, Contractable, EarlyClassifier, Loggable,
    MultiThreadable, ParameterSplittable, Seedable, SelfEstimating, Serializable, TrainCost,
    Visualisable,
};
pub use ensemble::DimensionEnsemble;
pub use knn::{EarlyKnn, KNearestNeighbours};
pub use majority::MajorityClass;
pub use registry::{ClassifierFactory, ClassifierRegistry};
