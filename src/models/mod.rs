//! Classifier training, evaluation and the deployable model bundle

pub mod bundle;
pub mod evaluation;
pub mod gbdt;
pub mod trainer;

pub use bundle::{FittedPipeline, ModelBundle, BUNDLE_FORMAT_VERSION};
pub use evaluation::TrainingMetrics;
pub use gbdt::{FraudClassifier, GbdtParams, GradientBoostedTrees};
pub use trainer::train_bundle;
