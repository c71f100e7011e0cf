//! Feature engineering shared by training and scoring.
//!
//! The same code path turns a training table and a single scoring record
//! into model input: [`schema::reconcile`], then
//! [`derived::add_derived_features`] with frozen [`GroupStatistics`], then the
//! fitted [`FeaturePipeline`].

pub mod catalog;
pub mod derived;
pub mod frame;
pub mod group_stats;
pub mod pipeline;
pub mod schema;

pub use catalog::{describe_features, FeatureInfo, FeatureType};
pub use frame::{ColumnData, ColumnKind, FeatureFrame};
pub use group_stats::GroupStatistics;
pub use pipeline::{DenseMatrix, FeaturePipeline};
pub use schema::{reconcile, LOGICAL_FEATURES};
