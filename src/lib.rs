//! Claim Fraud Scoring Library
//!
//! Reconciles heterogeneous insurance-claim schemas into a fixed feature
//! set, derives upcoding signals anchored on training-time DRG medians,
//! trains a gradient-boosted classifier and serves fraud probabilities with
//! the exact same feature construction used in training.

pub mod config;
pub mod dataset;
pub mod error;
pub mod features;
pub mod metrics;
pub mod models;
pub mod service;
pub mod storage;
pub mod types;

pub use config::AppConfig;
pub use error::{FraudModelError, Result};
pub use features::{describe_features, FeatureInfo};
pub use models::{train_bundle, ModelBundle};
pub use service::{ScoringService, ServiceState};
pub use types::{ClaimPrediction, FraudLabel, RawRecord, RawTable};
