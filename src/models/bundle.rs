//! The deployable unit: fitted pipeline plus the frozen statistics it needs.

use crate::features::derived::add_derived_features;
use crate::features::frame::{ColumnKind, FeatureFrame};
use crate::features::group_stats::GroupStatistics;
use crate::features::pipeline::FeaturePipeline;
use crate::features::schema::reconcile;
use crate::models::evaluation::TrainingMetrics;
use crate::models::gbdt::{FraudClassifier, GradientBoostedTrees};
use crate::types::RawRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Serialized bundle layout version
pub const BUNDLE_FORMAT_VERSION: u32 = 1;

/// Preprocessor and classifier, frozen after training
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPipeline {
    pub preprocessor: FeaturePipeline,
    pub classifier: GradientBoostedTrees,
}

impl FittedPipeline {
    /// Probabilities for an already reconciled and derived frame.
    pub fn predict_proba(&self, frame: &FeatureFrame) -> Vec<f64> {
        let matrix = self.preprocessor.transform(frame);
        self.classifier.predict_proba(&matrix)
    }
}

/// Fitted pipeline, feature layout, group statistics and training metrics.
///
/// Immutable once built; a retrain produces a whole new bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    pub format_version: u32,
    pub bundle_id: Uuid,
    pub trained_at: DateTime<Utc>,
    pub pipeline: FittedPipeline,
    /// Frame columns in training order
    pub feature_columns: Vec<String>,
    pub categorical_cols: Vec<String>,
    pub numeric_cols: Vec<String>,
    pub group_stats: GroupStatistics,
    pub training_metrics: TrainingMetrics,
}

impl ModelBundle {
    pub fn new(
        pipeline: FittedPipeline,
        group_stats: GroupStatistics,
        training_metrics: TrainingMetrics,
    ) -> Self {
        let preprocessor = &pipeline.preprocessor;
        let feature_columns = preprocessor
            .layout()
            .iter()
            .map(|(name, _)| name.clone())
            .collect();
        let categorical_cols = preprocessor.categorical_columns();
        let numeric_cols = preprocessor.numeric_columns();

        Self {
            format_version: BUNDLE_FORMAT_VERSION,
            bundle_id: Uuid::new_v4(),
            trained_at: Utc::now(),
            feature_columns,
            categorical_cols,
            numeric_cols,
            group_stats,
            training_metrics,
            pipeline,
        }
    }

    /// Reconcile and derive scoring records with the frozen statistics.
    pub fn feature_frame(&self, records: &[RawRecord]) -> FeatureFrame {
        let mut frame = reconcile(records);
        add_derived_features(&mut frame, &self.group_stats);
        frame
    }

    /// One fraud probability per record, in input order.
    ///
    /// Never fails on partial or malformed records: unknown values are
    /// imputed, unseen categories encode as zeros, extra fields are ignored.
    pub fn predict_proba(&self, records: &[RawRecord]) -> Vec<f64> {
        if records.is_empty() {
            return Vec::new();
        }
        let frame = self.feature_frame(records);
        self.pipeline.predict_proba(&frame)
    }

    /// Training-time layout as (name, kind) pairs.
    pub fn layout(&self) -> &[(String, ColumnKind)] {
        self.pipeline.preprocessor.layout()
    }

    pub fn scale_pos_weight(&self) -> f64 {
        self.pipeline.classifier.scale_pos_weight()
    }

    pub fn overall_median(&self) -> f64 {
        self.group_stats.overall_median()
    }
}
