//! Full training cycle: reconcile, derive, split, fit, evaluate.

use crate::error::{FraudModelError, Result};
use crate::features::derived::add_derived_features;
use crate::features::group_stats::GroupStatistics;
use crate::features::pipeline::FeaturePipeline;
use crate::features::schema::{detect_target, reconcile, TARGET_CANDIDATES};
use crate::models::bundle::{FittedPipeline, ModelBundle};
use crate::models::evaluation::{
    positive_rate, precision_recall_f1, train_validation_split, TrainingMetrics,
};
use crate::models::gbdt::{GbdtParams, GradientBoostedTrees};
use crate::types::record::coerce_number;
use crate::types::RawTable;
use serde_json::Value;
use std::time::Instant;
use tracing::{info, warn};

/// Share of rows held out for validation metrics
pub const VALIDATION_FRACTION: f64 = 0.2;
/// Probability threshold used for validation metrics
pub const DECISION_THRESHOLD: f64 = 0.5;

/// How a label cell was interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LabelSource {
    YesNo,
    Numeric,
    /// Numeric but neither 0 nor 1, collapsed to 1
    Collapsed,
}

fn parse_label(value: &Value) -> Option<(u8, LabelSource)> {
    if let Value::String(s) = value {
        match s.as_str() {
            "Yes" => return Some((1, LabelSource::YesNo)),
            "No" => return Some((0, LabelSource::YesNo)),
            _ => {}
        }
    }
    let number = coerce_number(value)?;
    // Truncate like an integer cast before testing for zero
    match number.trunc() {
        n if n == 0.0 => Some((0, LabelSource::Numeric)),
        n if n == 1.0 => Some((1, LabelSource::Numeric)),
        _ => Some((1, LabelSource::Collapsed)),
    }
}

/// Extract binary labels from the target column.
///
/// `Yes`/`No` map to 1/0; anything else goes through a permissive numeric
/// cast. Mixed encodings are accepted but logged, since they usually point
/// at a data-quality problem upstream.
pub fn extract_labels(table: &RawTable, target: &str) -> Result<Vec<u8>> {
    let mut labels = Vec::with_capacity(table.len());
    let (mut yes_no, mut numeric, mut collapsed) = (0usize, 0usize, 0usize);

    for (row, record) in table.rows.iter().enumerate() {
        let value = record.get(target).unwrap_or(&Value::Null);
        let Some((label, source)) = parse_label(value) else {
            return Err(FraudModelError::InvalidLabel {
                row,
                value: value.to_string(),
            });
        };
        match source {
            LabelSource::YesNo => yes_no += 1,
            LabelSource::Numeric => numeric += 1,
            LabelSource::Collapsed => collapsed += 1,
        }
        labels.push(label);
    }

    if yes_no > 0 && numeric + collapsed > 0 {
        warn!(
            target = %target,
            yes_no,
            numeric = numeric + collapsed,
            "fraud label column mixes Yes/No with numeric values, numeric values were cast"
        );
    }
    if collapsed > 0 {
        warn!(
            target = %target,
            collapsed,
            "fraud labels outside 0/1 were treated as positive"
        );
    }
    Ok(labels)
}

/// Train a new bundle from a raw training table.
pub fn train_bundle(table: &RawTable, params: &GbdtParams) -> Result<ModelBundle> {
    let started = Instant::now();

    let target = detect_target(&table.columns).ok_or_else(|| FraudModelError::MissingTarget {
        expected: TARGET_CANDIDATES.join(", "),
    })?;
    if table.is_empty() {
        return Err(FraudModelError::EmptyDataset);
    }
    let labels = extract_labels(table, target)?;
    info!(target = %target, rows = table.len(), "training target detected");

    let mut frame = reconcile(&table.rows);
    let group_stats = GroupStatistics::compute(&frame);
    add_derived_features(&mut frame, &group_stats);

    let split = train_validation_split(&labels, VALIDATION_FRACTION, params.seed);
    let train_frame = frame.select_rows(&split.train);
    let train_labels: Vec<u8> = split.train.iter().map(|&i| labels[i]).collect();

    let preprocessor = FeaturePipeline::fit(&train_frame);
    let matrix = preprocessor.transform(&train_frame);
    let classifier = GradientBoostedTrees::fit(&matrix, &train_labels, params);
    let pipeline = FittedPipeline {
        preprocessor,
        classifier,
    };

    let validation_labels: Vec<u8> = split.validation.iter().map(|&i| labels[i]).collect();
    let validation_proba = pipeline.predict_proba(&frame.select_rows(&split.validation));
    let (precision, recall, f1) =
        precision_recall_f1(&validation_proba, &validation_labels, DECISION_THRESHOLD);
    let metrics = TrainingMetrics {
        precision,
        recall,
        f1,
        target_positive_rate: positive_rate(&labels),
    };

    let bundle = ModelBundle::new(pipeline, group_stats, metrics);
    info!(
        bundle_id = %bundle.bundle_id,
        train_rows = split.train.len(),
        validation_rows = split.validation.len(),
        groups = bundle.group_stats.len(),
        overall_median = bundle.overall_median(),
        scale_pos_weight = bundle.scale_pos_weight(),
        precision = bundle.training_metrics.precision,
        recall = bundle.training_metrics.recall,
        f1 = bundle.training_metrics.f1,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "fraud model trained"
    );
    Ok(bundle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawRecord;
    use serde_json::json;

    fn table(rows: Vec<serde_json::Value>) -> RawTable {
        let rows: Vec<RawRecord> = rows
            .into_iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect();
        let mut columns: Vec<String> = rows
            .iter()
            .flat_map(|r| r.keys().cloned())
            .collect();
        columns.sort();
        columns.dedup();
        RawTable::new(columns, rows)
    }

    fn small_params() -> GbdtParams {
        GbdtParams {
            n_estimators: 10,
            ..GbdtParams::default()
        }
    }

    #[test]
    fn test_missing_target_is_schema_error() {
        let t = table(vec![json!({"ClaimAmount": 1})]);
        let err = train_bundle(&t, &small_params()).unwrap_err();
        assert!(matches!(err, FraudModelError::MissingTarget { .. }));
    }

    #[test]
    fn test_label_parsing() {
        let t = table(vec![
            json!({"fraud": "Yes"}),
            json!({"fraud": "No"}),
            json!({"fraud": 1}),
            json!({"fraud": "0"}),
            json!({"fraud": 2.0}),
        ]);
        assert_eq!(extract_labels(&t, "fraud").unwrap(), vec![1, 0, 1, 0, 1]);

        let bad = table(vec![json!({"fraud": "maybe"})]);
        assert!(matches!(
            extract_labels(&bad, "fraud"),
            Err(FraudModelError::InvalidLabel { row: 0, .. })
        ));
    }

    #[test]
    fn test_scale_pos_weight_from_imbalanced_table() {
        let mut rows = Vec::new();
        for i in 0..1000 {
            rows.push(json!({
                "ClaimAmount": 10000,
                "DRGDefinition": "470",
                "AmountPaid": 2000,
                "PotentialFraud": if i < 100 { "Yes" } else { "No" },
            }));
        }
        let bundle = train_bundle(&table(rows), &small_params()).unwrap();

        assert_eq!(bundle.scale_pos_weight(), 9.0);
        assert_eq!(bundle.training_metrics.target_positive_rate, 0.1);
        assert_eq!(bundle.group_stats.group_medians().get("470"), Some(&10000.0));
        assert_eq!(bundle.overall_median(), 10000.0);
    }

    #[test]
    fn test_bundle_layout_partition() {
        let rows: Vec<_> = (0..20)
            .map(|i| json!({"claim_amount": i * 100, "drg_code": "470", "is_fraud": i % 2}))
            .collect();
        let bundle = train_bundle(&table(rows), &small_params()).unwrap();

        assert_eq!(bundle.feature_columns.len(), 18);
        assert_eq!(bundle.categorical_cols.len(), 9);
        assert_eq!(bundle.numeric_cols.len(), 9);
        assert_eq!(bundle.feature_columns.last().unwrap(), "possible_drg_upcoding");
    }
}
