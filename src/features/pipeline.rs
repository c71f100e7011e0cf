//! Two-branch feature transform fitted once at training time.
//!
//! Categorical branch: most-frequent imputation, then one-hot encoding with
//! unseen categories encoded as all zeros. Numeric branch: median imputation,
//! then standardization. Output columns are every categorical block in
//! layout order followed by every numeric column in layout order.

use crate::features::frame::{ColumnData, ColumnKind, FeatureFrame};
use crate::features::group_stats::median;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Row-major dense matrix handed to the classifier
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix {
    n_rows: usize,
    n_cols: usize,
    data: Vec<f64>,
}

impl DenseMatrix {
    pub fn zeros(n_rows: usize, n_cols: usize) -> Self {
        Self {
            n_rows,
            n_cols,
            data: vec![0.0; n_rows * n_cols],
        }
    }

    /// Build from row vectors.
    ///
    /// # Panics
    /// Panics if rows have differing lengths.
    pub fn from_rows(rows: &[Vec<f64>]) -> Self {
        let n_cols = rows.first().map(Vec::len).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * n_cols);
        for row in rows {
            assert_eq!(row.len(), n_cols, "ragged rows");
            data.extend_from_slice(row);
        }
        Self {
            n_rows: rows.len(),
            n_cols,
            data,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n_cols..(i + 1) * self.n_cols]
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.n_cols + col]
    }

    fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.n_cols + col] = value;
    }
}

/// Fitted state of one categorical column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalEncoder {
    pub column: String,
    /// Most frequent training value, used for missing cells
    pub fill_value: String,
    /// Sorted training categories; one output column each
    pub categories: Vec<String>,
}

impl CategoricalEncoder {
    fn fit(column: &str, values: &[Option<String>]) -> Self {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for value in values.iter().flatten() {
            *counts.entry(value.as_str()).or_default() += 1;
        }
        // Ties resolve to the smallest value: BTreeMap iterates in order and
        // only a strictly greater count replaces the current pick.
        let fill_value = counts
            .iter()
            .fold(None::<(&str, usize)>, |best, (&value, &count)| match best {
                Some((_, best_count)) if best_count >= count => best,
                _ => Some((value, count)),
            })
            .map(|(value, _)| value.to_string())
            .unwrap_or_default();

        let mut categories: Vec<String> = counts.keys().map(|v| v.to_string()).collect();
        if categories.is_empty() {
            categories.push(fill_value.clone());
        }

        Self {
            column: column.to_string(),
            fill_value,
            categories,
        }
    }

    /// Output index of `value`, or `None` for a category never seen in training.
    fn index_of(&self, value: Option<&str>) -> Option<usize> {
        let value = value.unwrap_or(&self.fill_value);
        self.categories.binary_search_by(|c| c.as_str().cmp(value)).ok()
    }
}

/// Fitted state of one numeric column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericScaler {
    pub column: String,
    /// Training median, used for missing cells
    pub fill_value: f64,
    pub mean: f64,
    /// Population standard deviation; 1.0 for constant columns
    pub scale: f64,
}

impl NumericScaler {
    fn fit(column: &str, values: &[Option<f64>]) -> Self {
        let mut observed: Vec<f64> = values.iter().flatten().copied().collect();
        // An entirely missing column imputes to zero
        let fill_value = median(&mut observed).unwrap_or(0.0);

        let imputed: Vec<f64> = values.iter().map(|v| v.unwrap_or(fill_value)).collect();
        let n = imputed.len().max(1) as f64;
        let mean = imputed.iter().sum::<f64>() / n;
        let variance = imputed.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();
        let scale = if std > f64::EPSILON * mean.abs().max(1.0) {
            std
        } else {
            1.0
        };

        Self {
            column: column.to_string(),
            fill_value,
            mean,
            scale,
        }
    }

    fn transform(&self, value: Option<f64>) -> f64 {
        (value.unwrap_or(self.fill_value) - self.mean) / self.scale
    }
}

/// Frozen preprocessing for the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturePipeline {
    /// Column layout the pipeline was fitted on, in training order
    layout: Vec<(String, ColumnKind)>,
    categorical: Vec<CategoricalEncoder>,
    numeric: Vec<NumericScaler>,
}

impl FeaturePipeline {
    /// Fit imputers, encoder and scaler on a training frame.
    pub fn fit(frame: &FeatureFrame) -> Self {
        let mut layout = Vec::with_capacity(frame.columns().len());
        let mut categorical = Vec::new();
        let mut numeric = Vec::new();

        for column in frame.columns() {
            layout.push((column.name.clone(), column.data.kind()));
            match &column.data {
                ColumnData::Categorical(values) => {
                    categorical.push(CategoricalEncoder::fit(&column.name, values))
                }
                ColumnData::Numeric(values) => {
                    numeric.push(NumericScaler::fit(&column.name, values))
                }
            }
        }

        let pipeline = Self {
            layout,
            categorical,
            numeric,
        };
        debug!(
            input_columns = pipeline.layout.len(),
            output_columns = pipeline.output_width(),
            "feature pipeline fitted"
        );
        pipeline
    }

    /// Training-time column layout.
    pub fn layout(&self) -> &[(String, ColumnKind)] {
        &self.layout
    }

    pub fn categorical_columns(&self) -> Vec<String> {
        self.categorical.iter().map(|e| e.column.clone()).collect()
    }

    pub fn numeric_columns(&self) -> Vec<String> {
        self.numeric.iter().map(|s| s.column.clone()).collect()
    }

    /// Number of output columns after one-hot expansion.
    pub fn output_width(&self) -> usize {
        self.categorical.iter().map(|e| e.categories.len()).sum::<usize>() + self.numeric.len()
    }

    /// Names of the output columns, `column=category` for one-hot blocks.
    pub fn output_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.output_width());
        for encoder in &self.categorical {
            for category in &encoder.categories {
                names.push(format!("{}={}", encoder.column, category));
            }
        }
        names.extend(self.numeric.iter().map(|s| s.column.clone()));
        names
    }

    /// Apply the frozen transform.
    ///
    /// The frame is first aligned to the training layout: absent columns are
    /// injected as entirely missing and order is forced to match training.
    pub fn transform(&self, frame: &FeatureFrame) -> DenseMatrix {
        let frame = frame.aligned(&self.layout);
        let n = frame.n_rows();
        let mut out = DenseMatrix::zeros(n, self.output_width());

        let mut offset = 0;
        for encoder in &self.categorical {
            if let Some(values) = frame.categorical(&encoder.column) {
                for (row, value) in values.iter().enumerate() {
                    if let Some(idx) = encoder.index_of(value.as_deref()) {
                        out.set(row, offset + idx, 1.0);
                    }
                }
            }
            offset += encoder.categories.len();
        }

        for scaler in &self.numeric {
            if let Some(values) = frame.numeric(&scaler.column) {
                for (row, value) in values.iter().enumerate() {
                    out.set(row, offset, scaler.transform(*value));
                }
            }
            offset += 1;
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn training_frame() -> FeatureFrame {
        let mut frame = FeatureFrame::new(4);
        frame.set_column(
            "gender",
            ColumnData::Categorical(vec![
                Some("M".into()),
                Some("F".into()),
                Some("F".into()),
                None,
            ]),
            true,
        );
        frame.set_column(
            "claim_amount",
            ColumnData::Numeric(vec![Some(1.0), Some(3.0), None, Some(5.0)]),
            true,
        );
        frame
    }

    #[test]
    fn test_fit_statistics() {
        let pipeline = FeaturePipeline::fit(&training_frame());

        assert_eq!(pipeline.categorical[0].fill_value, "F");
        assert_eq!(pipeline.categorical[0].categories, vec!["F", "M"]);
        let scaler = &pipeline.numeric[0];
        assert_eq!(scaler.fill_value, 3.0);
        assert_eq!(scaler.mean, 3.0);
        assert!((scaler.scale - 2.0_f64.sqrt()).abs() < 1e-12);
        assert_eq!(pipeline.output_names(), vec!["gender=F", "gender=M", "claim_amount"]);
    }

    #[test]
    fn test_transform_imputes_and_encodes() {
        let frame = training_frame();
        let pipeline = FeaturePipeline::fit(&frame);
        let matrix = pipeline.transform(&frame);

        assert_eq!(matrix.n_rows(), 4);
        assert_eq!(matrix.n_cols(), 3);
        // missing gender imputes to the most frequent value "F"
        assert_eq!(&matrix.row(3)[..2], &[1.0, 0.0]);
        // missing amount imputes to the median, which standardizes to 0
        assert_eq!(matrix.get(2, 2), 0.0);
    }

    #[test]
    fn test_unseen_category_is_all_zero() {
        let pipeline = FeaturePipeline::fit(&training_frame());
        let mut frame = FeatureFrame::new(1);
        frame.set_column("gender", ColumnData::Categorical(vec![Some("X".into())]), true);
        frame.set_column("claim_amount", ColumnData::Numeric(vec![Some(3.0)]), true);

        let matrix = pipeline.transform(&frame);
        assert_eq!(matrix.row(0), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_missing_and_reordered_columns_are_aligned() {
        let pipeline = FeaturePipeline::fit(&training_frame());

        let mut reordered = FeatureFrame::new(1);
        reordered.set_column("extra", ColumnData::Numeric(vec![Some(99.0)]), true);
        reordered.set_column("claim_amount", ColumnData::Numeric(vec![Some(5.0)]), true);
        reordered.set_column("gender", ColumnData::Categorical(vec![Some("M".into())]), true);

        let mut partial = FeatureFrame::new(1);
        partial.set_column("claim_amount", ColumnData::Numeric(vec![Some(5.0)]), true);

        let full = pipeline.transform(&reordered);
        assert_eq!(full.row(0)[..2], [0.0, 1.0]);
        assert_eq!(full.n_cols(), 3);

        // gender injected as missing then imputed to "F"
        let imputed = pipeline.transform(&partial);
        assert_eq!(imputed.row(0)[..2], [1.0, 0.0]);
        assert_eq!(imputed.get(0, 2), full.get(0, 2));
    }

    #[test]
    fn test_constant_and_empty_numeric_columns() {
        let mut frame = FeatureFrame::new(2);
        frame.set_column("flat", ColumnData::Numeric(vec![Some(7.0), Some(7.0)]), true);
        frame.set_column("empty", ColumnData::Numeric(vec![None, None]), true);

        let pipeline = FeaturePipeline::fit(&frame);
        let matrix = pipeline.transform(&frame);
        assert_eq!(matrix.row(0), &[0.0, 0.0]);
        assert_eq!(pipeline.numeric[1].fill_value, 0.0);
    }
}
