//! Hold-out split and validation metrics.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Descriptive metrics recorded with a trained bundle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Share of positive labels across the full training table
    pub target_positive_rate: f64,
}

/// Row indices of a train/validation split
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

/// Shuffle-split `labels` into train and validation indices.
///
/// When both classes are present the split is stratified: each class
/// contributes `round(count * validation_fraction)` rows to validation.
/// Otherwise `ceil(n * validation_fraction)` rows are drawn at random.
/// Both index lists are returned in ascending order.
pub fn train_validation_split(labels: &[u8], validation_fraction: f64, seed: u64) -> Split {
    let mut rng = StdRng::seed_from_u64(seed);
    let positives: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == 1).collect();
    let negatives: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] != 1).collect();

    let mut train = Vec::with_capacity(labels.len());
    let mut validation = Vec::new();

    if !positives.is_empty() && !negatives.is_empty() {
        for mut class in [negatives, positives] {
            class.shuffle(&mut rng);
            let take = (class.len() as f64 * validation_fraction).round() as usize;
            let take = take.min(class.len().saturating_sub(1));
            validation.extend_from_slice(&class[..take]);
            train.extend_from_slice(&class[take..]);
        }
    } else {
        let mut all: Vec<usize> = (0..labels.len()).collect();
        all.shuffle(&mut rng);
        let take = (labels.len() as f64 * validation_fraction).ceil() as usize;
        let take = take.min(labels.len().saturating_sub(1));
        validation.extend_from_slice(&all[..take]);
        train.extend_from_slice(&all[take..]);
    }

    train.sort_unstable();
    validation.sort_unstable();
    Split { train, validation }
}

/// Precision, recall and F1 of thresholded predictions. Undefined ratios
/// (zero denominators) are reported as 0.
pub fn precision_recall_f1(predictions: &[f64], labels: &[u8], threshold: f64) -> (f64, f64, f64) {
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut fn_ = 0usize;
    for (&p, &y) in predictions.iter().zip(labels) {
        match (p >= threshold, y == 1) {
            (true, true) => tp += 1,
            (true, false) => fp += 1,
            (false, true) => fn_ += 1,
            (false, false) => {}
        }
    }

    let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };
    (precision, recall, f1)
}

/// Fraction of labels equal to 1.
pub fn positive_rate(labels: &[u8]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    labels.iter().filter(|&&l| l == 1).count() as f64 / labels.len() as f64
}
