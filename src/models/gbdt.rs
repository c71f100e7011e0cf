//! Gradient-boosted decision trees with a binary logistic objective.
//!
//! Trees are grown level-wise with exact greedy split search over presorted
//! feature columns. Gradients and hessians of positive rows are multiplied by
//! `scale_pos_weight` to correct class imbalance.

use crate::features::pipeline::DenseMatrix;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Fixed hyperparameters of the fraud classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GbdtParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    /// Fraction of rows sampled per tree
    pub subsample: f64,
    /// Fraction of features sampled per tree
    pub colsample_bytree: f64,
    /// Minimum hessian sum on each side of a split
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    pub seed: u64,
}

impl Default for GbdtParams {
    fn default() -> Self {
        Self {
            n_estimators: 220,
            max_depth: 5,
            learning_rate: 0.08,
            subsample: 0.9,
            colsample_bytree: 0.9,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            seed: 42,
        }
    }
}

/// Positive-class weight: negatives over positives, 1.0 with no positives.
pub fn scale_pos_weight(labels: &[u8]) -> f64 {
    let positives = labels.iter().filter(|&&l| l == 1).count();
    let negatives = labels.len() - positives;
    if positives == 0 {
        1.0
    } else {
        negatives as f64 / positives as f64
    }
}

/// Anything that turns a feature matrix into fraud probabilities.
pub trait FraudClassifier: Send + Sync {
    /// One probability in [0, 1] per matrix row, in row order.
    fn predict_proba(&self, features: &DenseMatrix) -> Vec<f64>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Rows with `value < threshold` go left
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf { value: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let value = row.get(*feature).copied().unwrap_or(0.0);
                    idx = if value < *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }
}

/// Fitted tree ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedTrees {
    params: GbdtParams,
    scale_pos_weight: f64,
    base_margin: f64,
    n_features: usize,
    trees: Vec<Tree>,
}

impl GradientBoostedTrees {
    /// Fit on `features` with binary `labels` (0 or 1), one per row.
    ///
    /// # Panics
    /// Panics if `labels.len()` differs from the matrix row count.
    pub fn fit(features: &DenseMatrix, labels: &[u8], params: &GbdtParams) -> Self {
        assert_eq!(features.n_rows(), labels.len(), "one label per row");

        let n = features.n_rows();
        let spw = scale_pos_weight(labels);
        let weights: Vec<f64> = labels
            .iter()
            .map(|&l| if l == 1 { spw } else { 1.0 })
            .collect();
        let sorted = presort(features);

        let mut rng = StdRng::seed_from_u64(params.seed);
        let base_margin = 0.0;
        let mut margin = vec![base_margin; n];
        let mut grad = vec![0.0; n];
        let mut hess = vec![0.0; n];
        let mut trees = Vec::with_capacity(params.n_estimators);

        for _ in 0..params.n_estimators {
            for i in 0..n {
                let p = sigmoid(margin[i]);
                grad[i] = (p - f64::from(labels[i])) * weights[i];
                hess[i] = (p * (1.0 - p) * weights[i]).max(1e-16);
            }

            let rows: Vec<bool> = (0..n).map(|_| rng.gen::<f64>() < params.subsample).collect();
            let columns = sample_columns(features.n_cols(), params.colsample_bytree, &mut rng);

            let tree = TreeGrower {
                features,
                sorted: &sorted,
                grad: &grad,
                hess: &hess,
                params,
            }
            .grow(&rows, &columns);

            for (i, m) in margin.iter_mut().enumerate() {
                *m += tree.predict(features.row(i));
            }
            trees.push(tree);
        }

        debug!(
            trees = trees.len(),
            rows = n,
            features = features.n_cols(),
            scale_pos_weight = spw,
            "gradient boosted trees fitted"
        );

        Self {
            params: params.clone(),
            scale_pos_weight: spw,
            base_margin,
            n_features: features.n_cols(),
            trees,
        }
    }

    /// Positive-class weight derived from the training labels.
    pub fn scale_pos_weight(&self) -> f64 {
        self.scale_pos_weight
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Raw log-odds for one row.
    pub fn predict_margin(&self, row: &[f64]) -> f64 {
        self.base_margin + self.trees.iter().map(|t| t.predict(row)).sum::<f64>()
    }

    pub fn predict_proba_row(&self, row: &[f64]) -> f64 {
        sigmoid(self.predict_margin(row))
    }
}

impl FraudClassifier for GradientBoostedTrees {
    fn predict_proba(&self, features: &DenseMatrix) -> Vec<f64> {
        if features.n_cols() != self.n_features {
            warn!(
                expected = self.n_features,
                got = features.n_cols(),
                "feature width differs from training, absent features read as 0"
            );
        }
        (0..features.n_rows())
            .map(|i| self.predict_proba_row(features.row(i)))
            .collect()
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Row indices of each column in ascending value order (stable on ties).
fn presort(features: &DenseMatrix) -> Vec<Vec<usize>> {
    (0..features.n_cols())
        .map(|j| {
            let mut idx: Vec<usize> = (0..features.n_rows()).collect();
            idx.sort_by(|&a, &b| features.get(a, j).total_cmp(&features.get(b, j)));
            idx
        })
        .collect()
}

fn sample_columns(n_cols: usize, fraction: f64, rng: &mut StdRng) -> Vec<usize> {
    let mut columns: Vec<usize> = (0..n_cols).collect();
    if fraction >= 1.0 || n_cols == 0 {
        return columns;
    }
    let keep = ((n_cols as f64 * fraction).round() as usize).clamp(1, n_cols);
    columns.shuffle(rng);
    columns.truncate(keep);
    columns.sort_unstable();
    columns
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    gain: f64,
    feature: usize,
    threshold: f64,
}

struct TreeGrower<'a> {
    features: &'a DenseMatrix,
    sorted: &'a [Vec<usize>],
    grad: &'a [f64],
    hess: &'a [f64],
    params: &'a GbdtParams,
}

impl TreeGrower<'_> {
    fn grow(&self, rows: &[bool], columns: &[usize]) -> Tree {
        let n = self.features.n_rows();
        let mut nodes = vec![Node::Leaf { value: 0.0 }];
        // Node each sampled row currently sits in
        let mut position: Vec<Option<usize>> =
            (0..n).map(|i| if rows[i] { Some(0) } else { None }).collect();

        let (g, h) = (0..n)
            .filter(|&i| rows[i])
            .fold((0.0, 0.0), |(g, h), i| (g + self.grad[i], h + self.hess[i]));
        let mut stats = vec![(g, h)];
        let mut active = vec![0usize];

        for _depth in 0..self.params.max_depth {
            if active.is_empty() {
                break;
            }
            let best = self.find_splits(&active, &position, &stats, columns);

            let mut next = Vec::new();
            for (slot, &node) in active.iter().enumerate() {
                let Some(split) = best[slot] else {
                    nodes[node] = Node::Leaf {
                        value: self.leaf_value(stats[node]),
                    };
                    continue;
                };
                let left = nodes.len();
                let right = left + 1;
                nodes.push(Node::Leaf { value: 0.0 });
                nodes.push(Node::Leaf { value: 0.0 });
                stats.push((0.0, 0.0));
                stats.push((0.0, 0.0));
                nodes[node] = Node::Split {
                    feature: split.feature,
                    threshold: split.threshold,
                    left,
                    right,
                };
                next.push(left);
                next.push(right);
            }

            for i in 0..n {
                let Some(node) = position[i] else { continue };
                if let Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } = nodes[node]
                {
                    let child = if self.features.get(i, feature) < threshold {
                        left
                    } else {
                        right
                    };
                    position[i] = Some(child);
                    stats[child].0 += self.grad[i];
                    stats[child].1 += self.hess[i];
                }
            }
            active = next;
        }

        for &node in &active {
            nodes[node] = Node::Leaf {
                value: self.leaf_value(stats[node]),
            };
        }
        Tree { nodes }
    }

    /// Best split per active node, scanning each sampled column once.
    fn find_splits(
        &self,
        active: &[usize],
        position: &[Option<usize>],
        stats: &[(f64, f64)],
        columns: &[usize],
    ) -> Vec<Option<SplitCandidate>> {
        let lambda = self.params.reg_lambda;
        let min_child = self.params.min_child_weight;

        let mut slot_of = vec![None; stats.len()];
        for (slot, &node) in active.iter().enumerate() {
            slot_of[node] = Some(slot);
        }
        let mut best: Vec<Option<SplitCandidate>> = vec![None; active.len()];

        for &feature in columns {
            let mut left = vec![(0.0_f64, 0.0_f64); active.len()];
            let mut last: Vec<Option<f64>> = vec![None; active.len()];

            for &row in &self.sorted[feature] {
                let Some(slot) = position[row].and_then(|node| slot_of[node]) else {
                    continue;
                };
                let value = self.features.get(row, feature);

                if let Some(prev) = last[slot] {
                    if value > prev {
                        let (g, h) = stats[active[slot]];
                        let (gl, hl) = left[slot];
                        let (gr, hr) = (g - gl, h - hl);
                        if hl >= min_child && hr >= min_child {
                            let gain = 0.5
                                * (gl * gl / (hl + lambda) + gr * gr / (hr + lambda)
                                    - g * g / (h + lambda));
                            let better = match best[slot] {
                                Some(current) => gain > current.gain,
                                None => gain > 1e-12,
                            };
                            if better {
                                best[slot] = Some(SplitCandidate {
                                    gain,
                                    feature,
                                    threshold: value,
                                });
                            }
                        }
                    }
                }

                left[slot].0 += self.grad[row];
                left[slot].1 += self.hess[row];
                last[slot] = Some(value);
            }
        }
        best
    }

    fn leaf_value(&self, (g, h): (f64, f64)) -> f64 {
        -g / (h + self.params.reg_lambda) * self.params.learning_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (DenseMatrix, Vec<u8>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..200 {
            let x = i as f64 / 10.0;
            rows.push(vec![x, (i % 7) as f64]);
            labels.push(u8::from(x > 15.0));
        }
        (DenseMatrix::from_rows(&rows), labels)
    }

    #[test]
    fn test_scale_pos_weight() {
        let mut labels = vec![0u8; 900];
        labels.extend(vec![1u8; 100]);
        assert_eq!(scale_pos_weight(&labels), 9.0);
        assert_eq!(scale_pos_weight(&[0, 0, 0]), 1.0);
    }

    #[test]
    fn test_learns_threshold() {
        let (x, y) = separable();
        let model = GradientBoostedTrees::fit(&x, &y, &GbdtParams::default());

        assert_eq!(model.n_trees(), 220);
        assert!(model.predict_proba_row(&[19.0, 3.0]) > 0.8);
        assert!(model.predict_proba_row(&[2.0, 3.0]) < 0.2);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (x, y) = separable();
        let params = GbdtParams {
            n_estimators: 20,
            ..GbdtParams::default()
        };
        let a = GradientBoostedTrees::fit(&x, &y, &params);
        let b = GradientBoostedTrees::fit(&x, &y, &params);
        assert_eq!(a, b);
        assert_eq!(a.predict_proba(&x), b.predict_proba(&x));
    }

    #[test]
    fn test_constant_features_give_single_leaf_trees() {
        let x = DenseMatrix::from_rows(&vec![vec![1.0, 2.0]; 50]);
        let mut y = vec![0u8; 45];
        y.extend(vec![1u8; 5]);
        let params = GbdtParams {
            n_estimators: 10,
            ..GbdtParams::default()
        };
        let model = GradientBoostedTrees::fit(&x, &y, &params);

        assert!(model.trees.iter().all(|t| t.n_leaves() == 1));
        assert_eq!(model.scale_pos_weight(), 9.0);
        let p = model.predict_proba_row(&[1.0, 2.0]);
        assert!(p.is_finite() && (0.0..=1.0).contains(&p));
    }

    #[test]
    fn test_serde_preserves_predictions() {
        let (x, y) = separable();
        let params = GbdtParams {
            n_estimators: 5,
            ..GbdtParams::default()
        };
        let model = GradientBoostedTrees::fit(&x, &y, &params);
        let json = serde_json::to_string(&model).unwrap();
        let restored: GradientBoostedTrees = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.predict_proba(&x), model.predict_proba(&x));
    }
}
