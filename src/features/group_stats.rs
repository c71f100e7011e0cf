//! Per-DRG reference charges captured at training time.

use crate::features::frame::FeatureFrame;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Column used as the grouping key
pub const GROUP_COLUMN: &str = "drg_code";
/// Column whose median is tracked per group
pub const AMOUNT_COLUMN: &str = "claim_amount";
/// Substitute for an absent, zero or undefined overall median
pub const FALLBACK_MEDIAN: f64 = 1.0;

/// Frozen group medians plus the overall fallback median.
///
/// Computed once from the full training frame and never recomputed at
/// inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStatistics {
    group_medians: BTreeMap<String, f64>,
    overall_median: f64,
}

impl GroupStatistics {
    /// Build from explicit values. A zero or non-finite overall median is
    /// replaced with [`FALLBACK_MEDIAN`].
    pub fn new(group_medians: BTreeMap<String, f64>, overall_median: f64) -> Self {
        Self {
            group_medians,
            overall_median: sanitize_overall(overall_median),
        }
    }

    /// The degenerate store: no groups, overall median of 1.0.
    pub fn degenerate() -> Self {
        Self::new(BTreeMap::new(), FALLBACK_MEDIAN)
    }

    /// Compute group medians of the claim amount keyed by DRG code.
    ///
    /// Rows with a missing amount are ignored. Rows with an empty DRG code
    /// count toward the overall median but form no group.
    pub fn compute(frame: &FeatureFrame) -> Self {
        let (Some(codes), Some(amounts)) = (
            frame.categorical(GROUP_COLUMN),
            frame.numeric(AMOUNT_COLUMN),
        ) else {
            warn!("group statistics columns missing, using degenerate store");
            return Self::degenerate();
        };
        if !frame.is_sourced(GROUP_COLUMN) || !frame.is_sourced(AMOUNT_COLUMN) {
            warn!(
                group_sourced = frame.is_sourced(GROUP_COLUMN),
                amount_sourced = frame.is_sourced(AMOUNT_COLUMN),
                "training data lacks group or amount column, using degenerate store"
            );
            return Self::degenerate();
        }

        let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        let mut all = Vec::with_capacity(amounts.len());
        for (code, amount) in codes.iter().zip(amounts) {
            let Some(amount) = *amount else { continue };
            all.push(amount);
            if let Some(code) = code.as_deref().filter(|c| !c.is_empty()) {
                groups.entry(code.to_string()).or_default().push(amount);
            }
        }

        let group_medians: BTreeMap<String, f64> = groups
            .into_iter()
            .filter_map(|(code, mut values)| median(&mut values).map(|m| (code, m)))
            .collect();
        let overall = median(&mut all).unwrap_or(FALLBACK_MEDIAN);

        debug!(
            groups = group_medians.len(),
            overall_median = overall,
            "group statistics computed"
        );
        Self::new(group_medians, overall)
    }

    /// Reference amount for a group code, falling back to the overall median
    /// for unseen, empty or missing codes.
    pub fn reference_for(&self, code: Option<&str>) -> f64 {
        code.filter(|c| !c.is_empty())
            .and_then(|c| self.group_medians.get(c))
            .copied()
            .unwrap_or(self.overall_median)
    }

    pub fn group_medians(&self) -> &BTreeMap<String, f64> {
        &self.group_medians
    }

    pub fn overall_median(&self) -> f64 {
        self.overall_median
    }

    pub fn len(&self) -> usize {
        self.group_medians.len()
    }

    pub fn is_empty(&self) -> bool {
        self.group_medians.is_empty()
    }
}

fn sanitize_overall(value: f64) -> f64 {
    if value.is_finite() && value != 0.0 {
        value
    } else {
        FALLBACK_MEDIAN
    }
}

/// Median of finite values; the mean of the middle pair for even counts.
pub(crate) fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}
