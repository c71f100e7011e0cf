//! Derived fraud signals computed identically at training and scoring time.
//!
//! Derivation is a pure column-wise map: row count and order never change.

use crate::features::frame::{ColumnData, FeatureFrame};
use crate::features::group_stats::{GroupStatistics, AMOUNT_COLUMN, GROUP_COLUMN};

pub const PAYMENT_TO_CHARGE_RATIO: &str = "payment_to_charge_ratio";
pub const DRG_CHARGE_RATIO: &str = "drg_charge_ratio";
pub const POSSIBLE_DRG_UPCODING: &str = "possible_drg_upcoding";

/// Derived columns in frame order (all numeric).
pub const DERIVED_FEATURES: &[&str] = &[
    PAYMENT_TO_CHARGE_RATIO,
    DRG_CHARGE_RATIO,
    POSSIBLE_DRG_UPCODING,
];

/// Charges more than this multiple of the DRG median flag possible upcoding.
pub const UPCODING_RATIO_THRESHOLD: f64 = 1.25;

const PAID_COLUMN: &str = "paid_amount";

/// Division that yields `None` for a missing operand, a zero denominator,
/// or a non-finite result.
pub fn safe_divide(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    let (n, d) = (numerator?, denominator?);
    if d == 0.0 {
        return None;
    }
    Some(n / d).filter(|r| r.is_finite())
}

/// `paid / claim` per row.
pub fn payment_to_charge_ratio(frame: &FeatureFrame) -> Vec<Option<f64>> {
    let n = frame.n_rows();
    let paid = frame.numeric(PAID_COLUMN);
    let claim = frame.numeric(AMOUNT_COLUMN);
    (0..n)
        .map(|i| safe_divide(paid.and_then(|p| p[i]), claim.and_then(|c| c[i])))
        .collect()
}

/// `claim / group reference` per row.
pub fn drg_charge_ratio(frame: &FeatureFrame, stats: &GroupStatistics) -> Vec<Option<f64>> {
    let n = frame.n_rows();
    let claim = frame.numeric(AMOUNT_COLUMN);
    let codes = frame.categorical(GROUP_COLUMN);
    (0..n)
        .map(|i| {
            let code = codes.and_then(|c| c[i].as_deref());
            safe_divide(claim.and_then(|c| c[i]), Some(stats.reference_for(code)))
        })
        .collect()
}

/// 1 when the ratio exceeds the upcoding threshold, 0 otherwise (including
/// when the ratio is undefined).
pub fn upcoding_flag(ratio: Option<f64>) -> f64 {
    match ratio {
        Some(r) if r > UPCODING_RATIO_THRESHOLD => 1.0,
        _ => 0.0,
    }
}

/// Append (or overwrite) the derived columns on `frame`.
pub fn add_derived_features(frame: &mut FeatureFrame, stats: &GroupStatistics) {
    let payment_ratio = payment_to_charge_ratio(frame);
    let drg_ratio = drg_charge_ratio(frame, stats);
    let upcoding: Vec<Option<f64>> = drg_ratio.iter().map(|r| Some(upcoding_flag(*r))).collect();

    frame.set_column(
        PAYMENT_TO_CHARGE_RATIO,
        ColumnData::Numeric(payment_ratio),
        true,
    );
    frame.set_column(DRG_CHARGE_RATIO, ColumnData::Numeric(drg_ratio), true);
    frame.set_column(POSSIBLE_DRG_UPCODING, ColumnData::Numeric(upcoding), true);
}
