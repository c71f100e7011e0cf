//! Human-readable description of every model feature.

use crate::features::frame::ColumnKind;
use serde::Serialize;

/// Static metadata for one feature
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureInfo {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: FeatureType,
    pub rationale: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureType {
    Number,
    Categorical,
}

impl From<ColumnKind> for FeatureType {
    fn from(kind: ColumnKind) -> Self {
        match kind {
            ColumnKind::Numeric => FeatureType::Number,
            ColumnKind::Categorical => FeatureType::Categorical,
        }
    }
}

const fn info(name: &'static str, kind: FeatureType, rationale: &'static str) -> FeatureInfo {
    FeatureInfo {
        name,
        kind,
        rationale,
    }
}

use FeatureType::{Categorical, Number};

const CATALOG: &[FeatureInfo] = &[
    info("claim_amount", Number, "Total charges billed for the stay."),
    info("paid_amount", Number, "What was actually paid; large gaps can indicate padding."),
    info("drg_code", Categorical, "Signals expected severity; used for upcoding detection."),
    info(
        "primary_diagnosis",
        Categorical,
        "Clinical context; mismatched with DRG can be suspicious.",
    ),
    info(
        "primary_procedure",
        Categorical,
        "High-cost procedures paired with mild DRG may be fraud.",
    ),
    info("admission_type", Categorical, "Emergency vs elective patterns differ for fraud risk."),
    info("admission_source", Categorical, "Referral source helps spot unusual routing."),
    info(
        "discharge_disposition",
        Categorical,
        "Early discharge after high billing can signal abuse.",
    ),
    info("length_of_stay", Number, "Too short or long stays relative to DRG raise flags."),
    info("patient_age", Number, "Age interacts with diagnosis/procedure severity."),
    info("gender", Categorical, "Minor but sometimes predictive for certain codes."),
    info("num_diagnoses", Number, "Large diagnosis lists with mild DRG can hint at upcoding."),
    info("num_procedures", Number, "High procedure volume for short stays can be suspicious."),
    info("provider_state", Categorical, "Regional practice patterns and risk baselines."),
    info("payer", Categorical, "Payer-specific rules can influence fraud likelihood."),
    info("payment_to_charge_ratio", Number, "Low ratios may indicate padded charges."),
    info("drg_charge_ratio", Number, "Charges relative to DRG median highlight upcoding."),
    info("possible_drg_upcoding", Number, "Binary flag when charges exceed DRG median by 25%."),
];

/// Every logical and derived feature, in frame order. Needs no model.
pub fn describe_features() -> Vec<FeatureInfo> {
    CATALOG.to_vec()
}
