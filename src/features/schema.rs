//! Schema reconciliation: raw source columns to fixed logical features.
//!
//! Source datasets name the same concept many ways (`ClaimAmount`,
//! `TotalClaimChargeAmount`, ...). Each logical feature carries an ordered
//! alias list; the first alias present in a record wins. The table is a
//! constant and is applied identically to training tables and single
//! scoring records.

use crate::features::frame::{ColumnData, ColumnKind, FeatureFrame};
use crate::types::record::{coerce_number, coerce_text, RawRecord};
use serde_json::Value;

/// A logical feature and the raw column names that may carry it.
#[derive(Debug, Clone, Copy)]
pub struct LogicalFeature {
    pub name: &'static str,
    pub kind: ColumnKind,
    /// Candidate source names in priority order. Always includes `name`.
    pub aliases: &'static [&'static str],
}

use ColumnKind::{Categorical, Numeric};

/// Logical features in frame order.
pub const LOGICAL_FEATURES: &[LogicalFeature] = &[
    LogicalFeature {
        name: "claim_amount",
        kind: Numeric,
        aliases: &[
            "claim_amount",
            "ClaimAmount",
            "TotalClaimChargeAmount",
            "total_claim_charge_amount",
            "InscClaimAmtReimbursed",
            "claim_total_amount",
        ],
    },
    LogicalFeature {
        name: "paid_amount",
        kind: Numeric,
        aliases: &[
            "paid_amount",
            "PaidAmount",
            "AmountPaid",
            "amount_paid",
            "DeductibleAmtPaid",
        ],
    },
    LogicalFeature {
        name: "drg_code",
        kind: Categorical,
        aliases: &["drg_code", "DRGDefinition", "drg_definition", "DRG_CODE"],
    },
    LogicalFeature {
        name: "primary_diagnosis",
        kind: Categorical,
        aliases: &[
            "primary_diagnosis",
            "PrimaryDiagnosis",
            "principal_diagnosis_code",
            "DiagnosisGroupCode",
            "DiagnosticRelatedGroup",
        ],
    },
    LogicalFeature {
        name: "primary_procedure",
        kind: Categorical,
        aliases: &[
            "primary_procedure",
            "PrincipalProcedureCode",
            "procedure_code",
            "procedure1",
            "ProcedureCode",
        ],
    },
    LogicalFeature {
        name: "admission_type",
        kind: Categorical,
        aliases: &["AdmissionType", "admission_type", "admission_type_code"],
    },
    LogicalFeature {
        name: "admission_source",
        kind: Categorical,
        aliases: &["AdmissionSource", "admission_source", "admission_source_code"],
    },
    LogicalFeature {
        name: "discharge_disposition",
        kind: Categorical,
        aliases: &[
            "DischargeDisposition",
            "discharge_disposition",
            "discharge_status",
        ],
    },
    LogicalFeature {
        name: "length_of_stay",
        kind: Numeric,
        aliases: &["length_of_stay", "LengthOfStay", "los"],
    },
    LogicalFeature {
        name: "patient_age",
        kind: Numeric,
        aliases: &["patient_age", "Age", "age"],
    },
    LogicalFeature {
        name: "gender",
        kind: Categorical,
        aliases: &["gender", "Gender", "Sex", "sex"],
    },
    LogicalFeature {
        name: "num_diagnoses",
        kind: Numeric,
        aliases: &[
            "num_diagnoses",
            "NumberOfDiagnosisCodes",
            "DiagnosisCodeCount",
            "diagnosis_count",
        ],
    },
    LogicalFeature {
        name: "num_procedures",
        kind: Numeric,
        aliases: &[
            "num_procedures",
            "NumberOfProcedureCodes",
            "ProcedureCodeCount",
            "procedure_count",
        ],
    },
    LogicalFeature {
        name: "provider_state",
        kind: Categorical,
        aliases: &["provider_state", "ProviderState", "state"],
    },
    LogicalFeature {
        name: "payer",
        kind: Categorical,
        aliases: &["payer", "Payer", "InsuranceCompany"],
    },
];

/// Fraud label candidates, in detection priority order.
pub const TARGET_CANDIDATES: &[&str] = &[
    "is_fraud",
    "fraud",
    "Fraud",
    "potential_fraud",
    "PotentialFraud",
];

/// Names of the categorical logical features, in frame order.
pub fn categorical_features() -> Vec<&'static str> {
    LOGICAL_FEATURES
        .iter()
        .filter(|f| f.kind == Categorical)
        .map(|f| f.name)
        .collect()
}

/// First alias of `feature` present as a key in `record`.
fn resolve<'r>(feature: &LogicalFeature, record: &'r RawRecord) -> Option<&'r Value> {
    feature.aliases.iter().find_map(|alias| record.get(*alias))
}

/// Reconcile a batch of raw records into the fixed logical frame.
///
/// The output always contains exactly the logical columns, in
/// [`LOGICAL_FEATURES`] order, with one row per input record in input order.
/// Categorical cells are text (absent becomes `""`); numeric cells are finite
/// floats or `None`.
pub fn reconcile(records: &[RawRecord]) -> FeatureFrame {
    let mut frame = FeatureFrame::new(records.len());

    for feature in LOGICAL_FEATURES {
        let resolved: Vec<Option<&Value>> = records.iter().map(|r| resolve(feature, r)).collect();
        let sourced = resolved.iter().any(Option::is_some);

        let data = match feature.kind {
            Numeric => ColumnData::Numeric(
                resolved
                    .iter()
                    .map(|v| v.and_then(coerce_number))
                    .collect(),
            ),
            Categorical => ColumnData::Categorical(
                resolved
                    .iter()
                    .map(|v| Some(v.map(coerce_text).unwrap_or_default()))
                    .collect(),
            ),
        };
        frame.set_column(feature.name, data, sourced);
    }

    frame
}

/// First target candidate present in `columns`.
pub fn detect_target<'c, I>(columns: I) -> Option<&'static str>
where
    I: IntoIterator<Item = &'c String>,
{
    let columns: Vec<&String> = columns.into_iter().collect();
    TARGET_CANDIDATES
        .iter()
        .copied()
        .find(|candidate| columns.iter().any(|c| c.as_str() == *candidate))
}
