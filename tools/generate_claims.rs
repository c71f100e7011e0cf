//! Synthetic Claims Generator
//!
//! Writes a claims CSV for local training runs without the external dataset.
//! Fraudulent claims skew toward upcoding: charges well above the DRG norm,
//! low payment ratios, short stays and long diagnosis lists.
//!
//! Usage: generate-claims [output.csv] [count] [fraud_rate] [seed]

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::info;

/// Row layout using the source-style column names the reconciler maps
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Claim {
    claim_id: String,
    claim_amount: f64,
    amount_paid: f64,
    #[serde(rename = "DRGDefinition")]
    drg_definition: String,
    primary_diagnosis: String,
    procedure_code: String,
    admission_type: String,
    admission_source: String,
    discharge_disposition: String,
    length_of_stay: u32,
    age: u32,
    gender: String,
    number_of_diagnosis_codes: u32,
    number_of_procedure_codes: u32,
    provider_state: String,
    insurance_company: String,
    potential_fraud: String,
}

/// DRG code with its typical charge
const DRGS: &[(&str, f64)] = &[
    ("291", 9_500.0),
    ("292", 7_200.0),
    ("470", 14_800.0),
    ("871", 18_300.0),
    ("872", 11_100.0),
    ("193", 8_900.0),
    ("690", 5_600.0),
];

/// Claim generator for testing
struct ClaimGenerator {
    rng: StdRng,
    claim_counter: u64,
}

impl ClaimGenerator {
    fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            claim_counter: 0,
        }
    }

    /// Generate a routine claim
    fn generate_legitimate(&mut self) -> Claim {
        let (drg, typical) = DRGS[self.rng.gen_range(0..DRGS.len())];
        let claim_amount = typical * self.rng.gen_range(0.8..1.2);
        let paid_ratio = self.rng.gen_range(0.55..0.9);
        let stay = self.rng.gen_range(2..9);
        let diagnoses = self.rng.gen_range(1..6);
        self.build(drg, claim_amount, paid_ratio, stay, diagnoses, "No")
    }

    /// Generate an upcoded/padded claim
    fn generate_suspicious(&mut self) -> Claim {
        let (drg, typical) = DRGS[self.rng.gen_range(0..DRGS.len())];
        let claim_amount = typical * self.rng.gen_range(1.4..2.6); // Far above DRG norm
        let paid_ratio = self.rng.gen_range(0.15..0.45); // Payer pushes back
        let stay = self.rng.gen_range(1..3); // Short stay
        let diagnoses = self.rng.gen_range(6..15); // Padded diagnosis list
        self.build(drg, claim_amount, paid_ratio, stay, diagnoses, "Yes")
    }

    fn build(
        &mut self,
        drg: &str,
        claim_amount: f64,
        paid_ratio: f64,
        length_of_stay: u32,
        diagnoses: u32,
        label: &str,
    ) -> Claim {
        self.claim_counter += 1;
        let diagnosis = self.random_choice(&["I50.9", "J18.9", "N39.0", "A41.9", "E11.9"]);
        let procedure = self.random_choice(&["0BH17EZ", "5A1955Z", "02HV33Z", "0DTJ4ZZ"]);
        let discharge = self.random_choice(&["Home", "SNF", "Home Health", "AMA"]);
        let payer = self.random_choice(&["Medicare", "Medicaid", "Aetna", "Cigna"]);
        Claim {
            claim_id: format!("clm_{:010}", self.claim_counter),
            claim_amount: (claim_amount * 100.0).round() / 100.0,
            amount_paid: (claim_amount * paid_ratio * 100.0).round() / 100.0,
            drg_definition: drg.to_string(),
            primary_diagnosis: diagnosis.to_string(),
            procedure_code: procedure.to_string(),
            admission_type: self.random_choice(&["Emergency", "Elective", "Urgent"]).to_string(),
            admission_source: self.random_choice(&["Referral", "ER", "Transfer"]).to_string(),
            discharge_disposition: discharge.to_string(),
            length_of_stay,
            age: self.rng.gen_range(18..95),
            gender: self.random_choice(&["M", "F"]).to_string(),
            number_of_diagnosis_codes: diagnoses,
            number_of_procedure_codes: self.rng.gen_range(0..6),
            provider_state: self.random_choice(&["CA", "TX", "FL", "NY", "OH"]).to_string(),
            insurance_company: payer.to_string(),
            potential_fraud: label.to_string(),
        }
    }

    fn random_choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("generate_claims=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let output = args.get(1).map(|s| s.as_str()).unwrap_or("data/claims.csv");
    let count: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(5000);
    let fraud_rate: f64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(0.1);
    let seed: u64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(42);

    info!(output = %output, count, fraud_rate, seed, "Configuration loaded");

    if let Some(parent) = std::path::Path::new(output).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let mut writer = csv::Writer::from_path(output)
        .with_context(|| format!("Failed to open {}", output))?;

    let mut generator = ClaimGenerator::new(seed);
    let mut label_rng = StdRng::seed_from_u64(seed.wrapping_add(1));
    let mut suspicious_count = 0;

    for _ in 0..count {
        let claim = if label_rng.gen_bool(fraud_rate) {
            suspicious_count += 1;
            generator.generate_suspicious()
        } else {
            generator.generate_legitimate()
        };
        writer.serialize(&claim)?;
    }
    writer.flush()?;

    info!(
        "Completed! Wrote {} claims ({} legitimate, {} suspicious) to {}",
        count,
        count - suspicious_count,
        suspicious_count,
        output
    );

    Ok(())
}
