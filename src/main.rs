//! Claim Fraud Scoring - CLI Entry Point
//!
//! Usage:
//!   claim-fraud-scoring features
//!   claim-fraud-scoring train [--force]
//!   claim-fraud-scoring score <claims.json | ->
//!
//! The configuration path comes from `FRAUD_CONFIG` (default
//! `config/config.toml`); built-in defaults apply when the file is absent.

use anyhow::{bail, Context, Result};
use claim_fraud_scoring::{
    config::{AppConfig, LoggingConfig},
    service::{init_global, ScoringService},
    storage::BundleMetadata,
    RawRecord,
};
use serde_json::{json, Value};
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    let config_path =
        std::env::var("FRAUD_CONFIG").unwrap_or_else(|_| "config/config.toml".to_string());
    let config = if Path::new(&config_path).exists() {
        AppConfig::load_from_path(&config_path)?
    } else {
        AppConfig::default()
    };

    init_tracing(&config.logging)?;
    if !Path::new(&config_path).exists() {
        warn!(path = %config_path, "Configuration file not found, using defaults");
    }

    let service = init_global(ScoringService::from_config(&config));

    match args.get(1).map(String::as_str) {
        Some("features") => {
            let features = ScoringService::describe_features();
            println!("{}", serde_json::to_string_pretty(&features)?);
        }
        Some("train") => {
            let force = args.iter().skip(2).any(|a| a == "--force");
            info!(force, "Training fraud model");
            let bundle = if force {
                service.retrain()?
            } else {
                service.bundle()?
            };
            let metadata = BundleMetadata::from_bundle(&bundle);
            println!("{}", serde_json::to_string_pretty(&metadata)?);
        }
        Some("score") => {
            let input = args.get(2).context("score requires a JSON file path or '-'")?;
            let records = read_records(input)?;
            info!(records = records.len(), "Scoring claims");

            let predictions = service.predict(&records)?;
            let bundle = service.bundle()?;
            let output = json!({
                "predictions": predictions,
                "model_columns": bundle.feature_columns,
                "feature_hint": ScoringService::describe_features()
                    .iter()
                    .map(|f| f.name)
                    .collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            service.metrics().log_summary();
        }
        _ => {
            eprintln!("usage: claim-fraud-scoring <features | train [--force] | score <file|->>");
            bail!("unknown or missing command");
        }
    }

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("claim_fraud_scoring={}", logging.level).parse()?);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

/// Parse a single claim object or an array of claim objects.
fn read_records(input: &str) -> Result<Vec<RawRecord>> {
    let mut text = String::new();
    if input == "-" {
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read claims from stdin")?;
    } else {
        text = std::fs::read_to_string(input)
            .with_context(|| format!("Failed to read claims from {}", input))?;
    }

    let value: Value = serde_json::from_str(&text).context("Claims input is not valid JSON")?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(_) => vec![value],
        _ => bail!("Claims input must be an object or an array of objects"),
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(map) => Ok(map),
            _ => bail!("Claim {} is not a JSON object", i),
        })
        .collect()
}
