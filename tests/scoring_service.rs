//! End-to-end scoring: train from a dataset directory, persist, reload, score.

use claim_fraud_scoring::dataset::{load_training_table, DatasetSource, LocalDirectorySource};
use claim_fraud_scoring::features::derived::PAYMENT_TO_CHARGE_RATIO;
use claim_fraud_scoring::models::GbdtParams;
use claim_fraud_scoring::storage::{BundleStore, FsBundleStore, InMemoryBundleStore};
use claim_fraud_scoring::{FraudLabel, RawRecord, ScoringService, ServiceState};
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

fn fast_params() -> GbdtParams {
    GbdtParams {
        n_estimators: 20,
        ..GbdtParams::default()
    }
}

/// Claims with upcoded fraud rows: charges far above the DRG norm.
fn claims_csv(rows: usize, fraud_every: usize) -> String {
    let mut csv = String::from(
        "ClaimID,ClaimAmount,AmountPaid,DRGDefinition,Gender,AdmissionType,Age,PotentialFraud\n",
    );
    for i in 0..rows {
        let fraud = i % fraud_every == 0;
        let code = ["470", "291", "871"][i % 3];
        let amount = if fraud { 28000 + (i % 5) * 500 } else { 9000 + (i % 11) * 150 };
        let paid = if fraud { 3000 } else { 6500 };
        let gender = if i % 2 == 0 { "M" } else { "F" };
        let admission = ["Emergency", "Elective", "Urgent"][i % 3];
        let label = if fraud { "Yes" } else { "No" };
        csv.push_str(&format!(
            "clm_{i},{amount},{paid},{code},{gender},{admission},{},{label}\n",
            30 + i % 50
        ));
    }
    csv
}

fn record(value: serde_json::Value) -> RawRecord {
    value.as_object().cloned().unwrap()
}

struct CountingSource {
    dir: tempfile::TempDir,
    fetches: Arc<AtomicUsize>,
}

impl DatasetSource for CountingSource {
    fn fetch(&self) -> claim_fraud_scoring::Result<PathBuf> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.dir.path().to_path_buf())
    }
}

fn dataset_dir(csv: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("claims.csv"), csv).unwrap();
    dir
}

#[test]
fn test_train_persist_reload_and_score() {
    let data = dataset_dir(&claims_csv(120, 6));
    let artifacts = tempfile::tempdir().unwrap();
    let store = FsBundleStore::new(artifacts.path(), "fraud_gbdt.json", "fraud_gbdt_meta.json");

    let service = ScoringService::new(
        Box::new(store.clone()),
        Box::new(LocalDirectorySource::new(data.path())),
    )
    .with_params(fast_params());
    let trained = service.bundle().unwrap();

    assert!(store.model_path().exists());
    assert!(store.metadata_path().exists());
    let metadata: serde_json::Value =
        serde_json::from_slice(&std::fs::read(store.metadata_path()).unwrap()).unwrap();
    assert_eq!(metadata["drg_charge_medians_size"], 3);
    assert_eq!(metadata["feature_columns"].as_array().unwrap().len(), 18);

    // A fresh service over the same artifacts reuses the persisted bundle.
    let reloaded = ScoringService::new(
        Box::new(store),
        Box::new(LocalDirectorySource::new("/nonexistent/dataset")),
    );
    let bundle = reloaded.bundle().unwrap();
    assert_eq!(bundle.bundle_id, trained.bundle_id);
    assert_eq!(*bundle, *trained);

    let claim = record(json!({"ClaimAmount": 30000, "AmountPaid": 3000, "DRGDefinition": "470"}));
    let a = service.score(std::slice::from_ref(&claim)).unwrap();
    let b = reloaded.score(std::slice::from_ref(&claim)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_training_rows_score_like_in_sample() {
    let data = dataset_dir(&claims_csv(90, 5));
    let source = LocalDirectorySource::new(data.path());
    let table = load_training_table(&source).unwrap();
    let service = ScoringService::new(Box::new(InMemoryBundleStore::new()), Box::new(source))
        .with_params(fast_params());
    let bundle = service.bundle().unwrap();

    let in_sample = bundle.predict_proba(&table.rows);
    for i in [0, 1, 17, 44] {
        let single = service.score(std::slice::from_ref(&table.rows[i])).unwrap();
        assert_eq!(single[0], in_sample[i]);
    }
}

#[test]
fn test_scores_ignore_field_order_and_extra_fields() {
    let data = dataset_dir(&claims_csv(90, 5));
    let service = ScoringService::new(
        Box::new(InMemoryBundleStore::new()),
        Box::new(LocalDirectorySource::new(data.path())),
    )
    .with_params(fast_params());

    let plain = record(json!({"claim_amount": 12000, "paid_amount": 4000, "drg_code": "291"}));
    let reordered = record(json!({"drg_code": "291", "paid_amount": 4000, "claim_amount": 12000}));
    let extra = record(json!({
        "claim_amount": 12000,
        "paid_amount": 4000,
        "drg_code": "291",
        "adjuster_notes": "called provider",
        "batch": 7
    }));

    let scores = service.score(&[plain, reordered, extra]).unwrap();
    assert_eq!(scores[0], scores[1]);
    assert_eq!(scores[0], scores[2]);
}

#[test]
fn test_zero_payment_and_batch_order() {
    let data = dataset_dir(&claims_csv(90, 5));
    let service = ScoringService::new(
        Box::new(InMemoryBundleStore::new()),
        Box::new(LocalDirectorySource::new(data.path())),
    )
    .with_params(fast_params());
    let bundle = service.bundle().unwrap();

    let zero_paid = record(json!({"claim_amount": 5000, "paid_amount": 0}));
    let frame = bundle.feature_frame(std::slice::from_ref(&zero_paid));
    // 0 / 5000 is a defined ratio; only a zero or missing charge is undefined.
    assert_eq!(frame.numeric(PAYMENT_TO_CHARGE_RATIO).unwrap()[0], Some(0.0));
    let zero_paid_score = service.score(std::slice::from_ref(&zero_paid)).unwrap()[0];
    assert!(zero_paid_score.is_finite() && (0.0..=1.0).contains(&zero_paid_score));

    let batch = vec![
        record(json!({"claim_amount": 30000, "paid_amount": 3000, "drg_code": "470"})),
        zero_paid,
        record(json!({"claim_amount": 9000, "paid_amount": 6500, "drg_code": "291"})),
    ];
    let batch_scores = service.score(&batch).unwrap();
    assert_eq!(batch_scores.len(), 3);
    for (i, r) in batch.iter().enumerate() {
        let single = service.score(std::slice::from_ref(r)).unwrap();
        assert_eq!(single[0], batch_scores[i]);
        assert!(batch_scores[i].is_finite());
    }

    let predictions = service.predict(&batch).unwrap();
    assert_eq!(predictions[0].label, FraudLabel::Fraud);
    assert_eq!(predictions[2].label, FraudLabel::Legit);
}

#[test]
fn test_scale_pos_weight_from_class_balance() {
    let data = dataset_dir(&claims_csv(1000, 10));
    let service = ScoringService::new(
        Box::new(InMemoryBundleStore::new()),
        Box::new(LocalDirectorySource::new(data.path())),
    )
    .with_params(GbdtParams {
        n_estimators: 5,
        ..GbdtParams::default()
    });

    let bundle = service.bundle().unwrap();
    assert_eq!(bundle.scale_pos_weight(), 9.0);
    assert!((bundle.training_metrics.target_positive_rate - 0.1).abs() < 1e-12);
}

#[test]
fn test_concurrent_first_requests_train_once() {
    let fetches = Arc::new(AtomicUsize::new(0));
    let source = CountingSource {
        dir: dataset_dir(&claims_csv(90, 5)),
        fetches: Arc::clone(&fetches),
    };
    let store = InMemoryBundleStore::new();
    let service = Arc::new(
        ScoringService::new(Box::new(store.clone()), Box::new(source)).with_params(fast_params()),
    );

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                let claim = record(json!({"claim_amount": 10000 + i * 1000, "drg_code": "470"}));
                service.score(&[claim]).unwrap()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap().len(), 1);
    }

    assert_eq!(fetches.load(Ordering::SeqCst), 1);
    assert_eq!(service.state(), ServiceState::Ready);
    assert!(store.load().unwrap().is_some());
}

#[test]
fn test_unseen_drg_uses_overall_median() {
    let data = dataset_dir(&claims_csv(90, 5));
    let service = ScoringService::new(
        Box::new(InMemoryBundleStore::new()),
        Box::new(LocalDirectorySource::new(data.path())),
    )
    .with_params(fast_params());
    let bundle = service.bundle().unwrap();

    let claim = record(json!({"claim_amount": 20000, "drg_code": "999"}));
    let frame = bundle.feature_frame(&[claim]);
    let ratio = frame
        .numeric(claim_fraud_scoring::features::derived::DRG_CHARGE_RATIO)
        .unwrap()[0]
        .unwrap();
    assert_eq!(ratio, 20000.0 / bundle.overall_median());
}
