//! Durable storage for model bundles.

use crate::error::{FraudModelError, Result};
use crate::features::group_stats::GroupStatistics;
use crate::models::bundle::{ModelBundle, BUNDLE_FORMAT_VERSION};
use crate::models::evaluation::TrainingMetrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

/// Persistence for the single current bundle.
pub trait BundleStore: Send + Sync {
    /// Load the persisted bundle, `Ok(None)` when nothing has been saved.
    fn load(&self) -> Result<Option<ModelBundle>>;

    /// Persist `bundle`, replacing any previous one.
    fn save(&self, bundle: &ModelBundle) -> Result<()>;
}

/// Human-readable summary written next to the bundle artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleMetadata {
    pub bundle_id: Uuid,
    pub trained_at: DateTime<Utc>,
    pub format_version: u32,
    pub feature_columns: Vec<String>,
    pub categorical_cols: Vec<String>,
    pub numeric_cols: Vec<String>,
    pub drg_charge_medians_size: usize,
    pub overall_charge_median: f64,
    pub scale_pos_weight: f64,
    pub training_metrics: TrainingMetrics,
}

impl BundleMetadata {
    pub fn from_bundle(bundle: &ModelBundle) -> Self {
        let stats: &GroupStatistics = &bundle.group_stats;
        Self {
            bundle_id: bundle.bundle_id,
            trained_at: bundle.trained_at,
            format_version: bundle.format_version,
            feature_columns: bundle.feature_columns.clone(),
            categorical_cols: bundle.categorical_cols.clone(),
            numeric_cols: bundle.numeric_cols.clone(),
            drg_charge_medians_size: stats.len(),
            overall_charge_median: stats.overall_median(),
            scale_pos_weight: bundle.scale_pos_weight(),
            training_metrics: bundle.training_metrics.clone(),
        }
    }
}

/// Bundle artifact plus metadata summary as two JSON files in one directory
#[derive(Debug, Clone)]
pub struct FsBundleStore {
    model_path: PathBuf,
    metadata_path: PathBuf,
}

impl FsBundleStore {
    pub fn new<P: AsRef<Path>>(dir: P, model_file: &str, metadata_file: &str) -> Self {
        let dir = dir.as_ref();
        Self {
            model_path: dir.join(model_file),
            metadata_path: dir.join(metadata_file),
        }
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn metadata_path(&self) -> &Path {
        &self.metadata_path
    }

    fn commit(tmp: &Path, path: &Path) -> Result<()> {
        fs::rename(tmp, path).map_err(|e| {
            let _ = fs::remove_file(tmp);
            FraudModelError::Storage(format!(
                "failed to move {} into place: {}",
                path.display(),
                e
            ))
        })
    }

    fn temp_path(path: &Path) -> PathBuf {
        let mut name = path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        path.with_file_name(name)
    }
}

impl BundleStore for FsBundleStore {
    /// A bundle counts as persisted only when both files are present.
    fn load(&self) -> Result<Option<ModelBundle>> {
        if !self.model_path.exists() || !self.metadata_path.exists() {
            debug!(
                model = self.model_path.exists(),
                metadata = self.metadata_path.exists(),
                "no complete bundle on disk"
            );
            return Ok(None);
        }
        let bytes = fs::read(&self.model_path)?;
        let bundle: ModelBundle = serde_json::from_slice(&bytes)?;
        if bundle.format_version != BUNDLE_FORMAT_VERSION {
            return Err(FraudModelError::IncompatibleBundle {
                found: bundle.format_version,
                expected: BUNDLE_FORMAT_VERSION,
            });
        }
        info!(
            path = %self.model_path.display(),
            bundle_id = %bundle.bundle_id,
            "fraud model bundle loaded"
        );
        Ok(Some(bundle))
    }

    /// Writes both files under temporary names first and renames them into
    /// place only once both writes succeeded. The model rename commits the
    /// pair, so it goes last.
    fn save(&self, bundle: &ModelBundle) -> Result<()> {
        if let Some(dir) = self.model_path.parent() {
            fs::create_dir_all(dir)?;
        }
        if let Some(dir) = self.metadata_path.parent() {
            fs::create_dir_all(dir)?;
        }

        let model_tmp = Self::temp_path(&self.model_path);
        let metadata_tmp = Self::temp_path(&self.metadata_path);
        let metadata = BundleMetadata::from_bundle(bundle);

        let written = serde_json::to_vec(bundle)
            .map_err(FraudModelError::from)
            .and_then(|bytes| fs::write(&model_tmp, bytes).map_err(FraudModelError::from))
            .and_then(|_| serde_json::to_vec_pretty(&metadata).map_err(FraudModelError::from))
            .and_then(|bytes| fs::write(&metadata_tmp, bytes).map_err(FraudModelError::from));
        if let Err(e) = written {
            let _ = fs::remove_file(&model_tmp);
            let _ = fs::remove_file(&metadata_tmp);
            return Err(e);
        }

        if let Err(e) = Self::commit(&metadata_tmp, &self.metadata_path) {
            let _ = fs::remove_file(&model_tmp);
            return Err(e);
        }
        Self::commit(&model_tmp, &self.model_path)?;
        info!(
            path = %self.model_path.display(),
            metadata = %self.metadata_path.display(),
            bundle_id = %bundle.bundle_id,
            "fraud model bundle saved"
        );
        Ok(())
    }
}

/// Process-local store, for tests and for injecting a prebuilt bundle
#[derive(Debug, Clone, Default)]
pub struct InMemoryBundleStore {
    slot: Arc<Mutex<Option<ModelBundle>>>,
}

impl InMemoryBundleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bundle(bundle: ModelBundle) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(bundle))),
        }
    }
}

impl BundleStore for InMemoryBundleStore {
    fn load(&self) -> Result<Option<ModelBundle>> {
        let slot = self.slot.lock().map_err(|_| FraudModelError::LockPoisoned)?;
        Ok(slot.clone())
    }

    fn save(&self, bundle: &ModelBundle) -> Result<()> {
        let mut slot = self.slot.lock().map_err(|_| FraudModelError::LockPoisoned)?;
        *slot = Some(bundle.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::trainer::train_bundle;
    use crate::models::GbdtParams;
    use crate::types::{RawRecord, RawTable};
    use serde_json::json;

    fn bundle() -> ModelBundle {
        let rows: Vec<RawRecord> = (0..40)
            .map(|i| {
                json!({
                    "ClaimAmount": 1000 + i * 250,
                    "DRGDefinition": if i % 2 == 0 { "470" } else { "291" },
                    "fraud": u8::from(i % 4 == 0),
                })
                .as_object()
                .cloned()
                .unwrap()
            })
            .collect();
        let columns = vec![
            "ClaimAmount".to_string(),
            "DRGDefinition".to_string(),
            "fraud".to_string(),
        ];
        let params = GbdtParams {
            n_estimators: 5,
            ..GbdtParams::default()
        };
        train_bundle(&RawTable::new(columns, rows), &params).unwrap()
    }

    #[test]
    fn test_fs_store_round_trip_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBundleStore::new(dir.path().join("artifacts"), "model.json", "meta.json");
        assert!(store.load().unwrap().is_none());

        let bundle = bundle();
        store.save(&bundle).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, bundle);

        let metadata: BundleMetadata =
            serde_json::from_slice(&fs::read(store.metadata_path()).unwrap()).unwrap();
        assert_eq!(metadata.feature_columns, bundle.feature_columns);
        assert_eq!(metadata.drg_charge_medians_size, 2);
        assert!(!FsBundleStore::temp_path(store.model_path()).exists());
    }

    #[test]
    fn test_model_without_metadata_is_not_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBundleStore::new(dir.path(), "model.json", "meta.json");
        store.save(&bundle()).unwrap();

        fs::remove_file(store.metadata_path()).unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_failed_commit_leaves_previous_model() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBundleStore::new(dir.path(), "model.json", "meta.json");
        let first = bundle();
        store.save(&first).unwrap();

        // A directory in the metadata slot makes the metadata rename fail.
        fs::remove_file(store.metadata_path()).unwrap();
        fs::create_dir(store.metadata_path()).unwrap();
        fs::write(store.metadata_path().join("keep"), b"x").unwrap();

        let err = store.save(&bundle()).unwrap_err();
        assert!(matches!(err, FraudModelError::Storage(_)));
        let on_disk: ModelBundle =
            serde_json::from_slice(&fs::read(store.model_path()).unwrap()).unwrap();
        assert_eq!(on_disk.bundle_id, first.bundle_id);
        assert!(!FsBundleStore::temp_path(store.model_path()).exists());
    }

    #[test]
    fn test_incompatible_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBundleStore::new(dir.path(), "model.json", "meta.json");
        let mut bundle = bundle();
        bundle.format_version = BUNDLE_FORMAT_VERSION + 1;
        store.save(&bundle).unwrap();

        assert!(matches!(
            store.load(),
            Err(FraudModelError::IncompatibleBundle { .. })
        ));
    }

    #[test]
    fn test_in_memory_store() {
        let store = InMemoryBundleStore::new();
        assert!(store.load().unwrap().is_none());
        let bundle = bundle();
        store.save(&bundle).unwrap();
        assert_eq!(store.load().unwrap().unwrap().bundle_id, bundle.bundle_id);
    }
}
