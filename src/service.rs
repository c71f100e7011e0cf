//! Scoring service: lazily loads or trains the bundle and answers queries.
//!
//! State machine: `Unloaded -> Loading -> Ready`, with `Ready -> Loading`
//! only on an explicit retrain. The load-or-train sequence runs under one
//! mutex so concurrent first requests never train twice. Once ready, scoring
//! only clones an `Arc` under the lock and works on the immutable bundle.

use crate::config::AppConfig;
use crate::dataset::{load_training_table, DatasetSource, LocalDirectorySource};
use crate::error::Result;
use crate::features::catalog::{describe_features, FeatureInfo};
use crate::metrics::ScoringMetrics;
use crate::models::bundle::ModelBundle;
use crate::models::gbdt::GbdtParams;
use crate::models::trainer::train_bundle;
use crate::storage::{BundleStore, FsBundleStore};
use crate::types::{ClaimPrediction, RawRecord};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Lifecycle of the cached bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Unloaded,
    Loading,
    Ready,
}

/// Lock-guarded owner of the process's model bundle
pub struct ScoringService {
    store: Box<dyn BundleStore>,
    source: Box<dyn DatasetSource>,
    params: GbdtParams,
    threshold: f64,
    cache: Mutex<Option<Arc<ModelBundle>>>,
    loading: AtomicBool,
    metrics: ScoringMetrics,
}

impl ScoringService {
    /// Create a service over injectable storage and dataset collaborators.
    pub fn new(store: Box<dyn BundleStore>, source: Box<dyn DatasetSource>) -> Self {
        Self {
            store,
            source,
            params: GbdtParams::default(),
            threshold: 0.5,
            cache: Mutex::new(None),
            loading: AtomicBool::new(false),
            metrics: ScoringMetrics::new(),
        }
    }

    /// Filesystem store and local dataset directory from configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        let store = FsBundleStore::new(
            &config.storage.artifact_dir,
            &config.storage.model_file,
            &config.storage.metadata_file,
        );
        let source = LocalDirectorySource::new(&config.dataset.dir);
        Self::new(Box::new(store), Box::new(source)).with_threshold(config.scoring.threshold)
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Override classifier hyperparameters used by training runs.
    pub fn with_params(mut self, params: GbdtParams) -> Self {
        self.params = params;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn metrics(&self) -> &ScoringMetrics {
        &self.metrics
    }

    pub fn state(&self) -> ServiceState {
        if self.loading.load(Ordering::Acquire) {
            return ServiceState::Loading;
        }
        match self.cache.try_lock() {
            Ok(cache) if cache.is_some() => ServiceState::Ready,
            Ok(_) => ServiceState::Unloaded,
            Err(std::sync::TryLockError::WouldBlock) => ServiceState::Loading,
            Err(std::sync::TryLockError::Poisoned(cache)) if cache.get_ref().is_some() => {
                ServiceState::Ready
            }
            Err(std::sync::TryLockError::Poisoned(_)) => ServiceState::Unloaded,
        }
    }

    /// The cached bundle, loading or training it on first use.
    pub fn bundle(&self) -> Result<Arc<ModelBundle>> {
        self.load_or_train(false)
    }

    /// Train a fresh bundle, persist it and replace the cached one.
    ///
    /// On failure the previously cached bundle, if any, stays in service.
    pub fn retrain(&self) -> Result<Arc<ModelBundle>> {
        self.load_or_train(true)
    }

    /// Install a prebuilt bundle, bypassing storage and training.
    pub fn install(&self, bundle: ModelBundle) -> Result<Arc<ModelBundle>> {
        let mut cache = self.lock_cache();
        let bundle = Arc::new(bundle);
        *cache = Some(Arc::clone(&bundle));
        info!(bundle_id = %bundle.bundle_id, "fraud model bundle installed");
        Ok(bundle)
    }

    /// The cache is written only after a successful load, so a panic in a
    /// collaborator leaves it consistent and the poison can be cleared.
    fn lock_cache(&self) -> MutexGuard<'_, Option<Arc<ModelBundle>>> {
        self.cache.lock().unwrap_or_else(|poisoned| {
            warn!("model cache lock poisoned by an earlier panic, recovering");
            self.cache.clear_poison();
            poisoned.into_inner()
        })
    }

    fn load_or_train(&self, force_retrain: bool) -> Result<Arc<ModelBundle>> {
        let mut cache = self.lock_cache();
        if !force_retrain {
            if let Some(bundle) = cache.as_ref() {
                return Ok(Arc::clone(bundle));
            }
        }

        let started = Instant::now();
        let result = {
            let _loading = LoadingFlag::raise(&self.loading);
            self.obtain(force_retrain)
        };

        match result {
            Ok(bundle) => {
                let bundle = Arc::new(bundle);
                *cache = Some(Arc::clone(&bundle));
                info!(
                    bundle_id = %bundle.bundle_id,
                    force_retrain,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "fraud model ready"
                );
                Ok(bundle)
            }
            Err(e) => {
                error!(
                    error = %e,
                    retryable = e.is_retryable(),
                    force_retrain,
                    "failed to load or train fraud model"
                );
                Err(e)
            }
        }
    }

    fn obtain(&self, force_retrain: bool) -> Result<ModelBundle> {
        if !force_retrain {
            if let Some(bundle) = self.store.load()? {
                return Ok(bundle);
            }
            info!("no persisted fraud model found, training");
        } else {
            info!("forced retrain requested");
        }

        let table = load_training_table(self.source.as_ref())?;
        let bundle = train_bundle(&table, &self.params)?;
        self.store.save(&bundle)?;
        Ok(bundle)
    }

    /// One fraud probability per record, in input order.
    ///
    /// Fails only when no bundle can be obtained.
    pub fn score(&self, records: &[RawRecord]) -> Result<Vec<f64>> {
        let bundle = self.bundle()?;
        let started = Instant::now();
        let probabilities = bundle.predict_proba(records);
        let elapsed = started.elapsed();

        self.metrics
            .record_batch(elapsed, &probabilities, self.threshold);
        debug!(
            records = records.len(),
            elapsed_us = elapsed.as_micros() as u64,
            "claims scored"
        );
        Ok(probabilities)
    }

    /// Probabilities plus thresholded labels.
    pub fn predict(&self, records: &[RawRecord]) -> Result<Vec<ClaimPrediction>> {
        Ok(self
            .score(records)?
            .into_iter()
            .map(|p| ClaimPrediction::new(p, self.threshold))
            .collect())
    }

    /// Static feature descriptions; needs no model.
    pub fn describe_features() -> Vec<FeatureInfo> {
        describe_features()
    }
}

/// Holds the `Loading` flag for its lifetime, including during unwinding.
struct LoadingFlag<'a>(&'a AtomicBool);

impl<'a> LoadingFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for LoadingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

static GLOBAL: OnceLock<ScoringService> = OnceLock::new();

/// Install the process-wide service. A service installed earlier wins and
/// `service` is dropped.
pub fn init_global(service: ScoringService) -> &'static ScoringService {
    GLOBAL.get_or_init(|| service)
}

/// The process-wide service, if one was installed.
pub fn global() -> Option<&'static ScoringService> {
    GLOBAL.get()
}
