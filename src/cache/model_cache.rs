//! Trained-model cache keyed by dataset fingerprint and hyperparameters

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::lru_ttl::LruTtlCache;
use crate::error::Result;
use crate::training::{ModelKind, TrainedModel};

/// SHA-256 over the shape and bit patterns of a training partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetFingerprint([u8; 32]);

impl DatasetFingerprint {
    pub fn of(x: &Array2<f64>, y: &Array1<f64>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update((x.nrows() as u64).to_le_bytes());
        hasher.update((x.ncols() as u64).to_le_bytes());
        for v in x.iter() {
            hasher.update(v.to_bits().to_le_bytes());
        }
        for v in y.iter() {
            hasher.update(v.to_bits().to_le_bytes());
        }
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for DatasetFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..8] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Cache key: which data, which variant, which hyperparameters
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub dataset: DatasetFingerprint,
    pub kind: ModelKind,
    pub params_digest: String,
}

/// Snapshot of cache activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub entries: usize,
    pub capacity: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total > 0 {
            self.hits as f64 / total as f64
        } else {
            0.0
        }
    }
}

/// Cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached models
    pub capacity: usize,
    /// Entry lifetime; unbounded when `None`
    pub ttl_seconds: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 32,
            ttl_seconds: None,
        }
    }
}

/// Shared cache of fitted models.
///
/// Entries are immutable `Arc<TrainedModel>` values, so concurrent sessions
/// can read the same model while another session inserts. Sessions trained on
/// different data never share an entry because the dataset fingerprint is
/// part of the key.
pub struct ModelCache {
    inner: LruTtlCache<CacheKey, Arc<TrainedModel>>,
}

impl Default for ModelCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl ModelCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: LruTtlCache::new(config.capacity, config.ttl_seconds.map(Duration::from_secs)),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<TrainedModel>> {
        self.inner.get(key)
    }

    pub fn insert(&self, key: CacheKey, model: Arc<TrainedModel>) {
        self.inner.set(key, model);
    }

    /// Return the cached model for `key`, or train, store and return a new one.
    ///
    /// The lock is not held while `train` runs; two sessions racing on the
    /// same key both train and the later insert wins. Failed fits are not
    /// cached. The flag is `true` on a cache hit.
    pub fn get_or_train<F>(&self, key: CacheKey, train: F) -> Result<(Arc<TrainedModel>, bool)>
    where
        F: FnOnce() -> Result<TrainedModel>,
    {
        if let Some(model) = self.inner.get(&key) {
            debug!(model = %key.kind, dataset = %key.dataset, "Model cache hit");
            return Ok((model, true));
        }
        debug!(model = %key.kind, dataset = %key.dataset, "Model cache miss");

        let model = Arc::new(train()?);
        self.inner.set(key, Arc::clone(&model));
        Ok((model, false))
    }

    /// Drop every model trained on `dataset`; returns how many were removed
    pub fn invalidate_dataset(&self, dataset: &DatasetFingerprint) -> usize {
        let removed = self.inner.remove_where(|key| &key.dataset == dataset);
        debug!(dataset = %dataset, removed, "Invalidated cached models");
        removed
    }

    pub fn clear(&self) {
        self.inner.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn prune_expired(&self) -> usize {
        self.inner.prune_expired()
    }

    pub fn stats(&self) -> CacheStats {
        let counters = self.inner.counters();
        CacheStats {
            hits: counters.hits,
            misses: counters.misses,
            evictions: counters.evictions,
            expirations: counters.expirations,
            entries: self.inner.len(),
            capacity: self.inner.capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChurnError;
    use crate::training::{KNNClassifier, KNNConfig};
    use ndarray::array;

    fn knn_model() -> TrainedModel {
        let mut knn = KNNClassifier::new(KNNConfig::default());
        knn.fit(&array![[0.0], [1.0]], &array![0.0, 1.0]).unwrap();
        TrainedModel::KNN(knn)
    }

    fn key(dataset: DatasetFingerprint, digest: &str) -> CacheKey {
        CacheKey {
            dataset,
            kind: ModelKind::KNN,
            params_digest: digest.to_string(),
        }
    }

    #[test]
    fn test_fingerprint_sensitivity() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let y = array![0.0, 1.0];
        let a = DatasetFingerprint::of(&x, &y);

        assert_eq!(a, DatasetFingerprint::of(&x.clone(), &y.clone()));
        assert_ne!(a, DatasetFingerprint::of(&x, &array![1.0, 0.0]));
        // same values, different shape
        let reshaped = x.clone().into_shape_with_order((1, 4)).unwrap();
        assert_ne!(a, DatasetFingerprint::of(&reshaped, &y));
    }

    #[test]
    fn test_get_or_train_hits_second_time() {
        let cache = ModelCache::default();
        let dataset = DatasetFingerprint::of(&array![[0.0]], &array![0.0]);

        let mut calls = 0;
        let (_, hit) = cache
            .get_or_train(key(dataset, "p"), || {
                calls += 1;
                Ok(knn_model())
            })
            .unwrap();
        assert!(!hit);

        let (_, hit) = cache
            .get_or_train(key(dataset, "p"), || {
                calls += 1;
                Ok(knn_model())
            })
            .unwrap();
        assert!(hit);
        assert_eq!(calls, 1);

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
    }

    #[test]
    fn test_failures_are_not_cached() {
        let cache = ModelCache::default();
        let dataset = DatasetFingerprint::of(&array![[0.0]], &array![0.0]);

        let result = cache.get_or_train(key(dataset, "p"), || {
            Err(ChurnError::training("KNN", "boom"))
        });
        assert!(result.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_dataset_is_scoped() {
        let cache = ModelCache::default();
        let a = DatasetFingerprint::of(&array![[0.0]], &array![0.0]);
        let b = DatasetFingerprint::of(&array![[1.0]], &array![1.0]);

        cache.insert(key(a, "p1"), Arc::new(knn_model()));
        cache.insert(key(a, "p2"), Arc::new(knn_model()));
        cache.insert(key(b, "p1"), Arc::new(knn_model()));

        assert_eq!(cache.invalidate_dataset(&a), 2);
        assert!(cache.get(&key(a, "p1")).is_none());
        assert!(cache.get(&key(b, "p1")).is_some());

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_bound() {
        let cache = ModelCache::new(CacheConfig {
            capacity: 2,
            ttl_seconds: None,
        });
        let dataset = DatasetFingerprint::of(&array![[0.0]], &array![0.0]);
        for digest in ["a", "b", "c"] {
            cache.insert(key(dataset, digest), Arc::new(knn_model()));
        }
        let stats = cache.stats();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.evictions, 1);
        assert!(cache.get(&key(dataset, "a")).is_none());
    }
}
