//! Model repository
//!
//! Loads artifacts through the storage adapters and caches one decoded
//! artifact per location. A cached artifact is reused while the adapter
//! reports the same version token; otherwise the new artifact is decoded off
//! to the side and swapped in under the write lock, so readers holding the
//! previous `Arc` finish with it undisturbed. When loads of one location
//! overlap, the one that read the newer version keeps its entry.

use crate::adapter::StorageAdapter;
use crate::codec;
use crate::file::FileStorage;
use crate::location::{Location, StorageKind};
use crate::memory::MemoryStorage;
use modelbridge_core::{Error, ModelArtifact, Result};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

struct CacheEntry {
    version: Option<String>,
    /// Order in which the version token was read
    sequence: u64,
    artifact: Arc<ModelArtifact>,
}

pub struct ModelRepository {
    adapters: HashMap<StorageKind, Arc<dyn StorageAdapter>>,
    cache: RwLock<HashMap<String, CacheEntry>>,
    sequence: Mutex<u64>,
}

impl Default for ModelRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelRepository {
    /// A repository with no adapters registered
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
            cache: RwLock::new(HashMap::new()),
            sequence: Mutex::new(0),
        }
    }

    /// File storage resolving relative paths against the working directory,
    /// plus an in-process memory store
    pub fn with_defaults() -> Self {
        Self::new()
            .with_adapter(StorageKind::File, Arc::new(FileStorage::new()))
            .with_adapter(StorageKind::Memory, Arc::new(MemoryStorage::new()))
    }

    pub fn with_adapter(mut self, kind: StorageKind, adapter: Arc<dyn StorageAdapter>) -> Self {
        self.register(kind, adapter);
        self
    }

    pub fn register(&mut self, kind: StorageKind, adapter: Arc<dyn StorageAdapter>) {
        self.adapters.insert(kind, adapter);
    }

    pub fn adapter(&self, kind: StorageKind) -> Option<&Arc<dyn StorageAdapter>> {
        self.adapters.get(&kind)
    }

    fn resolve(&self, location_key: &str) -> Result<(Location, &Arc<dyn StorageAdapter>)> {
        let location =
            Location::parse(location_key).map_err(|e| Error::model_load(location_key, e))?;
        let adapter = self.adapters.get(&location.kind).ok_or_else(|| {
            Error::model_load(
                location_key,
                format!("no storage adapter registered for '{}'", location.kind),
            )
        })?;
        Ok((location, adapter))
    }

    /// Load the artifact at `location_key`.
    ///
    /// Returns the cached artifact unless `force_refresh` is set or the stored
    /// object changed. Any failure leaves the cache as it was.
    pub fn load(&self, location_key: &str, force_refresh: bool) -> Result<Arc<ModelArtifact>> {
        let (location, adapter) = self.resolve(location_key)?;
        let key = location.key();

        // Version reads are numbered in the order they happen
        let (sequence, version) = {
            let mut last = self.sequence.lock();
            let version = adapter
                .version(&location.path)
                .map_err(|e| Error::model_load(&key, format!("{:#}", e)))?;
            *last += 1;
            (*last, version)
        };

        if !force_refresh {
            if let Some(entry) = self.cache.read().get(&key) {
                if version.is_some() && entry.version == version {
                    debug!("Model cache hit for {}", key);
                    return Ok(Arc::clone(&entry.artifact));
                }
            }
        }

        let bytes = adapter
            .read(&location.path)
            .map_err(|e| Error::model_load(&key, format!("{:#}", e)))?;
        let artifact = Arc::new(codec::decode(&bytes).map_err(|e| Error::model_load(&key, e))?);

        let mut cache = self.cache.write();
        if let Some(entry) = cache.get(&key) {
            if entry.sequence > sequence {
                debug!("Newer model already cached for {}, discarding this load", key);
                return Ok(Arc::clone(&entry.artifact));
            }
        }
        cache.insert(
            key.clone(),
            CacheEntry {
                version,
                sequence,
                artifact: Arc::clone(&artifact),
            },
        );
        drop(cache);
        info!(
            "Loaded {} model {} from {}",
            artifact.algorithm_name, artifact.model_id, key
        );
        Ok(artifact)
    }

    /// Encode and store `artifact`, returning the key it can be loaded from
    pub fn store(&self, location_key: &str, artifact: &ModelArtifact) -> Result<String> {
        let (location, adapter) = self.resolve(location_key)?;
        let bytes = codec::encode(artifact)?;
        let stored = adapter
            .write(&location.path, &bytes)
            .map_err(|e| Error::Storage(format!("{:#}", e)))?;
        let stored = Location::new(location.kind, stored).key();
        info!(
            "Stored {} model {} at {} ({} bytes)",
            artifact.algorithm_name,
            artifact.model_id,
            stored,
            bytes.len()
        );
        Ok(stored)
    }

    /// Drop the cached artifact for `location_key`
    pub fn evict(&self, location_key: &str) -> bool {
        match Location::parse(location_key) {
            Ok(location) => self.cache.write().remove(&location.key()).is_some(),
            Err(_) => false,
        }
    }

    pub fn cached(&self, location_key: &str) -> Option<Arc<ModelArtifact>> {
        let key = Location::parse(location_key).ok()?.key();
        self.cache.read().get(&key).map(|e| Arc::clone(&e.artifact))
    }

    pub fn cached_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.cache.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}
