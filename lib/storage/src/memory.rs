//! In-process adapter, for tests and embedding

use crate::adapter::StorageAdapter;
use anyhow::{anyhow, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct MemoryStorage {
    objects: RwLock<HashMap<String, (u64, Arc<Vec<u8>>)>>,
    writes: AtomicU64,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remove(&self, path: &str) -> bool {
        self.objects.write().remove(path).is_some()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl StorageAdapter for MemoryStorage {
    fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.objects
            .read()
            .get(path)
            .map(|(_, bytes)| bytes.as_ref().clone())
            .ok_or_else(|| anyhow!("no object at '{}'", path))
    }

    fn write(&self, path: &str, bytes: &[u8]) -> Result<String> {
        let version = self.writes.fetch_add(1, Ordering::SeqCst) + 1;
        self.objects
            .write()
            .insert(path.to_string(), (version, Arc::new(bytes.to_vec())));
        Ok(path.to_string())
    }

    fn version(&self, path: &str) -> Result<Option<String>> {
        Ok(self.objects.read().get(path).map(|(v, _)| v.to_string()))
    }
}
