//! Storage adapter contract

use anyhow::Result;

/// Byte storage behind one location kind.
///
/// Adapters are shared between threads by the repository.
pub trait StorageAdapter: Send + Sync {
    fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Store `bytes` and return the path they can be read back from
    fn write(&self, path: &str, bytes: &[u8]) -> Result<String>;

    /// Opaque token that changes whenever the object at `path` changes.
    /// `None` when the object does not exist.
    fn version(&self, path: &str) -> Result<Option<String>>;
}
