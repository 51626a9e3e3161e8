//! Local filesystem adapter

use crate::adapter::StorageAdapter;
use anyhow::{Context, Result};
use atomicwrites::{AllowOverwrite, AtomicFile};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Reads and writes artifacts as files. Writes go to a temporary file that is
/// renamed into place, so readers never observe a partial artifact.
#[derive(Debug, Clone, Default)]
pub struct FileStorage {
    root: Option<PathBuf>,
}

impl FileStorage {
    /// Paths are used as given
    pub fn new() -> Self {
        Self::default()
    }

    /// Relative paths are resolved against `root`
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        Self {
            root: Some(root.as_ref().to_path_buf()),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl StorageAdapter for FileStorage {
    fn read(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.resolve(path);
        std::fs::read(&full).with_context(|| format!("cannot read {}", full.display()))
    }

    fn write(&self, path: &str, bytes: &[u8]) -> Result<String> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        AtomicFile::new(&full, AllowOverwrite)
            .write(|f| f.write_all(bytes))
            .map_err(|e| anyhow::anyhow!("cannot write {}: {}", full.display(), e))?;
        Ok(path.to_string())
    }

    fn version(&self, path: &str) -> Result<Option<String>> {
        let full = self.resolve(path);
        let metadata = match std::fs::metadata(&full) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let modified = metadata
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        Ok(Some(format!("{}-{}", modified, metadata.len())))
    }
}
