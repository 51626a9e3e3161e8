//! Location keys
//!
//! A model is addressed as `kind:path`. Keys without a known kind prefix are
//! plain file paths.

use modelbridge_core::{Error, Result};
use std::fmt;
use std::str::FromStr;

const GOVERNANCE_PREFIX: &str = "/_system/governance";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StorageKind {
    File,
    Registry,
    Memory,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::File => "file",
            StorageKind::Registry => "registry",
            StorageKind::Memory => "memory",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        [StorageKind::File, StorageKind::Registry, StorageKind::Memory]
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(prefix))
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub kind: StorageKind,
    pub path: String,
}

impl Location {
    pub fn new(kind: StorageKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    pub fn parse(key: &str) -> Result<Self> {
        let key = key.trim();
        let (kind, path) = match key.split_once(':') {
            Some((prefix, rest)) => match StorageKind::from_prefix(prefix) {
                Some(kind) => (kind, rest),
                None => (StorageKind::File, key),
            },
            None => (StorageKind::File, key),
        };
        let path = match kind {
            StorageKind::Registry => path.strip_prefix(GOVERNANCE_PREFIX).unwrap_or(path),
            _ => path,
        };
        if path.trim().is_empty() {
            return Err(Error::config(format!("location '{}' has an empty path", key)));
        }
        Ok(Self::new(kind, path))
    }

    /// Canonical `kind:path` form, used as the cache key
    pub fn key(&self) -> String {
        format!("{}:{}", self.kind, self.path)
    }
}

impl FromStr for Location {
    type Err = Error;

    fn from_str(key: &str) -> Result<Self> {
        Location::parse(key)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.path)
    }
}
