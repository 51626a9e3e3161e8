//! Versioned artifact registry on LMDB
//!
//! Every write appends a new version of the object; earlier versions stay
//! readable as `path@N`. A plain `path` always reads the latest version.

use crate::adapter::StorageAdapter;
use anyhow::{anyhow, Result};
use heed::byteorder::BE;
use heed::types::{Bytes, Str, U64};
use heed::{Database, Env, EnvOpenOptions};
use std::path::Path;
use std::sync::Arc;

const DB_ARTIFACTS: &str = "artifacts";
const DB_LATEST: &str = "latest";

pub struct RegistryStorage {
    env: Arc<Env>,
    artifacts: Database<Str, Bytes>,
    latest: Database<Str, U64<BE>>,
}

impl RegistryStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        std::fs::create_dir_all(&path)?;

        let env = Arc::new(unsafe {
            EnvOpenOptions::new()
                .map_size(10 * 1024 * 1024 * 1024) // 10GB
                .max_dbs(4)
                .open(path)?
        });

        let mut wtxn = env.write_txn()?;
        let artifacts = env.create_database(&mut wtxn, Some(DB_ARTIFACTS))?;
        let latest = env.create_database(&mut wtxn, Some(DB_LATEST))?;
        wtxn.commit()?;

        Ok(Self {
            env,
            artifacts,
            latest,
        })
    }

    fn version_key(path: &str, version: u64) -> String {
        format!("{}@{:020}", path, version)
    }

    /// Split `path@N` into the object path and a pinned version
    fn split_version(path: &str) -> (&str, Option<u64>) {
        match path.rsplit_once('@') {
            Some((base, v)) => match v.parse() {
                Ok(version) => (base, Some(version)),
                Err(_) => (path, None),
            },
            None => (path, None),
        }
    }

    pub fn latest_version(&self, path: &str) -> Result<Option<u64>> {
        let rtxn = self.env.read_txn()?;
        Ok(self.latest.get(&rtxn, path)?)
    }

    /// All stored versions of `path`, oldest first
    pub fn versions(&self, path: &str) -> Result<Vec<u64>> {
        let latest = self.latest_version(path)?.unwrap_or(0);
        Ok((1..=latest).collect())
    }
}

impl StorageAdapter for RegistryStorage {
    fn read(&self, path: &str) -> Result<Vec<u8>> {
        let (base, pinned) = Self::split_version(path);
        let rtxn = self.env.read_txn()?;
        let version = match pinned {
            Some(v) => v,
            None => self
                .latest
                .get(&rtxn, base)?
                .ok_or_else(|| anyhow!("no artifact registered at '{}'", base))?,
        };
        let data = self
            .artifacts
            .get(&rtxn, &Self::version_key(base, version))?
            .ok_or_else(|| anyhow!("version {} of '{}' does not exist", version, base))?;
        Ok(data.to_vec())
    }

    fn write(&self, path: &str, bytes: &[u8]) -> Result<String> {
        let (base, pinned) = Self::split_version(path);
        if pinned.is_some() {
            return Err(anyhow!("cannot write to a pinned version: '{}'", path));
        }
        let mut wtxn = self.env.write_txn()?;
        let version = self.latest.get(&wtxn, base)?.unwrap_or(0) + 1;
        self.artifacts
            .put(&mut wtxn, &Self::version_key(base, version), bytes)?;
        self.latest.put(&mut wtxn, base, &version)?;
        wtxn.commit()?;
        Ok(format!("{}@{}", base, version))
    }

    fn version(&self, path: &str) -> Result<Option<String>> {
        let (base, pinned) = Self::split_version(path);
        let rtxn = self.env.read_txn()?;
        let version = match pinned {
            Some(v) => self
                .artifacts
                .get(&rtxn, &Self::version_key(base, v))?
                .map(|_| v),
            None => self.latest.get(&rtxn, base)?,
        };
        Ok(version.map(|v| v.to_string()))
    }
}
