//! # ModelBridge Storage
//!
//! Artifact persistence and the model repository cache.
//!
//! - [`StorageAdapter`] - byte storage contract, with [`FileStorage`],
//!   [`RegistryStorage`] (LMDB, versioned) and [`MemoryStorage`]
//! - [`codec`] - checksummed, compressed artifact format
//! - [`ModelRepository`] - location-keyed loading with version-checked caching

pub mod adapter;
pub mod codec;
pub mod file;
pub mod location;
pub mod memory;
pub mod registry;
pub mod repository;

pub use adapter::StorageAdapter;
pub use file::FileStorage;
pub use location::{Location, StorageKind};
pub use memory::MemoryStorage;
pub use registry::RegistryStorage;
pub use repository::ModelRepository;
