//! Filesystem-backed precompiled artifact cache for the unit loader.
//!
//! This crate provides:
//! - `FsPrecompiledStore`: sharded JSON records keyed by `(container, unit name)`
//!   implementing [`unit_loader_core::PrecompiledCache`]
//! - `paths`: key derivation, shard layout and atomic writes

pub mod paths;
pub mod store;

pub use store::{FsPrecompiledStore, StoreMetrics, StoredArtifact};
