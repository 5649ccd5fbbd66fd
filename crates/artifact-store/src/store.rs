//! Filesystem-backed precompiled artifact store.

use anyhow::{anyhow, Result};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use unit_loader_core::{DefinedUnit, PrecompiledCache};
use unit_loader_types::ContainerId;

use crate::paths::{artifact_key, artifact_path, atomic_write_json, content_digest, default_cache_root};

/// On-disk record for one stored definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredArtifact {
    pub container: String,
    pub name: String,
    /// Base64-encoded unit bytes
    pub bytes: String,
    /// Hex SHA-256 of the decoded bytes
    pub digest: String,
    /// Key of the coordinator that defined the unit
    pub loader: String,
    pub stored_at: DateTime<Utc>,
}

impl StoredArtifact {
    pub fn from_unit(container: &ContainerId, unit: &DefinedUnit) -> Self {
        Self {
            container: container.as_str().to_string(),
            name: unit.name().to_string(),
            bytes: base64::engine::general_purpose::STANDARD.encode(unit.bytes()),
            digest: content_digest(unit.bytes()),
            loader: unit.loader_key().to_string(),
            stored_at: Utc::now(),
        }
    }

    /// Decode and verify the stored bytes.
    pub fn decode(&self) -> Result<Vec<u8>> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&self.bytes)
            .map_err(|e| anyhow!("Failed to decode artifact {}: {}", self.name, e))?;
        let digest = content_digest(&bytes);
        if digest != self.digest {
            return Err(anyhow!(
                "Artifact {} digest mismatch (expected {}, found {})",
                self.name,
                self.digest,
                digest
            ));
        }
        Ok(bytes)
    }
}

/// Store counters (thread-safe).
#[derive(Debug, Clone, Default)]
pub struct StoreMetrics {
    pub hits: Arc<AtomicU64>,
    pub misses: Arc<AtomicU64>,
    pub writes: Arc<AtomicU64>,
    pub skipped_writes: Arc<AtomicU64>,
    pub corrupt: Arc<AtomicU64>,
}

impl StoreMetrics {
    pub fn summary(&self) -> String {
        format!(
            "hits={} misses={} writes={} skipped={} corrupt={}",
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
            self.writes.load(Ordering::Relaxed),
            self.skipped_writes.load(Ordering::Relaxed),
            self.corrupt.load(Ordering::Relaxed),
        )
    }
}

/// Sharded JSON store keyed by `(container identity, unit name)`.
pub struct FsPrecompiledStore {
    cache_root: Arc<Path>,
    metrics: StoreMetrics,
}

impl FsPrecompiledStore {
    pub fn new<P: AsRef<Path>>(cache_root: P) -> Result<Self> {
        let cache_root = cache_root.as_ref().to_path_buf();
        std::fs::create_dir_all(&cache_root)
            .map_err(|e| anyhow!("Failed to create cache root {}: {}", cache_root.display(), e))?;
        Ok(Self {
            cache_root: Arc::from(cache_root),
            metrics: StoreMetrics::default(),
        })
    }

    /// Store rooted at [`default_cache_root`].
    pub fn open_default() -> Result<Self> {
        Self::new(default_cache_root()?)
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    pub fn metrics(&self) -> &StoreMetrics {
        &self.metrics
    }

    fn path_for(&self, container: &ContainerId, name: &str) -> PathBuf {
        artifact_path(&self.cache_root, &artifact_key(container, name))
    }

    /// Raw record, if present. Records for a different pair are ignored.
    pub fn get(&self, container: &ContainerId, name: &str) -> Result<Option<StoredArtifact>> {
        let path = self.path_for(container, name);
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&path)
            .map_err(|e| anyhow!("Failed to read artifact file {}: {}", path.display(), e))?;
        let record: StoredArtifact =
            serde_json::from_str(&json).map_err(|e| anyhow!("Failed to parse artifact JSON: {}", e))?;
        if record.container != container.as_str() || record.name != name {
            warn!(path = %path.display(), name, "artifact record belongs to another unit");
            return Ok(None);
        }
        Ok(Some(record))
    }

    /// Delete the record for one pair. Returns whether one existed.
    pub fn remove(&self, container: &ContainerId, name: &str) -> Result<bool> {
        let path = self.path_for(container, name);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path)
            .map_err(|e| anyhow!("Failed to remove artifact {}: {}", path.display(), e))?;
        Ok(true)
    }
}

impl PrecompiledCache for FsPrecompiledStore {
    fn load_precompiled(&self, container: &ContainerId, name: &str) -> Result<Option<Vec<u8>>> {
        let Some(record) = self.get(container, name)? else {
            self.metrics.misses.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        };
        match record.decode() {
            Ok(bytes) => {
                self.metrics.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(bytes))
            }
            Err(e) => {
                self.metrics.corrupt.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    fn store_precompiled(&self, container: &ContainerId, unit: &DefinedUnit) -> Result<()> {
        let path = self.path_for(container, unit.name());
        let digest = content_digest(unit.bytes());

        // Identical bytes already stored
        if let Ok(Some(existing)) = self.get(container, unit.name()) {
            if existing.digest == digest {
                self.metrics.skipped_writes.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
        }

        atomic_write_json(&path, &StoredArtifact::from_unit(container, unit))?;
        self.metrics.writes.fetch_add(1, Ordering::Relaxed);
        debug!(container = %container, name = unit.name(), path = %path.display(), "stored precompiled artifact");
        Ok(())
    }
}

impl std::fmt::Debug for FsPrecompiledStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsPrecompiledStore")
            .field("cache_root", &self.cache_root)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;
    use unit_loader_core::{Coordinator, MemoryContainer, UnitLoader, UnitOrigin};

    fn coordinator(key: &str, store: Arc<FsPrecompiledStore>, container: Arc<MemoryContainer>) -> Arc<Coordinator> {
        Coordinator::builder(key).container(container).precompiled(store).build()
    }

    #[test]
    fn test_store_then_reuse_across_coordinators() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = Arc::new(FsPrecompiledStore::new(temp_dir.path())?);
        let container = Arc::new(MemoryContainer::new("mem:app").with_entry("app/Main.unit", b"main-bytes"));

        let first = coordinator("first", store.clone(), container.clone());
        assert_eq!(first.load("app.Main")?.origin(), UnitOrigin::Container);

        let record = store
            .get(&ContainerId::new("mem:app"), "app.Main")?
            .ok_or_else(|| anyhow!("artifact missing"))?;
        assert_eq!(record.loader, "first");
        assert_eq!(record.decode()?, b"main-bytes");

        let second = coordinator("second", store.clone(), container);
        let reused = second.load("app.Main")?;
        assert_eq!(reused.origin(), UnitOrigin::Precompiled);
        assert_eq!(reused.bytes(), b"main-bytes");
        assert_eq!(store.metrics().hits.load(Ordering::Relaxed), 1);
        assert_eq!(store.metrics().writes.load(Ordering::Relaxed), 1);
        Ok(())
    }

    #[test]
    fn test_corrupt_record_falls_back_to_container() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = Arc::new(FsPrecompiledStore::new(temp_dir.path())?);
        let container = Arc::new(MemoryContainer::new("mem:app").with_entry("app/Main.unit", b"fresh"));
        let id = ContainerId::new("mem:app");

        let record = StoredArtifact {
            container: id.as_str().to_string(),
            name: "app.Main".to_string(),
            bytes: base64::engine::general_purpose::STANDARD.encode(b"stale"),
            digest: content_digest(b"something else"),
            loader: "old".to_string(),
            stored_at: Utc::now(),
        };
        atomic_write_json(&artifact_path(store.cache_root(), &artifact_key(&id, "app.Main")), &record)?;

        assert!(store.load_precompiled(&id, "app.Main").is_err());
        let unit = coordinator("app", store.clone(), container).load("app.Main")?;
        assert_eq!(unit.bytes(), b"fresh");
        assert_eq!(unit.origin(), UnitOrigin::Container);
        assert_eq!(store.get(&id, "app.Main")?.map(|r| r.decode().is_ok()), Some(true));
        Ok(())
    }

    #[test]
    fn test_identical_store_is_skipped() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = Arc::new(FsPrecompiledStore::new(temp_dir.path())?);
        let container = Arc::new(MemoryContainer::new("mem:lib").with_entry("lib/A.unit", b"a"));

        let first = coordinator("one", store.clone(), container.clone()).load("lib.A")?;
        store.store_precompiled(&ContainerId::new("mem:lib"), &first)?;

        assert_eq!(store.metrics().writes.load(Ordering::Relaxed), 1);
        assert_eq!(store.metrics().skipped_writes.load(Ordering::Relaxed), 1);
        assert!(store.metrics().summary().contains("writes=1"));
        Ok(())
    }

    #[test]
    fn test_missing_and_remove() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = Arc::new(FsPrecompiledStore::new(temp_dir.path())?);
        let id = ContainerId::new("mem:none");

        assert!(store.load_precompiled(&id, "x.Y")?.is_none());
        assert!(!store.remove(&id, "x.Y")?);

        let container = Arc::new(MemoryContainer::new("mem:none").with_entry("x/Y.unit", b"y"));
        coordinator("c", store.clone(), container).load("x.Y")?;
        assert!(store.remove(&id, "x.Y")?);
        assert!(store.get(&id, "x.Y")?.is_none());
        Ok(())
    }
}
