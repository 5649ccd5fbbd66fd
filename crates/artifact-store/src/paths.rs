//! Path utilities for the sharded artifact layout.
//!
//! ```text
//! <root>/artifacts/<aa>/<bb>/<key>.json
//! ```
//!
//! `key` is the lowercase hex SHA-256 of the container identity and the
//! logical unit name; `aa`/`bb` are its first two byte pairs.

use anyhow::{anyhow, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use unit_loader_types::env_utils::env_var;
use unit_loader_types::ContainerId;

/// Overrides [`default_cache_root`].
pub const ARTIFACT_DIR_ENV: &str = "UNIT_LOADER_ARTIFACT_DIR";

/// Stable storage key for one `(container, name)` pair.
pub fn artifact_key(container: &ContainerId, name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(container.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(name.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hex SHA-256 of artifact bytes, stored alongside them.
pub fn content_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Shard directories (aa/bb) for a key.
pub fn shard_path(key: &str) -> (&str, &str) {
    (&key[0..2], &key[2..4])
}

pub fn artifact_path(cache_root: &Path, key: &str) -> PathBuf {
    let (aa, bb) = shard_path(key);
    cache_root
        .join("artifacts")
        .join(aa)
        .join(bb)
        .join(format!("{}.json", key))
}

/// `$UNIT_LOADER_ARTIFACT_DIR`, else `~/.unit-loader/precompiled`.
pub fn default_cache_root() -> Result<PathBuf> {
    if let Some(dir) = env_var::<PathBuf>(ARTIFACT_DIR_ENV) {
        return Ok(dir);
    }
    dirs::home_dir()
        .map(|home| home.join(".unit-loader").join("precompiled"))
        .ok_or_else(|| anyhow!("Failed to determine home directory for the artifact cache"))
}

pub fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| anyhow!("Failed to create directory {}: {}", parent.display(), e))?;
    }
    Ok(())
}

/// Write to a sibling `.tmp` file, then rename over `path`.
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    ensure_parent_dirs(path)?;
    let tmp_path = path.with_extension(format!(
        "{}.tmp",
        path.extension().and_then(|s| s.to_str()).unwrap_or("tmp")
    ));
    std::fs::write(&tmp_path, contents)
        .map_err(|e| anyhow!("Failed to write temp file {}: {}", tmp_path.display(), e))?;
    std::fs::rename(&tmp_path, path).map_err(|e| {
        anyhow!(
            "Failed to rename {} to {}: {}",
            tmp_path.display(),
            path.display(),
            e
        )
    })?;
    Ok(())
}

pub fn atomic_write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec(value).map_err(|e| anyhow!("Failed to serialize JSON: {}", e))?;
    atomic_write(path, &json)
}
