//! Interface to the external precompiled-artifact cache.
//!
//! The cache is opaque to the engine: it is asked for bytes by
//! `(container identity, logical name)` and offered definitions back after a
//! unit was defined from unmodified container bytes.

use unit_loader_types::ContainerId;

use crate::unit::DefinedUnit;

pub trait PrecompiledCache: Send + Sync {
    /// Previously stored bytes for `name` located in `container`.
    fn load_precompiled(&self, container: &ContainerId, name: &str) -> anyhow::Result<Option<Vec<u8>>>;

    /// Offer a fresh definition for storage.
    fn store_precompiled(&self, container: &ContainerId, unit: &DefinedUnit) -> anyhow::Result<()>;
}

/// Whether a freshly defined unit may be written back: only when it did not
/// come from the cache and its defined bytes equal the bytes that were loaded.
pub fn should_store(from_precompiled: bool, loaded: &[u8], defined: &[u8]) -> bool {
    !from_precompiled && loaded == defined
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_store_rules() {
        assert!(should_store(false, b"abc", b"abc"));
        assert!(!should_store(true, b"abc", b"abc"));
        assert!(!should_store(false, b"abc", b"abd"));
    }
}
