//! Package index: hash of a directory prefix -> ordered candidate containers.
//!
//! Buckets are filled one container at a time by the index worker. Readers
//! take the shared lock; a build takes the exclusive lock once per bucket
//! insertion. While any build is outstanding, or after a build failed, the
//! index reports itself unusable and lookups scan the full container list.

use parking_lot::RwLock;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use unit_loader_types::names::ancestor_prefixes;

use crate::container::ContainerEntry;

/// Index key of a directory prefix such as `com/example`.
pub(crate) fn prefix_key(prefix: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    prefix.hash(&mut hasher);
    hasher.finish()
}

#[derive(Debug, Default)]
pub(crate) struct PackageIndex {
    buckets: RwLock<HashMap<u64, Vec<Arc<ContainerEntry>>>>,
    outstanding: AtomicUsize,
    degraded: AtomicBool,
}

impl PackageIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn begin_build(&self) {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn finish_build(&self) {
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn mark_degraded(&self) {
        self.degraded.store(true, Ordering::SeqCst);
    }

    pub(crate) fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    pub(crate) fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    /// Usable means every registered container has been indexed successfully.
    pub(crate) fn is_usable(&self) -> bool {
        self.outstanding() == 0 && !self.is_degraded()
    }

    /// Containers known to hold entries under `prefix`, in list order.
    /// An unknown prefix yields an empty list.
    pub(crate) fn candidates(&self, prefix: &str) -> Vec<Arc<ContainerEntry>> {
        self.buckets
            .read()
            .get(&prefix_key(prefix))
            .cloned()
            .unwrap_or_default()
    }

    /// Add `entry` to the bucket of every directory it contains.
    /// Returns the number of buckets touched.
    pub(crate) fn index_container(&self, entry: &Arc<ContainerEntry>) -> io::Result<usize> {
        let resources = entry.container().enumerate("")?;
        let keys: HashSet<u64> = resources
            .iter()
            .flat_map(|r| ancestor_prefixes(r.name()))
            .map(|prefix| prefix_key(&prefix))
            .collect();

        for key in &keys {
            let mut buckets = self.buckets.write();
            let bucket = buckets.entry(*key).or_default();
            if bucket.iter().any(|e| Arc::ptr_eq(e, entry)) {
                continue;
            }
            let pos = bucket.partition_point(|e| e.order() < entry.order());
            bucket.insert(pos, entry.clone());
        }
        Ok(keys.len())
    }

    pub(crate) fn clear(&self) {
        self.buckets.write().clear();
        self.degraded.store(false, Ordering::SeqCst);
    }

    pub(crate) fn bucket_count(&self) -> usize {
        self.buckets.read().len()
    }
}
