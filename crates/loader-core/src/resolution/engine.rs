use parking_lot::{Mutex, RwLock};
use std::io;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};
use unit_loader_types::names::{index_prefix, unit_path};
use unit_loader_types::{ContainerId, LoaderConfig, Resource};

use super::cache::{BoundedCache, BoundedSet};
use super::index::PackageIndex;
use super::worker::IndexWorker;
use crate::container::{Container, ContainerEntry};
use crate::errors::LoadError;
use crate::manifest::PackageInfo;
use crate::metrics::LoaderMetrics;
use crate::precompiled::PrecompiledCache;

/// Order keys of prepended containers start here so they sort before every
/// appended container while keeping their own arrival order.
const PREPEND_BASE: i64 = i64::MIN / 2;

/// Runs once, right before the first read. Used to register containers
/// whose computation is deferred (override and private libraries). The hook
/// may mutate the container list but must not read through the engine.
pub type InitHook = Box<dyn FnOnce(&ResolutionEngine) + Send>;

#[derive(Clone)]
pub(crate) struct Located {
    pub(crate) resource: Resource,
    pub(crate) entry: Arc<ContainerEntry>,
}

#[derive(Debug, Default)]
struct MutationState {
    prepends: i64,
    appends: i64,
}

// =============================================================================
// UnitBytes
// =============================================================================

/// Bytes of a located unit together with where they came from.
pub struct UnitBytes {
    name: String,
    path: String,
    bytes: Vec<u8>,
    from_precompiled: bool,
    located: Located,
}

impl UnitBytes {
    pub(crate) fn new(name: &str, path: String, bytes: Vec<u8>, from_precompiled: bool, located: Located) -> Self {
        Self {
            name: name.to_string(),
            path,
            bytes,
            from_precompiled,
            located,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Container path the unit was located at.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The bytes to define from: precompiled form when served by the cache.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn from_precompiled(&self) -> bool {
        self.from_precompiled
    }

    /// Re-read the original container bytes. Without a precompiled hit this
    /// is the same as [`UnitBytes::bytes`].
    pub fn actual_bytes(&self) -> io::Result<Vec<u8>> {
        if self.from_precompiled {
            self.located.resource.read()
        } else {
            Ok(self.bytes.clone())
        }
    }

    pub fn container_id(&self) -> &ContainerId {
        self.located.entry.id()
    }

    pub fn resource(&self) -> &Resource {
        &self.located.resource
    }

    /// Package attributes from the supplying container's manifest.
    pub fn package_info(&self, package: &str) -> PackageInfo {
        self.located.entry.package_info(package)
    }
}

impl std::fmt::Debug for UnitBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitBytes")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("len", &self.bytes.len())
            .field("from_precompiled", &self.from_precompiled)
            .field("container", self.container_id())
            .finish()
    }
}

// =============================================================================
// EngineBuilder
// =============================================================================

pub struct EngineBuilder {
    key: String,
    config: LoaderConfig,
    worker: Option<Arc<IndexWorker>>,
    metrics: Option<LoaderMetrics>,
    init_hook: Option<InitHook>,
}

impl EngineBuilder {
    pub fn config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an index worker with other engines.
    pub fn worker(mut self, worker: Arc<IndexWorker>) -> Self {
        self.worker = Some(worker);
        self
    }

    pub fn metrics(mut self, metrics: LoaderMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn on_first_read<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(&ResolutionEngine) + Send + 'static,
    {
        self.init_hook = Some(Box::new(hook));
        self
    }

    pub fn build(self) -> Arc<ResolutionEngine> {
        let worker = self
            .worker
            .unwrap_or_else(|| IndexWorker::new(self.config.index_warmup()));
        let config = self.config;
        Arc::new(ResolutionEngine {
            key: self.key,
            last_found: Mutex::new(BoundedCache::new(config.last_found_capacity)),
            really_not_found: Mutex::new(BoundedSet::new(config.really_not_found_capacity)),
            config,
            containers: RwLock::new(Vec::new()),
            mutation: Mutex::new(MutationState::default()),
            index: Arc::new(PackageIndex::new()),
            worker,
            initialized: OnceLock::new(),
            init_hook: Mutex::new(self.init_hook),
            metrics: self.metrics.unwrap_or_default(),
        })
    }
}

// =============================================================================
// ResolutionEngine
// =============================================================================

/// Ordered multi-container search with positive and negative caching and an
/// asynchronously built package index.
///
/// The engine starts out mutable: containers can be added or prepended and an
/// [`InitHook`] may be pending. The first read runs the hook exactly once
/// (concurrent first readers wait for it) and from then on reads go straight
/// to the frozen list. Mutation after that point is tolerated but logged.
pub struct ResolutionEngine {
    key: String,
    config: LoaderConfig,
    containers: RwLock<Vec<Arc<ContainerEntry>>>,
    mutation: Mutex<MutationState>,
    index: Arc<PackageIndex>,
    worker: Arc<IndexWorker>,
    last_found: Mutex<BoundedCache<String, Located>>,
    really_not_found: Mutex<BoundedSet<String>>,
    initialized: OnceLock<()>,
    init_hook: Mutex<Option<InitHook>>,
    metrics: LoaderMetrics,
}

impl ResolutionEngine {
    pub fn builder(key: impl Into<String>) -> EngineBuilder {
        EngineBuilder {
            key: key.into(),
            config: LoaderConfig::default(),
            worker: None,
            metrics: None,
            init_hook: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn metrics(&self) -> &LoaderMetrics {
        &self.metrics
    }

    pub fn worker(&self) -> &Arc<IndexWorker> {
        &self.worker
    }

    // ---------------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------------

    pub fn add_container(&self, container: Arc<dyn Container>) {
        self.register(container, false);
    }

    /// Put `container` ahead of every appended container. Concurrent
    /// prepends are serialized; earlier arrivals stay first.
    pub fn prepend_container(&self, container: Arc<dyn Container>) {
        self.register(container, true);
    }

    fn register(&self, container: Arc<dyn Container>, prepend: bool) {
        let entry = {
            let mut state = self.mutation.lock();
            let order = if prepend {
                state.prepends += 1;
                PREPEND_BASE + state.prepends
            } else {
                state.appends += 1;
                state.appends
            };
            let entry = Arc::new(ContainerEntry::new(
                container,
                order,
                self.config.last_not_found_capacity,
            ));
            // Readers must see the build as outstanding before the entry is visible.
            if self.config.use_package_index {
                self.index.begin_build();
            }
            let mut list = self.containers.write();
            let pos = list.partition_point(|e| e.order() < order);
            list.insert(pos, entry.clone());
            entry
        };

        if self.is_initialized() {
            debug!(engine = %self.key, container = %entry.id(), "container list mutated after first read");
        } else {
            debug!(engine = %self.key, container = %entry.id(), prepend, "container registered");
        }
        self.schedule_index(entry);
    }

    /// Queue the index build for `entry`. The caller has already counted it
    /// as outstanding.
    fn schedule_index(&self, entry: Arc<ContainerEntry>) {
        if !self.config.use_package_index {
            return;
        }
        let index = self.index.clone();
        let metrics = self.metrics.clone();
        let engine = self.key.clone();
        self.worker.submit(Box::new(move || {
            match index.index_container(&entry) {
                Ok(buckets) => {
                    metrics.record_index_build();
                    debug!(engine = %engine, container = %entry.id(), buckets, "package index updated");
                }
                Err(e) => {
                    index.mark_degraded();
                    metrics.record_index_build_failure();
                    warn!(
                        engine = %engine,
                        container = %entry.id(),
                        error = %e,
                        "package index build failed, lookups fall back to the full container list"
                    );
                }
            }
            index.finish_build();
        }));
    }

    pub fn contains_container(&self, id: &ContainerId) -> bool {
        self.containers.read().iter().any(|e| e.id() == id)
    }

    /// Container identities in search order.
    pub fn container_ids(&self) -> Vec<ContainerId> {
        self.containers.read().iter().map(|e| e.id().clone()).collect()
    }

    pub fn container_count(&self) -> usize {
        self.containers.read().len()
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    pub fn is_initialized(&self) -> bool {
        self.initialized.get().is_some()
    }

    fn ensure_initialized(&self) {
        self.initialized.get_or_init(|| {
            let hook = self.init_hook.lock().take();
            if let Some(hook) = hook {
                hook(self);
            }
            info!(engine = %self.key, containers = self.container_count(), "resolution engine initialized");
        });
    }

    /// Wait until every queued index build for this engine has run.
    pub fn await_index(&self) {
        self.worker.flush();
    }

    /// True when lookups with a directory part are answered from the index.
    pub fn index_ready(&self) -> bool {
        self.config.use_package_index && self.index.is_usable()
    }

    /// Drop every cache and the package index. Later lookups scan the full
    /// container list.
    pub fn dispose(&self) {
        self.last_found.lock().clear();
        self.really_not_found.lock().clear();
        for entry in self.containers.read().iter() {
            entry.clear_absent();
        }
        self.index.clear();
        self.index.mark_degraded();
        info!(engine = %self.key, "resolution engine disposed");
    }

    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    /// First resource at `path`, searching containers in order.
    pub fn resolve(&self, path: &str) -> Option<Resource> {
        self.locate(path).map(|located| located.resource)
    }

    /// Whether `path` is currently remembered as absent everywhere.
    pub fn is_known_absent(&self, path: &str) -> bool {
        self.really_not_found.lock().contains(path)
    }

    fn candidates(&self, path: &str) -> (Vec<Arc<ContainerEntry>>, bool) {
        if self.index_ready() {
            if let Some(prefix) = index_prefix(path) {
                self.metrics.record_index_lookup();
                let bucket = self.index.candidates(&prefix);
                debug!(engine = %self.key, path, prefix = %prefix, candidates = bucket.len(), "using package index");
                return (bucket, true);
            }
        }
        self.metrics.record_full_list_fallback();
        (self.containers.read().clone(), false)
    }

    pub(crate) fn locate(&self, path: &str) -> Option<Located> {
        self.ensure_initialized();

        if let Some(hit) = self.last_found.lock().get(path).cloned() {
            self.metrics.record_positive_hit();
            debug!(engine = %self.key, path, "last found hit");
            return Some(hit);
        }
        if self.really_not_found.lock().contains(path) {
            self.metrics.record_negative_hit();
            debug!(engine = %self.key, path, "really not found hit");
            return None;
        }

        let (candidates, indexed) = self.candidates(path);
        for entry in &candidates {
            // Index misses are not recorded per container, so only the full
            // scan consults and feeds the per-container negatives.
            if !indexed && entry.is_known_absent(path) {
                continue;
            }
            self.metrics.record_container_probe();
            match entry.get_resource(path) {
                Some(resource) => {
                    let located = Located {
                        resource,
                        entry: entry.clone(),
                    };
                    self.last_found.lock().insert(path.to_string(), located.clone());
                    return Some(located);
                }
                None if !indexed => entry.record_absent(path),
                None => {}
            }
        }

        self.really_not_found.lock().insert(path.to_string());
        debug!(engine = %self.key, path, "really not found");
        None
    }

    /// Every resource at `path`, in container order.
    pub fn resolve_all(&self, path: &str) -> Vec<Resource> {
        self.ensure_initialized();
        if self.really_not_found.lock().contains(path) {
            self.metrics.record_negative_hit();
            return Vec::new();
        }
        let (candidates, _) = self.candidates(path);
        let found: Vec<Resource> = candidates
            .iter()
            .filter_map(|entry| {
                self.metrics.record_container_probe();
                entry.get_resource(path)
            })
            .collect();
        if found.is_empty() {
            self.really_not_found.lock().insert(path.to_string());
        }
        found
    }

    /// Locate and read the bytes of logical unit `name`.
    ///
    /// With a precompiled cache attached (and enabled) the cache is asked
    /// first; a cache failure is logged and the container bytes are used.
    /// Failing to read bytes that were located is fatal and never cached.
    pub fn find_unit_bytes(
        &self,
        name: &str,
        precompiled: Option<&dyn PrecompiledCache>,
    ) -> Result<Option<UnitBytes>, LoadError> {
        let path = unit_path(name, &self.config.unit_suffix);
        let Some(located) = self.locate(&path) else {
            return Ok(None);
        };

        if let Some(cache) = precompiled.filter(|_| self.config.precompiled_enabled) {
            match cache.load_precompiled(located.entry.id(), name) {
                Ok(Some(bytes)) => {
                    self.metrics.record_precompiled_hit();
                    debug!(engine = %self.key, name, "served from precompiled cache");
                    return Ok(Some(UnitBytes::new(name, path, bytes, true, located)));
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(engine = %self.key, name, error = %e, "precompiled cache lookup failed");
                }
            }
        }

        let bytes = located.resource.read().map_err(|source| LoadError::Io {
            name: name.to_string(),
            path: path.clone(),
            source,
        })?;
        Ok(Some(UnitBytes::new(name, path, bytes, false, located)))
    }

    /// Multi-line description of the container list and index state.
    pub fn diagnostics(&self) -> String {
        let mut lines = Vec::new();
        lines.push(format!("engine {}", self.key));
        lines.push(format!(
            "  index: enabled={} outstanding={} degraded={} buckets={}",
            self.config.use_package_index,
            self.index.outstanding(),
            self.index.is_degraded(),
            self.index.bucket_count()
        ));
        for (i, entry) in self.containers.read().iter().enumerate() {
            lines.push(format!("  [{}] {}", i, entry.container().urls().join(", ")));
        }
        lines.join("\n")
    }
}

impl std::fmt::Debug for ResolutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionEngine")
            .field("key", &self.key)
            .field("containers", &self.container_count())
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::MemoryContainer;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn no_index() -> LoaderConfig {
        LoaderConfig {
            use_package_index: false,
            ..LoaderConfig::default()
        }
    }

    fn mem(url: &str, paths: &[&str]) -> Arc<MemoryContainer> {
        let container = MemoryContainer::new(url);
        for path in paths {
            container.insert(*path, path.as_bytes());
        }
        Arc::new(container)
    }

    struct BrokenListing(ContainerId);

    impl Container for BrokenListing {
        fn id(&self) -> &ContainerId {
            &self.0
        }

        fn enumerate(&self, _prefix: &str) -> io::Result<Vec<Resource>> {
            Err(io::Error::new(io::ErrorKind::Other, "listing failed"))
        }

        fn get_resource(&self, path: &str) -> Option<Resource> {
            (path == "x/Hidden.unit").then(|| Resource::from_bytes(path, b"hidden".to_vec()))
        }
    }

    #[test]
    fn test_absent_name_is_negatively_cached() {
        let engine = ResolutionEngine::builder("absent").config(no_index()).build();
        let a = mem("mem://a", &["a/One.unit"]);
        let b = mem("mem://b", &["b/Two.unit"]);
        engine.add_container(a.clone());
        engine.add_container(b.clone());

        assert!(engine.resolve("z/Missing.unit").is_none());
        assert!(engine.is_known_absent("z/Missing.unit"));
        assert!(engine.resolve("z/Missing.unit").is_none());
        assert_eq!(a.probe_count(), 1);
        assert_eq!(b.probe_count(), 1);
        assert_eq!(engine.metrics().snapshot().negative_hits, 1);
    }

    #[test]
    fn test_earlier_containers_probed_at_most_once() -> anyhow::Result<()> {
        let engine = ResolutionEngine::builder("order").config(no_index()).build();
        let first = mem("mem://first", &[]);
        let second = mem("mem://second", &[]);
        let third = mem("mem://third", &["p/Target.unit"]);
        engine.add_container(first.clone());
        engine.add_container(second.clone());
        engine.add_container(third.clone());

        for _ in 0..10 {
            let found = engine.resolve("p/Target.unit");
            assert_eq!(found.map(|r| r.read()).transpose()?, Some(b"p/Target.unit".to_vec()));
        }
        assert_eq!(first.probe_count(), 1);
        assert_eq!(second.probe_count(), 1);
        assert_eq!(third.probe_count(), 1);
        Ok(())
    }

    #[test]
    fn test_per_container_negatives_survive_without_positive_cache() {
        let config = LoaderConfig {
            last_found_capacity: 0,
            ..no_index()
        };
        let engine = ResolutionEngine::builder("negatives").config(config).build();
        let first = mem("mem://first", &[]);
        let second = mem("mem://second", &["p/Target.unit"]);
        engine.add_container(first.clone());
        engine.add_container(second.clone());

        for _ in 0..3 {
            assert!(engine.resolve("p/Target.unit").is_some());
        }
        assert_eq!(first.probe_count(), 1);
        assert_eq!(second.probe_count(), 3);
    }

    #[test]
    fn test_index_bucket_limits_candidates() {
        let engine = ResolutionEngine::builder("indexed").build();
        let libs: Vec<_> = (0..5)
            .map(|i| mem(&format!("mem://lib{}", i), &[format!("lib{}/Unit.unit", i).as_str()]))
            .collect();
        for lib in &libs {
            engine.add_container(lib.clone());
        }
        engine.await_index();
        assert!(engine.index_ready());

        assert!(engine.resolve("lib3/Unit.unit").is_some());
        assert_eq!(libs[3].probe_count(), 1);
        for (i, lib) in libs.iter().enumerate() {
            if i != 3 {
                assert_eq!(lib.probe_count(), 0);
            }
        }

        // Unknown prefix: confirmed absent without touching any container.
        assert!(engine.resolve("nowhere/Unit.unit").is_none());
        assert!(libs.iter().all(|l| l.probe_count() <= 1));
        assert_eq!(engine.metrics().snapshot().index_lookups, 2);
    }

    #[test]
    fn test_root_level_paths_scan_full_list() {
        let engine = ResolutionEngine::builder("root-level").build();
        let a = mem("mem://a", &["Top.unit"]);
        engine.add_container(a);
        engine.await_index();

        assert!(engine.resolve("Top.unit").is_some());
        assert_eq!(engine.metrics().snapshot().full_list_fallbacks, 1);
    }

    #[test]
    fn test_pending_build_forces_full_list() {
        let worker = IndexWorker::new(Some(Duration::from_secs(60)));
        let engine = ResolutionEngine::builder("pending").worker(worker.clone()).build();
        let a = mem("mem://a", &["a/b/C.unit"]);
        engine.add_container(a.clone());

        assert!(!engine.index_ready());
        assert!(engine.resolve("a/b/C.unit").is_some());
        assert_eq!(engine.metrics().snapshot().full_list_fallbacks, 1);

        worker.release_warmup();
        engine.await_index();
        assert!(engine.index_ready());
    }

    #[test]
    fn test_failed_build_degrades_to_full_list() {
        let engine = ResolutionEngine::builder("degraded").build();
        engine.add_container(Arc::new(BrokenListing(ContainerId::new("mem://broken"))));
        engine.await_index();

        assert!(!engine.index_ready());
        assert!(engine.resolve("x/Hidden.unit").is_some());
        let snap = engine.metrics().snapshot();
        assert_eq!(snap.index_build_failures, 1);
        assert_eq!(snap.full_list_fallbacks, 1);
    }

    #[test]
    fn test_stale_negative_until_dispose() {
        let engine = ResolutionEngine::builder("stale").config(no_index()).build();
        let a = mem("mem://a", &[]);
        engine.add_container(a.clone());

        assert!(engine.resolve("late/Unit.unit").is_none());
        a.insert("late/Unit.unit", b"late");
        engine.add_container(mem("mem://b", &["late/Unit.unit"]));
        assert!(engine.resolve("late/Unit.unit").is_none());

        engine.dispose();
        assert!(engine.resolve("late/Unit.unit").is_some());
    }

    #[test]
    fn test_prepends_keep_arrival_order() {
        let engine = ResolutionEngine::builder("prepend").config(no_index()).build();
        engine.add_container(mem("mem://app", &[]));
        engine.prepend_container(mem("mem://override1", &[]));
        engine.add_container(mem("mem://private", &[]));
        engine.prepend_container(mem("mem://override2", &[]));

        let ids: Vec<String> = engine.container_ids().iter().map(|c| c.to_string()).collect();
        assert_eq!(
            ids,
            vec!["mem://override1", "mem://override2", "mem://app", "mem://private"]
        );
    }

    #[test]
    fn test_first_read_hook_runs_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let engine = ResolutionEngine::builder("lazy")
            .config(no_index())
            .on_first_read(move |engine| {
                counter.fetch_add(1, Ordering::SeqCst);
                engine.prepend_container(mem("mem://override", &["o/Unit.unit"]));
            })
            .build();
        engine.add_container(mem("mem://app", &["o/Unit.unit"]));
        assert!(!engine.is_initialized());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = engine.clone();
                std::thread::spawn(move || {
                    engine
                        .resolve("o/Unit.unit")
                        .and_then(|r| r.url().map(str::to_string))
                })
            })
            .collect();
        for handle in handles {
            let url = handle.join().ok().flatten();
            assert!(url.is_some_and(|u| u.starts_with("mem://override")));
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(engine.is_initialized());
    }

    #[test]
    fn test_unreadable_unit_is_fatal_and_not_cached_absent() {
        let engine = ResolutionEngine::builder("io").config(no_index()).build();
        let a = MemoryContainer::new("mem://a");
        a.insert_unreadable("com/example/Broken.unit");
        engine.add_container(Arc::new(a));

        let err = engine.find_unit_bytes("com.example.Broken", None);
        assert!(matches!(err, Err(LoadError::Io { .. })));
        assert!(!engine.is_known_absent("com/example/Broken.unit"));
        assert!(matches!(
            engine.find_unit_bytes("com.example.Broken", None),
            Err(LoadError::Io { .. })
        ));
    }

    #[test]
    fn test_resolve_all_in_order() -> anyhow::Result<()> {
        let engine = ResolutionEngine::builder("all").config(no_index()).build();
        engine.add_container(mem("mem://a", &["META-INF/services/x"]));
        engine.add_container(mem("mem://b", &[]));
        engine.add_container(mem("mem://c", &["META-INF/services/x"]));

        let urls: Vec<String> = engine
            .resolve_all("META-INF/services/x")
            .iter()
            .filter_map(|r| r.url().map(str::to_string))
            .collect();
        assert_eq!(urls.len(), 2);
        assert!(urls[0].starts_with("mem://a"));
        assert!(urls[1].starts_with("mem://c"));

        assert!(engine.resolve_all("META-INF/services/none").is_empty());
        assert!(engine.is_known_absent("META-INF/services/none"));
        Ok(())
    }

    struct FixedCache(Vec<u8>);

    impl PrecompiledCache for FixedCache {
        fn load_precompiled(&self, _container: &ContainerId, _name: &str) -> anyhow::Result<Option<Vec<u8>>> {
            Ok(Some(self.0.clone()))
        }

        fn store_precompiled(&self, _container: &ContainerId, _unit: &crate::unit::DefinedUnit) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_precompiled_bytes_keep_actual_bytes_reachable() -> anyhow::Result<()> {
        let engine = ResolutionEngine::builder("precompiled").config(no_index()).build();
        engine.add_container(mem("mem://a", &["a/Unit.unit"]));
        let cache = FixedCache(b"cached".to_vec());

        let unit = engine
            .find_unit_bytes("a.Unit", Some(&cache))?
            .ok_or_else(|| anyhow::anyhow!("unit should be found"))?;
        assert!(unit.from_precompiled());
        assert_eq!(unit.bytes(), b"cached");
        assert_eq!(unit.actual_bytes()?, b"a/Unit.unit");
        assert_eq!(unit.container_id().as_str(), "mem://a");

        let disabled = ResolutionEngine::builder("disabled")
            .config(LoaderConfig {
                precompiled_enabled: false,
                ..no_index()
            })
            .build();
        disabled.add_container(mem("mem://a", &["a/Unit.unit"]));
        let unit = disabled
            .find_unit_bytes("a.Unit", Some(&cache))?
            .ok_or_else(|| anyhow::anyhow!("unit should be found"))?;
        assert!(!unit.from_precompiled());
        Ok(())
    }

    #[test]
    fn test_container_registered_during_reads_is_never_reported_absent() {
        for round in 0..50 {
            let engine = ResolutionEngine::builder(format!("race-{}", round)).build();
            engine.add_container(mem("mem://a", &["a/One.unit"]));
            engine.await_index();
            assert!(engine.index_ready());

            // Park the worker so the late container's build stays queued.
            let (release, hold) = std::sync::mpsc::channel::<()>();
            engine.worker().submit(Box::new(move || {
                let _ = hold.recv();
            }));

            let late = mem("mem://b", &["p/X.unit"]);
            std::thread::scope(|scope| {
                scope.spawn(|| engine.add_container(late.clone()));
                while engine.container_count() < 2 {
                    std::hint::spin_loop();
                }
                assert!(!engine.index_ready(), "round {}: index served while a build was pending", round);
                assert!(engine.resolve("p/X.unit").is_some(), "round {}: registered unit reported absent", round);
            });
            assert!(!engine.is_known_absent("p/X.unit"));

            drop(release);
            engine.await_index();
            assert!(engine.index_ready());
            assert!(engine.resolve("p/X.unit").is_some());
        }
    }
}
