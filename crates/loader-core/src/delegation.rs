//! # Delegation Coordinator
//!
//! Resolves logical names through a fixed, data-driven search order:
//!
//! ```text
//!   BeforeDelegates ──► Parent ──► Local ──► AfterDelegates ──► generator
//!        │                │          │             │
//!   peer loaders     parent loader  engine +   peer loaders
//!   (no parent)      (full search)  pipeline   (no parent)
//! ```
//!
//! | Search order | Stages |
//! |--------------|--------|
//! | [`SearchOrder::parent_first`] | before, parent, local, after |
//! | [`SearchOrder::parent_last`] | before, local, parent, after |
//! | [`SearchOrder::isolated`] | before, local, after |
//!
//! [`DelegatePolicy::IncludeParent`] turns into
//! [`DelegatePolicy::SearchedParent`] once the parent stage ran, so nested
//! calls never ask the same parent twice. Delegates are always called with
//! the parent excluded (or already searched).
//!
//! A parent-first coordinator that is reached through delegation still asks
//! its parent before defining locally, so parent-first ordering holds across
//! the whole delegation graph.

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use tracing::{debug, warn};
use unit_loader_types::names::{package_name, unit_path};
use unit_loader_types::{LoaderConfig, Resource};

use crate::container::Container;
use crate::deny_list::DenyList;
use crate::errors::LoadError;
use crate::hooks::{NoSecurity, SecurityContext, UnitGenerator};
use crate::manifest::PackageInfo;
use crate::metrics::LoaderMetrics;
use crate::native::NativeLocator;
use crate::precompiled::{should_store, PrecompiledCache};
use crate::redefine::Redefiner;
use crate::resolution::{IndexWorker, ResolutionEngine, UnitBytes};
use crate::transform::{TransformPipeline, UnitTransformer};
use crate::unit::{DefinedUnit, LoaderId, UnitOrigin};

// =============================================================================
// Search order and policy
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStage {
    BeforeDelegates,
    Parent,
    Local,
    AfterDelegates,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOrder {
    stages: Vec<SearchStage>,
}

impl SearchOrder {
    pub fn parent_first() -> Self {
        Self {
            stages: vec![
                SearchStage::BeforeDelegates,
                SearchStage::Parent,
                SearchStage::Local,
                SearchStage::AfterDelegates,
            ],
        }
    }

    pub fn parent_last() -> Self {
        Self {
            stages: vec![
                SearchStage::BeforeDelegates,
                SearchStage::Local,
                SearchStage::Parent,
                SearchStage::AfterDelegates,
            ],
        }
    }

    /// No parent stage at all.
    pub fn isolated() -> Self {
        Self {
            stages: vec![
                SearchStage::BeforeDelegates,
                SearchStage::Local,
                SearchStage::AfterDelegates,
            ],
        }
    }

    pub fn stages(&self) -> &[SearchStage] {
        &self.stages
    }

    /// Parent is consulted before the local stage.
    pub fn is_parent_first(&self) -> bool {
        let parent = self.stages.iter().position(|s| *s == SearchStage::Parent);
        let local = self.stages.iter().position(|s| *s == SearchStage::Local);
        matches!((parent, local), (Some(p), Some(l)) if p < l)
    }
}

impl Default for SearchOrder {
    fn default() -> Self {
        Self::parent_first()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelegatePolicy {
    /// Consult the parent stage normally.
    IncludeParent,
    /// Skip the parent stage (the caller is a delegating peer).
    ExcludeParent,
    /// The parent has already been asked further up the call chain.
    SearchedParent,
}

impl DelegatePolicy {
    /// Policy handed to delegate tiers.
    fn for_delegates(self) -> Self {
        if self == DelegatePolicy::SearchedParent {
            DelegatePolicy::SearchedParent
        } else {
            DelegatePolicy::ExcludeParent
        }
    }
}

// =============================================================================
// UnitLoader Trait
// =============================================================================

/// Anything that can sit in a delegation graph: coordinators, mirrors and
/// weak proxies.
pub trait UnitLoader: Send + Sync {
    fn key(&self) -> &str;

    /// Resolve `name` under `policy`. With `allow_miss`, absence is `Ok(None)`
    /// instead of [`LoadError::NotFound`]; fatal errors propagate either way.
    fn load_unit(
        &self,
        name: &str,
        policy: DelegatePolicy,
        allow_miss: bool,
    ) -> Result<Option<Arc<DefinedUnit>>, LoadError>;

    /// Resolve with the full search order; absence is an error.
    fn load(&self, name: &str) -> Result<Arc<DefinedUnit>, LoadError> {
        self.load_unit(name, DelegatePolicy::IncludeParent, false)?
            .ok_or_else(|| LoadError::not_found(name))
    }

    fn get_resource(&self, path: &str) -> Option<Resource>;

    fn get_resources(&self, path: &str) -> Vec<Resource>;

    /// Resource lookup when reached as a delegate (parent excluded).
    fn delegate_find_resource(&self, path: &str) -> Option<Resource> {
        self.get_resource(path)
    }

    fn delegate_find_resources(&self, path: &str) -> Vec<Resource> {
        self.get_resources(path)
    }

    fn add_transformer(&self, _transformer: Arc<dyn UnitTransformer>) -> bool {
        false
    }

    fn remove_transformer(&self, _transformer: &Arc<dyn UnitTransformer>) -> bool {
        false
    }

    /// Shared libraries do not receive transformers pushed up by children.
    fn is_shared_library(&self) -> bool {
        false
    }

    /// An independently-defining mirror of this loader, or `None` when the
    /// loader is shared as-is by mirrors.
    fn mirror(&self) -> Option<Arc<dyn UnitLoader>> {
        None
    }

    fn as_coordinator(&self) -> Option<&Coordinator> {
        None
    }
}

/// Outcomes that mean "not here" become `Ok(None)`.
fn probe(result: Result<Option<Arc<DefinedUnit>>, LoadError>) -> Result<Option<Arc<DefinedUnit>>, LoadError> {
    match result {
        Err(e) if e.is_miss() => Ok(None),
        other => other,
    }
}

// =============================================================================
// Per-name locks
// =============================================================================

#[derive(Default)]
struct NameLocks {
    locks: Mutex<HashMap<String, Arc<ReentrantMutex<()>>>>,
}

impl NameLocks {
    fn lock_for(&self, name: &str) -> Arc<ReentrantMutex<()>> {
        self.locks
            .lock()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(ReentrantMutex::new(())))
            .clone()
    }

    fn clear(&self) {
        self.locks.lock().clear();
    }
}

// =============================================================================
// CoordinatorBuilder
// =============================================================================

pub struct CoordinatorBuilder {
    key: String,
    config: LoaderConfig,
    search: SearchOrder,
    parent: Option<Arc<dyn UnitLoader>>,
    before: Vec<Arc<dyn UnitLoader>>,
    after: Vec<Arc<dyn UnitLoader>>,
    containers: Vec<Arc<dyn Container>>,
    override_containers: Vec<Arc<dyn Container>>,
    private_containers: Vec<Arc<dyn Container>>,
    native_containers: Vec<Arc<dyn Container>>,
    native_files: Vec<PathBuf>,
    deny: Arc<DenyList>,
    system_transformers: Vec<Arc<dyn UnitTransformer>>,
    precompiled: Option<Arc<dyn PrecompiledCache>>,
    generator: Option<Arc<dyn UnitGenerator>>,
    security: Arc<dyn SecurityContext>,
    redefiner: Option<Arc<dyn Redefiner>>,
    worker: Option<Arc<IndexWorker>>,
    shared_library: bool,
}

impl CoordinatorBuilder {
    pub fn config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn search_order(mut self, search: SearchOrder) -> Self {
        self.search = search;
        self
    }

    pub fn parent(mut self, parent: Arc<dyn UnitLoader>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn before_delegate(mut self, delegate: Arc<dyn UnitLoader>) -> Self {
        self.before.push(delegate);
        self
    }

    pub fn after_delegate(mut self, delegate: Arc<dyn UnitLoader>) -> Self {
        self.after.push(delegate);
        self
    }

    pub fn container(mut self, container: Arc<dyn Container>) -> Self {
        self.containers.push(container);
        self
    }

    /// Prepended to the search list right before the first read.
    pub fn override_container(mut self, container: Arc<dyn Container>) -> Self {
        self.override_containers.push(container);
        self
    }

    /// Appended to the search list right before the first read.
    pub fn private_container(mut self, container: Arc<dyn Container>) -> Self {
        self.private_containers.push(container);
        self
    }

    pub fn native_container(mut self, container: Arc<dyn Container>) -> Self {
        self.native_containers.push(container);
        self
    }

    pub fn native_library_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.native_files.push(path.into());
        self
    }

    pub fn deny_list(mut self, deny: Arc<DenyList>) -> Self {
        self.deny = deny;
        self
    }

    pub fn system_transformer(mut self, transformer: Arc<dyn UnitTransformer>) -> Self {
        self.system_transformers.push(transformer);
        self
    }

    pub fn precompiled(mut self, cache: Arc<dyn PrecompiledCache>) -> Self {
        self.precompiled = Some(cache);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn UnitGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn security(mut self, security: Arc<dyn SecurityContext>) -> Self {
        self.security = security;
        self
    }

    pub fn redefiner(mut self, redefiner: Arc<dyn Redefiner>) -> Self {
        self.redefiner = Some(redefiner);
        self
    }

    /// Share a package index worker across coordinators.
    pub fn worker(mut self, worker: Arc<IndexWorker>) -> Self {
        self.worker = Some(worker);
        self
    }

    /// Mark as a shared library: child coordinators do not push their
    /// transformers into it.
    pub fn shared_library(mut self, shared: bool) -> Self {
        self.shared_library = shared;
        self
    }

    pub fn build(self) -> Arc<Coordinator> {
        let metrics = LoaderMetrics::new();
        let overrides = self.override_containers;
        let privates = self.private_containers;

        let mut engine = ResolutionEngine::builder(self.key.clone())
            .config(self.config.clone())
            .metrics(metrics.clone());
        if let Some(worker) = self.worker {
            engine = engine.worker(worker);
        }
        if !overrides.is_empty() || !privates.is_empty() {
            engine = engine.on_first_read(move |engine| {
                for container in overrides {
                    engine.prepend_container(container);
                }
                for container in privates {
                    engine.add_container(container);
                }
            });
        }
        let engine = engine.build();
        for container in self.containers {
            engine.add_container(container);
        }

        let native = NativeLocator::new();
        for container in self.native_containers {
            native.add_container(container);
        }
        for file in self.native_files {
            native.add_library_file(file);
        }

        let key: Arc<str> = Arc::from(self.key.as_str());
        Arc::new_cyclic(|this| Coordinator {
            id: LoaderId::next(),
            key,
            config: self.config,
            search: self.search,
            parent: self.parent,
            before: self.before,
            after: self.after,
            engine,
            deny: self.deny,
            pipeline: TransformPipeline::new(self.system_transformers),
            precompiled: self.precompiled,
            generator: self.generator,
            security: self.security,
            redefiner: self.redefiner,
            native,
            shared_library: self.shared_library,
            locks: NameLocks::default(),
            loaded: RwLock::new(HashMap::new()),
            packages: RwLock::new(HashMap::new()),
            mirror_of: None,
            this: this.clone(),
            metrics,
        })
    }
}

// =============================================================================
// Coordinator
// =============================================================================

pub struct Coordinator {
    id: LoaderId,
    key: Arc<str>,
    config: LoaderConfig,
    search: SearchOrder,
    parent: Option<Arc<dyn UnitLoader>>,
    before: Vec<Arc<dyn UnitLoader>>,
    after: Vec<Arc<dyn UnitLoader>>,
    engine: Arc<ResolutionEngine>,
    deny: Arc<DenyList>,
    pipeline: TransformPipeline,
    precompiled: Option<Arc<dyn PrecompiledCache>>,
    generator: Option<Arc<dyn UnitGenerator>>,
    security: Arc<dyn SecurityContext>,
    redefiner: Option<Arc<dyn Redefiner>>,
    native: NativeLocator,
    shared_library: bool,
    locks: NameLocks,
    loaded: RwLock<HashMap<String, Arc<DefinedUnit>>>,
    packages: RwLock<HashMap<String, Arc<PackageInfo>>>,
    /// Set on mirrors: the live coordinator whose topology is replayed.
    mirror_of: Option<Arc<Coordinator>>,
    this: Weak<Coordinator>,
    metrics: LoaderMetrics,
}

impl Coordinator {
    pub fn builder(key: impl Into<String>) -> CoordinatorBuilder {
        CoordinatorBuilder {
            key: key.into(),
            config: LoaderConfig::default(),
            search: SearchOrder::default(),
            parent: None,
            before: Vec::new(),
            after: Vec::new(),
            containers: Vec::new(),
            override_containers: Vec::new(),
            private_containers: Vec::new(),
            native_containers: Vec::new(),
            native_files: Vec::new(),
            deny: DenyList::empty(),
            system_transformers: Vec::new(),
            precompiled: None,
            generator: None,
            security: Arc::new(NoSecurity),
            redefiner: None,
            worker: None,
            shared_library: false,
        }
    }

    pub fn id(&self) -> LoaderId {
        self.id
    }

    pub fn engine(&self) -> &Arc<ResolutionEngine> {
        &self.engine
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn search_order(&self) -> &SearchOrder {
        &self.search
    }

    pub fn parent(&self) -> Option<&Arc<dyn UnitLoader>> {
        self.parent.as_ref()
    }

    pub fn before_delegates(&self) -> &[Arc<dyn UnitLoader>] {
        &self.before
    }

    pub fn after_delegates(&self) -> &[Arc<dyn UnitLoader>] {
        &self.after
    }

    pub fn metrics(&self) -> &LoaderMetrics {
        &self.metrics
    }

    pub fn is_mirror(&self) -> bool {
        self.mirror_of.is_some()
    }

    /// The live coordinator a mirror replays.
    pub fn mirrored(&self) -> Option<&Arc<Coordinator>> {
        self.mirror_of.as_ref()
    }

    pub(crate) fn redefiner(&self) -> Option<&Arc<dyn Redefiner>> {
        self.redefiner.as_ref()
    }

    pub fn pipeline(&self) -> &TransformPipeline {
        &self.pipeline
    }

    /// Unit registered for `name` in this coordinator, whoever defined it.
    pub fn find_loaded(&self, name: &str) -> Option<Arc<DefinedUnit>> {
        self.loaded.read().get(name).cloned()
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded.read().len()
    }

    pub fn package(&self, package: &str) -> Option<Arc<PackageInfo>> {
        self.packages.read().get(package).cloned()
    }

    /// Absolute path of native library `name`. Mirrors answer from the live
    /// coordinator.
    pub fn find_library(&self, name: &str) -> Option<PathBuf> {
        match &self.mirror_of {
            Some(live) => live.find_library(name),
            None => self.native.find_library(name),
        }
    }

    pub fn add_native_container(&self, container: Arc<dyn Container>) {
        self.native.add_container(container);
    }

    pub fn add_native_library_file(&self, path: impl Into<PathBuf>) {
        self.native.add_library_file(path);
    }

    pub fn native(&self) -> &NativeLocator {
        &self.native
    }

    // ---------------------------------------------------------------------
    // Unit resolution
    // ---------------------------------------------------------------------

    fn resolve_name(
        &self,
        name: &str,
        policy: DelegatePolicy,
        allow_miss: bool,
    ) -> Result<Option<Arc<DefinedUnit>>, LoadError> {
        if self.deny.contains(name) {
            self.metrics.record_forbidden();
            debug!(loader = %self.key, name, "forbidden unit requested");
            return if allow_miss {
                Ok(None)
            } else {
                Err(LoadError::forbidden(name))
            };
        }

        let lock = self.locks.lock_for(name);
        let _guard = lock.lock();

        if let Some(unit) = self.find_loaded(name) {
            return Ok(Some(unit));
        }

        let mut policy = policy;
        for stage in self.search.stages() {
            let found = match stage {
                SearchStage::BeforeDelegates => self.load_from_delegates(&self.before, name, policy)?,
                SearchStage::Parent => {
                    if policy == DelegatePolicy::IncludeParent {
                        let found = self.load_from_parent(name)?;
                        policy = DelegatePolicy::SearchedParent;
                        found
                    } else {
                        None
                    }
                }
                SearchStage::Local => self.find_local(name, policy)?,
                SearchStage::AfterDelegates => self.load_from_delegates(&self.after, name, policy)?,
            };
            if let Some(unit) = found {
                debug!(loader = %self.key, name, stage = ?stage, definer = %unit.loader_key(), "unit resolved");
                self.remember(name, &unit);
                return Ok(Some(unit));
            }
        }

        if let Some(unit) = self.generate(name)? {
            return Ok(Some(unit));
        }

        if allow_miss {
            Ok(None)
        } else {
            Err(LoadError::not_found(name))
        }
    }

    fn remember(&self, name: &str, unit: &Arc<DefinedUnit>) {
        self.loaded
            .write()
            .entry(name.to_string())
            .or_insert_with(|| unit.clone());
    }

    fn load_from_parent(&self, name: &str) -> Result<Option<Arc<DefinedUnit>>, LoadError> {
        match &self.parent {
            Some(parent) => probe(parent.load_unit(name, DelegatePolicy::IncludeParent, true)),
            None => Ok(None),
        }
    }

    fn load_from_delegates(
        &self,
        delegates: &[Arc<dyn UnitLoader>],
        name: &str,
        policy: DelegatePolicy,
    ) -> Result<Option<Arc<DefinedUnit>>, LoadError> {
        let policy = policy.for_delegates();
        for delegate in delegates {
            if let Some(unit) = probe(delegate.load_unit(name, policy, true))? {
                return Ok(Some(unit));
            }
        }
        Ok(None)
    }

    fn precompiled_source(&self) -> Option<&dyn PrecompiledCache> {
        self.precompiled.as_deref()
    }

    fn find_local(&self, name: &str, policy: DelegatePolicy) -> Result<Option<Arc<DefinedUnit>>, LoadError> {
        let Some(unit_bytes) = self.engine.find_unit_bytes(name, self.precompiled_source())? else {
            return Ok(None);
        };

        // Reached through delegation without the parent having been asked:
        // a parent-first coordinator must still defer to its parent.
        if self.search.is_parent_first() && policy != DelegatePolicy::SearchedParent {
            if let Some(unit) = self.load_from_parent(name)? {
                return Ok(Some(unit));
            }
        }

        let bytes = if self.pipeline.is_empty() {
            unit_bytes.bytes().to_vec()
        } else {
            self.metrics.record_transform();
            self.pipeline.apply(&unit_bytes)?
        };
        Ok(Some(self.define_local(name, &unit_bytes, bytes)))
    }

    fn define_package(&self, package: &str, info: impl FnOnce() -> PackageInfo) -> Arc<PackageInfo> {
        if let Some(existing) = self.packages.read().get(package) {
            return existing.clone();
        }
        let info = Arc::new(info());
        self.packages
            .write()
            .entry(package.to_string())
            .or_insert(info)
            .clone()
    }

    fn define_local(&self, name: &str, unit_bytes: &UnitBytes, bytes: Vec<u8>) -> Arc<DefinedUnit> {
        let package = package_name(name).map(|pkg| self.define_package(pkg, || unit_bytes.package_info(pkg)));
        let source = unit_bytes.container_id().clone();
        let origin = if unit_bytes.from_precompiled() && bytes.as_slice() == unit_bytes.bytes() {
            UnitOrigin::Precompiled
        } else {
            UnitOrigin::Container
        };
        let store = !self.is_mirror() && should_store(unit_bytes.from_precompiled(), unit_bytes.bytes(), &bytes);

        let unit = Arc::new(DefinedUnit::new(
            name,
            bytes,
            self.id,
            self.key.clone(),
            Some(source.clone()),
            package,
            self.security.domain_for(Some(&source)),
            origin,
        ));
        self.metrics.record_definition();
        debug!(loader = %self.key, name, container = %source, unit = unit.id().get(), "unit defined");

        if store && self.config.precompiled_enabled {
            if let Some(cache) = &self.precompiled {
                match cache.store_precompiled(&source, &unit) {
                    Ok(()) => self.metrics.record_precompiled_store(),
                    Err(e) => warn!(loader = %self.key, name, error = %e, "failed to store precompiled unit"),
                }
            }
        }
        unit
    }

    fn generate(&self, name: &str) -> Result<Option<Arc<DefinedUnit>>, LoadError> {
        let Some(generator) = &self.generator else {
            return Ok(None);
        };
        let Some(bytes) = generator
            .generate(name, self)
            .map_err(|source| LoadError::Generation {
                name: name.to_string(),
                source,
            })?
        else {
            return Ok(None);
        };

        let package = package_name(name).map(|pkg| {
            self.define_package(pkg, || PackageInfo {
                name: pkg.to_string(),
                ..PackageInfo::default()
            })
        });
        let unit = Arc::new(DefinedUnit::new(
            name,
            bytes,
            self.id,
            self.key.clone(),
            None,
            package,
            self.security.domain_for(None),
            UnitOrigin::Generated,
        ));
        self.metrics.record_definition();
        debug!(loader = %self.key, name, "defined generated unit");
        self.remember(name, &unit);
        Ok(Some(unit))
    }

    // ---------------------------------------------------------------------
    // Resources
    // ---------------------------------------------------------------------

    fn local_resource(&self, path: &str) -> Option<Resource> {
        match &self.mirror_of {
            Some(live) => live.local_resource(path),
            None => self.engine.resolve(path),
        }
    }

    fn local_resources(&self, path: &str) -> Vec<Resource> {
        match &self.mirror_of {
            Some(live) => live.local_resources(path),
            None => self.engine.resolve_all(path),
        }
    }

    fn find_resource_in(&self, stages: &[SearchStage], path: &str, include_parent: bool) -> Option<Resource> {
        stages.iter().find_map(|stage| match stage {
            SearchStage::BeforeDelegates => self.before.iter().find_map(|d| d.delegate_find_resource(path)),
            SearchStage::Parent if include_parent => self.parent.as_ref().and_then(|p| p.get_resource(path)),
            SearchStage::Parent => None,
            SearchStage::Local => self.local_resource(path),
            SearchStage::AfterDelegates => self.after.iter().find_map(|d| d.delegate_find_resource(path)),
        })
    }

    fn find_resources_in(&self, stages: &[SearchStage], path: &str, include_parent: bool) -> Vec<Resource> {
        let mut found = Vec::new();
        for stage in stages {
            match stage {
                SearchStage::BeforeDelegates => {
                    for d in &self.before {
                        found.extend(d.delegate_find_resources(path));
                    }
                }
                SearchStage::Parent if include_parent => {
                    if let Some(parent) = &self.parent {
                        found.extend(parent.get_resources(path));
                    }
                }
                SearchStage::Parent => {}
                SearchStage::Local => found.extend(self.local_resources(path)),
                SearchStage::AfterDelegates => {
                    for d in &self.after {
                        found.extend(d.delegate_find_resources(path));
                    }
                }
            }
        }
        found
    }

    /// Resource at the container path of logical unit `name`.
    pub fn unit_resource(&self, name: &str) -> Option<Resource> {
        self.get_resource(&unit_path(name, &self.config.unit_suffix))
    }

    // ---------------------------------------------------------------------
    // Lifecycle and diagnostics
    // ---------------------------------------------------------------------

    /// Independently-defining mirror replaying this coordinator's topology.
    /// The mirror of a mirror is the mirror itself.
    pub fn shadow(self: &Arc<Self>) -> Arc<Coordinator> {
        if self.is_mirror() {
            return self.clone();
        }
        crate::shadow::mirror_coordinator(self)
    }

    /// Drop caches, the package index and the defined-unit registry.
    pub fn dispose(&self) {
        self.engine.dispose();
        self.loaded.write().clear();
        self.packages.write().clear();
        self.locks.clear();
    }

    /// Multi-line description of this coordinator's topology.
    pub fn diagnostics(&self) -> String {
        let mut lines = Vec::new();
        lines.push(format!(
            "coordinator {} ({}){}",
            self.key,
            self.id,
            if self.is_mirror() { " [mirror]" } else { "" }
        ));
        lines.push(format!("  search order: {:?}", self.search.stages()));
        lines.push(format!(
            "  parent: {}",
            self.parent.as_ref().map(|p| p.key().to_string()).unwrap_or_else(|| "<none>".to_string())
        ));
        let keys = |loaders: &[Arc<dyn UnitLoader>]| -> String {
            loaders.iter().map(|l| l.key().to_string()).collect::<Vec<_>>().join(", ")
        };
        lines.push(format!("  before delegates: [{}]", keys(&self.before)));
        lines.push(format!("  after delegates: [{}]", keys(&self.after)));
        lines.push(format!(
            "  transformers: {} user, {} system",
            self.pipeline.user_count(),
            self.pipeline.system_count()
        ));
        lines.push(format!("  defined units: {}", self.loaded_count()));
        for line in self.engine.diagnostics().lines() {
            lines.push(format!("  {}", line));
        }
        lines.join("\n")
    }

    pub(crate) fn new_mirror(
        live: &Arc<Coordinator>,
        parent: Option<Arc<dyn UnitLoader>>,
        before: Vec<Arc<dyn UnitLoader>>,
        after: Vec<Arc<dyn UnitLoader>>,
    ) -> Arc<Coordinator> {
        Arc::new_cyclic(|this| Coordinator {
            id: LoaderId::next(),
            key: live.key.clone(),
            config: live.config.clone(),
            search: live.search.clone(),
            parent,
            before,
            after,
            engine: live.engine.clone(),
            deny: live.deny.clone(),
            pipeline: TransformPipeline::default(),
            precompiled: None,
            generator: None,
            security: live.security.clone(),
            redefiner: None,
            native: NativeLocator::with_platform(live.native.platform()),
            shared_library: live.shared_library,
            locks: NameLocks::default(),
            loaded: RwLock::new(HashMap::new()),
            packages: RwLock::new(HashMap::new()),
            mirror_of: Some(live.clone()),
            this: this.clone(),
            metrics: LoaderMetrics::new(),
        })
    }
}

impl UnitLoader for Coordinator {
    fn key(&self) -> &str {
        &self.key
    }

    fn load_unit(
        &self,
        name: &str,
        policy: DelegatePolicy,
        allow_miss: bool,
    ) -> Result<Option<Arc<DefinedUnit>>, LoadError> {
        self.resolve_name(name, policy, allow_miss)
    }

    fn get_resource(&self, path: &str) -> Option<Resource> {
        if let Some(live) = &self.mirror_of {
            return live.get_resource(path);
        }
        self.find_resource_in(self.search.stages(), path, true)
    }

    fn get_resources(&self, path: &str) -> Vec<Resource> {
        if let Some(live) = &self.mirror_of {
            return live.get_resources(path);
        }
        self.find_resources_in(self.search.stages(), path, true)
    }

    fn delegate_find_resource(&self, path: &str) -> Option<Resource> {
        if let Some(live) = &self.mirror_of {
            return live.delegate_find_resource(path);
        }
        self.find_resource_in(self.search.stages(), path, false)
    }

    fn delegate_find_resources(&self, path: &str) -> Vec<Resource> {
        if let Some(live) = &self.mirror_of {
            return live.delegate_find_resources(path);
        }
        self.find_resources_in(self.search.stages(), path, false)
    }

    /// Registers locally and, unless the parent is a shared library, with
    /// the parent chain. Returns the outermost registration result.
    fn add_transformer(&self, transformer: Arc<dyn UnitTransformer>) -> bool {
        let added = self.pipeline.add(transformer.clone());
        match &self.parent {
            Some(parent) if parent.is_shared_library() => {
                debug!(loader = %self.key, parent = %parent.key(), "not propagating transformer into shared library");
                added
            }
            Some(parent) => parent.add_transformer(transformer),
            None => added,
        }
    }

    fn remove_transformer(&self, transformer: &Arc<dyn UnitTransformer>) -> bool {
        if let Some(parent) = &self.parent {
            parent.remove_transformer(transformer);
        }
        self.pipeline.remove(transformer)
    }

    fn is_shared_library(&self) -> bool {
        self.shared_library
    }

    fn mirror(&self) -> Option<Arc<dyn UnitLoader>> {
        if self.is_mirror() {
            return None;
        }
        let live = self.this.upgrade()?;
        Some(live.shadow() as Arc<dyn UnitLoader>)
    }

    fn as_coordinator(&self) -> Option<&Coordinator> {
        Some(self)
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("key", &self.key)
            .field("id", &self.id)
            .field("mirror", &self.is_mirror())
            .field("search", &self.search)
            .finish_non_exhaustive()
    }
}
