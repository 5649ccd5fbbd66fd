//! Containers: ordered, enumerable sources of named byte resources.
//!
//! The engine only talks to the [`Container`] trait. Two implementations
//! ship with the crate:
//!
//! | Type | Backing |
//! |------|---------|
//! | [`MemoryContainer`] | In-memory map, counts probes (handy for tests and generated content) |
//! | [`DirContainer`] | A directory on disk |
//!
//! Registered containers are wrapped in a [`ContainerEntry`], which adds the
//! per-container negative cache, lazily parsed manifest metadata and path
//! normalization for non-root containers.

use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};
use unit_loader_types::names::normalize_path;
use unit_loader_types::{ContainerId, Resource};

use crate::manifest::{Manifest, PackageInfo, MANIFEST_PATH};
use crate::resolution::cache::BoundedSet;

// =============================================================================
// Container Trait
// =============================================================================

pub trait Container: Send + Sync {
    /// Identity of the container (its canonical URL).
    fn id(&self) -> &ContainerId;

    /// Every URL this container answers for. Defaults to its identity.
    fn urls(&self) -> Vec<String> {
        vec![self.id().to_string()]
    }

    /// Root containers are addressed directly; non-root containers are
    /// nested views whose paths get normalized before lookup.
    fn is_root(&self) -> bool {
        true
    }

    /// All resources whose path starts with `prefix`, in a stable order.
    fn enumerate(&self, prefix: &str) -> io::Result<Vec<Resource>>;

    /// Look up one resource. Absence is `None`, never an error.
    fn get_resource(&self, path: &str) -> Option<Resource>;
}

// =============================================================================
// MemoryContainer
// =============================================================================

#[derive(Debug, Clone)]
enum MemoryEntry {
    Bytes(Arc<[u8]>),
    Unreadable,
}

/// In-memory container. Entries can be added after registration, which is
/// how late-arriving content (and negative-cache staleness) is exercised.
#[derive(Debug)]
pub struct MemoryContainer {
    id: ContainerId,
    root: bool,
    entries: RwLock<BTreeMap<String, MemoryEntry>>,
    probes: AtomicU64,
    reads: Arc<AtomicU64>,
}

impl MemoryContainer {
    pub fn new(url: impl AsRef<str>) -> Self {
        Self {
            id: ContainerId::new(url),
            root: true,
            entries: RwLock::new(BTreeMap::new()),
            probes: AtomicU64::new(0),
            reads: Arc::new(AtomicU64::new(0)),
        }
    }

    /// A nested (non-root) container.
    pub fn nested(url: impl AsRef<str>) -> Self {
        Self {
            root: false,
            ..Self::new(url)
        }
    }

    pub fn with_entry(self, path: impl Into<String>, bytes: impl AsRef<[u8]>) -> Self {
        self.insert(path, bytes);
        self
    }

    pub fn insert(&self, path: impl Into<String>, bytes: impl AsRef<[u8]>) {
        self.entries
            .write()
            .insert(path.into(), MemoryEntry::Bytes(Arc::from(bytes.as_ref())));
    }

    /// An entry that can be located but whose bytes fail to read.
    pub fn insert_unreadable(&self, path: impl Into<String>) {
        self.entries
            .write()
            .insert(path.into(), MemoryEntry::Unreadable);
    }

    pub fn remove(&self, path: &str) -> bool {
        self.entries.write().remove(path).is_some()
    }

    /// Number of `get_resource` calls served so far.
    pub fn probe_count(&self) -> u64 {
        self.probes.load(Ordering::SeqCst)
    }

    /// Number of successful byte reads through resources handed out.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    fn resource(&self, path: &str, entry: &MemoryEntry) -> Resource {
        let resource = match entry {
            MemoryEntry::Bytes(bytes) => {
                let bytes = bytes.clone();
                let reads = self.reads.clone();
                Resource::new(path, move || {
                    reads.fetch_add(1, Ordering::SeqCst);
                    Ok(bytes.to_vec())
                })
            }
            MemoryEntry::Unreadable => {
                let missing = path.to_string();
                Resource::new(path, move || {
                    Err(io::Error::new(
                        io::ErrorKind::Other,
                        format!("resource {} is unreadable", missing),
                    ))
                })
            }
        };
        resource.with_url(format!("{}!/{}", self.id, path))
    }
}

impl Container for MemoryContainer {
    fn id(&self) -> &ContainerId {
        &self.id
    }

    fn is_root(&self) -> bool {
        self.root
    }

    fn enumerate(&self, prefix: &str) -> io::Result<Vec<Resource>> {
        Ok(self
            .entries
            .read()
            .range(prefix.to_string()..)
            .take_while(|(path, _)| path.starts_with(prefix))
            .map(|(path, entry)| self.resource(path, entry))
            .collect())
    }

    fn get_resource(&self, path: &str) -> Option<Resource> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.entries
            .read()
            .get(path)
            .map(|entry| self.resource(path, entry))
    }
}

// =============================================================================
// DirContainer
// =============================================================================

/// A directory on disk. Resources are read from the file on each access.
#[derive(Debug)]
pub struct DirContainer {
    id: ContainerId,
    root_dir: PathBuf,
    root: bool,
}

impl DirContainer {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        let root_dir = dir.as_ref().to_path_buf();
        Self {
            id: ContainerId::new(format!("file://{}/", root_dir.display())),
            root_dir,
            root: true,
        }
    }

    /// A non-root view of a subdirectory.
    pub fn nested<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            root: false,
            ..Self::new(dir)
        }
    }

    pub fn dir(&self) -> &Path {
        &self.root_dir
    }

    fn walk(&self, dir: &Path, relative: &str, out: &mut Vec<Resource>) -> io::Result<()> {
        let mut children: Vec<_> = std::fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
        children.sort_by_key(|entry| entry.file_name());
        for child in children {
            let name = child.file_name().to_string_lossy().into_owned();
            let child_relative = if relative.is_empty() {
                name
            } else {
                format!("{}/{}", relative, name)
            };
            let file_type = child.file_type()?;
            if file_type.is_dir() {
                self.walk(&child.path(), &child_relative, out)?;
            } else if file_type.is_file() {
                out.push(Resource::from_file(&child_relative, child.path()));
            }
        }
        Ok(())
    }
}

impl Container for DirContainer {
    fn id(&self) -> &ContainerId {
        &self.id
    }

    fn is_root(&self) -> bool {
        self.root
    }

    fn enumerate(&self, prefix: &str) -> io::Result<Vec<Resource>> {
        let mut all = Vec::new();
        self.walk(&self.root_dir, "", &mut all)?;
        all.retain(|r| r.name().starts_with(prefix));
        Ok(all)
    }

    fn get_resource(&self, path: &str) -> Option<Resource> {
        // Never let a lookup climb out of the directory.
        let normalized = normalize_path(path)?;
        let relative = normalized.trim_start_matches('/');
        let full = self.root_dir.join(relative);
        if full.is_file() {
            Some(Resource::from_file(relative, full))
        } else {
            None
        }
    }
}

// =============================================================================
// ContainerEntry
// =============================================================================

/// A registered container plus the engine-side state kept for it.
pub struct ContainerEntry {
    container: Arc<dyn Container>,
    order: i64,
    not_found: Mutex<BoundedSet<String>>,
    manifest: OnceLock<Manifest>,
}

impl ContainerEntry {
    pub(crate) fn new(container: Arc<dyn Container>, order: i64, not_found_capacity: usize) -> Self {
        Self {
            container,
            order,
            not_found: Mutex::new(BoundedSet::new(not_found_capacity)),
            manifest: OnceLock::new(),
        }
    }

    pub fn id(&self) -> &ContainerId {
        self.container.id()
    }

    pub fn container(&self) -> &Arc<dyn Container> {
        &self.container
    }

    /// Position key in the container list; prepended entries sort first.
    pub(crate) fn order(&self) -> i64 {
        self.order
    }

    /// Look a path up, normalizing it first for non-root containers.
    /// `""` and `"/"` denote the container itself.
    pub fn get_resource(&self, path: &str) -> Option<Resource> {
        let path = if self.container.is_root() {
            path.to_string()
        } else {
            match normalize_path(path) {
                Some(p) => p,
                None => {
                    debug!(container = %self.id(), path, "rejected path escaping container");
                    return None;
                }
            }
        };
        if path.is_empty() || path == "/" {
            return Some(Resource::from_bytes("", Vec::new()).with_url(self.id().as_str()));
        }
        self.container.get_resource(&path)
    }

    pub(crate) fn is_known_absent(&self, path: &str) -> bool {
        self.not_found.lock().contains(path)
    }

    pub(crate) fn record_absent(&self, path: &str) {
        self.not_found.lock().insert(path.to_string());
    }

    pub(crate) fn clear_absent(&self) {
        self.not_found.lock().clear();
    }

    /// Manifest metadata, parsed on first use. A missing or unreadable
    /// manifest yields an empty one.
    pub fn manifest(&self) -> &Manifest {
        self.manifest.get_or_init(|| {
            let Some(resource) = self.container.get_resource(MANIFEST_PATH) else {
                return Manifest::default();
            };
            match resource.read() {
                Ok(bytes) => Manifest::parse(&String::from_utf8_lossy(&bytes)),
                Err(e) => {
                    warn!(container = %self.id(), error = %e, "failed to read manifest");
                    Manifest::default()
                }
            }
        })
    }

    pub fn package_info(&self, package: &str) -> PackageInfo {
        self.manifest().package_info(package, self.id().as_str())
    }
}

impl std::fmt::Debug for ContainerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerEntry")
            .field("id", self.id())
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}
