//! Located resources and container identities.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Identity of a container, normally its canonical URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainerId(Arc<str>);

impl ContainerId {
    pub fn new(url: impl AsRef<str>) -> Self {
        Self(Arc::from(url.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContainerId {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

type ByteSupplier = dyn Fn() -> io::Result<Vec<u8>> + Send + Sync;

/// A named resource found inside a container.
///
/// Locating a resource never reads it; bytes are pulled through the supplier
/// on demand so that "located" and "readable" stay distinct outcomes.
#[derive(Clone)]
pub struct Resource {
    name: Arc<str>,
    url: Option<Arc<str>>,
    native_path: Option<PathBuf>,
    supplier: Arc<ByteSupplier>,
}

impl Resource {
    /// A resource whose bytes are produced by `supplier`.
    pub fn new<F>(name: impl AsRef<str>, supplier: F) -> Self
    where
        F: Fn() -> io::Result<Vec<u8>> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name.as_ref()),
            url: None,
            native_path: None,
            supplier: Arc::new(supplier),
        }
    }

    /// A resource backed by an in-memory buffer.
    pub fn from_bytes(name: impl AsRef<str>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes: Arc<[u8]> = bytes.into();
        Self::new(name, move || Ok(bytes.to_vec()))
    }

    /// A resource backed by a file, read on every call to [`Resource::read`].
    pub fn from_file(name: impl AsRef<str>, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let url = format!("file://{}", path.display());
        let reader = path.clone();
        Self::new(name, move || std::fs::read(&reader))
            .with_url(url)
            .with_native_path(path)
    }

    pub fn with_url(mut self, url: impl AsRef<str>) -> Self {
        self.url = Some(Arc::from(url.as_ref()));
        self
    }

    pub fn with_native_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.native_path = Some(path.into());
        self
    }

    /// Path of the resource inside its container.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Filesystem location when the resource is backed by a real file.
    pub fn native_path(&self) -> Option<&Path> {
        self.native_path.as_deref()
    }

    /// Read the resource bytes.
    pub fn read(&self) -> io::Result<Vec<u8>> {
        (self.supplier)()
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("native_path", &self.native_path)
            .finish_non_exhaustive()
    }
}
