//! Native library lookup.
//!
//! A platform library name (`zip`) is mapped to a file name (`libzip.so`,
//! `libzip.dylib`, `zip.dll`). Native containers are searched first, in
//! registration order, then individually registered library files. On
//! Windows file names are also compared case-insensitively. Lookups are not
//! cached.

use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::container::Container;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    MacOs,
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }

    pub fn map_library_name(self, name: &str) -> String {
        match self {
            Platform::Linux => format!("lib{}.so", name),
            Platform::MacOs => format!("lib{}.dylib", name),
            Platform::Windows => format!("{}.dll", name),
        }
    }
}

fn is_windows_library(file_name: &str) -> bool {
    file_name.ends_with(".dll") || file_name.ends_with(".DLL")
}

fn matches_library(path: &Path, mapped: &str) -> bool {
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    path.exists()
        && (file_name == mapped
            || (is_windows_library(mapped) && file_name.eq_ignore_ascii_case(mapped)))
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

pub struct NativeLocator {
    platform: Platform,
    containers: RwLock<Vec<Arc<dyn Container>>>,
    files: RwLock<Vec<PathBuf>>,
}

impl Default for NativeLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeLocator {
    pub fn new() -> Self {
        Self::with_platform(Platform::current())
    }

    pub fn with_platform(platform: Platform) -> Self {
        Self {
            platform,
            containers: RwLock::new(Vec::new()),
            files: RwLock::new(Vec::new()),
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn add_container(&self, container: Arc<dyn Container>) {
        self.containers.write().push(container);
    }

    pub fn add_library_file(&self, path: impl Into<PathBuf>) {
        self.files.write().push(path.into());
    }

    /// Absolute path of the first matching native library, if any.
    pub fn find_library(&self, name: &str) -> Option<PathBuf> {
        if name.is_empty() {
            return None;
        }
        let mapped = self.platform.map_library_name(name);

        for container in self.containers.read().iter() {
            let found = container
                .get_resource(&mapped)
                .and_then(|r| r.native_path().map(Path::to_path_buf))
                .filter(|p| p.exists());
            if let Some(path) = found {
                debug!(library = name, container = %container.id(), "native library found in container");
                return Some(absolute(&path));
            }
        }

        let found = self
            .files
            .read()
            .iter()
            .find(|f| matches_library(f, &mapped))
            .map(|f| absolute(f));
        if found.is_none() {
            debug!(library = name, mapped = %mapped, "native library not found");
        }
        found
    }
}

impl std::fmt::Debug for NativeLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeLocator")
            .field("platform", &self.platform)
            .field("containers", &self.containers.read().len())
            .field("files", &self.files.read().len())
            .finish()
    }
}
