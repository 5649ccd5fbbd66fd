//! Weak proxy to a coordinator.
//!
//! Holders that must not keep a coordinator alive (thread-context style
//! references) go through [`LoaderRef`]. Once the referent has been dropped
//! the proxy warns a single time and answers from the referent's parent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::warn;
use unit_loader_types::Resource;

use crate::delegation::{Coordinator, DelegatePolicy, UnitLoader};
use crate::errors::LoadError;
use crate::transform::UnitTransformer;
use crate::unit::DefinedUnit;

pub struct LoaderRef {
    key: Arc<str>,
    target: Weak<Coordinator>,
    parent: Option<Arc<dyn UnitLoader>>,
    warned: AtomicBool,
}

impl LoaderRef {
    pub fn new(target: &Arc<Coordinator>) -> Arc<Self> {
        Arc::new(Self {
            key: Arc::from(target.key()),
            target: Arc::downgrade(target),
            parent: target.parent().cloned(),
            warned: AtomicBool::new(false),
        })
    }

    /// The referent, if it is still alive.
    pub fn get(&self) -> Option<Arc<Coordinator>> {
        self.target.upgrade()
    }

    pub fn is_alive(&self) -> bool {
        self.target.strong_count() > 0
    }

    fn live(&self) -> Option<Arc<Coordinator>> {
        let live = self.target.upgrade();
        if live.is_none() && self.warned.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_ok() {
            warn!(
                loader = %self.key,
                fallback = self.parent.as_ref().map(|p| p.key()).unwrap_or("<none>"),
                "coordinator behind weak reference is gone, using its parent"
            );
        }
        live
    }
}

impl UnitLoader for LoaderRef {
    fn key(&self) -> &str {
        &self.key
    }

    fn load_unit(
        &self,
        name: &str,
        policy: DelegatePolicy,
        allow_miss: bool,
    ) -> Result<Option<Arc<DefinedUnit>>, LoadError> {
        if let Some(live) = self.live() {
            return live.load_unit(name, policy, allow_miss);
        }
        match &self.parent {
            Some(parent) => parent.load_unit(name, policy, allow_miss),
            None if allow_miss => Ok(None),
            None => Err(LoadError::not_found(name)),
        }
    }

    fn get_resource(&self, path: &str) -> Option<Resource> {
        match self.live() {
            Some(live) => live.get_resource(path),
            None => self.parent.as_ref().and_then(|p| p.get_resource(path)),
        }
    }

    fn get_resources(&self, path: &str) -> Vec<Resource> {
        match self.live() {
            Some(live) => live.get_resources(path),
            None => self.parent.as_ref().map(|p| p.get_resources(path)).unwrap_or_default(),
        }
    }

    fn delegate_find_resource(&self, path: &str) -> Option<Resource> {
        match self.live() {
            Some(live) => live.delegate_find_resource(path),
            None => self.parent.as_ref().and_then(|p| p.delegate_find_resource(path)),
        }
    }

    fn delegate_find_resources(&self, path: &str) -> Vec<Resource> {
        match self.live() {
            Some(live) => live.delegate_find_resources(path),
            None => self
                .parent
                .as_ref()
                .map(|p| p.delegate_find_resources(path))
                .unwrap_or_default(),
        }
    }

    /// `false` once the referent is gone.
    fn add_transformer(&self, transformer: Arc<dyn UnitTransformer>) -> bool {
        self.live().map(|live| live.add_transformer(transformer)).unwrap_or(false)
    }

    fn remove_transformer(&self, transformer: &Arc<dyn UnitTransformer>) -> bool {
        self.live().map(|live| live.remove_transformer(transformer)).unwrap_or(false)
    }

    fn is_shared_library(&self) -> bool {
        self.live().map(|live| live.is_shared_library()).unwrap_or(false)
    }

    fn mirror(&self) -> Option<Arc<dyn UnitLoader>> {
        self.live().map(|live| live.shadow() as Arc<dyn UnitLoader>)
    }
}

impl std::fmt::Debug for LoaderRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderRef")
            .field("key", &self.key)
            .field("alive", &self.is_alive())
            .finish()
    }
}
