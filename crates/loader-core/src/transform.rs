//! Transformation pipeline applied to unit bytes before definition.
//!
//! User transformers run first, then system transformers, each in
//! registration order. A transformer returns `Ok(None)` to leave the bytes
//! unchanged. Any error aborts the definition.
//!
//! Bytes served by the precompiled-artifact cache are never transformed
//! directly: the original container bytes are re-read and transformed
//! instead, and when the chain leaves them unchanged the precompiled form is
//! served again.

use parking_lot::RwLock;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::LoadError;
use crate::resolution::UnitBytes;

pub trait UnitTransformer: Send + Sync {
    fn transform(&self, name: &str, bytes: &[u8]) -> anyhow::Result<Option<Vec<u8>>>;
}

impl<F> UnitTransformer for F
where
    F: Fn(&str, &[u8]) -> anyhow::Result<Option<Vec<u8>>> + Send + Sync,
{
    fn transform(&self, name: &str, bytes: &[u8]) -> anyhow::Result<Option<Vec<u8>>> {
        self(name, bytes)
    }
}

/// Identity comparison for trait objects (data pointer only).
pub(crate) fn same_transformer(a: &Arc<dyn UnitTransformer>, b: &Arc<dyn UnitTransformer>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

#[derive(Default)]
pub struct TransformPipeline {
    user: RwLock<Vec<Arc<dyn UnitTransformer>>>,
    system: Vec<Arc<dyn UnitTransformer>>,
}

impl TransformPipeline {
    pub fn new(system: Vec<Arc<dyn UnitTransformer>>) -> Self {
        Self {
            user: RwLock::new(Vec::new()),
            system,
        }
    }

    /// Register a user transformer. Returns `false` if it is already registered.
    pub fn add(&self, transformer: Arc<dyn UnitTransformer>) -> bool {
        let mut user = self.user.write();
        if user.iter().any(|t| same_transformer(t, &transformer)) {
            return false;
        }
        user.push(transformer);
        true
    }

    pub fn remove(&self, transformer: &Arc<dyn UnitTransformer>) -> bool {
        let mut user = self.user.write();
        let before = user.len();
        user.retain(|t| !same_transformer(t, transformer));
        user.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.system.is_empty() && self.user.read().is_empty()
    }

    pub fn user_count(&self) -> usize {
        self.user.read().len()
    }

    pub fn system_count(&self) -> usize {
        self.system.len()
    }

    /// Bytes to define `unit` from.
    pub fn apply(&self, unit: &UnitBytes) -> Result<Vec<u8>, LoadError> {
        if self.is_empty() {
            return Ok(unit.bytes().to_vec());
        }
        let name = unit.name();

        let original = if unit.from_precompiled() {
            match unit.actual_bytes() {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(name, error = %e, "failed to re-read original bytes, defining precompiled form");
                    return Ok(unit.bytes().to_vec());
                }
            }
        } else {
            unit.bytes().to_vec()
        };

        // Snapshot so transformers run without holding the registry lock.
        let user: Vec<_> = self.user.read().clone();
        let mut current: Cow<'_, [u8]> = Cow::Borrowed(original.as_slice());
        for transformer in user.iter().chain(self.system.iter()) {
            let changed = transformer
                .transform(name, &current)
                .map_err(|source| LoadError::Transform {
                    name: name.to_string(),
                    source,
                })?;
            if let Some(bytes) = changed {
                current = Cow::Owned(bytes);
            }
        }

        if unit.from_precompiled() && current.as_ref() == original.as_slice() {
            debug!(name, "transformers left bytes unchanged, restoring precompiled form");
            return Ok(unit.bytes().to_vec());
        }
        Ok(current.into_owned())
    }
}

impl std::fmt::Debug for TransformPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformPipeline")
            .field("user", &self.user_count())
            .field("system", &self.system_count())
            .finish()
    }
}
