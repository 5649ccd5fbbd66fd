//! Recording collaborators for integration tests.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use unit_loader::{ContainerId, Coordinator, DefinedUnit, PrecompiledCache, Redefiner, UnitGenerator, UnitTransformer};

/// Appends `suffix` to every unit and records the names it saw.
#[derive(Default)]
pub struct RecordingTransformer {
    suffix: Vec<u8>,
    seen: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl RecordingTransformer {
    pub fn appending(suffix: &str) -> Arc<Self> {
        Arc::new(Self {
            suffix: suffix.as_bytes().to_vec(),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().clone()
    }
}

impl UnitTransformer for RecordingTransformer {
    fn transform(&self, name: &str, bytes: &[u8]) -> anyhow::Result<Option<Vec<u8>>> {
        self.seen.lock().push(name.to_string());
        if self.suffix.is_empty() {
            return Ok(None);
        }
        Ok(Some([bytes, self.suffix.as_slice()].concat()))
    }
}

/// Records submitted batches and answers with a fixed verdict.
pub struct RecordingRedefiner {
    pub available: bool,
    pub accept: bool,
    batches: Mutex<Vec<Vec<(String, Vec<u8>)>>>,
}

#[allow(dead_code)]
impl RecordingRedefiner {
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self {
            available: true,
            accept: true,
            batches: Mutex::new(Vec::new()),
        })
    }

    pub fn batches(&self) -> Vec<Vec<(String, Vec<u8>)>> {
        self.batches.lock().clone()
    }
}

impl Redefiner for RecordingRedefiner {
    fn can_redefine(&self) -> bool {
        self.available
    }

    fn redefine_batch(&self, batch: &[(Arc<DefinedUnit>, Vec<u8>)]) -> bool {
        self.batches
            .lock()
            .push(batch.iter().map(|(unit, bytes)| (unit.name().to_string(), bytes.clone())).collect());
        self.accept
    }
}

/// Generates `generated:<name>` for names ending in `suffix`.
pub struct CountingGenerator {
    suffix: String,
    calls: AtomicUsize,
}

#[allow(dead_code)]
impl CountingGenerator {
    pub fn for_suffix(suffix: &str) -> Arc<Self> {
        Arc::new(Self {
            suffix: suffix.to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl UnitGenerator for CountingGenerator {
    fn generate(&self, name: &str, _requester: &Coordinator) -> anyhow::Result<Option<Vec<u8>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(name
            .ends_with(&self.suffix)
            .then(|| format!("generated:{}", name).into_bytes()))
    }
}

/// In-memory precompiled cache keyed by `(container, name)`.
#[derive(Default)]
pub struct MemoryPrecompiled {
    entries: Mutex<HashMap<(String, String), Vec<u8>>>,
    stores: AtomicUsize,
}

#[allow(dead_code)]
impl MemoryPrecompiled {
    pub fn seed(&self, container: &str, name: &str, bytes: &[u8]) {
        self.entries
            .lock()
            .insert((container.to_string(), name.to_string()), bytes.to_vec());
    }

    pub fn stores(&self) -> usize {
        self.stores.load(Ordering::SeqCst)
    }
}

impl PrecompiledCache for MemoryPrecompiled {
    fn load_precompiled(&self, container: &ContainerId, name: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self
            .entries
            .lock()
            .get(&(container.as_str().to_string(), name.to_string()))
            .cloned())
    }

    fn store_precompiled(&self, container: &ContainerId, unit: &DefinedUnit) -> anyhow::Result<()> {
        self.stores.fetch_add(1, Ordering::SeqCst);
        self.seed(container.as_str(), unit.name(), unit.bytes());
        Ok(())
    }
}
