//! Defined units and the identities attached to them.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use unit_loader_types::ContainerId;

use crate::manifest::PackageInfo;

static NEXT_UNIT_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_LOADER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct UnitId(u64);

impl UnitId {
    pub(crate) fn next() -> Self {
        Self(NEXT_UNIT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// Process-unique identity of a coordinator (live or mirror).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LoaderId(u64);

impl LoaderId {
    pub(crate) fn next() -> Self {
        Self(NEXT_LOADER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LoaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loader#{}", self.0)
    }
}

/// Where the defined bytes came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnitOrigin {
    /// Read from a container (possibly transformed).
    Container,
    /// Served by the precompiled-artifact cache.
    Precompiled,
    /// Produced by the synthetic-generation hook.
    Generated,
}

/// A unit irrevocably defined by one coordinator.
#[derive(Debug, Clone)]
pub struct DefinedUnit {
    id: UnitId,
    name: String,
    bytes: Arc<[u8]>,
    defined_by: LoaderId,
    loader_key: Arc<str>,
    source: Option<ContainerId>,
    package: Option<Arc<PackageInfo>>,
    domain: Option<Arc<str>>,
    origin: UnitOrigin,
}

impl DefinedUnit {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: &str,
        bytes: Vec<u8>,
        defined_by: LoaderId,
        loader_key: Arc<str>,
        source: Option<ContainerId>,
        package: Option<Arc<PackageInfo>>,
        domain: Option<Arc<str>>,
        origin: UnitOrigin,
    ) -> Self {
        Self {
            id: UnitId::next(),
            name: name.to_string(),
            bytes: Arc::from(bytes),
            defined_by,
            loader_key,
            source,
            package,
            domain,
            origin,
        }
    }

    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bytes the unit was defined from (after transformation).
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn defined_by(&self) -> LoaderId {
        self.defined_by
    }

    /// Key of the coordinator that defined the unit.
    pub fn loader_key(&self) -> &str {
        &self.loader_key
    }

    /// Container the bytes were located in, if any.
    pub fn source(&self) -> Option<&ContainerId> {
        self.source.as_ref()
    }

    pub fn package(&self) -> Option<&PackageInfo> {
        self.package.as_deref()
    }

    /// Security domain assigned at definition time.
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn origin(&self) -> UnitOrigin {
        self.origin
    }
}
