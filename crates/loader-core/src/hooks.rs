//! External collaborators consulted by the coordinator.

use std::sync::Arc;
use unit_loader_types::ContainerId;

use crate::delegation::Coordinator;

/// Synthetic-generation hook, asked after every search stage missed.
pub trait UnitGenerator: Send + Sync {
    fn generate(&self, name: &str, requester: &Coordinator) -> anyhow::Result<Option<Vec<u8>>>;
}

/// Assigns a security domain to each definition. The engine only passes
/// the value through to [`crate::DefinedUnit::domain`].
pub trait SecurityContext: Send + Sync {
    fn domain_for(&self, source: Option<&ContainerId>) -> Option<Arc<str>>;
}

/// Assigns nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSecurity;

impl SecurityContext for NoSecurity {
    fn domain_for(&self, _source: Option<&ContainerId>) -> Option<Arc<str>> {
        None
    }
}

/// One fixed domain for every definition.
#[derive(Debug, Clone)]
pub struct FixedDomain(pub Arc<str>);

impl SecurityContext for FixedDomain {
    fn domain_for(&self, _source: Option<&ContainerId>) -> Option<Arc<str>> {
        Some(self.0.clone())
    }
}
