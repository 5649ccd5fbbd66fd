//! Unit Loader
//!
//! Hierarchical resolution and loading of named units from ordered
//! containers, with layered delegation between coordinators.
//!
//! - **[`types`]**: shared value types, name conversions, [`types::LoaderConfig`]
//! - **[`core`]**: resolution engine, delegation coordinator, transformation
//!   pipeline, shadow mirrors, redefinition, native lookup
//! - **[`artifacts`]**: filesystem precompiled-artifact store
//!
//! The most common items are re-exported at the crate root.

pub use unit_loader_artifacts as artifacts;
pub use unit_loader_core as core;
pub use unit_loader_types as types;

pub use unit_loader_artifacts::FsPrecompiledStore;
pub use unit_loader_core::{
    ChangeNotification, Container, Coordinator, CoordinatorBuilder, DefinedUnit, DelegatePolicy, DenyList,
    DirContainer, IndexWorker, LoadError, LoaderMetrics, LoaderRef, MemoryContainer, NativeLocator,
    PrecompiledCache, Redefiner, ResolutionEngine, SearchOrder, SearchStage, UnitGenerator, UnitLoader,
    UnitOrigin, UnitTransformer,
};
pub use unit_loader_types::{ContainerId, LoaderConfig, Resource};
