//! Unit Loader Core
//!
//! Hierarchical resolution and definition of named units (bytes identified
//! by dotted logical names) from an ordered set of containers.
//!
//! # Features
//!
//! - **Resolution engine**: ordered container search with positive and
//!   negative caches and an asynchronously built package index
//! - **Delegation**: parent-first, parent-last and isolated search orders with
//!   before/after delegate tiers
//! - **Transformation**: user and system transformer chains coupled to a
//!   precompiled-artifact cache
//! - **Shadow mirrors**: throwaway coordinators that define independently
//! - **Redefinition**: conservative evaluation of live updates
//!
//! # Core Modules
//!
//! - [`container`]: container abstraction, in-memory and directory containers
//! - [`resolution`]: the resolution engine, caches, package index
//! - [`delegation`]: [`Coordinator`] and the [`UnitLoader`] trait
//! - [`transform`]: [`TransformPipeline`]
//! - [`shadow`]: mirrors built by [`Coordinator::shadow`]
//! - [`redefine`]: [`Coordinator::redefine`]
//! - [`native`]: native library lookup
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use unit_loader_core::{Coordinator, MemoryContainer, UnitLoader};
//!
//! let app = Coordinator::builder("app")
//!     .container(Arc::new(MemoryContainer::new("mem:app").with_entry("com/acme/Main.unit", b"...")))
//!     .build();
//! let unit = app.load("com.acme.Main")?;
//! ```

#![allow(clippy::type_complexity)]
#![allow(clippy::too_many_arguments)]

pub mod container;
pub mod delegation;
pub mod deny_list;
pub mod errors;
pub mod hooks;
pub mod loader_ref;
pub mod manifest;
pub mod metrics;
pub mod native;
pub mod precompiled;
pub mod redefine;
pub mod resolution;
pub mod shadow;
pub mod transform;
pub mod unit;

pub use container::{Container, ContainerEntry, DirContainer, MemoryContainer};
pub use delegation::{Coordinator, CoordinatorBuilder, DelegatePolicy, SearchOrder, SearchStage, UnitLoader};
pub use deny_list::DenyList;
pub use errors::LoadError;
pub use hooks::{FixedDomain, NoSecurity, SecurityContext, UnitGenerator};
pub use loader_ref::LoaderRef;
pub use manifest::{Manifest, PackageInfo};
pub use metrics::{LoaderMetrics, MetricsSnapshot};
pub use native::{NativeLocator, Platform};
pub use precompiled::PrecompiledCache;
pub use redefine::{ChangeNotification, Redefiner};
pub use resolution::{IndexWorker, ResolutionEngine, UnitBytes};
pub use transform::{TransformPipeline, UnitTransformer};
pub use unit::{DefinedUnit, LoaderId, UnitId, UnitOrigin};
