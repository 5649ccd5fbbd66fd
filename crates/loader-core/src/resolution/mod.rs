//! # Resolution Engine
//!
//! Maps a container path (or a logical unit name) to a resource across an
//! ordered container list.
//!
//! ## Lookup
//!
//! ```text
//!   resolve(path)
//!        │
//!        ▼
//! ┌──────────────┐ hit
//! │ last found   │──────────────► resource
//! └──────┬───────┘
//!        ▼
//! ┌──────────────┐ hit
//! │ really not   │──────────────► absent
//! │ found        │
//! └──────┬───────┘
//!        ▼
//! ┌──────────────┐  index usable and path has a directory
//! │ candidates   │────────────────► index bucket (may be empty)
//! └──────┬───────┘  otherwise
//!        │          ───────────────► full list, per-container negatives apply
//!        ▼
//!   first hit -> last found; exhaustion -> really not found
//! ```
//!
//! ## Key Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ResolutionEngine`] | Container list, caches, lazy first-read initialization |
//! | [`IndexWorker`] | Background FIFO worker building the package index |
//! | [`UnitBytes`] | Bytes of a located unit plus their provenance |
//! | [`cache::BoundedCache`] / [`cache::BoundedSet`] | Oldest-inserted eviction caches |

pub mod cache;
mod engine;
pub(crate) mod index;
mod worker;

pub use engine::{EngineBuilder, InitHook, ResolutionEngine, UnitBytes};
pub use worker::{IndexJob, IndexWorker};
