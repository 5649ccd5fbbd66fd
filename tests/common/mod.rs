#![allow(unused_imports)]
//! Shared test utilities for integration tests.
//!
//! # Modules
//!
//! - `fixtures`: container and coordinator builders
//! - `mocks`: recording transformers, redefiners, generators and caches
//! - `assertions`: assertion helpers with descriptive failure messages

pub mod assertions;
pub mod fixtures;
pub mod mocks;

pub use assertions::{assert_bytes_eq, assert_defined_by, assert_error_contains};
pub use fixtures::{dir_container, mem_container, simple_coordinator, unit_entries};
pub use mocks::{CountingGenerator, MemoryPrecompiled, RecordingRedefiner, RecordingTransformer};
