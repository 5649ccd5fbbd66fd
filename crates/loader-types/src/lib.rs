//! Shared types for the unit loader workspace.
//!
//! This crate provides:
//! - [`Resource`]: a located, named byte resource with a lazy byte supplier
//! - [`ContainerId`]: identity of a container (its canonical URL)
//! - [`names`]: conversions between logical unit names and container paths
//! - [`LoaderConfig`]: cache capacities and feature switches, from env or JSON
//! - [`env_utils`]: typed environment variable parsing

pub mod config;
pub mod env_utils;
pub mod names;
pub mod resource;

pub use config::LoaderConfig;
pub use resource::{ContainerId, Resource};
