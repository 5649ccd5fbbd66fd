//! Loader configuration.
//!
//! Every knob has a compiled-in default, can be overridden from the
//! environment ([`LoaderConfig::from_env`]) or from a JSON document
//! ([`LoaderConfig::from_json_str`]). Missing JSON fields keep their defaults.
//!
//! | Field | Default | Environment |
//! |-------|---------|-------------|
//! | `last_found_capacity` | 900 | `UNIT_LOADER_LAST_FOUND` |
//! | `last_not_found_capacity` | 250 | `UNIT_LOADER_LAST_NOT_FOUND` |
//! | `really_not_found_capacity` | 900 | `UNIT_LOADER_LAST_REALLY_NOT_FOUND` |
//! | `use_package_index` | true | `UNIT_LOADER_DISABLE_INDEX` (inverted) |
//! | `index_warmup_ms` | unset | `UNIT_LOADER_INDEX_WARMUP_MS` |
//! | `nothing_forbidden` | false | `UNIT_LOADER_NOTHING_FORBIDDEN` |
//! | `precompiled_enabled` | true | `UNIT_LOADER_DISABLE_PRECOMPILED` (inverted) |
//! | `unit_suffix` | `.unit` | `UNIT_LOADER_UNIT_SUFFIX` |
//! | `strip_prefixes` | empty | `UNIT_LOADER_STRIP_PREFIXES` (comma list) |

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::env_utils::{env_bool, env_list, env_var};

pub const DEFAULT_LAST_FOUND_CAPACITY: usize = 900;
pub const DEFAULT_LAST_NOT_FOUND_CAPACITY: usize = 250;
pub const DEFAULT_REALLY_NOT_FOUND_CAPACITY: usize = 900;
pub const DEFAULT_UNIT_SUFFIX: &str = ".unit";

/// Upper bound on how long the index worker may be held back at startup.
pub const MAX_INDEX_WARMUP: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Positive cache capacity (0 disables the cache).
    pub last_found_capacity: usize,
    /// Per-container negative cache capacity.
    pub last_not_found_capacity: usize,
    /// Global negative cache capacity.
    pub really_not_found_capacity: usize,
    /// Build and consult the package index.
    pub use_package_index: bool,
    /// Hold index builds back for this long after the worker starts.
    pub index_warmup_ms: Option<u64>,
    /// Ignore every deny-list source.
    pub nothing_forbidden: bool,
    /// Consult the precompiled-artifact cache when one is attached.
    pub precompiled_enabled: bool,
    /// Path suffix of binary units inside containers.
    pub unit_suffix: String,
    /// Path prefixes stripped when turning a changed path back into a unit name.
    pub strip_prefixes: Vec<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            last_found_capacity: DEFAULT_LAST_FOUND_CAPACITY,
            last_not_found_capacity: DEFAULT_LAST_NOT_FOUND_CAPACITY,
            really_not_found_capacity: DEFAULT_REALLY_NOT_FOUND_CAPACITY,
            use_package_index: true,
            index_warmup_ms: None,
            nothing_forbidden: false,
            precompiled_enabled: true,
            unit_suffix: DEFAULT_UNIT_SUFFIX.to_string(),
            strip_prefixes: Vec::new(),
        }
    }
}

impl LoaderConfig {
    /// Defaults overridden by any `UNIT_LOADER_*` variables that are set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_var("UNIT_LOADER_LAST_FOUND") {
            config.last_found_capacity = v;
        }
        if let Some(v) = env_var("UNIT_LOADER_LAST_NOT_FOUND") {
            config.last_not_found_capacity = v;
        }
        if let Some(v) = env_var("UNIT_LOADER_LAST_REALLY_NOT_FOUND") {
            config.really_not_found_capacity = v;
        }
        if env_bool("UNIT_LOADER_DISABLE_INDEX") {
            config.use_package_index = false;
        }
        config.index_warmup_ms = env_var("UNIT_LOADER_INDEX_WARMUP_MS");
        config.nothing_forbidden = env_bool("UNIT_LOADER_NOTHING_FORBIDDEN");
        if env_bool("UNIT_LOADER_DISABLE_PRECOMPILED") {
            config.precompiled_enabled = false;
        }
        if let Some(suffix) = env_var::<String>("UNIT_LOADER_UNIT_SUFFIX") {
            if !suffix.is_empty() {
                config.unit_suffix = suffix;
            }
        }
        let prefixes = env_list("UNIT_LOADER_STRIP_PREFIXES");
        if !prefixes.is_empty() {
            config.strip_prefixes = prefixes;
        }
        config
    }

    /// Parse a JSON document; absent fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| anyhow!("Failed to parse loader config JSON: {}", e))?;
        if config.unit_suffix.is_empty() {
            return Err(anyhow!("Loader config has an empty unit_suffix"));
        }
        Ok(config)
    }

    /// Warm-up gate for the index worker, clamped to [`MAX_INDEX_WARMUP`].
    pub fn index_warmup(&self) -> Option<Duration> {
        self.index_warmup_ms
            .map(|ms| Duration::from_millis(ms).min(MAX_INDEX_WARMUP))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LoaderConfig::default();
        assert_eq!(config.last_found_capacity, 900);
        assert_eq!(config.last_not_found_capacity, 250);
        assert_eq!(config.really_not_found_capacity, 900);
        assert!(config.use_package_index);
        assert!(config.precompiled_enabled);
        assert_eq!(config.unit_suffix, ".unit");
        assert!(config.index_warmup().is_none());
    }

    #[test]
    fn test_from_json_partial() -> Result<()> {
        let config = LoaderConfig::from_json_str(
            r#"{"last_found_capacity": 10, "use_package_index": false, "strip_prefixes": ["WEB-INF/classes/"]}"#,
        )?;
        assert_eq!(config.last_found_capacity, 10);
        assert!(!config.use_package_index);
        assert_eq!(config.last_not_found_capacity, 250);
        assert_eq!(config.strip_prefixes, vec!["WEB-INF/classes/"]);
        Ok(())
    }

    #[test]
    fn test_from_json_rejects_bad_input() {
        assert!(LoaderConfig::from_json_str("{not json").is_err());
        assert!(LoaderConfig::from_json_str(r#"{"unit_suffix": ""}"#).is_err());
    }

    #[test]
    fn test_warmup_is_clamped() {
        let config = LoaderConfig {
            index_warmup_ms: Some(10 * 60 * 1000),
            ..LoaderConfig::default()
        };
        assert_eq!(config.index_warmup(), Some(MAX_INDEX_WARMUP));
    }

    #[test]
    fn test_from_env_overrides() {
        std::env::set_var("UNIT_LOADER_LAST_NOT_FOUND", "12");
        std::env::set_var("UNIT_LOADER_DISABLE_INDEX", "true");
        std::env::set_var("UNIT_LOADER_STRIP_PREFIXES", "WEB-INF/classes/,classes/");

        let config = LoaderConfig::from_env();
        assert_eq!(config.last_not_found_capacity, 12);
        assert!(!config.use_package_index);
        assert_eq!(config.strip_prefixes.len(), 2);

        std::env::remove_var("UNIT_LOADER_LAST_NOT_FOUND");
        std::env::remove_var("UNIT_LOADER_DISABLE_INDEX");
        std::env::remove_var("UNIT_LOADER_STRIP_PREFIXES");
    }
}
