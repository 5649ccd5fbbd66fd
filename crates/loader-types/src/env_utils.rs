//! Typed environment variable parsing.
//!
//! ```
//! use unit_loader_types::env_utils::{env_bool, env_var_or};
//!
//! let capacity: usize = env_var_or("UNIT_LOADER_LAST_FOUND", 900);
//! let disabled = env_bool("UNIT_LOADER_DISABLE_INDEX");
//! # let _ = (capacity, disabled);
//! ```

use std::str::FromStr;

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Parse a variable into any `FromStr` type; `None` when unset or unparsable.
pub fn env_var<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Parse a variable, falling back to `default` when unset or unparsable.
pub fn env_var_or<T: FromStr>(key: &str, default: T) -> T {
    env_var(key).unwrap_or(default)
}

/// `true` when the variable is "1", "true", "yes" or "on" (any case).
pub fn env_bool(key: &str) -> bool {
    env_flag(key).unwrap_or(false)
}

/// Tri-state flag: `None` when unset, otherwise whether the value is truthy.
pub fn env_flag(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|v| is_truthy(&v))
}

/// Split a comma-separated variable into trimmed, non-empty items.
pub fn env_list(key: &str) -> Vec<String> {
    std::env::var(key)
        .ok()
        .map(|v| {
            v.split(',')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
