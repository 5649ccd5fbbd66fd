//! Custom assertion utilities for tests.

use std::sync::Arc;
use unit_loader::{Coordinator, DefinedUnit};

/// Assert that an error message contains expected text (case-insensitive).
#[allow(dead_code)]
pub fn assert_error_contains<E: std::fmt::Display>(error: E, expected_text: &str, context: &str) {
    let error_str = error.to_string().to_lowercase();
    assert!(
        error_str.contains(&expected_text.to_lowercase()),
        "{}: error message should contain '{}', got: {}",
        context,
        expected_text,
        error
    );
}

/// Assert that two byte slices are equal with readable output.
#[allow(dead_code)]
pub fn assert_bytes_eq(actual: &[u8], expected: &[u8], context: &str) {
    if actual != expected {
        panic!(
            "{}: byte mismatch\n  expected: {:?}\n  actual: {:?}",
            context,
            String::from_utf8_lossy(expected),
            String::from_utf8_lossy(actual)
        );
    }
}

/// Assert which coordinator defined `unit`.
#[allow(dead_code)]
pub fn assert_defined_by(unit: &DefinedUnit, coordinator: &Arc<Coordinator>, context: &str) {
    assert_eq!(
        unit.defined_by(),
        coordinator.id(),
        "{}: {} was defined by {} ({}), expected {}",
        context,
        unit.name(),
        unit.loader_key(),
        unit.defined_by(),
        coordinator.id()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assert_error_contains() {
        assert_error_contains("unit not found: x.A", "NOT FOUND", "lookup");
    }

    #[test]
    #[should_panic(expected = "payload: byte mismatch")]
    fn test_assert_bytes_eq_reports_mismatch() {
        assert_bytes_eq(b"abc", b"abd", "payload");
    }
}
