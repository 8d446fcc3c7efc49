//! Opaque 128-bit identifiers.
//!
//! All entity ids are [`Uuid`] v4 values rendered in their hyphenated form,
//! which already satisfies the `[A-Za-z0-9_-]` path-segment constraint from
//! the data model (hyphens are the only non-alphanumeric character a UUID
//! ever produces). [`PathSegment::validate`] is still enforced at every
//! filesystem path build so a future id format change cannot silently
//! reintroduce path traversal.

use uuid::Uuid;

/// Validate that a string is safe to use as a single filesystem path
/// segment: only `[A-Za-z0-9_-]`, non-empty, no `.` or `..`.
///
/// # Errors
///
/// Returns a description of the first invalid character or empty/`.`/`..` input.
pub fn validate_path_segment(s: &str) -> Result<(), String> {
    if s.is_empty() {
        return Err("path segment must not be empty".to_owned());
    }
    if s == "." || s == ".." {
        return Err(format!("path segment must not be '{s}'"));
    }
    for c in s.chars() {
        if !(c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(format!("path segment '{s}' contains invalid character '{c}'"));
        }
    }
    Ok(())
}

/// Generate a new opaque id (UUID v4, hyphenated).
#[must_use]
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_path_safe() {
        for _ in 0..100 {
            let id = new_id();
            assert!(validate_path_segment(&id).is_ok());
        }
    }

    #[test]
    fn rejects_traversal() {
        assert!(validate_path_segment("..").is_err());
        assert!(validate_path_segment(".").is_err());
        assert!(validate_path_segment("").is_err());
        assert!(validate_path_segment("a/b").is_err());
        assert!(validate_path_segment("a..b").is_ok());
        assert!(validate_path_segment("../etc").is_err());
    }

    #[test]
    fn accepts_alphanumeric_underscore_hyphen() {
        assert!(validate_path_segment("abc123_DEF-456").is_ok());
    }
}
