//! Name validation for namespaces, keys, and log names.
//!
//! Every name ends up as a single path component on disk (a namespace is a
//! directory, a key or a log name is a file), so the rules keep names from
//! escaping their parent directory or colliding with temporary files:
//! - Must be non-empty and at most [`MAX_NAME_LEN`] bytes
//! - Must not contain `/`, `\`, NUL, or any control character
//! - Must not be `.` or `..`
//! - Must not start with `.` (reserved for in-flight temporary files)

use crate::error::TypeError;

/// Longest accepted name, in bytes. Matches the common filesystem limit.
pub const MAX_NAME_LEN: usize = 255;

/// Characters that are forbidden anywhere in a name.
const FORBIDDEN_CHARS: &[char] = &['/', '\\', '\0'];

fn validate_component(kind: &'static str, name: &str) -> Result<(), TypeError> {
    let invalid = |reason: String| TypeError::InvalidName {
        kind,
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("must not be empty".into()));
    }

    if name.len() > MAX_NAME_LEN {
        return Err(invalid(format!(
            "is {} bytes, longer than {MAX_NAME_LEN}",
            name.len()
        )));
    }

    for ch in FORBIDDEN_CHARS {
        if name.contains(*ch) {
            return Err(invalid(format!("contains forbidden character: {ch:?}")));
        }
    }

    if let Some(ch) = name.chars().find(|c| c.is_control()) {
        return Err(invalid(format!("contains control character: {ch:?}")));
    }

    // Covers "." and ".." as well.
    if name.starts_with('.') {
        return Err(invalid("must not start with '.'".into()));
    }

    Ok(())
}

/// Validate a namespace name, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use cellar_types::names::validate_namespace;
///
/// assert!(validate_namespace("cats").is_ok());
/// assert!(validate_namespace("").is_err());
/// assert!(validate_namespace("../etc").is_err());
/// ```
pub fn validate_namespace(name: &str) -> Result<(), TypeError> {
    validate_component("namespace", name)
}

/// Validate a key name. Same rules as namespaces.
pub fn validate_key(name: &str) -> Result<(), TypeError> {
    validate_component("key", name)
}

/// Validate an append-log name. Same rules as keys.
pub fn validate_log_name(name: &str) -> Result<(), TypeError> {
    validate_component("log", name)
}
