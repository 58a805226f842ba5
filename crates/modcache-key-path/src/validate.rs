//! Validation functions for key paths.

use serde_json::Value;
use thiserror::Error;

use crate::types::{KeyPath, PathStep};

/// Maximum allowed path depth.
const MAX_PATH_LENGTH: usize = 256;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("PATH_EMPTY")]
    PathEmpty,
    #[error("PATH_TOO_LONG")]
    PathTooLong,
    #[error("PATH_NOT_ARRAY")]
    PathNotArray,
    #[error("INVALID_PATH_STEP: {0}")]
    InvalidPathStep(String),
}

/// Validate a key path.
///
/// # Errors
///
/// Returns an error if:
/// - The path is empty (a mod always needs a final key)
/// - The path exceeds the maximum length (256 steps)
///
/// # Example
///
/// ```
/// use modcache_key_path::{key_path, validate_key_path};
///
/// validate_key_path(&key_path!["projects", "Foo"]).unwrap();
/// validate_key_path(&[]).unwrap_err();
/// ```
pub fn validate_key_path(path: &[PathStep]) -> Result<(), ValidationError> {
    if path.is_empty() {
        return Err(ValidationError::PathEmpty);
    }
    if path.len() > MAX_PATH_LENGTH {
        return Err(ValidationError::PathTooLong);
    }
    Ok(())
}

/// Decode a wire key path: a JSON array of strings and integers.
///
/// Floats, booleans, nulls and nested containers are rejected. Integers that
/// do not fit in `i64` are rejected as well.
///
/// ```
/// use modcache_key_path::{path_from_value, PathStep};
/// use serde_json::json;
///
/// let path = path_from_value(&json!(["projects", "Foo", "chats", 2])).unwrap();
/// assert_eq!(path[3], PathStep::Index(2));
/// assert!(path_from_value(&json!(["a", 1.5])).is_err());
/// ```
pub fn path_from_value(value: &Value) -> Result<KeyPath, ValidationError> {
    let steps = value.as_array().ok_or(ValidationError::PathNotArray)?;
    if steps.len() > MAX_PATH_LENGTH {
        return Err(ValidationError::PathTooLong);
    }
    steps
        .iter()
        .map(|step| match step {
            Value::String(s) => Ok(PathStep::Key(s.clone())),
            Value::Number(n) => n
                .as_i64()
                .map(PathStep::Index)
                .ok_or_else(|| ValidationError::InvalidPathStep(n.to_string())),
            other => Err(ValidationError::InvalidPathStep(other.to_string())),
        })
        .collect()
}

/// Encode a key path to its wire form.
pub fn path_to_value(path: &[PathStep]) -> Value {
    Value::Array(path.iter().map(PathStep::to_value).collect())
}
