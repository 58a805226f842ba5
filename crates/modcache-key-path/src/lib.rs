//! Key paths for addressing nodes inside a JSON store.
//!
//! A key path is a root-relative sequence of steps, each either a string key
//! (mapping member) or an integer index (sequence element). Unlike a JSON
//! Pointer the two are distinct on the wire, so `"0"` and `0` address
//! different things.
//!
//! # Example
//!
//! ```
//! use modcache_key_path::{format_key_path, get, key_path};
//! use serde_json::json;
//!
//! let doc = json!({"projects": {"Foo": {"chats": [{"text": "hi"}]}}});
//! let path = key_path!["projects", "Foo", "chats", 0usize, "text"];
//!
//! assert_eq!(get(&doc, &path), Some(&json!("hi")));
//! assert_eq!(format_key_path(&path), "projects.Foo.chats[0].text");
//! ```

use serde_json::Value;
use thiserror::Error;

pub mod types;
pub use types::{KeyPath, PathStep};

pub mod validate;
pub use validate::{path_from_value, path_to_value, validate_key_path, ValidationError};

/// Format a key path for humans: keys joined by `.`, indices in brackets.
///
/// The root path formats as `$`.
///
/// ```
/// use modcache_key_path::{format_key_path, key_path};
///
/// assert_eq!(format_key_path(&[]), "$");
/// assert_eq!(format_key_path(&key_path!["a", 2usize, "b"]), "a[2].b");
/// assert_eq!(format_key_path(&key_path![0usize]), "[0]");
/// ```
pub fn format_key_path(path: &[PathStep]) -> String {
    if path.is_empty() {
        return "$".to_string();
    }
    let mut out = String::new();
    for step in path {
        match step {
            PathStep::Key(k) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(k);
            }
            PathStep::Index(i) => {
                out.push('[');
                out.push_str(&i.to_string());
                out.push(']');
            }
        }
    }
    out
}

/// Get a value from a JSON document by key path.
///
/// Returns `None` if any hop is missing, out of range, or addresses the wrong
/// kind of container.
///
/// ```
/// use modcache_key_path::{get, key_path};
/// use serde_json::json;
///
/// let doc = json!({"a": [10, 20]});
/// assert_eq!(get(&doc, &key_path!["a", 1usize]), Some(&json!(20)));
/// assert_eq!(get(&doc, &key_path!["a", "1"]), None);
/// ```
pub fn get<'a>(val: &'a Value, path: &[PathStep]) -> Option<&'a Value> {
    let mut current = val;
    for step in path {
        current = match (current, step) {
            (Value::Object(map), PathStep::Key(k)) => map.get(k)?,
            (Value::Array(arr), PathStep::Index(_)) => arr.get(step.index_within(arr.len())?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Get a mutable reference to a value in a JSON document by key path.
///
/// Returns `None` under the same conditions as [`get`].
pub fn get_mut<'a>(val: &'a mut Value, path: &[PathStep]) -> Option<&'a mut Value> {
    let mut current = val;
    for step in path {
        current = match (current, step) {
            (Value::Object(map), PathStep::Key(k)) => map.get_mut(k)?,
            (Value::Array(arr), PathStep::Index(_)) => {
                let idx = step.index_within(arr.len())?;
                arr.get_mut(idx)?
            }
            _ => return None,
        };
    }
    Some(current)
}

/// Find a value by key path, reporting which hop failed.
///
/// # Errors
///
/// - `LookupError::NotFound` - a mapping key is absent
/// - `LookupError::OutOfRange` - a sequence index is negative or past the end
/// - `LookupError::TypeMismatch` - a key used on a sequence, an index used on
///   a mapping, or any step taken into a scalar
pub fn find<'a>(val: &'a Value, path: &[PathStep]) -> Result<&'a Value, LookupError> {
    let mut current = val;
    for (depth, step) in path.iter().enumerate() {
        current = match (current, step) {
            (Value::Object(map), PathStep::Key(k)) => map
                .get(k)
                .ok_or_else(|| LookupError::NotFound(format_key_path(&path[..=depth])))?,
            (Value::Array(arr), PathStep::Index(i)) => {
                let idx = step.index_within(arr.len()).ok_or(LookupError::OutOfRange {
                    index: *i,
                    len: arr.len(),
                })?;
                &arr[idx]
            }
            _ => return Err(LookupError::TypeMismatch(format_key_path(&path[..=depth]))),
        };
    }
    Ok(current)
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("NOT_FOUND: {0}")]
    NotFound(String),
    #[error("OUT_OF_RANGE: index {index}, length {len}")]
    OutOfRange { index: i64, len: usize },
    #[error("TYPE_MISMATCH: {0}")]
    TypeMismatch(String),
}
