//! Type definitions for key paths.

use std::fmt;

use serde_json::Value;

/// A step in a key path.
///
/// Mapping members are addressed by string keys, sequence elements by
/// integer indices. Indices are signed so that a negative index received over
/// the wire survives decoding and is rejected where it is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathStep {
    Key(String),
    Index(i64),
}

/// A root-relative key path.
pub type KeyPath = Vec<PathStep>;

impl PathStep {
    /// Returns the key if this step addresses a mapping member.
    pub fn as_key(&self) -> Option<&str> {
        match self {
            PathStep::Key(k) => Some(k),
            PathStep::Index(_) => None,
        }
    }

    /// Returns true if this step is the given string key.
    pub fn is_key(&self, key: &str) -> bool {
        matches!(self, PathStep::Key(k) if k == key)
    }

    /// Resolve an index against a sequence of `len` elements.
    ///
    /// Returns `None` for keys, negative indices and indices `>= len`.
    pub fn index_within(&self, len: usize) -> Option<usize> {
        match self {
            PathStep::Index(i) if *i >= 0 && (*i as u64) < len as u64 => Some(*i as usize),
            _ => None,
        }
    }

    /// Wire form of this step: a JSON string or a JSON integer.
    pub fn to_value(&self) -> Value {
        match self {
            PathStep::Key(k) => Value::String(k.clone()),
            PathStep::Index(i) => Value::from(*i),
        }
    }
}

impl From<&str> for PathStep {
    fn from(key: &str) -> Self {
        PathStep::Key(key.to_string())
    }
}

impl From<String> for PathStep {
    fn from(key: String) -> Self {
        PathStep::Key(key)
    }
}

impl From<i64> for PathStep {
    fn from(index: i64) -> Self {
        PathStep::Index(index)
    }
}

impl From<i32> for PathStep {
    fn from(index: i32) -> Self {
        PathStep::Index(index as i64)
    }
}

impl From<usize> for PathStep {
    fn from(index: usize) -> Self {
        PathStep::Index(index as i64)
    }
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathStep::Key(k) => f.write_str(k),
            PathStep::Index(i) => write!(f, "{i}"),
        }
    }
}

/// Build a [`KeyPath`] from a list of steps.
///
/// ```
/// use modcache_key_path::{key_path, PathStep};
///
/// let path = key_path!["projects", "Foo", "chats", 0usize];
/// assert_eq!(path[3], PathStep::Index(0));
/// ```
#[macro_export]
macro_rules! key_path {
    ($($step:expr),* $(,)?) => {
        vec![$($crate::PathStep::from($step)),*]
    };
}
