//! Core types for the data-mod module.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub use modcache_key_path::{KeyPath, PathStep};

use crate::store::{MOD_COUNT, PROJECTS};

// ── Error ─────────────────────────────────────────────────────────────────

/// Why a single data mod could not be applied.
///
/// Paths in the payloads are formatted with
/// [`modcache_key_path::format_key_path`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModError {
    /// An intermediate mapping key is missing and the mode cannot create it
    /// (`edit`).
    #[error("PATH_NOT_FOUND: {0}")]
    PathNotFound(String),
    /// `edit` targets a mapping key that does not exist.
    #[error("KEY_NOT_FOUND: {0}")]
    KeyNotFound(String),
    #[error("INDEX_OUT_OF_RANGE: {path} (length {len})")]
    IndexOutOfRange { path: String, len: usize },
    /// A string key used on a sequence, an integer index used on a mapping,
    /// or a step into a scalar.
    #[error("TYPE_MISMATCH: {0}")]
    TypeMismatch(String),
    #[error("UNKNOWN_MODE: {0}")]
    UnknownMode(String),
    #[error("EMPTY_PATH")]
    EmptyPath,
    #[error("PATH_TOO_LONG: {0} steps")]
    PathTooLong(usize),
    /// The wire object is not a well-formed data mod.
    #[error("INVALID_MOD: {0}")]
    InvalidMod(String),
}

// ── Mode ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Create-or-replace; materializes missing intermediate mappings.
    Create,
    /// Overwrite an existing key or index.
    Edit,
    /// Remove a key or index; absent targets are a no-op.
    Delete,
    /// Push onto a sequence, creating it (and missing parent mappings) if
    /// needed.
    Append,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Create => "create",
            Mode::Edit => "edit",
            Mode::Delete => "delete",
            Mode::Append => "append",
        }
    }
}

impl FromStr for Mode {
    type Err = ModError;

    /// Parses a wire mode. The backend spells delete as `del`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Mode::Create),
            "edit" => Ok(Mode::Edit),
            "delete" | "del" => Ok(Mode::Delete),
            "append" => Ok(Mode::Append),
            other => Err(ModError::UnknownMode(other.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── DataMod ───────────────────────────────────────────────────────────────

/// One structural edit to the store.
///
/// `value` is carried verbatim; it is `null` for deletes and for mods whose
/// wire form omitted it.
#[derive(Debug, Clone, PartialEq)]
pub struct DataMod {
    pub key_path: KeyPath,
    pub mode: Mode,
    pub value: Value,
}

impl DataMod {
    pub fn new(key_path: KeyPath, mode: Mode, value: Value) -> Self {
        Self { key_path, mode, value }
    }

    pub fn create(key_path: KeyPath, value: Value) -> Self {
        Self::new(key_path, Mode::Create, value)
    }

    pub fn edit(key_path: KeyPath, value: Value) -> Self {
        Self::new(key_path, Mode::Edit, value)
    }

    pub fn delete(key_path: KeyPath) -> Self {
        Self::new(key_path, Mode::Delete, Value::Null)
    }

    pub fn append(key_path: KeyPath, value: Value) -> Self {
        Self::new(key_path, Mode::Append, value)
    }

    /// The project whose `mod_count` this mod bumps, if any.
    ///
    /// A mod touches a project when its path starts with
    /// `["projects", <name>]`, except for a direct write to
    /// `["projects", <name>, "mod_count"]`, which would otherwise bump the
    /// counter it just set.
    pub fn touched_project(&self) -> Option<&str> {
        let path = &self.key_path;
        if path.len() < 2 || !path[0].is_key(PROJECTS) {
            return None;
        }
        let name = path[1].as_key()?;
        if path.len() == 3 && path[2].is_key(MOD_COUNT) {
            return None;
        }
        Some(name)
    }
}

// ── Options ───────────────────────────────────────────────────────────────

/// What to do with the rest of a batch once one mod fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchPolicy {
    /// Record the failure and continue with the next mod.
    #[default]
    SkipFailed,
    /// Stop at the first failure; later mods are not attempted.
    AbortOnError,
}

impl FromStr for BatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skip" | "skip-failed" => Ok(BatchPolicy::SkipFailed),
            "abort" | "abort-on-error" => Ok(BatchPolicy::AbortOnError),
            other => Err(format!("unknown batch policy: {other}")),
        }
    }
}

/// Options for `apply_with`.
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    pub policy: BatchPolicy,
}

// ── Result types ──────────────────────────────────────────────────────────

/// A mod that failed, by position in the batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModFailure {
    pub index: usize,
    /// Formatted key path, empty when the wire item had no decodable path.
    pub key_path: String,
    #[serde(serialize_with = "serialize_display")]
    pub error: ModError,
}

/// Outcome of applying a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    /// Number of mods that applied successfully.
    pub applied: usize,
    pub failures: Vec<ModFailure>,
    /// Mods left untouched because the batch aborted.
    pub not_attempted: usize,
    /// Projects whose `mod_count` was incremented, in first-touch order.
    pub bumped: Vec<String>,
}

impl BatchReport {
    /// True when every mod in the batch applied.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.not_attempted == 0
    }
}

fn serialize_display<S: serde::Serializer>(err: &ModError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(err)
}
