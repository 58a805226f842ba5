//! The local mirror of server-side user data.
//!
//! The store is a single JSON mapping with two reserved members:
//!
//! - `global_data`: cross-project data (AI memory, video reflections).
//! - `projects`: project name → project entry.
//!
//! Each project entry carries a `mod_count` revision counter next to its
//! server-defined fields. A `Store` is owned by the session that created it
//! and handed by reference to the mod applier and the coherency checker.

use serde_json::{json, Map, Value};
use thiserror::Error;

pub const GLOBAL_DATA: &str = "global_data";
pub const PROJECTS: &str = "projects";
pub const MOD_COUNT: &str = "mod_count";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("NOT_AN_OBJECT")]
    NotAnObject,
    #[error("INVALID_PROJECTS: `projects` must be a mapping")]
    InvalidProjects,
    #[error("MOD_COUNT_OVERFLOW: {0}")]
    ModCountOverflow(String),
}

/// Read a `mod_count` value: a non-negative integer, an integral float
/// (`7.0`) or a decimal string (`"7"`).
fn counter(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            let f = n.as_f64()?;
            (f >= 0.0 && f.fract() == 0.0 && f < u64::MAX as f64).then_some(f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Store {
    root: Value,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// An empty session store.
    pub fn new() -> Self {
        Self {
            root: json!({
                "global_data": {"ai_memory": {}, "video_reflections": {}},
                "projects": {},
            }),
        }
    }

    /// Adopt an existing document as the store root.
    ///
    /// Missing `global_data` / `projects` members are added as empty
    /// mappings; everything else is kept verbatim.
    pub fn from_value(root: Value) -> Result<Self, StoreError> {
        let Value::Object(mut map) = root else {
            return Err(StoreError::NotAnObject);
        };
        map.entry(GLOBAL_DATA).or_insert_with(|| Value::Object(Map::new()));
        match map.entry(PROJECTS).or_insert_with(|| Value::Object(Map::new())) {
            Value::Object(_) => {}
            _ => return Err(StoreError::InvalidProjects),
        }
        Ok(Self { root: Value::Object(map) })
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }

    /// Raw mutable access to the root, used by the mod applier.
    ///
    /// Mods never address the root itself, so it stays a mapping.
    pub(crate) fn as_value_mut(&mut self) -> &mut Value {
        &mut self.root
    }

    pub fn into_value(self) -> Value {
        self.root
    }

    pub fn global_data(&self) -> Option<&Value> {
        self.root.get(GLOBAL_DATA)
    }

    /// The `projects` mapping, if it is still a mapping.
    ///
    /// Data mods may legally overwrite `projects` with anything, so this is
    /// not guaranteed to stay `Some` for the lifetime of the store.
    pub fn projects(&self) -> Option<&Map<String, Value>> {
        self.root.get(PROJECTS).and_then(Value::as_object)
    }

    fn projects_mut(&mut self) -> Option<&mut Map<String, Value>> {
        let slot = self
            .root
            .as_object_mut()?
            .entry(PROJECTS)
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        slot.as_object_mut()
    }

    pub fn project(&self, name: &str) -> Option<&Value> {
        self.projects()?.get(name)
    }

    pub fn project_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.root
            .get_mut(PROJECTS)
            .and_then(Value::as_object_mut)?
            .get_mut(name)
    }

    pub fn contains_project(&self, name: &str) -> bool {
        self.project(name).is_some()
    }

    pub fn project_names(&self) -> Vec<String> {
        self.projects()
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// The locally recorded revision counter of a project.
    ///
    /// `None` when the project is absent, or its `mod_count` is absent or not
    /// a non-negative whole number. `None` is distinct from `Some(0)`.
    pub fn mod_count(&self, name: &str) -> Option<u64> {
        counter(self.project(name)?.get(MOD_COUNT)?)
    }

    /// Replace a project entry wholesale, returning the previous entry.
    ///
    /// A `projects` member that was overwritten with a non-mapping is reset
    /// to an empty mapping first.
    pub fn replace_project(&mut self, name: &str, entry: Value) -> Option<Value> {
        self.projects_mut()?.insert(name.to_string(), entry)
    }

    /// Drop a project entry, as the external "delete project" action does.
    pub fn remove_project(&mut self, name: &str) -> Option<Value> {
        self.root
            .get_mut(PROJECTS)
            .and_then(Value::as_object_mut)?
            .remove(name)
    }

    /// Increment a project's `mod_count` by one (absent or unreadable counts
    /// as zero).
    ///
    /// Returns the new value, or `Ok(None)` when the project is absent or its
    /// entry is not a mapping.
    ///
    /// # Errors
    ///
    /// `StoreError::ModCountOverflow` when the counter is already `u64::MAX`;
    /// the entry is left as it was.
    pub(crate) fn bump_mod_count(&mut self, name: &str) -> Result<Option<u64>, StoreError> {
        let Some(entry) = self.project_mut(name).and_then(Value::as_object_mut) else {
            return Ok(None);
        };
        let current = entry.get(MOD_COUNT).and_then(counter).unwrap_or(0);
        let next = current
            .checked_add(1)
            .ok_or_else(|| StoreError::ModCountOverflow(name.to_string()))?;
        entry.insert(MOD_COUNT.to_string(), Value::from(next));
        Ok(Some(next))
    }
}
