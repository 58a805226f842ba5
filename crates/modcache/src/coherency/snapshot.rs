//! A [`ProjectSource`] backed by an in-memory server snapshot.

use serde_json::{Map, Value};

use super::{FetchError, ProjectSource};
use crate::store::{MOD_COUNT, PROJECTS};

/// Serves project data out of a JSON document shaped like the store
/// (`{"projects": {...}}`), e.g. a dump of the server's user data.
#[derive(Debug, Clone, Default)]
pub struct SnapshotSource {
    projects: Map<String, Value>,
}

impl SnapshotSource {
    /// Build a source from a snapshot document.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Unavailable` if the document has no `projects`
    /// mapping.
    pub fn from_value(snapshot: Value) -> Result<Self, FetchError> {
        match snapshot {
            Value::Object(mut root) => match root.remove(PROJECTS) {
                Some(Value::Object(projects)) => Ok(Self { projects }),
                _ => Err(FetchError::Unavailable("snapshot has no `projects` mapping".into())),
            },
            _ => Err(FetchError::Unavailable("snapshot is not an object".into())),
        }
    }

    pub fn insert(&mut self, project: &str, entry: Value) {
        self.projects.insert(project.to_string(), entry);
    }
}

impl ProjectSource for SnapshotSource {
    fn fetch_mod_count(&self, project: &str) -> Result<Option<u64>, FetchError> {
        let entry = self.projects.get(project).ok_or(FetchError::NotFound)?;
        Ok(entry.get(MOD_COUNT).and_then(Value::as_u64))
    }

    fn fetch_project_data(&self, project: &str) -> Result<Value, FetchError> {
        self.projects.get(project).cloned().ok_or(FetchError::NotFound)
    }
}
