//! Logic behind the `modcache` binary.
//!
//! - `apply`: apply a `data_mods` array to a store document
//! - `check`: run a coherency check against a server snapshot

use serde_json::Value;
use thiserror::Error;

use crate::coherency::{ensure_fresh, CoherencyError, FetchError, Freshness, SnapshotSource};
use crate::data_mods::{apply_json, ApplyOptions, BatchReport, ModError};
use crate::store::{Store, StoreError};

// ── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("data mods: {0}")]
    Mods(#[from] ModError),
    #[error("server snapshot: {0}")]
    Snapshot(#[from] FetchError),
    #[error("{0}")]
    Coherency(#[from] CoherencyError),
}

// ── Helpers ───────────────────────────────────────────────────────────────

/// Parse a store document; blank input starts from an empty store.
pub fn parse_store(json: &str) -> Result<Store, CliError> {
    if json.trim().is_empty() {
        return Ok(Store::new());
    }
    Ok(Store::from_value(serde_json::from_str(json)?)?)
}

fn render(store: &Store) -> Result<String, CliError> {
    Ok(serde_json::to_string_pretty(store.as_value())?)
}

// ── apply ─────────────────────────────────────────────────────────────────

/// Apply a JSON `data_mods` array to a store document.
///
/// Returns the resulting store as pretty JSON together with the batch
/// report. Individual mods that fail are reported, not raised.
pub fn apply_data_mods(
    store_json: &str,
    mods_json: &str,
    options: &ApplyOptions,
) -> Result<(String, BatchReport), CliError> {
    let mut store = parse_store(store_json)?;
    let mods: Value = serde_json::from_str(mods_json)?;
    let items = mods
        .as_array()
        .ok_or_else(|| ModError::InvalidMod("data_mods must be an array".into()))?;
    let report = apply_json(&mut store, items, options);
    Ok((render(&store)?, report))
}

// ── check ─────────────────────────────────────────────────────────────────

/// Bring one project of a store document in line with a server snapshot.
pub fn check_project(
    store_json: &str,
    project: &str,
    snapshot_json: &str,
) -> Result<(String, Freshness), CliError> {
    let mut store = parse_store(store_json)?;
    let source = SnapshotSource::from_value(serde_json::from_str(snapshot_json)?)?;
    let freshness = ensure_fresh(&mut store, project, &source)?;
    Ok((render(&store)?, freshness))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn apply_on_blank_store() {
        let mods = r#"[{"key_path": ["projects", "Foo", "chats"], "mode": "append", "value": "hi"}]"#;
        let (out, report) = apply_data_mods("", mods, &ApplyOptions::default()).unwrap();
        let store: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(store["projects"]["Foo"], json!({"chats": ["hi"], "mod_count": 1}));
        assert!(report.is_clean());
    }

    #[test]
    fn apply_rejects_non_array_mods() {
        let err = apply_data_mods("", r#"{"key_path": []}"#, &ApplyOptions::default()).unwrap_err();
        assert!(matches!(err, CliError::Mods(ModError::InvalidMod(_))));
        assert!(matches!(
            apply_data_mods("[]", "[]", &ApplyOptions::default()),
            Err(CliError::Store(StoreError::NotAnObject))
        ));
        assert!(matches!(
            apply_data_mods("{", "[]", &ApplyOptions::default()),
            Err(CliError::Json(_))
        ));
    }

    #[test]
    fn check_reloads_from_snapshot() {
        let store = r#"{"projects": {"Foo": {"mod_count": 1, "chats": []}}}"#;
        let server = r#"{"projects": {"Foo": {"mod_count": 3, "chats": ["x"]}}}"#;
        let (out, freshness) = check_project(store, "Foo", server).unwrap();
        assert_eq!(freshness, Freshness::Reloaded { previous: Some(1), current: Some(3) });
        let store: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(store["projects"]["Foo"]["chats"], json!(["x"]));

        let err = check_project(store.to_string().as_str(), "Ghost", server).unwrap_err();
        assert!(matches!(err, CliError::Coherency(CoherencyError::ProjectNotFound(_))));
    }
}
