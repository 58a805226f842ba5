//! Data-mod apply logic.
//!
//! Each mod is applied in two steps: walk to the parent of the final key,
//! then run the mode's applicator against that parent. Every check that can
//! fail runs before the first write, so a failed mod leaves the document
//! exactly as it found it.

use indexmap::IndexSet;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use modcache_key_path::{format_key_path, validate_key_path, ValidationError};

use super::codec::json::{from_json, peek_key_path};
use super::types::{ApplyOptions, BatchPolicy, BatchReport, DataMod, Mode, ModError, ModFailure, PathStep};
use crate::store::Store;

// ── Path navigation ───────────────────────────────────────────────────────

fn out_of_range(path: &[PathStep], len: usize) -> ModError {
    ModError::IndexOutOfRange { path: format_key_path(path), len }
}

fn type_mismatch(path: &[PathStep]) -> ModError {
    ModError::TypeMismatch(format_key_path(path))
}

/// Walk to the container holding the final key of `m.key_path`.
///
/// Returns `Ok(None)` when a delete runs into a missing hop: the target
/// cannot exist, so there is nothing to remove.
fn locate_parent<'a>(root: &'a mut Value, m: &DataMod) -> Result<Option<&'a mut Value>, ModError> {
    let path = &m.key_path;
    let parent_len = path.len() - 1;
    let mut current = root;
    for (depth, step) in path[..parent_len].iter().enumerate() {
        let here = &path[..=depth];
        current = match (current, step) {
            (Value::Object(map), PathStep::Key(k)) => {
                if !map.contains_key(k) {
                    match m.mode {
                        Mode::Create | Mode::Append => {
                            // Everything below a materialized mapping is a fresh
                            // mapping, so the rest of the path must be keys.
                            if let Some(offset) = path[depth + 1..].iter().position(|s| s.as_key().is_none()) {
                                return Err(type_mismatch(&path[..=depth + 1 + offset]));
                            }
                        }
                        Mode::Delete => return Ok(None),
                        Mode::Edit => return Err(ModError::PathNotFound(format_key_path(here))),
                    }
                }
                map.entry(k.clone()).or_insert_with(|| Value::Object(Map::new()))
            }
            (Value::Array(arr), PathStep::Index(_)) => {
                let len = arr.len();
                match step.index_within(len) {
                    Some(idx) => &mut arr[idx],
                    None if m.mode == Mode::Delete => return Ok(None),
                    None => return Err(out_of_range(here, len)),
                }
            }
            _ => return Err(type_mismatch(here)),
        };
    }
    Ok(Some(current))
}

// ── Individual mode applicators ──────────────────────────────────────────

fn apply_create(parent: &mut Value, path: &[PathStep], value: Value) -> Result<(), ModError> {
    let key = &path[path.len() - 1];
    match (parent, key) {
        (Value::Object(map), PathStep::Key(k)) => {
            map.insert(k.clone(), value);
            Ok(())
        }
        (Value::Array(arr), PathStep::Index(i)) => {
            if *i >= 0 && *i as u64 == arr.len() as u64 {
                arr.push(value);
                return Ok(());
            }
            let idx = key.index_within(arr.len()).ok_or_else(|| out_of_range(path, arr.len()))?;
            arr[idx] = value;
            Ok(())
        }
        _ => Err(type_mismatch(path)),
    }
}

fn apply_edit(parent: &mut Value, path: &[PathStep], value: Value) -> Result<(), ModError> {
    let key = &path[path.len() - 1];
    match (parent, key) {
        (Value::Object(map), PathStep::Key(k)) => {
            let slot = map
                .get_mut(k)
                .ok_or_else(|| ModError::KeyNotFound(format_key_path(path)))?;
            *slot = value;
            Ok(())
        }
        (Value::Array(arr), PathStep::Index(_)) => {
            let idx = key.index_within(arr.len()).ok_or_else(|| out_of_range(path, arr.len()))?;
            arr[idx] = value;
            Ok(())
        }
        _ => Err(type_mismatch(path)),
    }
}

fn apply_delete(parent: &mut Value, path: &[PathStep]) -> Result<(), ModError> {
    let key = &path[path.len() - 1];
    match (parent, key) {
        (Value::Object(map), PathStep::Key(k)) => {
            map.remove(k);
            Ok(())
        }
        (Value::Array(arr), PathStep::Index(_)) => {
            if let Some(idx) = key.index_within(arr.len()) {
                arr.remove(idx);
            }
            Ok(())
        }
        _ => Err(type_mismatch(path)),
    }
}

fn push_onto(slot: &mut Value, value: Value) {
    match slot {
        Value::Array(items) => items.push(value),
        other => *other = Value::Array(vec![value]),
    }
}

fn apply_append(parent: &mut Value, path: &[PathStep], value: Value) -> Result<(), ModError> {
    let key = &path[path.len() - 1];
    match (parent, key) {
        (Value::Object(map), PathStep::Key(k)) => {
            let slot = map.entry(k.clone()).or_insert_with(|| Value::Array(Vec::new()));
            push_onto(slot, value);
            Ok(())
        }
        (Value::Array(arr), PathStep::Index(_)) => {
            let idx = key.index_within(arr.len()).ok_or_else(|| out_of_range(path, arr.len()))?;
            push_onto(&mut arr[idx], value);
            Ok(())
        }
        _ => Err(type_mismatch(path)),
    }
}

// ── Main apply functions ──────────────────────────────────────────────────

/// Apply a single data mod to a JSON document (in-place mutation).
///
/// On error the document is unchanged.
pub fn apply_mod(doc: &mut Value, m: &DataMod) -> Result<(), ModError> {
    validate_key_path(&m.key_path).map_err(|e| match e {
        ValidationError::PathTooLong => ModError::PathTooLong(m.key_path.len()),
        ValidationError::PathEmpty => ModError::EmptyPath,
        other => ModError::InvalidMod(other.to_string()),
    })?;
    let Some(parent) = locate_parent(doc, m)? else {
        return Ok(());
    };
    let path = &m.key_path;
    match m.mode {
        Mode::Create => apply_create(parent, path, m.value.clone()),
        Mode::Edit => apply_edit(parent, path, m.value.clone()),
        Mode::Delete => apply_delete(parent, path),
        Mode::Append => apply_append(parent, path, m.value.clone()),
    }
}

enum BatchItem<'a> {
    Mod(&'a DataMod),
    Undecodable { key_path: String, error: ModError },
}

fn run_batch<'a>(
    store: &mut Store,
    items: impl ExactSizeIterator<Item = BatchItem<'a>>,
    options: &ApplyOptions,
) -> BatchReport {
    let total = items.len();
    let mut report = BatchReport::default();
    let mut touched: IndexSet<String> = IndexSet::new();

    for (index, item) in items.enumerate() {
        let (key_path, result) = match item {
            BatchItem::Mod(m) => {
                if let Some(name) = m.touched_project() {
                    touched.insert(name.to_string());
                }
                (format_key_path(&m.key_path), apply_mod(store.as_value_mut(), m))
            }
            BatchItem::Undecodable { key_path, error } => (key_path, Err(error)),
        };
        match result {
            Ok(()) => report.applied += 1,
            Err(error) => {
                warn!(index, key_path = %key_path, %error, "data mod failed");
                report.failures.push(ModFailure { index, key_path, error });
                if options.policy == BatchPolicy::AbortOnError {
                    report.not_attempted = total - index - 1;
                    break;
                }
            }
        }
    }

    for name in touched {
        match store.bump_mod_count(&name) {
            Ok(Some(mod_count)) => {
                debug!(project = %name, mod_count, "bumped mod_count");
                report.bumped.push(name);
            }
            Ok(None) => debug!(project = %name, "touched project no longer cached"),
            Err(error) => warn!(project = %name, %error, "mod_count not bumped"),
        }
    }
    report
}

/// Apply a batch of data mods to the store with the default options
/// (skip failed mods and continue).
pub fn apply(store: &mut Store, mods: &[DataMod]) -> BatchReport {
    apply_with(store, mods, &ApplyOptions::default())
}

/// Apply a batch of data mods to the store.
///
/// Mods run in order. Afterwards every project touched by the batch that is
/// still cached gets its `mod_count` incremented exactly once, however many
/// mods touched it. A project counts as touched as soon as a mod addressing
/// it is attempted, whether or not that mod succeeded.
pub fn apply_with(store: &mut Store, mods: &[DataMod], options: &ApplyOptions) -> BatchReport {
    run_batch(store, mods.iter().map(BatchItem::Mod), options)
}

/// Apply a batch of wire-form data mods (`{"key_path", "mode", "value"}`).
///
/// Items that do not decode count as failed mods at their position in the
/// batch and do not touch any project.
pub fn apply_json(store: &mut Store, mods: &[Value], options: &ApplyOptions) -> BatchReport {
    let decoded: Vec<Result<DataMod, ModError>> = mods.iter().map(from_json).collect();
    let items = decoded.iter().zip(mods).map(|(result, raw)| match result {
        Ok(m) => BatchItem::Mod(m),
        Err(error) => BatchItem::Undecodable {
            key_path: peek_key_path(raw).map(|p| format_key_path(&p)).unwrap_or_default(),
            error: error.clone(),
        },
    });
    run_batch(store, items, options)
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use modcache_key_path::key_path;
    use serde_json::json;

    fn run(doc: &mut Value, m: DataMod) -> Result<(), ModError> {
        apply_mod(doc, &m)
    }

    #[test]
    fn create_in_object() {
        let mut doc = json!({"a": 1});
        run(&mut doc, DataMod::create(key_path!["b"], json!(2))).unwrap();
        assert_eq!(doc, json!({"a": 1, "b": 2}));
    }

    #[test]
    fn create_replaces_existing_key() {
        let mut doc = json!({"a": {"old": true}});
        run(&mut doc, DataMod::create(key_path!["a"], json!([1]))).unwrap();
        assert_eq!(doc, json!({"a": [1]}));
    }

    #[test]
    fn create_materializes_intermediate_mappings() {
        let mut doc = json!({});
        run(&mut doc, DataMod::create(key_path!["a", "b", "c"], json!(1))).unwrap();
        assert_eq!(doc, json!({"a": {"b": {"c": 1}}}));
    }

    #[test]
    fn create_in_array() {
        let mut doc = json!({"list": [1, 2]});
        run(&mut doc, DataMod::create(key_path!["list", 2usize], json!(3))).unwrap();
        assert_eq!(doc["list"], json!([1, 2, 3]));
        run(&mut doc, DataMod::create(key_path!["list", 0usize], json!(0))).unwrap();
        assert_eq!(doc["list"], json!([0, 2, 3]));
        let err = run(&mut doc, DataMod::create(key_path!["list", 5usize], json!(9))).unwrap_err();
        assert_eq!(err, ModError::IndexOutOfRange { path: "list[5]".into(), len: 3 });
        let err = run(&mut doc, DataMod::create(key_path!["list", -1], json!(9))).unwrap_err();
        assert_eq!(err, ModError::IndexOutOfRange { path: "list[-1]".into(), len: 3 });
    }

    #[test]
    fn create_with_index_below_missing_key_writes_nothing() {
        let mut doc = json!({"a": {}});
        let err = run(&mut doc, DataMod::create(key_path!["a", "b", 0usize, "c"], json!(1))).unwrap_err();
        assert_eq!(err, ModError::TypeMismatch("a.b[0]".into()));
        assert_eq!(doc, json!({"a": {}}));

        let err = run(&mut doc, DataMod::create(key_path!["a", "b", 0usize], json!(1))).unwrap_err();
        assert_eq!(err, ModError::TypeMismatch("a.b[0]".into()));
        assert_eq!(doc, json!({"a": {}}));
    }

    #[test]
    fn edit_requires_existing_target() {
        let mut doc = json!({"a": 1, "list": [1]});
        run(&mut doc, DataMod::edit(key_path!["a"], json!(10))).unwrap();
        assert_eq!(doc["a"], json!(10));
        assert_eq!(
            run(&mut doc, DataMod::edit(key_path!["b"], json!(1))),
            Err(ModError::KeyNotFound("b".into()))
        );
        assert_eq!(
            run(&mut doc, DataMod::edit(key_path!["list", 1usize], json!(1))),
            Err(ModError::IndexOutOfRange { path: "list[1]".into(), len: 1 })
        );
        assert_eq!(
            run(&mut doc, DataMod::edit(key_path!["x", "y"], json!(1))),
            Err(ModError::PathNotFound("x".into()))
        );
        assert_eq!(doc, json!({"a": 10, "list": [1]}));
    }

    #[test]
    fn delete_is_idempotent() {
        let mut doc = json!({"a": 1, "list": [1, 2]});
        let del = DataMod::delete(key_path!["a"]);
        run(&mut doc, del.clone()).unwrap();
        run(&mut doc, del).unwrap();
        assert_eq!(doc, json!({"list": [1, 2]}));

        run(&mut doc, DataMod::delete(key_path!["list", 0usize])).unwrap();
        assert_eq!(doc["list"], json!([2]));
        run(&mut doc, DataMod::delete(key_path!["list", 7usize])).unwrap();
        run(&mut doc, DataMod::delete(key_path!["missing", "deeper"])).unwrap();
        run(&mut doc, DataMod::delete(key_path!["list", 3usize, "x"])).unwrap();
        assert_eq!(doc, json!({"list": [2]}));
    }

    #[test]
    fn delete_reports_type_mismatch() {
        let mut doc = json!({"list": [1]});
        assert_eq!(
            run(&mut doc, DataMod::delete(key_path!["list", "0"])),
            Err(ModError::TypeMismatch("list.0".into()))
        );
    }

    #[test]
    fn append_initializes_sequence() {
        let mut doc = json!({"a": "not a list"});
        run(&mut doc, DataMod::append(key_path!["a"], json!(1))).unwrap();
        run(&mut doc, DataMod::append(key_path!["b"], json!(2))).unwrap();
        run(&mut doc, DataMod::append(key_path!["b"], json!(3))).unwrap();
        assert_eq!(doc, json!({"a": [1], "b": [2, 3]}));
    }

    #[test]
    fn append_into_array_slot() {
        let mut doc = json!({"grid": [[1], "x"]});
        run(&mut doc, DataMod::append(key_path!["grid", 0usize], json!(2))).unwrap();
        run(&mut doc, DataMod::append(key_path!["grid", 1usize], json!(3))).unwrap();
        assert_eq!(doc, json!({"grid": [[1, 2], [3]]}));
        assert_eq!(
            run(&mut doc, DataMod::append(key_path!["grid", 2usize], json!(4))),
            Err(ModError::IndexOutOfRange { path: "grid[2]".into(), len: 2 })
        );
    }

    #[test]
    fn append_materializes_parents() {
        let mut doc = json!({});
        run(&mut doc, DataMod::append(key_path!["a", "b"], json!(1))).unwrap();
        assert_eq!(doc, json!({"a": {"b": [1]}}));

        let err = run(&mut doc, DataMod::append(key_path!["x", 0usize], json!(1))).unwrap_err();
        assert_eq!(err, ModError::TypeMismatch("x[0]".into()));
        assert_eq!(doc, json!({"a": {"b": [1]}}));
    }

    #[test]
    fn traversal_type_mismatches() {
        let mut doc = json!({"obj": {"k": 1}, "list": [{"k": 1}], "s": "x"});
        assert_eq!(
            run(&mut doc, DataMod::edit(key_path!["obj", 0usize, "k"], json!(2))),
            Err(ModError::TypeMismatch("obj[0]".into()))
        );
        assert_eq!(
            run(&mut doc, DataMod::edit(key_path!["list", "k", "x"], json!(2))),
            Err(ModError::TypeMismatch("list.k".into()))
        );
        assert_eq!(
            run(&mut doc, DataMod::create(key_path!["s", "x"], json!(2))),
            Err(ModError::TypeMismatch("s.x".into()))
        );
        assert_eq!(
            run(&mut doc, DataMod::edit(key_path!["list", 4usize, "k"], json!(2))),
            Err(ModError::IndexOutOfRange { path: "list[4]".into(), len: 1 })
        );
        run(&mut doc, DataMod::edit(key_path!["list", 0usize, "k"], json!(2))).unwrap();
        assert_eq!(doc["list"], json!([{"k": 2}]));
    }

    #[test]
    fn empty_path_is_rejected() {
        let mut doc = json!({"a": 1});
        assert_eq!(run(&mut doc, DataMod::delete(vec![])), Err(ModError::EmptyPath));
        assert_eq!(doc, json!({"a": 1}));
    }

    #[test]
    fn overlong_path_is_rejected() {
        let mut doc = json!({});
        let deep: Vec<PathStep> = (0..257).map(|i| PathStep::from(format!("k{i}"))).collect();
        assert_eq!(
            run(&mut doc, DataMod::create(deep.clone(), json!(1))),
            Err(ModError::PathTooLong(257))
        );
        assert_eq!(doc, json!({}));

        run(&mut doc, DataMod::create(deep[..256].to_vec(), json!(1))).unwrap();
        assert_eq!(modcache_key_path::get(&doc, &deep[..256]), Some(&json!(1)));
    }

    #[test]
    fn saturated_mod_count_is_left_alone() {
        let mut store =
            Store::from_value(json!({"projects": {"Foo": {"mod_count": u64::MAX, "x": 0}}})).unwrap();
        let report = apply(&mut store, &[DataMod::edit(key_path!["projects", "Foo", "x"], json!(1))]);
        assert_eq!(report.applied, 1);
        assert!(report.bumped.is_empty());
        assert_eq!(store.mod_count("Foo"), Some(u64::MAX));
        assert_eq!(store.project("Foo").unwrap()["x"], json!(1));
    }

    #[test]
    fn batch_bumps_once_per_project() {
        let mut store = Store::new();
        store.replace_project("Foo", json!({"mod_count": 3, "chats": []}));
        let mods = vec![
            DataMod::append(key_path!["projects", "Foo", "chats"], json!("a")),
            DataMod::append(key_path!["projects", "Foo", "chats"], json!("b")),
            DataMod::create(key_path!["global_data", "ai_memory", "k"], json!(1)),
        ];
        let report = apply(&mut store, &mods);
        assert!(report.is_clean());
        assert_eq!(report.applied, 3);
        assert_eq!(report.bumped, vec!["Foo".to_string()]);
        assert_eq!(store.mod_count("Foo"), Some(4));
    }

    #[test]
    fn abort_policy_stops_batch() {
        let mut store = Store::new();
        store.replace_project("Foo", json!({"n": 0}));
        let mods = vec![
            DataMod::edit(key_path!["projects", "Foo", "n"], json!(1)),
            DataMod::edit(key_path!["projects", "Foo", "missing"], json!(2)),
            DataMod::edit(key_path!["projects", "Foo", "n"], json!(3)),
        ];
        let options = ApplyOptions { policy: BatchPolicy::AbortOnError };
        let report = apply_with(&mut store, &mods, &options);
        assert_eq!(report.applied, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 1);
        assert_eq!(report.not_attempted, 1);
        assert_eq!(store.project("Foo"), Some(&json!({"n": 1, "mod_count": 1})));
    }

    #[test]
    fn apply_json_reports_undecodable_items() {
        let mut store = Store::new();
        let mods = vec![
            json!({"key_path": ["projects", "Foo", "x"], "mode": "upsert", "value": 1}),
            json!({"key_path": ["projects", "Foo", "x"], "mode": "create", "value": 1}),
            json!("garbage"),
        ];
        let report = apply_json(&mut store, &mods, &ApplyOptions::default());
        assert_eq!(report.applied, 1);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].key_path, "projects.Foo.x");
        assert_eq!(report.failures[0].error, ModError::UnknownMode("upsert".into()));
        assert_eq!(report.failures[1].index, 2);
        assert_eq!(report.failures[1].key_path, "");
        assert_eq!(store.project("Foo"), Some(&json!({"x": 1, "mod_count": 1})));
    }
}
