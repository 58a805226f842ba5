//! JSON codec for data mods.
//!
//! Wire shape, as emitted in the `data_mods` list of chat and REST
//! responses:
//!
//! ```json
//! {"key_path": ["projects", "Foo", "chats"], "mode": "append", "value": {...}}
//! ```
//!
//! `value` is passed through untouched.

use serde_json::{json, Map, Value};

use modcache_key_path::{path_from_value, path_to_value, KeyPath};

use crate::data_mods::types::{DataMod, Mode, ModError};

// ── Deserialization ───────────────────────────────────────────────────────

/// Read just the key path of a wire mod, if it has a decodable one.
pub fn peek_key_path(v: &Value) -> Option<KeyPath> {
    path_from_value(v.get("key_path")?).ok()
}

/// Deserialize a wire data mod.
///
/// # Errors
///
/// - `ModError::InvalidMod` - not an object, or `key_path` missing or malformed
/// - `ModError::UnknownMode` - `mode` is a string outside the known set
pub fn from_json(v: &Value) -> Result<DataMod, ModError> {
    let obj = v
        .as_object()
        .ok_or_else(|| ModError::InvalidMod("data mod must be an object".into()))?;
    let key_path = obj
        .get("key_path")
        .ok_or_else(|| ModError::InvalidMod("missing key_path".into()))
        .and_then(|p| path_from_value(p).map_err(|e| ModError::InvalidMod(format!("key_path: {e}"))))?;
    let mode: Mode = obj
        .get("mode")
        .and_then(Value::as_str)
        .ok_or_else(|| ModError::InvalidMod("mode must be a string".into()))?
        .parse()?;
    let value = obj.get("value").cloned().unwrap_or(Value::Null);
    Ok(DataMod { key_path, mode, value })
}

/// Deserialize a `data_mods` array, one result per item.
///
/// # Errors
///
/// Returns `ModError::InvalidMod` if `v` is not an array.
pub fn from_json_batch(v: &Value) -> Result<Vec<Result<DataMod, ModError>>, ModError> {
    let items = v
        .as_array()
        .ok_or_else(|| ModError::InvalidMod("data_mods must be an array".into()))?;
    Ok(items.iter().map(from_json).collect())
}

// ── Serialization ─────────────────────────────────────────────────────────

/// Serialize a `DataMod` to its wire form. Deletes carry no `value`.
pub fn to_json(m: &DataMod) -> Value {
    match m.mode {
        Mode::Delete => json!({
            "key_path": path_to_value(&m.key_path),
            "mode": m.mode.as_str()
        }),
        _ => {
            let mut obj = Map::new();
            obj.insert("key_path".into(), path_to_value(&m.key_path));
            obj.insert("mode".into(), json!(m.mode.as_str()));
            obj.insert("value".into(), m.value.clone());
            Value::Object(obj)
        }
    }
}

pub fn to_json_batch(mods: &[DataMod]) -> Value {
    Value::Array(mods.iter().map(to_json).collect())
}
