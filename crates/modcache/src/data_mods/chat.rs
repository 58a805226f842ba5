//! Chat messages carried by data mods.
//!
//! Assistant replies sometimes arrive only as an `append` to a project's
//! `chats` list rather than as streamed text. Callers use this to surface
//! them.

use serde_json::Value;

use super::types::{DataMod, Mode};

pub const CHATS: &str = "chats";

/// Messages a batch adds to `<project>.chats`, in batch order.
///
/// Matches `append` and `create` mods whose key path is at least three steps
/// long and ends in `[.., project, "chats"]`. A list value contributes each of
/// its elements. With `role` set, only mapping messages whose `role` member
/// equals it are returned.
pub fn appended_messages<'a>(mods: &'a [DataMod], project: &str, role: Option<&str>) -> Vec<&'a Value> {
    mods.iter()
        .filter(|m| matches!(m.mode, Mode::Append | Mode::Create))
        .filter(|m| {
            let path = &m.key_path;
            path.len() >= 3 && path[path.len() - 2].is_key(project) && path[path.len() - 1].is_key(CHATS)
        })
        .flat_map(|m| match &m.value {
            Value::Array(items) => items.iter().collect::<Vec<_>>(),
            single => vec![single],
        })
        .filter(|msg| match role {
            Some(role) => msg.get("role").and_then(Value::as_str) == Some(role),
            None => true,
        })
        .collect()
}

/// Concatenated `text` of the assistant messages a batch adds to a project.
pub fn assistant_text(mods: &[DataMod], project: &str) -> String {
    appended_messages(mods, project, Some("assistant"))
        .into_iter()
        .filter_map(|msg| msg.get("text").and_then(Value::as_str))
        .collect()
}
