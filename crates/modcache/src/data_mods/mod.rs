//! Data mods: structural edits streamed from the backend.
//!
//! A data mod addresses a node of the store by key path and applies one of
//! four modes:
//!
//! - `create`: create-or-replace, materializing missing parent mappings.
//! - `edit`: overwrite an existing key or index.
//! - `delete` (wire alias `del`): remove, no-op when already absent.
//! - `append`: push onto a sequence, creating it (and missing parent
//!   mappings) when missing.
//!
//! Applying a batch also bumps the `mod_count` of every project it touched,
//! once per batch.

pub mod types;
pub mod apply;
pub mod chat;
pub mod codec;

pub use types::{ApplyOptions, BatchPolicy, BatchReport, DataMod, Mode, ModError, ModFailure};
pub use apply::{apply, apply_json, apply_mod, apply_with};
pub use chat::{appended_messages, assistant_text};
pub use codec::json::{from_json, from_json_batch, to_json, to_json_batch};
