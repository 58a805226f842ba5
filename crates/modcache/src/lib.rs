//! modcache: the local project cache of the dashboard client.
//!
//! The client mirrors the server's per-user data in a [`Store`]. The backend
//! describes every change to that data as a list of data mods, which
//! [`data_mods::apply`] replays locally. Each project carries a `mod_count`
//! revision counter; [`coherency::ensure_fresh`] compares it with the
//! server's and reloads the project when the two have drifted apart.
//!
//! Nothing here performs I/O. Server access is injected through
//! [`coherency::ProjectSource`] (or plain closures).
//!
//! ```
//! use modcache::data_mods::{apply, DataMod};
//! use modcache::key_path;
//! use modcache::Store;
//! use serde_json::json;
//!
//! let mut store = Store::new();
//! let report = apply(
//!     &mut store,
//!     &[DataMod::append(key_path!["projects", "Foo", "chats"], json!({"role": "user", "text": "hi"}))],
//! );
//! assert!(report.is_clean());
//! assert_eq!(store.mod_count("Foo"), Some(1));
//! ```

pub mod store;
pub mod data_mods;
pub mod coherency;
pub mod cli;

pub use modcache_key_path::{key_path, KeyPath, PathStep};
pub use store::{Store, StoreError};
