//! Cache coherency: keep a cached project in step with the server.
//!
//! Both sides keep a per-project `mod_count`. The server bumps its counter
//! whenever project data changes; the mod applier bumps the local one for
//! every batch that touches the project. When the two disagree the local
//! entry is stale and gets replaced wholesale.
//!
//! Per project, repeated checks move through:
//!
//! ```text
//! UNKNOWN ──load──▶ SYNCED ──local batch / server change──▶ POSSIBLY_STALE
//!                     ▲                                          │
//!                     └──────────── ensure_fresh ok ◀────────────┤
//!                                                                ▼
//!                                          STALE_CHECK_FAILED (until a later
//!                                          ensure_fresh succeeds)
//! ```
//!
//! Callers must serialize checks per project; taking `&mut Store` already
//! rules out two checks racing on the same store.

pub mod envelope;
pub mod snapshot;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::store::{Store, MOD_COUNT};

pub use envelope::{mod_count_from_envelope, project_data_from_envelope};
pub use snapshot::SnapshotSource;

// ── Errors ────────────────────────────────────────────────────────────────

/// Failure reported by a remote fetch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Network failure, bad status, or an unreadable response.
    #[error("UNAVAILABLE: {0}")]
    Unavailable(String),
    /// The server does not know the project.
    #[error("NOT_FOUND")]
    NotFound,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoherencyError {
    #[error("REMOTE_UNAVAILABLE: {project}: {reason}")]
    RemoteUnavailable { project: String, reason: String },
    #[error("PROJECT_NOT_FOUND: {0}")]
    ProjectNotFound(String),
    /// The counters disagreed but the fresh copy could not be fetched. The
    /// stale entry is still in the store and must not be trusted.
    #[error("RELOAD_FAILED: {project}: {reason}")]
    ReloadFailed { project: String, reason: String },
}

// ── Remote capability ─────────────────────────────────────────────────────

/// The two server calls a coherency check needs.
///
/// Implemented by the HTTP client against the `get-project-mod-count` and
/// `get-project-data` endpoints; see [`envelope`] for decoding their
/// responses. Any timeout or retry policy lives in the implementation.
pub trait ProjectSource {
    /// The server's `mod_count` for a project. `Ok(None)` means the server
    /// knows the project but reports no counter.
    fn fetch_mod_count(&self, project: &str) -> Result<Option<u64>, FetchError>;

    /// The full project entry as the server holds it.
    fn fetch_project_data(&self, project: &str) -> Result<Value, FetchError>;
}

// ── Results ───────────────────────────────────────────────────────────────

/// Outcome of a successful coherency check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Freshness {
    /// Local and remote counters matched; nothing was written.
    UpToDate { mod_count: Option<u64> },
    /// The local entry was replaced by the server's copy.
    Reloaded {
        previous: Option<u64>,
        current: Option<u64>,
    },
}

// ── Checks ────────────────────────────────────────────────────────────────

fn remote_error(project: &str, err: FetchError) -> CoherencyError {
    match err {
        FetchError::NotFound => CoherencyError::ProjectNotFound(project.to_string()),
        FetchError::Unavailable(reason) => CoherencyError::RemoteUnavailable {
            project: project.to_string(),
            reason,
        },
    }
}

fn reload_error(project: &str, err: FetchError) -> CoherencyError {
    CoherencyError::ReloadFailed {
        project: project.to_string(),
        reason: err.to_string(),
    }
}

/// Fetch a project entry, insisting on a mapping payload.
fn fetch_entry<D>(project: &str, fetch_project_data: &mut D) -> Result<Value, FetchError>
where
    D: FnMut(&str) -> Result<Value, FetchError>,
{
    let entry = fetch_project_data(project)?;
    if !entry.is_object() {
        return Err(FetchError::Unavailable("project data is not an object".into()));
    }
    Ok(entry)
}

/// Make sure the cached copy of `project` matches the server.
///
/// Compares the server's `mod_count` with the local one (an absent local
/// counter only matches an absent remote one) and, on mismatch, replaces the
/// local project entry with the server's copy. The fetched entry is stored
/// as-is; it is not merged into the old one.
///
/// The store is only written after both fetches succeeded.
///
/// # Errors
///
/// - `CoherencyError::RemoteUnavailable` / `ProjectNotFound` - the counter
///   fetch failed; the store is untouched
/// - `CoherencyError::ReloadFailed` - the counters differ but the project
///   data could not be fetched; the stale entry is left in place
pub fn ensure_fresh_with<C, D>(
    store: &mut Store,
    project: &str,
    mut fetch_mod_count: C,
    mut fetch_project_data: D,
) -> Result<Freshness, CoherencyError>
where
    C: FnMut(&str) -> Result<Option<u64>, FetchError>,
    D: FnMut(&str) -> Result<Value, FetchError>,
{
    let remote = fetch_mod_count(project).map_err(|e| remote_error(project, e))?;
    let local = store.mod_count(project);

    if local == remote {
        debug!(project, mod_count = ?remote, "project cache up to date");
        return Ok(Freshness::UpToDate { mod_count: remote });
    }

    info!(project, local = ?local, remote = ?remote, "mod_count mismatch, reloading project");
    let entry = fetch_entry(project, &mut fetch_project_data)
        .map_err(|e| reload_error(project, e))
        .inspect_err(|error| warn!(project, %error, "project reload failed, cached entry is stale"))?;

    let fetched = entry.get(MOD_COUNT).and_then(Value::as_u64);
    if fetched != remote {
        warn!(
            project,
            reported = ?remote,
            fetched = ?fetched,
            "project changed on the server during reload"
        );
    }
    store.replace_project(project, entry);
    Ok(Freshness::Reloaded { previous: local, current: remote })
}

/// [`ensure_fresh_with`] against a [`ProjectSource`].
pub fn ensure_fresh<S: ProjectSource + ?Sized>(
    store: &mut Store,
    project: &str,
    source: &S,
) -> Result<Freshness, CoherencyError> {
    ensure_fresh_with(
        store,
        project,
        |name| source.fetch_mod_count(name),
        |name| source.fetch_project_data(name),
    )
}

/// Load a project into the cache if it is not cached yet.
///
/// Returns `true` when a fetch happened. An already cached project is left
/// alone, stale or not; use [`ensure_fresh`] for that.
///
/// # Errors
///
/// - `CoherencyError::ProjectNotFound` - the server does not know the project
/// - `CoherencyError::ReloadFailed` - any other fetch failure
pub fn ensure_loaded<S: ProjectSource + ?Sized>(
    store: &mut Store,
    project: &str,
    source: &S,
) -> Result<bool, CoherencyError> {
    if store.contains_project(project) {
        return Ok(false);
    }
    let entry = fetch_entry(project, &mut |name: &str| source.fetch_project_data(name)).map_err(|e| match e {
        FetchError::NotFound => CoherencyError::ProjectNotFound(project.to_string()),
        other => reload_error(project, other),
    })?;
    info!(project, "loaded project into cache");
    store.replace_project(project, entry);
    Ok(true)
}
