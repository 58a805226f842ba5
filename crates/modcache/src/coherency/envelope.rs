//! Response envelopes of the project endpoints.
//!
//! Every REST endpoint answers with
//!
//! ```json
//! {"result": true, "response": {...}}
//! ```
//!
//! where `result: false` means the request was understood but refused (for
//! the project endpoints: unknown project). These helpers turn such an
//! envelope into the values a [`ProjectSource`](super::ProjectSource)
//! implementation returns.

use serde_json::Value;

use super::FetchError;

fn response_of(envelope: &Value) -> Result<&Value, FetchError> {
    let ok = envelope
        .get("result")
        .and_then(Value::as_bool)
        .ok_or_else(|| FetchError::Unavailable("response envelope has no boolean `result`".into()))?;
    if !ok {
        return Err(FetchError::NotFound);
    }
    envelope
        .get("response")
        .ok_or_else(|| FetchError::Unavailable("response envelope has no `response`".into()))
}

/// Decode a `get-project-mod-count` envelope.
///
/// A `null` or absent `mod_count` decodes to `Ok(None)`.
pub fn mod_count_from_envelope(envelope: &Value) -> Result<Option<u64>, FetchError> {
    match response_of(envelope)?.get("mod_count") {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .ok_or_else(|| FetchError::Unavailable(format!("invalid mod_count: {v}"))),
    }
}

/// Decode a `get-project-data` envelope into the project entry.
pub fn project_data_from_envelope(envelope: &Value) -> Result<Value, FetchError> {
    response_of(envelope)?
        .get("project_data")
        .filter(|v| !v.is_null())
        .cloned()
        .ok_or_else(|| FetchError::Unavailable("response has no `project_data`".into()))
}
