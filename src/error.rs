//! Typed errors for the tracker and its store.
//!
//! Plumbing failures (SQLite, I/O, startup) stay as `anyhow::Error`; these enums
//! cover the cases callers may want to match on.

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("work session {0} is already open; end it before starting another")]
    SessionAlreadyOpen(String),
}

/// Read-side persistence failures. The store logs these and reports the slot as empty.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("stored value for {key} is malformed: {source}")]
    Malformed {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("storage backend failed to read {key}: {message}")]
    Backend { key: &'static str, message: String },
}
