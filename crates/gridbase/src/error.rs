//! Error taxonomy for the row-store engine.

use thiserror::Error;

/// Failures surfaced by a [`GridBackend`](crate::GridBackend)
/// implementation.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The service answered with a non-2xx status. Never retried here; quota
    /// pacing is the engine's only built-in delay.
    #[error("backend rejected the request with status {status}")]
    Rejected { status: u16 },

    #[error("container '{0}' not found")]
    ContainerNotFound(String),

    #[error("sheet '{0}' not found")]
    SheetNotFound(String),

    /// Backend-specific failure without a structured mapping.
    #[error("{backend}: {message}")]
    Other { backend: String, message: String },
}

impl BackendError {
    /// Wrap a backend's own error, tagged with the backend name.
    pub fn other<E: std::fmt::Display>(backend: &str, err: E) -> Self {
        BackendError::Other {
            backend: backend.to_string(),
            message: err.to_string(),
        }
    }
}

/// Failures surfaced by database and table operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("table '{0}' already exists")]
    DuplicateTable(String),

    /// A table name that the backend's own sheet naming would shadow.
    #[error("table name '{0}' collides with reserved sheet naming")]
    ReservedName(String),

    /// An input row does not fit the table schema. The whole batch is
    /// aborted; nothing is written.
    #[error("row {row}: {reason}")]
    SchemaMismatch { row: usize, reason: String },

    /// Upsert called with no input rows.
    #[error("no rows supplied")]
    EmptyBatch,

    #[error("constraint references unknown column '{0}'")]
    UnknownColumn(String),

    #[error("unsupported column kind tag '{0}'")]
    UnsupportedKind(String),

    /// The header region of a managed sheet is missing or malformed.
    #[error("corrupt table header on '{sheet}': {reason}")]
    CorruptHeader { sheet: String, reason: String },

    #[error("constraint blob: {0}")]
    ConstraintCodec(#[from] serde_json::Error),

    #[error(transparent)]
    Backend(#[from] BackendError),
}
