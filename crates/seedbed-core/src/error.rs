use thiserror::Error;

/// Core error type shared across seedbed crates.
#[derive(Debug, Error)]
pub enum Error {
    /// The schema collaborator does not know the requested record kind.
    #[error("unknown record kind: {0}")]
    UnknownKind(String),
    /// A field is not declared for the record kind.
    #[error("unknown field '{field}' for kind '{kind}'")]
    UnknownField { kind: String, field: String },
    /// The assembled field map violates the record schema.
    #[error("invalid {kind} record: {reason}")]
    InvalidRecord { kind: String, reason: String },
    /// The schema cannot synthesize a value for the field.
    #[error("no default available for '{kind}.{field}'")]
    NoDefault { kind: String, field: String },
    /// The catalog violates internal invariants.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    /// The record store rejected an upload.
    #[error("store error: {0}")]
    Store(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias for results returned by seedbed crates.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid(kind: &str, reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            kind: kind.to_string(),
            reason: reason.into(),
        }
    }
}
