use thiserror::Error;

/// Result type local to splitscan-connectors.
pub type Result<T> = std::result::Result<T, ConnectorError>;

#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Bad input at construction or call time; not retryable.
    #[error("validation error: {0}")]
    Validation(String),

    /// The connector lacks the capability; the caller must use another path.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// A handle or split of one connector kind was given to another.
    #[error("type mismatch: expected {expected} handle, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("lookup error: {0}")]
    Lookup(String),

    /// The caller broke the data-source protocol (e.g. overlapping splits).
    #[error("protocol violation: {0}")]
    Invariant(String),

    #[error("memory budget: {0}")]
    Budget(String),

    #[error("split document error: {0}")]
    Serde(String),

    #[error(transparent)]
    Io(#[from] splitscan_io::Error),

    #[error(transparent)]
    Core(#[from] splitscan_core::error::Error),
}

impl From<serde_json::Error> for ConnectorError {
    fn from(e: serde_json::Error) -> Self {
        ConnectorError::Serde(e.to_string())
    }
}

impl From<splitscan_mem::error::Error> for ConnectorError {
    fn from(e: splitscan_mem::error::Error) -> Self {
        ConnectorError::Budget(e.to_string())
    }
}
