use thiserror::Error;

/// Result type local to splitscan-io.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A field was read but could not be turned into the declared column type.
    #[error("decode error: {0}")]
    Decode(String),

    #[error("invalid path '{0}'")]
    Path(String),

    #[error(transparent)]
    Core(#[from] splitscan_core::error::Error),
}
