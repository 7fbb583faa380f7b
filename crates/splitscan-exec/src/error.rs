use thiserror::Error;

use splitscan_connectors::ConnectorError;

pub type Result<T> = std::result::Result<T, ExecError>;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("connector: {0}")]
    Connector(#[from] ConnectorError),

    #[error("invalid scan: {0}")]
    Invalid(String),

    #[error("config: {0}")]
    Config(#[from] splitscan_core::error::Error),

    #[error("scan worker {0} panicked")]
    Worker(usize),
}
