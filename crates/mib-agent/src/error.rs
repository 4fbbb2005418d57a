//! Agent error types.

use thiserror::Error;

/// Agent errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Registry error.
    #[error("registry error: {0}")]
    Registry(#[from] mib_core::Error),

    /// Catalog file could not be parsed.
    #[error("catalog error: {0}")]
    Catalog(#[from] serde_json::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
