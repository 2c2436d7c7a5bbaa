use std::path::PathBuf;

use thiserror::Error;

/// Common error type for featureprofiles tooling.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias using the common [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
