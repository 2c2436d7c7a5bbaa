use thiserror::Error;

/// Errors raised by the gNMI client.
#[derive(Debug, Error)]
pub enum GnmiError {
    #[error(transparent)]
    Config(#[from] fp_common::Error),

    #[error("Configuration validation failed: {0}")]
    Validation(String),

    #[error("Unknown target '{0}'")]
    UnknownTarget(String),

    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Invalid metadata value for '{key}'")]
    InvalidMetadata { key: String },

    #[error("Invalid value for '{path}': {source}")]
    InvalidValue {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("RPC failed: {0}")]
    Rpc(#[from] tonic::Status),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using [`GnmiError`].
pub type Result<T> = std::result::Result<T, GnmiError>;
