//! Error types for hexopipe

use thiserror::Error;

/// Errors that can occur while decoding, converting, or batching recordings
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("decode error: {0}")]
    Decode(String),

    #[error("unsupported sample width: {0} bytes")]
    UnsupportedFormat(u16),

    #[error("missing input: {0}")]
    MissingInput(String),

    #[error("timed out after {0}s")]
    Timeout(u64),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
