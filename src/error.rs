//! Error taxonomy for the carving core.
//!
//! Configuration problems (empty signatures, bad buffer sizes, malformed
//! catalog entries) are raised before any byte is scanned. I/O problems are
//! propagated to the caller of the affected operation. `Internal` marks a
//! broken automaton and should never be seen in a correct build.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SawmillError {
    #[error("Empty signature for file type '{file_type}'")]
    EmptyPattern { file_type: String },

    #[error("Invalid buffer size {size}: must be between 1 and {limit}")]
    InvalidBufferSize { size: usize, limit: usize },

    #[error("Malformed {field} signature for '{name}': {detail}")]
    MalformedSignature {
        name: String,
        field: &'static str,
        detail: String,
    },

    #[error("Failed to parse signature catalog: {0}")]
    CatalogParse(#[from] toml::de::Error),

    #[error("Unknown file type '{0}' (not present in the signature catalog)")]
    NoSuchFileType(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Source is not seekable")]
    NotSeekable,

    #[error("Short read at offset {offset}: expected {expected} bytes, got {actual}")]
    ShortRead {
        offset: u64,
        expected: u64,
        actual: u64,
    },

    #[error("Internal automaton error: {0}")]
    Internal(String),

    #[error("Failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Failed to write manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SawmillError>;
