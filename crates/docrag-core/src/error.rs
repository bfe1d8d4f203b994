use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Source bytes could not be turned into page text.
    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Upload rejected: {0}")]
    UploadRejected(String),

    /// The embedding model failed, after retries where they apply.
    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Dimension mismatch: index holds {expected}-d vectors, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Invalid vector: {0}")]
    InvalidVector(String),

    #[error("Index I/O failed: {0}")]
    IndexIo(std::io::Error),

    #[error("Index format error: {0}")]
    IndexFormat(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Metadata store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_mismatch_names_both_sides() {
        let err = Error::DimensionMismatch { expected: 384, got: 1024 };
        let msg = err.to_string();
        assert!(msg.contains("384"));
        assert!(msg.contains("1024"));
    }

    #[test]
    fn timeout_reports_duration() {
        let err = Error::Timeout(Duration::from_secs(30));
        assert!(err.to_string().contains("30s"));
    }
}
