//! Error types for settings persistence

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while loading or saving settings
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error (file access, rename, directory creation)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings could not be encoded or decoded
    #[error("settings serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The stored document parsed but does not describe valid settings
    #[error("stored settings are invalid: {0}")]
    InvalidDocument(String),

    /// No default settings location exists on this platform
    #[error("no configuration directory available")]
    NoConfigDir,

    /// Backend refused the operation
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
}
