use crate::config::ConfigError;
use crate::storage::StorageError;

/// Errors returned by engine commands
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The engine actor is gone (after shutdown)
    #[error("monitoring engine is not running")]
    EngineStopped,
}

pub type EngineResult<T> = Result<T, EngineError>;
