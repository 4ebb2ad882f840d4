use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Session '{0}' already exists")]
    SessionExists(String),

    #[error("Session '{0}' does not exist")]
    SessionMissing(String),

    #[error("Session '{0}' is already completed")]
    SessionCompleted(String),

    #[error("Storage write failed: {0}")]
    Write(String),
}
