use thiserror::Error;

/// Main error type for the application.
#[derive(Error, Debug)]
pub enum AppError {
    /// Backup archive could not be decoded or is structurally invalid.
    #[error("Invalid backup: {0}")]
    InvalidBackup(String),

    /// Backup archive was produced by a newer, unknown format version.
    #[error("Unsupported backup version: {0}")]
    UnsupportedVersion(u32),

    /// Encoding produced no bytes; such an archive must never be persisted.
    #[error("Backup produced an empty file")]
    EmptyBackup,

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for the application.
pub type Result<T> = std::result::Result<T, AppError>;
