//! Error types for user records.

use thiserror::Error;

/// User storage and validation errors.
#[derive(Debug, Error)]
pub enum UserError {
    /// Email already registered.
    #[error("User with email {0} already exists")]
    DuplicateEmail(String),

    /// No user with this email.
    #[error("User with email {0} not found")]
    NotFound(String),

    /// Field validation failed.
    #[error("invalid user: {0}")]
    InvalidInput(String),

    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    PasswordHash(String),

    /// Background hashing task failed to complete.
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// `SQLite` error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Async `SQLite` error.
    #[error("tokio-rusqlite error: {0}")]
    TokioSqlite(#[from] tokio_rusqlite::Error),

    /// Validation pattern failed to compile.
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

/// Convenience result alias for user operations.
pub type UserResult<T> = Result<T, UserError>;
