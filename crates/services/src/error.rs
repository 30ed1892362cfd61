//! Shared error types for the services crate.

use thiserror::Error;

use aptitude_core::model::{QuestionBankError, SessionError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted while loading a question bank from JSON.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BankLoadError {
    #[error("failed to read question file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid question JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Bank(#[from] QuestionBankError),
}

/// Errors emitted by `AuthService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    #[error("username must be between 3 and 50 characters")]
    InvalidUsername,
    #[error("a valid email address is required")]
    InvalidEmail,
    #[error("password must be at least 6 characters")]
    WeakPassword,
    #[error("full name must be at most 100 characters")]
    FullNameTooLong,
    #[error("username or email already registered")]
    AlreadyRegistered,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `TestFlow`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FlowError {
    #[error("no test in progress")]
    NoSession,
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Errors emitted while bootstrapping services over storage.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Bank(#[from] BankLoadError),
}
