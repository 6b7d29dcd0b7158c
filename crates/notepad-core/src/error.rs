//! Error types for notepad-core

use thiserror::Error;

use crate::identity::AuthError;

/// Result type alias using notepad-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in notepad-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Remote store error (read, write or subscription)
    #[error("Store error: {0}")]
    Store(String),

    /// `SQLite` error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Identity could not be established
    #[error("Identity error: {0}")]
    Identity(#[from] AuthError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Note not found
    #[error("Note not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Export/rendering error
    #[error("Export error: {0}")]
    Export(String),
}
