//! Error types for the notesync engine.
//!
//! This module defines the failures that can occur while talking to the notes
//! API or while validating local input. The store never lets these escape its
//! remote-backed mutators; they are recorded on its `error` notice instead.

use std::io;

use thiserror::Error;

/// The main error type for the notesync engine.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Transport-level failures (connection refused, timeouts, bad TLS...).
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-2xx status.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// Errors related to serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Errors related to file I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A note patch named a field the Note schema does not have.
    #[error("Unknown note field: {field}")]
    UnknownField { field: String },

    /// A patch field had the wrong shape for its column.
    #[error("Invalid value for field {field}: {message}")]
    InvalidField { field: String, message: String },

    /// Category outside the fixed enumeration.
    #[error("Invalid category: {value}")]
    InvalidCategory { value: String },

    /// Note was not found when performing an operation.
    #[error("Note not found: {id}")]
    NoteNotFound { id: String },

    /// Errors related to the background draft sweeper.
    #[error("Sweeper error: {message}")]
    SweeperFailed { message: String },

    /// Errors related to configuration.
    #[error("Configuration error: {message}")]
    ConfigError { message: String },
}

impl SyncError {
    /// Whether this error came from the remote side (transport or HTTP status).
    pub fn is_remote(&self) -> bool {
        matches!(self, SyncError::Http(_) | SyncError::Api { .. })
    }
}
