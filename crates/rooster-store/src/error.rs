//! Store-specific error types.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rooster_core::{ConfigError, DatabaseError};
use thiserror::Error;

/// Errors raised by the persistence adapters.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reported by the remote fetch collaborator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("Fetch service unavailable")]
    Unavailable,

    #[error("Fetch failed: {0}")]
    Failed(String),
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable)
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Appointment {id} ends before it starts ({start} > {end})")]
    InvalidInterval {
        id: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Local time {0} does not exist in the configured timezone")]
    InvalidLocalTime(NaiveDateTime),

    #[error("Date out of range: {0}")]
    DateOutOfRange(NaiveDate),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("No async runtime available to schedule deferred work")]
    NoRuntime,
}

impl StoreError {
    /// User-friendly error message for UI display.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidInterval { .. } => "An appointment has an invalid time range".to_string(),
            Self::InvalidLocalTime(t) => format!("The time {} does not exist locally", t),
            Self::DateOutOfRange(d) => format!("The date {} is out of range", d),
            Self::Storage(StorageError::Database(e)) => e.user_message().to_string(),
            Self::Storage(_) => "Local timetable data could not be saved".to_string(),
            Self::Fetch(_) => "The timetable could not be refreshed. Check your connection.".to_string(),
            Self::Config(e) => e.user_message().to_string(),
            Self::NoRuntime => "Background work is unavailable".to_string(),
        }
    }

    /// Whether retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_retryable(),
            Self::Storage(StorageError::Io(_)) => true,
            Self::Storage(StorageError::Database(DatabaseError::ConnectionFailed(_))) => true,
            _ => false,
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
pub type StoreResult<T> = Result<T, StoreError>;
