//! Errors shared by the Rooster crates: the local database and the schedule
//! configuration. Store-level errors live in `rooster-store`.

use thiserror::Error;

/// Failures of the local SQLite database.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Cannot open database: {0}")]
    ConnectionFailed(String),

    #[error("Database query failed: {0}")]
    QueryFailed(String),

    #[error("Database file is corrupt: {0}")]
    Corruption(String),
}

impl DatabaseError {
    /// Message for the timetable UI.
    pub fn user_message(&self) -> &'static str {
        match self {
            DatabaseError::ConnectionFailed(_) => "The local timetable could not be opened",
            DatabaseError::QueryFailed(_) => "The local timetable could not be updated",
            DatabaseError::Corruption(_) => "The local timetable is damaged and has to be downloaded again",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::UnknownTimezone(_) => "The school timezone in the settings is not recognised",
        }
    }
}

/// Maps rusqlite failures onto [`DatabaseError`].
pub trait RusqliteErrorExt {
    fn into_database_error(self) -> DatabaseError;
}

impl RusqliteErrorExt for rusqlite::Error {
    fn into_database_error(self) -> DatabaseError {
        let code = self.sqlite_error_code();
        let message = self.to_string();
        match code {
            Some(rusqlite::ErrorCode::DatabaseCorrupt | rusqlite::ErrorCode::NotADatabase) => {
                DatabaseError::Corruption(message)
            }
            Some(rusqlite::ErrorCode::CannotOpen | rusqlite::ErrorCode::PermissionDenied) => {
                DatabaseError::ConnectionFailed(message)
            }
            _ => DatabaseError::QueryFailed(message),
        }
    }
}
