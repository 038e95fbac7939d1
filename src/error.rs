//! Error types shared by the backend adapters, the live store and the CLI.
//!
//! `AuthError` is shown inline next to the sign-in form and the user retries by
//! resubmitting. `QueryError` halts the data panels until a manual refresh.
//! Subscription close failures never surface; they are logged and dropped.

use crate::model::Table;
use std::fmt;
use thiserror::Error;

/// Transport and local I/O failures.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Timeout: {0}")]
    Timeout(String),
    #[error("Request failed ({status}): {message}")]
    Http { status: u16, message: String },
    #[error("Response error: {0}")]
    Parse(String),
    #[error("Request error: {0}")]
    Serialization(String),
    #[error("Subscription error: {0}")]
    Subscription(String),
    #[error("Preference error: {0}")]
    Preference(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout("Request timed out. Please try again.".to_string())
        } else if err.is_decode() {
            Error::Parse(format!("Failed to decode response: {err}"))
        } else if err.is_builder() {
            Error::Serialization(format!("Failed to build request: {err}"))
        } else {
            Error::Network(format!("Unable to reach the server: {err}"))
        }
    }
}

/// Result type alias for backend and store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Sign-in and sign-up failures, rendered as an inline form message.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Enter a valid email address.")]
    InvalidEmail,
    #[error("Password is required.")]
    MissingPassword,
    #[error("{0}")]
    Rejected(String),
    #[error(transparent)]
    Backend(#[from] Error),
}

/// Aggregate failure of the initial bulk fetch. One entry per failed table.
#[derive(Debug)]
pub struct QueryError {
    pub failures: Vec<(Table, Error)>,
}

impl QueryError {
    /// Tables whose fetch failed, in request order.
    #[must_use]
    pub fn tables(&self) -> Vec<Table> {
        self.failures.iter().map(|(table, _)| *table).collect()
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "Failed to load dashboard data")?;
        for (index, (table, err)) in self.failures.iter().enumerate() {
            let separator = if index == 0 { ": " } else { "; " };
            write!(formatter, "{separator}{table}: {err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for QueryError {}
