use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error as ThisError;

/// A requested series that the API left out of an otherwise good response.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
#[error("no data returned for series {series}")]
pub struct PartialDataError {
    pub series: String,
}

#[derive(ThisError, Debug)]
pub enum SyncError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error: {0}")]
    Api(String),

    #[error(transparent)]
    PartialData(#[from] PartialDataError),

    #[error("No stored table for series {0}")]
    MissingSeries(String),

    #[error("Storage error at {}: {message}", .path.display())]
    Storage { path: PathBuf, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid date window: start {start} is after end {end}")]
    InvalidWindow { start: NaiveDate, end: NaiveDate },

    #[error("A refresh is already running")]
    RefreshInProgress,

    #[error("Series {0} is not tracked")]
    UnknownSeries(String),
}

impl SyncError {
    pub fn storage(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        SyncError::Storage {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::Network(format!("request timed out: {}", err))
        } else if err.is_status() || err.is_decode() {
            SyncError::Api(err.to_string())
        } else {
            SyncError::Network(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
