//! Error types shared by the probes, engines and notifier boundary.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Connection failure: {0}")]
    Connection(String),

    #[error("Authentication failure: {0}")]
    Auth(String),

    #[error("Remote I/O failure: {0}")]
    RemoteIo(String),

    #[error("File too large: {size} bytes exceeds the {limit} byte limit")]
    SizeLimitExceeded { size: u64, limit: u64 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Remote command exited with status {status}: {stderr}")]
    CommandFailed { status: i32, stderr: String },

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Notification error: {0}")]
    Notify(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<zip::result::ZipError> for WatchError {
    fn from(e: zip::result::ZipError) -> Self {
        WatchError::Archive(e.to_string())
    }
}

impl From<walkdir::Error> for WatchError {
    fn from(e: walkdir::Error) -> Self {
        WatchError::Archive(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WatchError>;
