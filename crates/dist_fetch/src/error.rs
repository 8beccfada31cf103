use std::{path::PathBuf, sync::Arc};

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur while fetching from a distribution and placing a
/// binary on disk.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("GET {url} error: {status}")]
    NotFound {
        path: String,
        url: String,
        status: StatusCode,
    },

    #[error("GET {url} error: {status}: {message}")]
    HttpStatus {
        url: String,
        status: StatusCode,
        message: String,
    },

    #[error(transparent)]
    Transport(Arc<reqwest::Error>),

    #[error("the operation was cancelled")]
    Cancelled,

    #[error("invalid gateway url '{gateway}': {reason}")]
    InvalidGateway { gateway: String, reason: String },

    #[error("invalid distribution path '{0}'")]
    InvalidDistPath(String),

    #[error("response from {url} exceeds the fetch limit of {limit} bytes")]
    SizeLimitExceeded { url: String, limit: u64 },

    #[error("no fetchers configured")]
    NoFetchers,

    #[error("could not find a matching version of {package}")]
    NoVersionFound { package: String },

    #[error("no binary found in archive")]
    NoBinaryInArchive,

    #[error("{} already exists", path.display())]
    AlreadyExists { path: PathBuf },

    #[error("permission denied creating staging directory in {}", path.display())]
    Permission {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    #[error(transparent)]
    Io(Arc<std::io::Error>),

    #[error(transparent)]
    Extract(ExtractError),

    #[error(transparent)]
    Join(Arc<tokio::task::JoinError>),
}

impl FetchError {
    /// Returns true if the remote reported the resource as absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if the caller cancelled the operation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<std::io::Error> for FetchError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(Arc::new(err))
    }
}

impl From<tokio::task::JoinError> for FetchError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Join(Arc::new(err))
    }
}

impl From<ExtractError> for FetchError {
    fn from(err: ExtractError) -> Self {
        match err {
            // A missing entry is the expected "wrong archive" outcome for both formats.
            ExtractError::EntryNotFound(_) => Self::NoBinaryInArchive,
            other => Self::Extract(other),
        }
    }
}

/// Errors emitted while reading an archive.
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Io(Arc<std::io::Error>),

    #[error("failed to read tar archive: {0}")]
    TarExtractionError(String),

    #[error("failed to extract zip archive: {0}")]
    ZipExtractionError(String),

    #[error("invalid zip archive: {0}")]
    InvalidZip(String),

    #[error("unsupported archive format: {0}")]
    UnsupportedArchive(String),

    #[error("entry '{0}' not found in archive")]
    EntryNotFound(String),
}

impl From<std::io::Error> for ExtractError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

/// Errors emitted while loading a [`crate::DownloadConfig`].
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("failed to parse download configuration: {0}")]
    Parse(String),

    #[error(transparent)]
    Io(Arc<std::io::Error>),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}
