//! Error types for speech-dl
//!
//! This module provides error handling for the library, including:
//! - The crate-wide [`Error`] taxonomy (transport, protocol, filesystem, corrupt state)
//! - [`DownloadError`], the per-record failure carried by
//!   [`RecordOutcome::Failed`](crate::types::RecordOutcome::Failed)
//! - Process exit status mapping for binaries embedding the library

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for speech-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Exit status for normal completion
pub const EXIT_SUCCESS: i32 = 0;

/// Exit status for unhandled top-level errors
pub const EXIT_FAILURE: i32 = 1;

/// Exit status when the run was interrupted by a signal (128 + SIGINT)
pub const EXIT_INTERRUPTED: i32 = 130;

/// Main error type for speech-dl
///
/// Per-record failures never surface through this type during a batch run; they are
/// converted into [`DownloadError`] values and recorded in the ledger. Everything
/// here is fatal to the operation that returned it.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "page_size")
        key: Option<String>,
    },

    /// A call to the remote service failed (connection, non-success HTTP status)
    #[error("transport error: {message}")]
    Transport {
        /// Human-readable description of the failure
        message: String,
        /// HTTP status code, if the server answered at all
        status: Option<u16>,
    },

    /// The remote service answered with a malformed or unexpected response
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A directory or artifact could not be created or written
    #[error("filesystem error at {path}: {source}")]
    Filesystem {
        /// Path that was being created or written
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// A persisted state file exists but cannot be decoded
    #[error("corrupt state file {path}: {reason}")]
    CorruptState {
        /// The unreadable file
        path: PathBuf,
        /// Decoder error message
        reason: String,
    },

    /// A required input file does not exist
    #[error("required file not found: {path} ({hint})")]
    MissingInput {
        /// The missing file
        path: PathBuf,
        /// What the operator should run to produce it
        hint: String,
    },

    /// Per-record download failure
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// Network error from the HTTP client
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The run was cancelled by a signal or an explicit shutdown
    #[error("operation interrupted")]
    Interrupted,

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a transport error that never reached an HTTP status
    pub fn transport(message: impl Into<String>) -> Self {
        Error::Transport {
            message: message.into(),
            status: None,
        }
    }

    /// Create a filesystem error for `path`
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Filesystem {
            path: path.into(),
            source,
        }
    }
}

/// Why a single record could not be downloaded
///
/// Always fatal to the one record and never to the batch.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The record's directory could not be created or cleared
    #[error("failed to prepare directory {path}: {reason}")]
    DirectoryFailed {
        /// Directory that was being prepared
        path: PathBuf,
        /// The reason preparation failed
        reason: String,
    },

    /// The metadata artifact could not be written
    #[error("failed to write metadata {path}: {reason}")]
    MetadataFailed {
        /// Path of the metadata artifact
        path: PathBuf,
        /// The reason the write failed
        reason: String,
    },

    /// The content fetcher reported an error
    #[error("content fetch for {content_id} failed: {reason}")]
    FetchFailed {
        /// Content-addressing id passed to the fetcher
        content_id: String,
        /// The error reported by the fetcher
        reason: String,
    },

    /// The fetcher returned success but no archive exists
    #[error("content archive missing at {path}")]
    ArtifactMissing {
        /// Where the archive was expected
        path: PathBuf,
    },

    /// The fetcher produced a zero-length archive
    #[error("content archive at {path} is empty")]
    ArtifactEmpty {
        /// The empty archive
        path: PathBuf,
    },
}

/// Convert errors to process exit statuses
///
/// Mirrors what a CLI wrapper needs at the process boundary: a numeric status and a
/// short machine-readable code to print next to the human-readable message.
pub trait ToExitCode {
    /// Get the process exit status for this error
    fn exit_code(&self) -> i32;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToExitCode for Error {
    fn exit_code(&self) -> i32 {
        match self {
            Error::Interrupted => EXIT_INTERRUPTED,
            _ => EXIT_FAILURE,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Transport { .. } => "transport_error",
            Error::Protocol(_) => "protocol_error",
            Error::Filesystem { .. } => "filesystem_error",
            Error::CorruptState { .. } => "corrupt_state",
            Error::MissingInput { .. } => "missing_input",
            Error::Download(e) => match e {
                DownloadError::DirectoryFailed { .. } => "directory_failed",
                DownloadError::MetadataFailed { .. } => "metadata_failed",
                DownloadError::FetchFailed { .. } => "fetch_failed",
                DownloadError::ArtifactMissing { .. } => "artifact_missing",
                DownloadError::ArtifactEmpty { .. } => "artifact_empty",
            },
            Error::Network(_) => "network_error",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::Interrupted => "interrupted",
            Error::Other(_) => "internal_error",
        }
    }
}

/// Exit status for the outcome of a top-level operation
///
/// # Example
///
/// ```
/// use speech_dl::error::{Error, Result, exit_code_for};
///
/// let ok: Result<()> = Ok(());
/// assert_eq!(exit_code_for(&ok), 0);
///
/// let interrupted: Result<()> = Err(Error::Interrupted);
/// assert_eq!(exit_code_for(&interrupted), 130);
/// ```
pub fn exit_code_for<T>(result: &Result<T>) -> i32 {
    match result {
        Ok(_) => EXIT_SUCCESS,
        Err(e) => e.exit_code(),
    }
}
