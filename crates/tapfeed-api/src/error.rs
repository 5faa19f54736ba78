//! Error types for the API crate.
//!
//! [`ApiError`] separates the failures callers must handle differently:
//! configuration problems, transport failures, corrupt downloads, integrity
//! failures of signed payloads, and bad requests made through the simple
//! fetch path. Every variant that concerns a remote file names its URL.

use miette::Diagnostic;
use tapfeed_dl::DownloadError;
use tapfeed_utils::error::{FileSystemError, PathError, UtilsError};
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ApiError {
    #[error("{0}")]
    #[diagnostic(code(tapfeed_api::configuration))]
    Configuration(String),

    #[error("Failed to download {url}")]
    #[diagnostic(
        code(tapfeed_api::transport),
        help("Check your network connection and the configured API domain")
    )]
    Transport {
        url: String,
        #[source]
        source: DownloadError,
    },

    #[error("Cannot download non-corrupt {url}!")]
    #[diagnostic(
        code(tapfeed_api::corrupt_download),
        help("The server keeps returning invalid JSON; try again later")
    )]
    CorruptDownload { url: String },

    #[error("Failed to verify integrity ({reason}) of:\n  {url}\nPotential MITM attempt detected.")]
    #[diagnostic(
        code(tapfeed_api::integrity),
        help("The cached copy was removed. Update again, and check your network if this repeats")
    )]
    Integrity { reason: String, url: String },

    #[error("No file found at {url}")]
    #[diagnostic(code(tapfeed_api::not_found))]
    NotFound {
        url: String,
        #[source]
        source: DownloadError,
    },

    #[error("Invalid JSON file: {url}")]
    #[diagnostic(code(tapfeed_api::invalid_json))]
    InvalidJson {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Error while {action}: {source}")]
    #[diagnostic(code(tapfeed_api::io))]
    IoError {
        action: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(code(tapfeed_api::json))]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    #[diagnostic(code(tapfeed_api::config))]
    Config(#[from] tapfeed_config::ConfigError),

    #[error(transparent)]
    #[diagnostic(code(tapfeed_api::utils))]
    Utils(#[from] UtilsError),
}

impl From<FileSystemError> for ApiError {
    fn from(err: FileSystemError) -> Self {
        Self::Utils(UtilsError::FileSystem(err))
    }
}

impl From<PathError> for ApiError {
    fn from(err: PathError) -> Self {
        Self::Utils(UtilsError::Path(err))
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// Extension trait for adding context to I/O errors.
pub trait ErrorContext<T> {
    /// Adds context to an error, describing what action was being performed.
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            ApiError::IoError {
                action: context(),
                source: err,
            }
        })
    }
}
