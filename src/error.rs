//! Error types surfaced by the fetch pipeline
//!
//! Every failure the library reports to a caller is a [`TargitError`]. Each
//! variant maps onto a stable [`ErrorKind`] whose [`ErrorKind::code`] is safe
//! to match on from scripts and bindings.

use std::path::PathBuf;
use thiserror::Error;

use crate::locator::{SUPPORTED_ARCHIVE_TYPES, SUPPORTED_HOSTS};

/// Stable, machine-readable classification of a [`TargitError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    Parse,
    UnsupportedHost,
    UnsupportedArchiveType,
    RefNotFound,
    ArchiveNotFound,
    DestinationNotEmpty,
    DownloadFailed,
    RepoLookupFailed,
    ExtractFailed,
    Config,
    Io,
}

impl ErrorKind {
    /// Error code string, stable across releases
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "E_INVALID_ARGUMENT",
            ErrorKind::Parse => "E_PARSE_FAIL",
            ErrorKind::UnsupportedHost => "E_UNSUPPORTED_HOST",
            ErrorKind::UnsupportedArchiveType => "E_UNSUPPORTED_ARCHIVE_TYPE",
            ErrorKind::RefNotFound => "E_NO_REF",
            ErrorKind::ArchiveNotFound => "E_ARCHIVE_NO_EXIST",
            ErrorKind::DestinationNotEmpty => "E_EXTRACT_DIR_NOT_EMPTY",
            ErrorKind::DownloadFailed => "E_DOWNLOAD_FAILED",
            ErrorKind::RepoLookupFailed => "E_REPO_LOOKUP_FAILED",
            ErrorKind::ExtractFailed => "E_EXTRACT_FAILED",
            ErrorKind::Config => "E_CONFIG",
            ErrorKind::Io => "E_IO",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Errors returned by locator parsing, resolution, download and extraction
#[derive(Debug, Error)]
pub enum TargitError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("Could not parse {input}")]
    Parse { input: String },

    #[error("{host} is an unsupported host. Valid hosts are {}", SUPPORTED_HOSTS.join(", "))]
    UnsupportedHost { host: String },

    #[error(
        "{archive_type} is an unsupported archive type. Valid types are {}",
        SUPPORTED_ARCHIVE_TYPES.join(" and ")
    )]
    UnsupportedArchiveType { archive_type: String },

    #[error("Could not find commit sha for {reference}")]
    RefNotFound { reference: String },

    #[error("Archive location {} does not exist", .path.display())]
    ArchiveNotFound { path: PathBuf },

    #[error("Extract location {} is not empty", .path.display())]
    DestinationNotEmpty { path: PathBuf },

    #[error("Failed to download archive from {url}: {reason}")]
    DownloadFailed {
        url: String,
        status: Option<u16>,
        reason: String,
    },

    #[error("Repo lookup failed {url}, HTTP {status}")]
    RepoLookupFailed { url: String, status: u16 },

    #[error("Failed to extract {}: {reason}", .path.display())]
    Extract { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TargitError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TargitError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            TargitError::Parse { .. } => ErrorKind::Parse,
            TargitError::UnsupportedHost { .. } => ErrorKind::UnsupportedHost,
            TargitError::UnsupportedArchiveType { .. } => ErrorKind::UnsupportedArchiveType,
            TargitError::RefNotFound { .. } => ErrorKind::RefNotFound,
            TargitError::ArchiveNotFound { .. } => ErrorKind::ArchiveNotFound,
            TargitError::DestinationNotEmpty { .. } => ErrorKind::DestinationNotEmpty,
            TargitError::DownloadFailed { .. } => ErrorKind::DownloadFailed,
            TargitError::RepoLookupFailed { .. } => ErrorKind::RepoLookupFailed,
            TargitError::Extract { .. } => ErrorKind::ExtractFailed,
            TargitError::Config(_) => ErrorKind::Config,
            TargitError::Io { .. } => ErrorKind::Io,
        }
    }

    /// Shorthand for the machine-readable code of this error
    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TargitError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = TargitError> = std::result::Result<T, E>;
