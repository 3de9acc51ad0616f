//! Error types for package builds
//!
//! Every pipeline failure is a `BuildError`. `BuildError::kind` folds the
//! variants down to the small set of kinds callers branch on.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use pkgseal_archive::ArchiveError;

use crate::config::RepositoryError;

/// Coarse classification of a `BuildError`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A referenced file or manifest does not exist
    NotFound,
    /// A manifest or record could not be parsed or decoded
    MalformedManifest,
    /// A package manifest declares an unsupported version
    IncompatibleVersion,
    /// A required metadata entry is absent from the build manifest
    MissingRequiredFile,
    /// The configured repository identifier is not well formed
    InvalidRepositoryIdentifier,
    /// Read/write/create failure on the filesystem or archive
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotFound => "not_found",
            Self::MalformedManifest => "malformed_manifest",
            Self::IncompatibleVersion => "incompatible_version",
            Self::MissingRequiredFile => "missing_required_file",
            Self::InvalidRepositoryIdentifier => "invalid_repository_identifier",
            Self::Io => "io",
        };
        f.write_str(s)
    }
}

/// Errors for package build operations
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Malformed manifest {what}: {reason}")]
    MalformedManifest { what: String, reason: String },

    #[error("Incompatible package manifest version in {}: found {found}, expected \"1\"", path.display())]
    IncompatibleVersion { path: PathBuf, found: String },

    #[error("Missing required file: {0}")]
    MissingRequiredFile(String),

    #[error(transparent)]
    InvalidRepository(#[from] RepositoryError),

    #[error("Invalid package path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("IO error at {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Digest mismatch for {}: sidecar has {expected}, archive hashes to {actual}", path.display())]
    DigestMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
}

impl BuildError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BuildError::NotFound(_) => ErrorKind::NotFound,
            BuildError::MalformedManifest { .. } | BuildError::InvalidPath { .. } => {
                ErrorKind::MalformedManifest
            }
            BuildError::IncompatibleVersion { .. } => ErrorKind::IncompatibleVersion,
            BuildError::MissingRequiredFile(_) => ErrorKind::MissingRequiredFile,
            BuildError::InvalidRepository(_) => ErrorKind::InvalidRepositoryIdentifier,
            BuildError::Archive(e) if e.is_not_found() => ErrorKind::NotFound,
            BuildError::Io { .. } | BuildError::Archive(_) | BuildError::DigestMismatch { .. } => {
                ErrorKind::Io
            }
        }
    }

    pub(crate) fn malformed(what: impl fmt::Display, reason: impl fmt::Display) -> Self {
        BuildError::MalformedManifest {
            what: what.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn invalid_path(path: &str, reason: impl Into<String>) -> Self {
        BuildError::InvalidPath {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// Attach `path` to an IO error
pub(crate) fn io_error(path: &Path) -> impl FnOnce(io::Error) -> BuildError + '_ {
    move |source| BuildError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Like `io_error`, but a missing file becomes `NotFound`
pub(crate) fn read_error(path: &Path) -> impl FnOnce(io::Error) -> BuildError + '_ {
    move |source| {
        if source.kind() == io::ErrorKind::NotFound {
            BuildError::NotFound(path.to_path_buf())
        } else {
            BuildError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

pub type Result<T, E = BuildError> = std::result::Result<T, E>;
