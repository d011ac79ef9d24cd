//! Typed errors returned by every store operation.
//!
//! # Invariants
//! - Key validation errors are produced before any filesystem access.
//! - `NotFound` is reserved for absent targets; every other I/O failure is
//!   reported as `Io` with the operation and path that failed.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::PathBuf;

pub type StoreResult<T> = Result<T, StoreError>;

/// Which half of a record key a name belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Collection,
    Resource,
}

impl Display for NameKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Collection => f.write_str("collection"),
            Self::Resource => f.write_str("resource"),
        }
    }
}

/// Filesystem step that failed, carried by `StoreError::Io`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOp {
    CreateDir,
    Write,
    Sync,
    Rename,
    Read,
    ListDir,
    Remove,
    Stat,
}

impl Display for IoOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::CreateDir => "create_dir",
            Self::Write => "write",
            Self::Sync => "sync",
            Self::Rename => "rename",
            Self::Read => "read",
            Self::ListDir => "list_dir",
            Self::Remove => "remove",
            Self::Stat => "stat",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub enum StoreError {
    MissingCollection,
    MissingResource,
    InvalidName {
        kind: NameKind,
        name: String,
    },
    NotFound {
        path: PathBuf,
    },
    InvalidStoreLocation {
        path: PathBuf,
    },
    Serialization(serde_json::Error),
    Deserialization {
        path: PathBuf,
        source: serde_json::Error,
    },
    Io {
        op: IoOp,
        path: PathBuf,
        source: io::Error,
    },
}

impl StoreError {
    pub(crate) fn io(op: IoOp, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }

    /// Maps `NotFound` and `NotADirectory` to `StoreError::NotFound`, anything
    /// else to `Io`.
    ///
    /// `NotADirectory` means a regular file sits where the collection
    /// directory should be, so the collection does not exist.
    pub(crate) fn from_io(op: IoOp, path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => Self::NotFound { path },
            _ => Self::Io { op, path, source },
        }
    }

    /// Returns true when the requested collection or resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Stable short code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingCollection => "missing_collection",
            Self::MissingResource => "missing_resource",
            Self::InvalidName { .. } => "invalid_name",
            Self::NotFound { .. } => "not_found",
            Self::InvalidStoreLocation { .. } => "invalid_store_location",
            Self::Serialization(_) => "serialization_failed",
            Self::Deserialization { .. } => "deserialization_failed",
            Self::Io { .. } => "io_failed",
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingCollection => write!(f, "collection name is empty"),
            Self::MissingResource => write!(f, "resource name is empty"),
            Self::InvalidName { kind, name } => write!(f, "invalid {kind} name `{name}`"),
            Self::NotFound { path } => write!(f, "not found: {}", path.display()),
            Self::InvalidStoreLocation { path } => {
                write!(f, "store location is not a directory: {}", path.display())
            }
            Self::Serialization(err) => write!(f, "failed to serialize record: {err}"),
            Self::Deserialization { path, source } => {
                write!(f, "failed to deserialize `{}`: {source}", path.display())
            }
            Self::Io { op, path, source } => {
                write!(f, "{op} failed for `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Serialization(err) => Some(err),
            Self::Deserialization { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            Self::MissingCollection
            | Self::MissingResource
            | Self::InvalidName { .. }
            | Self::NotFound { .. }
            | Self::InvalidStoreLocation { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{IoOp, StoreError};
    use std::error::Error;
    use std::io;

    #[test]
    fn from_io_maps_not_found_kind() {
        let err = StoreError::from_io(
            IoOp::Read,
            "/tmp/x.json",
            io::Error::from(io::ErrorKind::NotFound),
        );
        assert!(err.is_not_found());
        assert!(err.source().is_none());
    }

    #[test]
    fn from_io_maps_not_a_directory_kind() {
        let err = StoreError::from_io(
            IoOp::ListDir,
            "/tmp/fish",
            io::Error::from(io::ErrorKind::NotADirectory),
        );
        assert!(err.is_not_found());
    }

    #[test]
    fn from_io_keeps_other_kinds_with_context() {
        let err = StoreError::from_io(
            IoOp::Rename,
            "/tmp/x.json",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert_eq!(err.code(), "io_failed");
        assert!(err.to_string().contains("rename failed for `/tmp/x.json`"));
        assert!(err.source().is_some());
    }
}
