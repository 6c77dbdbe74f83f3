//! VFS error types.

use std::io;
use std::path::Path;

use hako_types::NodeType;
use thiserror::Error;

/// VFS error type.
#[derive(Debug, Error)]
pub enum VfsError {
    /// File or directory not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Expected a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Expected a file.
    #[error("not a file: {0}")]
    NotAFile(String),

    /// Adapter metadata could not be turned into a handle.
    #[error("unknown node type '{kind}' for {path}")]
    UnknownNodeType { path: String, kind: NodeType },

    /// Path already exists with an incompatible kind.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Permission denied.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Filesystem is read-only.
    #[error("filesystem is read-only")]
    ReadOnly,

    /// Path escapes root (security violation).
    #[error("path escapes root: {0}")]
    PathEscapesRoot(String),

    /// Invalid path.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Backend configuration could not be parsed.
    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl VfsError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    /// Create a NotAFile error.
    pub fn not_a_file(path: impl Into<String>) -> Self {
        Self::NotAFile(path.into())
    }

    /// Create an UnknownNodeType error.
    pub fn unknown_node_type(path: impl Into<String>, kind: NodeType) -> Self {
        Self::UnknownNodeType {
            path: path.into(),
            kind,
        }
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    /// Create a PermissionDenied error.
    pub fn permission_denied(path: impl Into<String>) -> Self {
        Self::PermissionDenied(path.into())
    }

    /// Create a PathEscapesRoot error.
    pub fn path_escapes_root(path: impl Into<String>) -> Self {
        Self::PathEscapesRoot(path.into())
    }

    /// Create an InvalidPath error.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Classify an I/O failure against the path it happened on.
    ///
    /// Kinds that belong to the VFS taxonomy carry the path; anything else
    /// stays a plain `Io` error.
    pub fn from_io(err: io::Error, path: &Path) -> Self {
        let display = path.display().to_string();
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(display),
            io::ErrorKind::NotADirectory => Self::NotADirectory(display),
            io::ErrorKind::IsADirectory => Self::NotAFile(display),
            io::ErrorKind::AlreadyExists => Self::AlreadyExists(display),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(display),
            _ => Self::Io(err),
        }
    }

    /// Returns true for errors meaning "nothing at that path".
    pub fn is_not_found(&self) -> bool {
        match self {
            VfsError::NotFound(_) => true,
            VfsError::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Convert VfsError to std::io::Error so it can cross stream boundaries.
impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        match e {
            VfsError::NotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            VfsError::NotADirectory(msg) => io::Error::new(io::ErrorKind::NotADirectory, msg),
            VfsError::NotAFile(msg) => io::Error::new(io::ErrorKind::IsADirectory, msg),
            VfsError::AlreadyExists(msg) => io::Error::new(io::ErrorKind::AlreadyExists, msg),
            VfsError::PermissionDenied(msg) => {
                io::Error::new(io::ErrorKind::PermissionDenied, msg)
            }
            VfsError::ReadOnly => {
                io::Error::new(io::ErrorKind::PermissionDenied, "filesystem is read-only")
            }
            VfsError::PathEscapesRoot(msg) => {
                io::Error::new(io::ErrorKind::PermissionDenied, msg)
            }
            VfsError::InvalidPath(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            VfsError::Io(e) => e,
            other @ (VfsError::UnknownNodeType { .. } | VfsError::Config(_)) => {
                io::Error::other(other.to_string())
            }
        }
    }
}

/// VFS result type.
pub type VfsResult<T> = Result<T, VfsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_classifies_kinds() {
        let path = Path::new("/missing.txt");
        let err = VfsError::from_io(io::Error::from(io::ErrorKind::NotFound), path);
        assert!(matches!(err, VfsError::NotFound(ref p) if p == "/missing.txt"));
        assert!(err.is_not_found());

        let err = VfsError::from_io(io::Error::from(io::ErrorKind::IsADirectory), path);
        assert!(matches!(err, VfsError::NotAFile(_)));

        let err = VfsError::from_io(io::Error::from(io::ErrorKind::UnexpectedEof), path);
        assert!(matches!(err, VfsError::Io(_)));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_into_io_error_keeps_kind() {
        let err: io::Error = VfsError::not_found("/a.txt").into();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);

        let err: io::Error = VfsError::ReadOnly.into();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);

        let err: io::Error = VfsError::unknown_node_type("/a", NodeType::Unknown).into();
        assert_eq!(err.kind(), io::ErrorKind::Other);
        assert!(err.to_string().contains("unknown node type"));
    }
}
