//! Node kind and metadata.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;

/// Kind of a filesystem entry.
///
/// `Unknown` is only ever produced by operations whose backend cannot
/// cheaply classify the result (move, copy, exotic directory entries).
/// It is never the kind of a handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum NodeType {
    /// Regular file.
    File,
    /// Directory.
    #[strum(serialize = "directory", serialize = "dir")]
    Directory,
    /// Not classified by the backend.
    Unknown,
}

impl NodeType {
    /// Parse from string (case-insensitive).
    ///
    /// Accepts "dir" as an alias for `Directory`.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::File => "file",
            NodeType::Directory => "directory",
            NodeType::Unknown => "unknown",
        }
    }

    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, NodeType::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, NodeType::Directory)
    }

    /// Returns true if the backend could not classify the entry.
    pub fn is_unknown(&self) -> bool {
        matches!(self, NodeType::Unknown)
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Minimal description of a filesystem entry, as produced by an adapter.
///
/// `path` is backend-relative in virtual form: it starts with `/`, which
/// stands for the adapter's root, and is lexically normalized.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMeta {
    /// Entry path, relative to the adapter root.
    pub path: PathBuf,
    /// Entry kind.
    #[serde(rename = "type")]
    pub kind: NodeType,
}

impl NodeMeta {
    /// Create metadata for an entry.
    pub fn new(path: impl Into<PathBuf>, kind: NodeType) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// Metadata for a file.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(path, NodeType::File)
    }

    /// Metadata for a directory.
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self::new(path, NodeType::Directory)
    }

    /// Metadata for an entry the backend did not classify.
    pub fn unknown(path: impl Into<PathBuf>) -> Self {
        Self::new(path, NodeType::Unknown)
    }

    /// Entry path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
