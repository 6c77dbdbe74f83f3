//! Node handles.
//!
//! A handle pairs a [`Filesystem`] with a path. Handles never cache
//! contents or existence; every call goes back through the facade, so a
//! handle whose entry was deleted elsewhere simply reports errors.

use std::borrow::Cow;
use std::path::{Component, Path, PathBuf};

use hako_types::NodeType;

use crate::adapter::{ReadStream, WriteStream};
use crate::error::VfsResult;
use crate::filesystem::Filesystem;

/// Last path segment, empty for the root.
fn last_segment(path: &Path) -> Cow<'_, str> {
    path.file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default()
}

/// Second-to-last path segment, `/` when there is none.
fn parent_segment(path: &Path) -> Cow<'_, str> {
    let segments: Vec<_> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s),
            _ => None,
        })
        .collect();

    match segments.len().checked_sub(2) {
        Some(i) => segments[i].to_string_lossy(),
        None => Cow::Borrowed("/"),
    }
}

/// Methods shared by [`File`] and [`Directory`].
macro_rules! handle_common {
    ($handle:ident, $kind:expr) => {
        impl $handle {
            pub(crate) fn new(fs: Filesystem, path: PathBuf) -> Self {
                Self { fs, path }
            }

            /// Kind of entry this handle was resolved as.
            pub fn kind(&self) -> NodeType {
                $kind
            }

            /// Path the handle points at, in virtual form.
            pub fn path(&self) -> &Path {
                &self.path
            }

            /// Last segment of the path, empty for the root.
            pub fn name(&self) -> Cow<'_, str> {
                last_segment(&self.path)
            }

            /// Second-to-last segment of the path, `/` at the top level.
            ///
            /// This is the parent's *name*, not its full path.
            pub fn parent_path(&self) -> Cow<'_, str> {
                parent_segment(&self.path)
            }

            /// The filesystem this handle calls back into.
            pub fn filesystem(&self) -> &Filesystem {
                &self.fs
            }

            /// Size in bytes.
            pub async fn size(&self) -> VfsResult<u64> {
                self.fs.size(&self.path).await
            }

            /// Whether the entry still exists.
            pub async fn exists(&self) -> bool {
                self.fs.has(&self.path).await
            }

            /// Move the entry; this handle then points at the destination.
            pub async fn move_to(&mut self, new_path: impl AsRef<Path>) -> VfsResult<&mut Self> {
                let meta = self.fs.move_meta(&self.path, new_path).await?;
                self.path = meta.path;
                Ok(self)
            }

            /// Copy the entry and return a handle to the copy.
            pub async fn copy_to(&self, new_path: impl AsRef<Path>) -> VfsResult<Self> {
                let meta = self.fs.copy_meta(&self.path, new_path).await?;
                Ok(Self::new(self.fs.clone(), meta.path))
            }

            /// Delete the entry, consuming the handle.
            pub async fn delete(self) -> VfsResult<()> {
                self.fs.delete(&self.path).await
            }
        }
    };
}

/// Handle to a file.
#[derive(Debug, Clone)]
pub struct File {
    fs: Filesystem,
    path: PathBuf,
}

handle_common!(File, NodeType::File);

impl File {
    /// Read as UTF-8 text.
    pub async fn read(&self) -> VfsResult<String> {
        self.fs.read(&self.path).await
    }

    /// Read as bytes.
    pub async fn read_bytes(&self) -> VfsResult<Vec<u8>> {
        self.fs.read_bytes(&self.path).await
    }

    /// Lazy byte stream over the contents.
    pub fn read_stream(&self) -> ReadStream {
        self.fs.read_stream(&self.path)
    }

    /// Detected media type.
    pub async fn mime(&self) -> VfsResult<Option<String>> {
        self.fs.mime(&self.path).await
    }

    /// Replace the contents.
    pub async fn write(&self, contents: impl AsRef<[u8]>) -> VfsResult<&Self> {
        self.fs.write(&self.path, contents).await?;
        Ok(self)
    }

    /// Open a sink that replaces the contents.
    pub async fn write_stream(&self) -> VfsResult<WriteStream> {
        self.fs.write_stream(&self.path).await
    }

    /// Add contents after the existing bytes.
    pub async fn append(&self, contents: impl AsRef<[u8]>) -> VfsResult<&Self> {
        self.fs.append(&self.path, contents).await?;
        Ok(self)
    }

    /// Insert contents before the existing bytes.
    pub async fn prepend(&self, contents: impl AsRef<[u8]>) -> VfsResult<&Self> {
        self.fs.prepend(&self.path, contents).await?;
        Ok(self)
    }
}

/// Handle to a directory.
#[derive(Debug, Clone)]
pub struct Directory {
    fs: Filesystem,
    path: PathBuf,
}

handle_common!(Directory, NodeType::Directory);

impl Directory {
    /// Direct children, in backend order.
    pub async fn children(&self) -> VfsResult<Vec<Node>> {
        self.fs.list_children(&self.path).await
    }
}

/// A file or directory handle.
#[derive(Debug, Clone)]
pub enum Node {
    File(File),
    Directory(Directory),
}

impl From<File> for Node {
    fn from(file: File) -> Self {
        Node::File(file)
    }
}

impl From<Directory> for Node {
    fn from(dir: Directory) -> Self {
        Node::Directory(dir)
    }
}

impl Node {
    /// Kind of entry this handle was resolved as.
    pub fn kind(&self) -> NodeType {
        match self {
            Node::File(f) => f.kind(),
            Node::Directory(d) => d.kind(),
        }
    }

    /// Path the handle points at, in virtual form.
    pub fn path(&self) -> &Path {
        match self {
            Node::File(f) => f.path(),
            Node::Directory(d) => d.path(),
        }
    }

    /// Last segment of the path, empty for the root.
    pub fn name(&self) -> Cow<'_, str> {
        last_segment(self.path())
    }

    /// Second-to-last segment of the path, `/` at the top level.
    pub fn parent_path(&self) -> Cow<'_, str> {
        parent_segment(self.path())
    }

    /// The filesystem this handle calls back into.
    pub fn filesystem(&self) -> &Filesystem {
        match self {
            Node::File(f) => f.filesystem(),
            Node::Directory(d) => d.filesystem(),
        }
    }

    /// Returns true for a file handle.
    pub fn is_file(&self) -> bool {
        matches!(self, Node::File(_))
    }

    /// Returns true for a directory handle.
    pub fn is_directory(&self) -> bool {
        matches!(self, Node::Directory(_))
    }

    /// Borrow the file handle, if this is one.
    pub fn as_file(&self) -> Option<&File> {
        match self {
            Node::File(f) => Some(f),
            Node::Directory(_) => None,
        }
    }

    /// Borrow the directory handle, if this is one.
    pub fn as_directory(&self) -> Option<&Directory> {
        match self {
            Node::Directory(d) => Some(d),
            Node::File(_) => None,
        }
    }

    /// Unwrap into a file handle, if this is one.
    pub fn into_file(self) -> Option<File> {
        match self {
            Node::File(f) => Some(f),
            Node::Directory(_) => None,
        }
    }

    /// Unwrap into a directory handle, if this is one.
    pub fn into_directory(self) -> Option<Directory> {
        match self {
            Node::Directory(d) => Some(d),
            Node::File(_) => None,
        }
    }

    /// Size in bytes.
    pub async fn size(&self) -> VfsResult<u64> {
        self.filesystem().size(self.path()).await
    }

    /// Whether the entry still exists.
    pub async fn exists(&self) -> bool {
        self.filesystem().has(self.path()).await
    }

    /// Move the entry; the handle keeps its kind and follows the entry.
    pub async fn move_to(&mut self, new_path: impl AsRef<Path>) -> VfsResult<&mut Self> {
        match self {
            Node::File(f) => {
                f.move_to(new_path).await?;
            }
            Node::Directory(d) => {
                d.move_to(new_path).await?;
            }
        }
        Ok(self)
    }

    /// Copy the entry and return a handle of the same kind.
    pub async fn copy_to(&self, new_path: impl AsRef<Path>) -> VfsResult<Node> {
        Ok(match self {
            Node::File(f) => Node::File(f.copy_to(new_path).await?),
            Node::Directory(d) => Node::Directory(d.copy_to(new_path).await?),
        })
    }

    /// Delete the entry, consuming the handle.
    pub async fn delete(self) -> VfsResult<()> {
        match self {
            Node::File(f) => f.delete().await,
            Node::Directory(d) => d.delete().await,
        }
    }
}
