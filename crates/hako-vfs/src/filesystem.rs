//! The filesystem facade.
//!
//! [`Filesystem`] is the one object clients hold. It forwards every
//! operation to its adapter and turns the adapter's [`NodeMeta`] results
//! into live [`Node`] handles.

use std::path::Path;
use std::sync::Arc;

use hako_types::{NodeMeta, NodeType};

use crate::adapter::{Adapter, ReadStream, WriteStream};
use crate::backends::{LocalBackend, MemoryBackend};
use crate::config::LocalConfig;
use crate::error::{VfsError, VfsResult};
use crate::node::{Directory, File, Node};

/// Client-facing filesystem over a pluggable adapter.
///
/// Cheap to clone: clones share the same adapter. Handles keep a clone so
/// they can call back into the facade without the path being re-supplied.
#[derive(Clone)]
pub struct Filesystem {
    adapter: Arc<dyn Adapter>,
}

impl std::fmt::Debug for Filesystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Filesystem")
            .field("root", &self.adapter.root())
            .field("read_only", &self.adapter.read_only())
            .finish()
    }
}

impl Filesystem {
    /// Wrap an adapter.
    pub fn new(adapter: impl Adapter + 'static) -> Self {
        Self {
            adapter: Arc::new(adapter),
        }
    }

    /// Wrap an adapter that is already shared.
    pub fn from_arc(adapter: Arc<dyn Adapter>) -> Self {
        Self { adapter }
    }

    /// Filesystem over a local directory.
    pub fn local(root: impl Into<std::path::PathBuf>) -> Self {
        Self::new(LocalBackend::new(root))
    }

    /// Filesystem over a local directory, configured.
    pub fn from_config(config: &LocalConfig) -> Self {
        Self::new(LocalBackend::from_config(config))
    }

    /// Ephemeral in-memory filesystem.
    pub fn memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    /// The underlying adapter.
    pub fn adapter(&self) -> &Arc<dyn Adapter> {
        &self.adapter
    }

    // ========================================================================
    // Metadata → handles
    // ========================================================================

    /// Turn adapter metadata into a handle.
    ///
    /// `Unknown` metadata is refused rather than guessed at; callers should
    /// re-stat with [`Filesystem::node`].
    pub fn resolve(&self, meta: NodeMeta) -> VfsResult<Node> {
        match meta.kind {
            NodeType::File => Ok(Node::File(File::new(self.clone(), meta.path))),
            NodeType::Directory => Ok(Node::Directory(Directory::new(self.clone(), meta.path))),
            NodeType::Unknown => {
                tracing::debug!(path = %meta.path.display(), "refusing to resolve unclassified node");
                Err(VfsError::unknown_node_type(
                    meta.path.display().to_string(),
                    meta.kind,
                ))
            }
        }
    }

    fn resolve_file(&self, meta: NodeMeta) -> VfsResult<File> {
        match self.resolve(meta)? {
            Node::File(file) => Ok(file),
            Node::Directory(dir) => Err(VfsError::not_a_file(dir.path().display().to_string())),
        }
    }

    fn resolve_directory(&self, meta: NodeMeta) -> VfsResult<Directory> {
        match self.resolve(meta)? {
            Node::Directory(dir) => Ok(dir),
            Node::File(file) => Err(VfsError::not_a_directory(
                file.path().display().to_string(),
            )),
        }
    }

    /// Re-stat a path and return a handle of its real kind.
    pub async fn node(&self, path: impl AsRef<Path>) -> VfsResult<Node> {
        let meta = self.adapter.stat(path.as_ref()).await?;
        self.resolve(meta)
    }

    // ========================================================================
    // Reading
    // ========================================================================

    /// Check whether a file or directory exists.
    pub async fn has(&self, path: impl AsRef<Path>) -> bool {
        self.adapter.has(path.as_ref()).await
    }

    /// Read a file as UTF-8 text.
    pub async fn read(&self, path: impl AsRef<Path>) -> VfsResult<String> {
        self.adapter.read(path.as_ref()).await
    }

    /// Read a file as bytes.
    pub async fn read_bytes(&self, path: impl AsRef<Path>) -> VfsResult<Vec<u8>> {
        self.adapter.read_bytes(path.as_ref()).await
    }

    /// Read a file as a lazy byte stream.
    pub fn read_stream(&self, path: impl AsRef<Path>) -> ReadStream {
        self.adapter.read_stream(path.as_ref())
    }

    /// List the children of a directory as handles.
    pub async fn list_children(&self, path: impl AsRef<Path>) -> VfsResult<Vec<Node>> {
        self.adapter
            .list_children(path.as_ref())
            .await?
            .into_iter()
            .map(|meta| self.resolve(meta))
            .collect()
    }

    /// Size of a file or directory in bytes.
    pub async fn size(&self, path: impl AsRef<Path>) -> VfsResult<u64> {
        self.adapter.size(path.as_ref()).await
    }

    /// Detected media type of a file, `None` when undetectable.
    pub async fn mime(&self, path: impl AsRef<Path>) -> VfsResult<Option<String>> {
        self.adapter.mime(path.as_ref()).await
    }

    // ========================================================================
    // Writing
    // ========================================================================

    /// Create or replace a file.
    pub async fn write(&self, path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> VfsResult<File> {
        let meta = self.adapter.write(path.as_ref(), contents.as_ref()).await?;
        self.resolve_file(meta)
    }

    /// Open a sink that creates or replaces a file.
    pub async fn write_stream(&self, path: impl AsRef<Path>) -> VfsResult<WriteStream> {
        self.adapter.write_stream(path.as_ref()).await
    }

    /// Update a file (create-or-replace, like [`Filesystem::write`]).
    pub async fn update(&self, path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> VfsResult<File> {
        let meta = self.adapter.update(path.as_ref(), contents.as_ref()).await?;
        self.resolve_file(meta)
    }

    /// Update a file through a sink.
    pub async fn update_stream(&self, path: impl AsRef<Path>) -> VfsResult<WriteStream> {
        self.adapter.update_stream(path.as_ref()).await
    }

    /// Create or update a file (like [`Filesystem::write`]).
    pub async fn put(&self, path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> VfsResult<File> {
        let meta = self.adapter.put(path.as_ref(), contents.as_ref()).await?;
        self.resolve_file(meta)
    }

    /// Create or update a file through a sink.
    pub async fn put_stream(&self, path: impl AsRef<Path>) -> VfsResult<WriteStream> {
        self.adapter.put_stream(path.as_ref()).await
    }

    /// Append to a file, creating it if missing.
    pub async fn append(&self, path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> VfsResult<File> {
        let meta = self.adapter.append(path.as_ref(), contents.as_ref()).await?;
        self.resolve_file(meta)
    }

    /// Insert contents before the existing bytes of a file.
    pub async fn prepend(&self, path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> VfsResult<File> {
        let meta = self.adapter.prepend(path.as_ref(), contents.as_ref()).await?;
        self.resolve_file(meta)
    }

    /// Move a file or directory and return a handle to the destination.
    ///
    /// Backends do not classify move results, so this fails with
    /// `UnknownNodeType` *after* the move has happened. Use
    /// [`Filesystem::move_meta`] plus [`Filesystem::node`] to get a handle.
    pub async fn move_to(&self, path: impl AsRef<Path>, new_path: impl AsRef<Path>) -> VfsResult<Node> {
        let meta = self.move_meta(path, new_path).await?;
        self.resolve(meta)
    }

    /// Move a file or directory, returning the raw metadata.
    pub async fn move_meta(&self, path: impl AsRef<Path>, new_path: impl AsRef<Path>) -> VfsResult<NodeMeta> {
        self.adapter.move_to(path.as_ref(), new_path.as_ref()).await
    }

    /// Copy a file or directory and return a handle to the copy.
    ///
    /// Same `UnknownNodeType` caveat as [`Filesystem::move_to`].
    pub async fn copy(&self, path: impl AsRef<Path>, new_path: impl AsRef<Path>) -> VfsResult<Node> {
        let meta = self.copy_meta(path, new_path).await?;
        self.resolve(meta)
    }

    /// Copy a file or directory, returning the raw metadata.
    pub async fn copy_meta(&self, path: impl AsRef<Path>, new_path: impl AsRef<Path>) -> VfsResult<NodeMeta> {
        self.adapter.copy(path.as_ref(), new_path.as_ref()).await
    }

    /// Delete a file, or a directory recursively.
    pub async fn delete(&self, path: impl AsRef<Path>) -> VfsResult<()> {
        self.adapter.delete(path.as_ref()).await
    }

    /// Create a directory and any missing parents.
    pub async fn make_directory(&self, path: impl AsRef<Path>) -> VfsResult<Directory> {
        let meta = self.adapter.make_directory(path.as_ref()).await?;
        self.resolve_directory(meta)
    }
}
