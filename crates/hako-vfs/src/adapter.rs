//! Adapter contract.
//!
//! An adapter translates the uniform VFS operations into primitive calls
//! on one storage backend, scoped under that backend's root. Everything it
//! returns is plain [`NodeMeta`]; turning metadata into handles is the
//! facade's job.

use std::future::Future;
use std::io;
use std::path::Path;
use std::pin::Pin;

use async_trait::async_trait;
use futures::{stream, StreamExt, TryStreamExt};
use hako_types::NodeMeta;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::io::{ReaderStream, StreamReader};

use crate::error::{VfsError, VfsResult};

/// Lazy, finite, non-restartable byte source.
pub type ReadStream = Pin<Box<dyn AsyncRead + Send>>;

/// Byte sink; the target is created (or truncated) when the sink is opened.
pub type WriteStream = Pin<Box<dyn AsyncWrite + Send>>;

/// Storage primitives a backend must provide.
///
/// All paths are backend-relative. A leading `/` is accepted and means the
/// adapter root. Metadata is returned with paths in virtual form (see
/// [`crate::path`]).
///
/// `update`, `put` and their stream variants are create-or-replace exactly
/// like `write`; they exist as provided methods so the equivalence holds
/// for every backend.
#[async_trait]
pub trait Adapter: Send + Sync {
    // ========================================================================
    // Reading
    // ========================================================================

    /// Check whether a file or directory exists.
    ///
    /// Never fails: any access error reads as `false`.
    async fn has(&self, path: &Path) -> bool;

    /// Classify an existing entry.
    async fn stat(&self, path: &Path) -> VfsResult<NodeMeta>;

    /// Read a whole file as bytes.
    async fn read_bytes(&self, path: &Path) -> VfsResult<Vec<u8>>;

    /// Read a file as a lazy byte stream.
    ///
    /// Nothing is opened until the first read; a missing file surfaces as
    /// an `io::Error` from that read.
    fn read_stream(&self, path: &Path) -> ReadStream;

    /// List the direct children of a directory, in backend order.
    async fn list_children(&self, path: &Path) -> VfsResult<Vec<NodeMeta>>;

    /// Size of the entry in bytes.
    async fn size(&self, path: &Path) -> VfsResult<u64>;

    /// Detected media type, or `None` when undetectable.
    ///
    /// Only I/O failures are errors; detection failure is `None`.
    async fn mime(&self, path: &Path) -> VfsResult<Option<String>>;

    // ========================================================================
    // Writing
    // ========================================================================

    /// Create or replace a file.
    async fn write(&self, path: &Path, contents: &[u8]) -> VfsResult<NodeMeta>;

    /// Open a sink that creates or replaces a file.
    async fn write_stream(&self, path: &Path) -> VfsResult<WriteStream>;

    /// Append to a file, creating it if missing.
    async fn append(&self, path: &Path, contents: &[u8]) -> VfsResult<NodeMeta>;

    /// Insert contents before the existing bytes of a file.
    async fn prepend(&self, path: &Path, contents: &[u8]) -> VfsResult<NodeMeta>;

    /// Move a file or directory. The result is not reclassified.
    async fn move_to(&self, path: &Path, new_path: &Path) -> VfsResult<NodeMeta>;

    /// Copy a file or a whole directory subtree. The result is not
    /// reclassified.
    async fn copy(&self, path: &Path, new_path: &Path) -> VfsResult<NodeMeta>;

    /// Delete a file, or a directory recursively.
    async fn delete(&self, path: &Path) -> VfsResult<()>;

    /// Create a directory and any missing parents. Idempotent.
    async fn make_directory(&self, path: &Path) -> VfsResult<NodeMeta>;

    // ========================================================================
    // Metadata
    // ========================================================================

    /// Returns true if this adapter refuses mutations.
    fn read_only(&self) -> bool;

    /// Real root directory, for backends that have one.
    fn root(&self) -> Option<&Path> {
        None
    }

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// Read a whole file as UTF-8 text.
    async fn read(&self, path: &Path) -> VfsResult<String> {
        let bytes = self.read_bytes(path).await?;
        String::from_utf8(bytes).map_err(|e| {
            VfsError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} is not valid UTF-8: {}", path.display(), e),
            ))
        })
    }

    /// Update a file. Same semantics as [`Adapter::write`].
    async fn update(&self, path: &Path, contents: &[u8]) -> VfsResult<NodeMeta> {
        self.write(path, contents).await
    }

    /// Create or update a file. Same semantics as [`Adapter::write`].
    async fn put(&self, path: &Path, contents: &[u8]) -> VfsResult<NodeMeta> {
        self.write(path, contents).await
    }

    /// Update a file through a sink. Same semantics as [`Adapter::write_stream`].
    async fn update_stream(&self, path: &Path) -> VfsResult<WriteStream> {
        self.write_stream(path).await
    }

    /// Create or update a file through a sink. Same semantics as
    /// [`Adapter::write_stream`].
    async fn put_stream(&self, path: &Path) -> VfsResult<WriteStream> {
        self.write_stream(path).await
    }
}

/// Build a [`ReadStream`] that runs `open` on first poll.
///
/// Errors from `open` are delivered through the reader as `io::Error`.
pub fn lazy_reader<F, R>(open: F) -> ReadStream
where
    F: Future<Output = VfsResult<R>> + Send + 'static,
    R: AsyncRead + Send + 'static,
{
    let chunks = stream::once(open)
        .map_err(io::Error::from)
        .map_ok(ReaderStream::new)
        .try_flatten()
        .boxed();
    Box::pin(StreamReader::new(chunks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_lazy_reader_yields_bytes() {
        let mut reader = lazy_reader(async { Ok::<_, VfsError>(Cursor::new(b"hello".to_vec())) });
        let mut out = String::new();
        reader.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn test_lazy_reader_defers_error() {
        let mut reader =
            lazy_reader(async { Err::<Cursor<Vec<u8>>, _>(VfsError::not_found("/gone")) });
        let mut buf = Vec::new();
        let err = reader.read_to_end(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
