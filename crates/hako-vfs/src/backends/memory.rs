//! In-memory filesystem backend.
//!
//! Used for scratch space and testing. All data is ephemeral.

use std::collections::HashMap;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use hako_types::{NodeMeta, NodeType};
use parking_lot::RwLock;
use tokio::io::AsyncWrite;

use crate::adapter::{lazy_reader, Adapter, ReadStream, WriteStream};
use crate::error::{VfsError, VfsResult};
use crate::mime;
use crate::path;

/// Entry in the memory filesystem.
#[derive(Debug, Clone)]
enum Entry {
    File { data: Vec<u8> },
    Directory,
}

impl Entry {
    fn kind(&self) -> NodeType {
        match self {
            Entry::File { .. } => NodeType::File,
            Entry::Directory => NodeType::Directory,
        }
    }
}

type Entries = HashMap<PathBuf, Entry>;

/// In-memory filesystem backend.
///
/// Thread-safe via internal `RwLock`. Clones share the same storage; all
/// data is lost when the last clone is dropped.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    entries: Arc<RwLock<Entries>>,
    read_only: bool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create a new empty in-memory filesystem.
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        // Root directory always exists
        entries.insert(PathBuf::new(), Entry::Directory);
        Self {
            entries: Arc::new(RwLock::new(entries)),
            read_only: false,
        }
    }

    /// Set whether this filesystem is read-only.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    fn check_writable(&self) -> VfsResult<()> {
        if self.read_only {
            Err(VfsError::ReadOnly)
        } else {
            Ok(())
        }
    }

    /// Get the path string for error messages.
    fn path_str(relative: &Path) -> String {
        path::to_virtual(relative).display().to_string()
    }

    /// Ensure all parent directories exist.
    fn ensure_parents(entries: &mut Entries, relative: &Path) -> VfsResult<()> {
        let mut current = PathBuf::new();
        for component in relative.parent().into_iter().flat_map(|p| p.components()) {
            current.push(component);
            match entries.get(&current) {
                Some(Entry::Directory) => {}
                Some(Entry::File { .. }) => {
                    return Err(VfsError::not_a_directory(Self::path_str(&current)));
                }
                None => {
                    entries.insert(current.clone(), Entry::Directory);
                }
            }
        }
        Ok(())
    }

    fn file_data<'a>(entries: &'a Entries, relative: &Path) -> VfsResult<&'a Vec<u8>> {
        match entries.get(relative) {
            Some(Entry::File { data }) => Ok(data),
            Some(Entry::Directory) => Err(VfsError::not_a_file(Self::path_str(relative))),
            None => Err(VfsError::not_found(Self::path_str(relative))),
        }
    }

    fn file_data_mut<'a>(entries: &'a mut Entries, relative: &Path) -> VfsResult<&'a mut Vec<u8>> {
        match entries.get_mut(relative) {
            Some(Entry::File { data }) => Ok(data),
            Some(Entry::Directory) => Err(VfsError::not_a_file(Self::path_str(relative))),
            None => Err(VfsError::not_found(Self::path_str(relative))),
        }
    }

    /// Create or truncate a file entry.
    fn replace_file(entries: &mut Entries, relative: &Path, data: Vec<u8>) -> VfsResult<()> {
        if relative.as_os_str().is_empty() || matches!(entries.get(relative), Some(Entry::Directory)) {
            return Err(VfsError::not_a_file(Self::path_str(relative)));
        }
        Self::ensure_parents(entries, relative)?;
        entries.insert(relative.to_path_buf(), Entry::File { data });
        Ok(())
    }

    /// Snapshot an entry and everything below it, keyed relative to it.
    fn subtree(entries: &Entries, relative: &Path) -> Vec<(PathBuf, Entry)> {
        entries
            .iter()
            .filter(|(k, _)| k.starts_with(relative))
            .filter_map(|(k, e)| {
                k.strip_prefix(relative)
                    .ok()
                    .map(|rest| (rest.to_path_buf(), e.clone()))
            })
            .collect()
    }

    fn remove_subtree(entries: &mut Entries, relative: &Path) {
        entries.retain(|k, _| !k.starts_with(relative));
    }

    /// Shared move/copy logic: place a snapshot of `from` at `to`.
    fn transplant(&self, from: &Path, to: &Path, remove_source: bool) -> VfsResult<NodeMeta> {
        self.check_writable()?;
        let from_normalized = path::normalize(from)?;
        let to_normalized = path::normalize(to)?;

        if from_normalized.as_os_str().is_empty() || to_normalized.as_os_str().is_empty() {
            return Err(VfsError::permission_denied("cannot move or copy over root"));
        }

        let mut entries = self.entries.write();

        if !entries.contains_key(&from_normalized) {
            return Err(VfsError::not_found(Self::path_str(&from_normalized)));
        }
        if to_normalized.starts_with(&from_normalized) {
            return Err(VfsError::invalid_path(format!(
                "cannot place {} inside itself",
                Self::path_str(&from_normalized)
            )));
        }

        // Only a file may replace a file; directories are never overwritten.
        let source_is_dir = matches!(entries.get(&from_normalized), Some(Entry::Directory));
        match entries.get(&to_normalized) {
            Some(Entry::Directory) => {
                return Err(VfsError::already_exists(Self::path_str(&to_normalized)));
            }
            Some(Entry::File { .. }) if source_is_dir => {
                return Err(VfsError::already_exists(Self::path_str(&to_normalized)));
            }
            _ => {}
        }

        let moved = Self::subtree(&entries, &from_normalized);
        Self::ensure_parents(&mut entries, &to_normalized)?;
        if remove_source {
            Self::remove_subtree(&mut entries, &from_normalized);
        }

        for (rest, entry) in moved {
            let key = if rest.as_os_str().is_empty() {
                to_normalized.clone()
            } else {
                to_normalized.join(rest)
            };
            entries.insert(key, entry);
        }

        Ok(NodeMeta::unknown(path::to_virtual(&to_normalized)))
    }
}

/// Sink that commits each written chunk straight into the entry map.
struct MemoryWriter {
    entries: Arc<RwLock<Entries>>,
    key: PathBuf,
}

impl AsyncWrite for MemoryWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut entries = self.entries.write();
        let result = MemoryBackend::file_data_mut(&mut entries, &self.key)
            .map(|data| {
                data.extend_from_slice(buf);
                buf.len()
            })
            .map_err(io::Error::from);
        Poll::Ready(result)
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[async_trait]
impl Adapter for MemoryBackend {
    async fn has(&self, path: &Path) -> bool {
        match path::normalize(path) {
            Ok(normalized) => self.entries.read().contains_key(&normalized),
            Err(_) => false,
        }
    }

    async fn stat(&self, path: &Path) -> VfsResult<NodeMeta> {
        let normalized = path::normalize(path)?;
        let entries = self.entries.read();
        entries
            .get(&normalized)
            .map(|e| NodeMeta::new(path::to_virtual(&normalized), e.kind()))
            .ok_or_else(|| VfsError::not_found(Self::path_str(&normalized)))
    }

    async fn read_bytes(&self, path: &Path) -> VfsResult<Vec<u8>> {
        let normalized = path::normalize(path)?;
        let entries = self.entries.read();
        Self::file_data(&entries, &normalized).cloned()
    }

    fn read_stream(&self, path: &Path) -> ReadStream {
        let entries = Arc::clone(&self.entries);
        let path = path.to_path_buf();
        lazy_reader(async move {
            let normalized = path::normalize(&path)?;
            let data = Self::file_data(&entries.read(), &normalized)?.clone();
            Ok::<_, VfsError>(Cursor::new(data))
        })
    }

    async fn list_children(&self, path: &Path) -> VfsResult<Vec<NodeMeta>> {
        let normalized = path::normalize(path)?;
        let entries = self.entries.read();

        match entries.get(&normalized) {
            Some(Entry::Directory) => {}
            Some(_) => return Err(VfsError::not_a_directory(Self::path_str(&normalized))),
            None => return Err(VfsError::not_found(Self::path_str(&normalized))),
        }

        let mut result: Vec<NodeMeta> = entries
            .iter()
            .filter(|(k, _)| k.parent() == Some(normalized.as_path()))
            .map(|(k, e)| NodeMeta::new(path::to_virtual(k), e.kind()))
            .collect();

        // Sort for consistent ordering
        result.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(result)
    }

    async fn size(&self, path: &Path) -> VfsResult<u64> {
        let normalized = path::normalize(path)?;
        let entries = self.entries.read();
        match entries.get(&normalized) {
            Some(Entry::File { data }) => Ok(data.len() as u64),
            Some(Entry::Directory) => Ok(0),
            None => Err(VfsError::not_found(Self::path_str(&normalized))),
        }
    }

    async fn mime(&self, path: &Path) -> VfsResult<Option<String>> {
        let normalized = path::normalize(path)?;
        let entries = self.entries.read();
        let data = Self::file_data(&entries, &normalized)?;
        let head = &data[..data.len().min(mime::SNIFF_LEN)];
        Ok(mime::sniff(head).map(str::to_string))
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> VfsResult<NodeMeta> {
        self.check_writable()?;
        let normalized = path::normalize(path)?;
        Self::replace_file(&mut self.entries.write(), &normalized, contents.to_vec())?;
        Ok(NodeMeta::file(path::to_virtual(&normalized)))
    }

    async fn write_stream(&self, path: &Path) -> VfsResult<WriteStream> {
        self.check_writable()?;
        let normalized = path::normalize(path)?;
        Self::replace_file(&mut self.entries.write(), &normalized, Vec::new())?;
        Ok(Box::pin(MemoryWriter {
            entries: Arc::clone(&self.entries),
            key: normalized,
        }))
    }

    async fn append(&self, path: &Path, contents: &[u8]) -> VfsResult<NodeMeta> {
        self.check_writable()?;
        let normalized = path::normalize(path)?;
        let mut entries = self.entries.write();

        if !entries.contains_key(&normalized) {
            Self::replace_file(&mut entries, &normalized, Vec::new())?;
        }
        Self::file_data_mut(&mut entries, &normalized)?.extend_from_slice(contents);

        Ok(NodeMeta::file(path::to_virtual(&normalized)))
    }

    async fn prepend(&self, path: &Path, contents: &[u8]) -> VfsResult<NodeMeta> {
        self.check_writable()?;
        let normalized = path::normalize(path)?;
        let mut entries = self.entries.write();

        let data = Self::file_data_mut(&mut entries, &normalized)?;
        let mut joined = Vec::with_capacity(contents.len() + data.len());
        joined.extend_from_slice(contents);
        joined.extend_from_slice(data);
        *data = joined;

        Ok(NodeMeta::file(path::to_virtual(&normalized)))
    }

    async fn move_to(&self, path: &Path, new_path: &Path) -> VfsResult<NodeMeta> {
        self.transplant(path, new_path, true)
    }

    async fn copy(&self, path: &Path, new_path: &Path) -> VfsResult<NodeMeta> {
        self.transplant(path, new_path, false)
    }

    async fn delete(&self, path: &Path) -> VfsResult<()> {
        self.check_writable()?;
        let normalized = path::normalize(path)?;

        if normalized.as_os_str().is_empty() {
            return Err(VfsError::permission_denied("cannot remove root"));
        }

        let mut entries = self.entries.write();
        if !entries.contains_key(&normalized) {
            return Err(VfsError::not_found(Self::path_str(&normalized)));
        }
        Self::remove_subtree(&mut entries, &normalized);
        Ok(())
    }

    async fn make_directory(&self, path: &Path) -> VfsResult<NodeMeta> {
        self.check_writable()?;
        let normalized = path::normalize(path)?;
        let mut entries = self.entries.write();

        Self::ensure_parents(&mut entries, &normalized)?;
        match entries.get(&normalized) {
            Some(Entry::Directory) => {}
            Some(Entry::File { .. }) => {
                return Err(VfsError::already_exists(Self::path_str(&normalized)));
            }
            None => {
                entries.insert(normalized.clone(), Entry::Directory);
            }
        }

        Ok(NodeMeta::directory(path::to_virtual(&normalized)))
    }

    fn read_only(&self) -> bool {
        self.read_only
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_write_and_read() {
        let fs = MemoryBackend::new();
        let meta = fs.write(Path::new("test.txt"), b"hello world").await.unwrap();
        assert_eq!(meta, NodeMeta::file("/test.txt"));

        let data = fs.read(Path::new("test.txt")).await.unwrap();
        assert_eq!(data, "hello world");
    }

    #[tokio::test]
    async fn test_make_directory_and_list() {
        let fs = MemoryBackend::new();
        fs.make_directory(Path::new("subdir")).await.unwrap();
        fs.write(Path::new("subdir/file.txt"), b"").await.unwrap();
        fs.write(Path::new("root.txt"), b"").await.unwrap();

        let entries = fs.list_children(Path::new("")).await.unwrap();
        assert_eq!(
            entries,
            vec![NodeMeta::file("/root.txt"), NodeMeta::directory("/subdir")]
        );

        let subentries = fs.list_children(Path::new("subdir")).await.unwrap();
        assert_eq!(subentries, vec![NodeMeta::file("/subdir/file.txt")]);
    }

    #[tokio::test]
    async fn test_list_children_errors() {
        let fs = MemoryBackend::new();
        fs.write(Path::new("f"), b"").await.unwrap();

        assert!(matches!(
            fs.list_children(Path::new("f")).await,
            Err(VfsError::NotADirectory(_))
        ));
        assert!(matches!(
            fs.list_children(Path::new("missing")).await,
            Err(VfsError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_recursive() {
        let fs = MemoryBackend::new();
        fs.write(Path::new("d/e/f.txt"), b"x").await.unwrap();
        assert!(fs.has(Path::new("d/e")).await);

        fs.delete(Path::new("d")).await.unwrap();
        assert!(!fs.has(Path::new("d")).await);
        assert!(!fs.has(Path::new("d/e/f.txt")).await);
        assert!(fs.delete(Path::new("d")).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_move_subtree() {
        let fs = MemoryBackend::new();
        fs.write(Path::new("old/a.txt"), b"content").await.unwrap();

        let meta = fs
            .move_to(Path::new("old"), Path::new("new"))
            .await
            .unwrap();
        assert_eq!(meta, NodeMeta::unknown("/new"));

        assert!(!fs.has(Path::new("old")).await);
        assert!(!fs.has(Path::new("old/a.txt")).await);
        assert_eq!(fs.read(Path::new("new/a.txt")).await.unwrap(), "content");
    }

    #[tokio::test]
    async fn test_copy_subtree() {
        let fs = MemoryBackend::new();
        fs.write(Path::new("src/a.txt"), b"a").await.unwrap();

        fs.copy(Path::new("src"), Path::new("dst/copy")).await.unwrap();
        assert_eq!(fs.read(Path::new("dst/copy/a.txt")).await.unwrap(), "a");
        assert_eq!(fs.read(Path::new("src/a.txt")).await.unwrap(), "a");

        let err = fs
            .copy(Path::new("src"), Path::new("src/again"))
            .await
            .unwrap_err();
        assert!(matches!(err, VfsError::InvalidPath(_)));
    }

    #[tokio::test]
    async fn test_copy_onto_itself_keeps_contents() {
        let fs = MemoryBackend::new();
        fs.write(Path::new("a.txt"), b"precious").await.unwrap();

        let err = fs
            .copy(Path::new("a.txt"), Path::new("/./a.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, VfsError::InvalidPath(_)));
        assert_eq!(fs.read(Path::new("a.txt")).await.unwrap(), "precious");
    }

    #[tokio::test]
    async fn test_transplant_never_overwrites_directories() {
        let fs = MemoryBackend::new();
        fs.write(Path::new("src/a.txt"), b"a").await.unwrap();
        fs.write(Path::new("dst/keep.txt"), b"keep").await.unwrap();
        fs.write(Path::new("file.txt"), b"f").await.unwrap();
        fs.write(Path::new("other.txt"), b"o").await.unwrap();

        let err = fs
            .copy(Path::new("src"), Path::new("dst"))
            .await
            .unwrap_err();
        assert!(matches!(err, VfsError::AlreadyExists(_)));
        let err = fs
            .move_to(Path::new("file.txt"), Path::new("dst"))
            .await
            .unwrap_err();
        assert!(matches!(err, VfsError::AlreadyExists(_)));
        let err = fs
            .move_to(Path::new("src"), Path::new("file.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, VfsError::AlreadyExists(_)));

        assert_eq!(fs.read(Path::new("dst/keep.txt")).await.unwrap(), "keep");
        assert!(fs.has(Path::new("src/a.txt")).await);
        assert!(fs.has(Path::new("file.txt")).await);

        // A file may still replace a file.
        fs.move_to(Path::new("other.txt"), Path::new("file.txt"))
            .await
            .unwrap();
        assert_eq!(fs.read(Path::new("file.txt")).await.unwrap(), "o");
        assert!(!fs.has(Path::new("other.txt")).await);
    }

    #[tokio::test]
    async fn test_append_and_prepend() {
        let fs = MemoryBackend::new();
        fs.write(Path::new("f"), b"mid").await.unwrap();

        fs.append(Path::new("f"), b"-end").await.unwrap();
        fs.prepend(Path::new("f"), b"start-").await.unwrap();
        assert_eq!(fs.read(Path::new("f")).await.unwrap(), "start-mid-end");

        assert!(fs.prepend(Path::new("missing"), b"x").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_streams() {
        let fs = MemoryBackend::new();

        let mut sink = fs.write_stream(Path::new("s/out.txt")).await.unwrap();
        sink.write_all(b"one ").await.unwrap();
        sink.write_all(b"two").await.unwrap();
        sink.shutdown().await.unwrap();

        let mut out = String::new();
        fs.read_stream(Path::new("s/out.txt"))
            .read_to_string(&mut out)
            .await
            .unwrap();
        assert_eq!(out, "one two");

        let err = fs
            .read_stream(Path::new("missing"))
            .read_to_end(&mut Vec::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_write_over_directory_fails() {
        let fs = MemoryBackend::new();
        fs.make_directory(Path::new("d")).await.unwrap();

        assert!(matches!(
            fs.write(Path::new("d"), b"x").await,
            Err(VfsError::NotAFile(_))
        ));
        fs.write(Path::new("d/f/g"), b"x").await.unwrap();
        assert!(matches!(
            fs.write(Path::new("d/f/g/h"), b"x").await,
            Err(VfsError::NotADirectory(_))
        ));
    }

    #[tokio::test]
    async fn test_make_directory_idempotent() {
        let fs = MemoryBackend::new();
        fs.make_directory(Path::new("a/b")).await.unwrap();
        fs.make_directory(Path::new("a/b")).await.unwrap();

        assert_eq!(fs.list_children(Path::new("a")).await.unwrap().len(), 1);
        assert_eq!(
            fs.stat(Path::new("a")).await.unwrap(),
            NodeMeta::directory("/a")
        );
    }

    #[tokio::test]
    async fn test_mime() {
        let fs = MemoryBackend::new();
        fs.write(Path::new("a.txt"), b"text").await.unwrap();
        fs.write(Path::new("empty"), b"").await.unwrap();

        assert_eq!(
            fs.mime(Path::new("a.txt")).await.unwrap().as_deref(),
            Some("text/plain")
        );
        assert_eq!(fs.mime(Path::new("empty")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_only() {
        let mut fs = MemoryBackend::new();
        fs.write(Path::new("f"), b"x").await.unwrap();
        fs.set_read_only(true);

        assert!(matches!(fs.write(Path::new("f"), b"y").await, Err(VfsError::ReadOnly)));
        assert!(matches!(fs.delete(Path::new("f")).await, Err(VfsError::ReadOnly)));
        assert_eq!(fs.read(Path::new("f")).await.unwrap(), "x");
    }

    #[tokio::test]
    async fn test_path_normalization() {
        let fs = MemoryBackend::new();
        fs.write(Path::new("/a/b/c.txt"), b"").await.unwrap();

        // Various path forms should all work
        assert!(fs.has(Path::new("a/b/c.txt")).await);
        assert!(fs.has(Path::new("/a/b/c.txt")).await);
        assert!(fs.has(Path::new("a/./b/c.txt")).await);
        assert!(fs.has(Path::new("a/b/../b/c.txt")).await);
        assert!(!fs.has(Path::new("../a/b/c.txt")).await);
    }
}
