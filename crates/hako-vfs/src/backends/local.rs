//! Local filesystem backend.
//!
//! Provides access to real filesystem paths, with path security
//! to prevent escaping the root directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use hako_types::{NodeMeta, NodeType};
use tempfile::NamedTempFile;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};

use crate::adapter::{lazy_reader, Adapter, ReadStream, WriteStream};
use crate::config::{LocalConfig, DEFAULT_COPY_BUFFER_SIZE};
use crate::error::{VfsError, VfsResult};
use crate::mime;
use crate::path;

/// Local filesystem backend.
///
/// All operations are relative to `root`. For example, if `root` is
/// `/home/amy/project`, then `read("src/main.rs")` reads
/// `/home/amy/project/src/main.rs`.
///
/// Path security is enforced: `..` cannot climb above the root, and
/// symlinks that lead outside it are refused.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
    read_only: bool,
    atomic_prepend: bool,
    copy_buffer_size: usize,
    staging_dir: Option<PathBuf>,
}

impl LocalBackend {
    /// Create a new local filesystem rooted at the given path.
    ///
    /// The root is canonicalized at construction time to handle symlinks
    /// (e.g. macOS `/tmp` → `/private/tmp`).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Self::canonical_root(root.into()),
            read_only: false,
            atomic_prepend: false,
            copy_buffer_size: DEFAULT_COPY_BUFFER_SIZE,
            staging_dir: None,
        }
    }

    /// Create a read-only local filesystem.
    pub fn read_only(root: impl Into<PathBuf>) -> Self {
        Self {
            read_only: true,
            ..Self::new(root)
        }
    }

    /// Create a local filesystem from a config.
    pub fn from_config(config: &LocalConfig) -> Self {
        Self {
            root: Self::canonical_root(config.root.clone()),
            read_only: config.read_only,
            atomic_prepend: config.atomic_prepend,
            copy_buffer_size: config.effective_copy_buffer_size(),
            staging_dir: config.staging_dir.clone(),
        }
    }

    /// Set whether this filesystem is read-only.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Set whether prepend finishes with an atomic rename.
    pub fn set_atomic_prepend(&mut self, atomic: bool) {
        self.atomic_prepend = atomic;
    }

    fn canonical_root(root: PathBuf) -> PathBuf {
        dunce::canonicalize(&root).unwrap_or(root)
    }

    /// Resolve a backend-relative path to an absolute path within the root.
    ///
    /// The final component is not followed, so a symlink can be deleted or
    /// moved as itself. If it is a symlink, its target must still lie
    /// under the root.
    async fn resolve(&self, path: &Path) -> VfsResult<PathBuf> {
        let relative = path::normalize(path)?;

        // Handle empty path (root)
        if relative.as_os_str().is_empty() {
            return Ok(self.root.clone());
        }

        let full = self.root.join(&relative);
        let (Some(parent), Some(name)) = (full.parent(), full.file_name()) else {
            return Err(VfsError::invalid_path(path.display().to_string()));
        };

        let parent = Self::canonicalize_existing(parent)?;
        self.confine(&parent, path)?;
        let resolved = parent.join(name);

        let is_link = fs::symlink_metadata(&resolved)
            .await
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false);
        if is_link {
            // Dangling links have nothing to escape to.
            if let Ok(target) = dunce::canonicalize(&resolved) {
                self.confine(&target, path)?;
            }
        }

        Ok(resolved)
    }

    /// Canonicalize the deepest existing ancestor and re-append the rest.
    fn canonicalize_existing(path: &Path) -> VfsResult<PathBuf> {
        let mut existing = path;
        let mut rest = Vec::new();
        loop {
            if existing.exists() {
                let mut canonical = dunce::canonicalize(existing)
                    .map_err(|e| VfsError::from_io(e, existing))?;
                canonical.extend(rest.iter().rev());
                return Ok(canonical);
            }
            match (existing.parent(), existing.file_name()) {
                (Some(parent), Some(name)) => {
                    rest.push(name.to_owned());
                    existing = parent;
                }
                _ => return Ok(path.to_path_buf()),
            }
        }
    }

    /// Verify a canonical path has not escaped the root.
    fn confine(&self, canonical: &Path, requested: &Path) -> VfsResult<()> {
        if canonical.starts_with(&self.root) {
            Ok(())
        } else {
            Err(VfsError::path_escapes_root(format!(
                "{} is not under {}",
                requested.display(),
                self.root.display()
            )))
        }
    }

    /// Check if write operations are allowed.
    fn check_writable(&self) -> VfsResult<()> {
        if self.read_only {
            Err(VfsError::ReadOnly)
        } else {
            Ok(())
        }
    }

    /// Refuse operations that would remove or replace the root itself.
    fn check_not_root(path: &Path) -> VfsResult<()> {
        if path::normalize(path)?.as_os_str().is_empty() {
            Err(VfsError::permission_denied("cannot move or remove root"))
        } else {
            Ok(())
        }
    }

    /// Ensure the parent directory of `full` exists.
    async fn ensure_parent(full: &Path) -> VfsResult<()> {
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| VfsError::from_io(e, parent))?;
        }
        Ok(())
    }

    fn classify(file_type: &std::fs::FileType) -> NodeType {
        if file_type.is_dir() {
            NodeType::Directory
        } else if file_type.is_file() {
            NodeType::File
        } else {
            NodeType::Unknown
        }
    }

    /// Refuse moving or copying onto a directory, or a directory onto a file.
    async fn check_destination(to: &Path, new_path: &Path, source_is_dir: bool) -> VfsResult<()> {
        match fs::symlink_metadata(to).await {
            Ok(existing) if existing.is_dir() || source_is_dir => {
                Err(VfsError::already_exists(new_path.display().to_string()))
            }
            _ => Ok(()),
        }
    }

    /// Refuse placing a node at or below itself.
    fn check_not_nested(from: &Path, to: &Path, path: &Path) -> VfsResult<()> {
        if to.starts_with(from) {
            Err(VfsError::invalid_path(format!(
                "cannot place {} inside itself",
                path.display()
            )))
        } else {
            Ok(())
        }
    }

    /// Recreate a symlink as a link, never copying what it points at.
    async fn copy_link(src: &Path, dst: &Path) -> VfsResult<()> {
        let target = fs::read_link(src)
            .await
            .map_err(|e| VfsError::from_io(e, src))?;

        #[cfg(unix)]
        let linked = fs::symlink(&target, dst).await;
        #[cfg(windows)]
        let linked = match fs::metadata(src).await {
            Ok(meta) if meta.is_dir() => fs::symlink_dir(&target, dst).await,
            _ => fs::symlink_file(&target, dst).await,
        };
        #[cfg(not(any(unix, windows)))]
        let linked: std::io::Result<()> = Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            format!("cannot copy symlink to {}", target.display()),
        ));

        linked.map_err(|e| VfsError::from_io(e, dst))
    }

    /// Copy a directory subtree without recursion.
    ///
    /// Symlinks inside the tree are copied as links, so the copy never
    /// pulls in content from outside the root.
    async fn copy_tree(from: &Path, to: &Path) -> VfsResult<()> {
        let mut pending = vec![(from.to_path_buf(), to.to_path_buf())];

        while let Some((src, dst)) = pending.pop() {
            fs::create_dir_all(&dst)
                .await
                .map_err(|e| VfsError::from_io(e, &dst))?;

            let mut dir = fs::read_dir(&src)
                .await
                .map_err(|e| VfsError::from_io(e, &src))?;
            while let Some(entry) = dir.next_entry().await? {
                let target = dst.join(entry.file_name());
                let file_type = entry.file_type().await?;
                if file_type.is_symlink() {
                    Self::copy_link(&entry.path(), &target).await?;
                } else if file_type.is_dir() {
                    pending.push((entry.path(), target));
                } else {
                    fs::copy(entry.path(), &target)
                        .await
                        .map_err(|e| VfsError::from_io(e, &entry.path()))?;
                }
            }
        }

        Ok(())
    }

    /// Stream `source` onto `sink` through a bounded buffer.
    async fn pipe(&self, source: fs::File, sink: &mut fs::File) -> VfsResult<u64> {
        let mut reader = BufReader::with_capacity(self.copy_buffer_size, source);
        let copied = tokio::io::copy_buf(&mut reader, sink).await?;
        sink.flush().await?;
        Ok(copied)
    }
}

#[async_trait]
impl Adapter for LocalBackend {
    async fn has(&self, path: &Path) -> bool {
        match self.resolve(path).await {
            Ok(full) => fs::metadata(&full).await.is_ok(),
            Err(_) => false,
        }
    }

    async fn stat(&self, path: &Path) -> VfsResult<NodeMeta> {
        let full = self.resolve(path).await?;
        let meta = fs::metadata(&full)
            .await
            .map_err(|e| VfsError::from_io(e, path))?;
        Ok(NodeMeta::new(
            path::virtualize(path)?,
            Self::classify(&meta.file_type()),
        ))
    }

    async fn read_bytes(&self, path: &Path) -> VfsResult<Vec<u8>> {
        let full = self.resolve(path).await?;
        fs::read(&full).await.map_err(|e| VfsError::from_io(e, path))
    }

    fn read_stream(&self, path: &Path) -> ReadStream {
        let backend = self.clone();
        let path = path.to_path_buf();
        lazy_reader(async move {
            let full = backend.resolve(&path).await?;
            fs::File::open(&full)
                .await
                .map_err(|e| VfsError::from_io(e, &path))
        })
    }

    async fn list_children(&self, path: &Path) -> VfsResult<Vec<NodeMeta>> {
        let full = self.resolve(path).await?;
        let base = path::virtualize(path)?;

        let meta = fs::metadata(&full)
            .await
            .map_err(|e| VfsError::from_io(e, path))?;
        if !meta.is_dir() {
            return Err(VfsError::not_a_directory(path.display().to_string()));
        }

        let mut children = Vec::new();
        let mut dir = fs::read_dir(&full)
            .await
            .map_err(|e| VfsError::from_io(e, path))?;

        while let Some(entry) = dir.next_entry().await? {
            let file_type = entry.file_type().await?;
            let kind = if file_type.is_symlink() {
                match fs::metadata(entry.path()).await {
                    Ok(target) => Self::classify(&target.file_type()),
                    Err(_) => NodeType::Unknown,
                }
            } else {
                Self::classify(&file_type)
            };

            children.push(NodeMeta::new(base.join(entry.file_name()), kind));
        }

        Ok(children)
    }

    async fn size(&self, path: &Path) -> VfsResult<u64> {
        let full = self.resolve(path).await?;
        let meta = fs::metadata(&full)
            .await
            .map_err(|e| VfsError::from_io(e, path))?;
        Ok(meta.len())
    }

    async fn mime(&self, path: &Path) -> VfsResult<Option<String>> {
        let full = self.resolve(path).await?;
        let file = fs::File::open(&full)
            .await
            .map_err(|e| VfsError::from_io(e, path))?;

        let mut head = Vec::with_capacity(mime::SNIFF_LEN);
        file.take(mime::SNIFF_LEN as u64)
            .read_to_end(&mut head)
            .await
            .map_err(|e| VfsError::from_io(e, path))?;

        Ok(mime::sniff(&head).map(str::to_string))
    }

    #[tracing::instrument(skip(self, contents), fields(len = contents.len()), name = "vfs.local.write")]
    async fn write(&self, path: &Path, contents: &[u8]) -> VfsResult<NodeMeta> {
        self.check_writable()?;
        let full = self.resolve(path).await?;
        Self::ensure_parent(&full).await?;

        fs::write(&full, contents)
            .await
            .map_err(|e| VfsError::from_io(e, path))?;

        Ok(NodeMeta::file(path::virtualize(path)?))
    }

    async fn write_stream(&self, path: &Path) -> VfsResult<WriteStream> {
        self.check_writable()?;
        let full = self.resolve(path).await?;
        Self::ensure_parent(&full).await?;

        let file = fs::File::create(&full)
            .await
            .map_err(|e| VfsError::from_io(e, path))?;
        Ok(Box::pin(file))
    }

    #[tracing::instrument(skip(self, contents), fields(len = contents.len()), name = "vfs.local.append")]
    async fn append(&self, path: &Path, contents: &[u8]) -> VfsResult<NodeMeta> {
        self.check_writable()?;
        let full = self.resolve(path).await?;
        Self::ensure_parent(&full).await?;

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&full)
            .await
            .map_err(|e| VfsError::from_io(e, path))?;
        file.write_all(contents).await?;
        file.flush().await?;

        Ok(NodeMeta::file(path::virtualize(path)?))
    }

    /// Prepend through a scoped temp file in three stages:
    ///
    /// - A: write `contents` to the temp file
    /// - B: stream the original file onto the end of the temp file
    /// - C: stream the temp file over the original (or, with
    ///   `atomic_prepend`, rename it over the original)
    ///
    /// The temp file is removed on every exit path when it drops. Without
    /// `atomic_prepend` the target is untouched until stage C starts, and
    /// a failure during stage C can leave it partially overwritten.
    #[tracing::instrument(skip(self, contents), fields(len = contents.len()), name = "vfs.local.prepend")]
    async fn prepend(&self, path: &Path, contents: &[u8]) -> VfsResult<NodeMeta> {
        self.check_writable()?;
        let full = self.resolve(path).await?;
        let meta = NodeMeta::file(path::virtualize(path)?);

        let original = fs::metadata(&full)
            .await
            .map_err(|e| VfsError::from_io(e, path))?;
        if !original.is_file() {
            return Err(VfsError::not_a_file(path.display().to_string()));
        }

        let staging_dir = if self.atomic_prepend {
            full.parent()
        } else {
            self.staging_dir.as_deref()
        };
        let staged = match staging_dir {
            Some(dir) => NamedTempFile::new_in(dir),
            None => NamedTempFile::new(),
        }?;

        fs::write(staged.path(), contents).await?;
        tracing::debug!(staged = %staged.path().display(), "stage A: contents staged");

        let source = fs::File::open(&full)
            .await
            .map_err(|e| VfsError::from_io(e, path))?;
        let mut sink = fs::OpenOptions::new()
            .append(true)
            .open(staged.path())
            .await?;
        let copied = self.pipe(source, &mut sink).await?;
        drop(sink);
        tracing::debug!(bytes = copied, "stage B: original appended to staged file");

        if self.atomic_prepend {
            fs::set_permissions(staged.path(), original.permissions()).await?;
            staged.persist(&full).map_err(|e| VfsError::Io(e.error))?;
            tracing::debug!("stage C: staged file renamed over target");
            return Ok(meta);
        }

        let source = fs::File::open(staged.path()).await?;
        let mut target = fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&full)
            .await
            .map_err(|e| VfsError::from_io(e, path))?;
        let written = self.pipe(source, &mut target).await?;
        drop(target);
        tracing::debug!(bytes = written, "stage C: staged file copied over target");

        if let Err(e) = staged.close() {
            tracing::warn!(error = %e, "failed to release prepend staging file");
        }

        Ok(meta)
    }

    #[tracing::instrument(skip(self), name = "vfs.local.move")]
    async fn move_to(&self, path: &Path, new_path: &Path) -> VfsResult<NodeMeta> {
        self.check_writable()?;
        Self::check_not_root(path)?;
        let from = self.resolve(path).await?;
        let to = self.resolve(new_path).await?;

        let source = fs::symlink_metadata(&from)
            .await
            .map_err(|e| VfsError::from_io(e, path))?;
        Self::check_not_nested(&from, &to, path)?;
        Self::check_destination(&to, new_path, source.is_dir()).await?;
        Self::ensure_parent(&to).await?;

        fs::rename(&from, &to)
            .await
            .map_err(|e| VfsError::from_io(e, new_path))?;

        Ok(NodeMeta::unknown(path::virtualize(new_path)?))
    }

    #[tracing::instrument(skip(self), name = "vfs.local.copy")]
    async fn copy(&self, path: &Path, new_path: &Path) -> VfsResult<NodeMeta> {
        self.check_writable()?;
        let from = self.resolve(path).await?;
        let to = self.resolve(new_path).await?;

        let meta = fs::metadata(&from)
            .await
            .map_err(|e| VfsError::from_io(e, path))?;
        // fs::copy truncates the destination before reading the source.
        Self::check_not_nested(&from, &to, path)?;
        Self::check_destination(&to, new_path, meta.is_dir()).await?;

        if meta.is_dir() {
            Self::copy_tree(&from, &to).await?;
        } else {
            Self::ensure_parent(&to).await?;
            fs::copy(&from, &to)
                .await
                .map_err(|e| VfsError::from_io(e, path))?;
        }

        Ok(NodeMeta::unknown(path::virtualize(new_path)?))
    }

    #[tracing::instrument(skip(self), name = "vfs.local.delete")]
    async fn delete(&self, path: &Path) -> VfsResult<()> {
        self.check_writable()?;
        Self::check_not_root(path)?;
        let full = self.resolve(path).await?;

        let meta = fs::symlink_metadata(&full)
            .await
            .map_err(|e| VfsError::from_io(e, path))?;

        let removed = if meta.is_dir() {
            fs::remove_dir_all(&full).await
        } else {
            fs::remove_file(&full).await
        };
        removed.map_err(|e| VfsError::from_io(e, path))
    }

    async fn make_directory(&self, path: &Path) -> VfsResult<NodeMeta> {
        self.check_writable()?;
        let full = self.resolve(path).await?;

        fs::create_dir_all(&full)
            .await
            .map_err(|e| VfsError::from_io(e, path))?;

        Ok(NodeMeta::directory(path::virtualize(path)?))
    }

    fn read_only(&self) -> bool {
        self.read_only
    }

    fn root(&self) -> Option<&Path> {
        Some(&self.root)
    }
}
