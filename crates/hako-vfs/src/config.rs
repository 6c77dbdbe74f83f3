//! Local backend configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{VfsError, VfsResult};

/// Default buffer size for streamed copies (64 KiB).
pub const DEFAULT_COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Smallest buffer a config may ask for.
const MIN_COPY_BUFFER_SIZE: usize = 1024;

/// Configuration for a [`LocalBackend`](crate::LocalBackend).
///
/// ```toml
/// root = "/srv/data"
/// read_only = false        # default: false
/// atomic_prepend = true    # default: false
/// copy_buffer_size = 65536 # default: 64 KiB
/// staging_dir = "/var/tmp" # default: system temp dir
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Directory every adapter path is resolved against.
    pub root: PathBuf,

    /// Refuse all mutations.
    #[serde(default)]
    pub read_only: bool,

    /// Finish prepends with an atomic rename instead of an overwrite copy.
    ///
    /// The staged file is created next to the target so the rename stays
    /// on one filesystem. A failed prepend then leaves the target
    /// untouched, but the target is replaced by a new inode.
    #[serde(default)]
    pub atomic_prepend: bool,

    /// Buffer size for streamed copies during prepend.
    #[serde(default = "default_copy_buffer_size")]
    pub copy_buffer_size: usize,

    /// Where non-atomic prepends stage their temp file.
    ///
    /// Ignored with `atomic_prepend`, which always stages next to the
    /// target.
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,
}

fn default_copy_buffer_size() -> usize {
    DEFAULT_COPY_BUFFER_SIZE
}

impl LocalConfig {
    /// Create a config with defaults for everything but the root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            read_only: false,
            atomic_prepend: false,
            copy_buffer_size: DEFAULT_COPY_BUFFER_SIZE,
            staging_dir: None,
        }
    }

    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> VfsResult<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> VfsResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| VfsError::from_io(e, path))?;
        Self::from_toml_str(&text)
    }

    /// Set read-only mode.
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Set atomic prepend mode.
    pub fn with_atomic_prepend(mut self, atomic: bool) -> Self {
        self.atomic_prepend = atomic;
        self
    }

    /// Set the copy buffer size.
    pub fn with_copy_buffer_size(mut self, size: usize) -> Self {
        self.copy_buffer_size = size;
        self
    }

    /// Set the staging directory for non-atomic prepends.
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    /// Copy buffer size with the lower bound applied.
    pub fn effective_copy_buffer_size(&self) -> usize {
        self.copy_buffer_size.max(MIN_COPY_BUFFER_SIZE)
    }
}
