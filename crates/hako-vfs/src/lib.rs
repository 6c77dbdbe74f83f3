//! Backend-agnostic virtual filesystem.
//!
//! Clients talk to a [`Filesystem`], which forwards every operation to a
//! pluggable [`Adapter`] and hands back typed [`File`] and [`Directory`]
//! handles. Key components:
//!
//! - [`Adapter`] - Storage primitives a backend provides
//! - [`LocalBackend`] - Local directory tree, confined to its root
//! - [`MemoryBackend`] - In-memory tree (for tests and scratch space)
//! - [`Filesystem`] - Facade that turns metadata into handles
//!
//! ## Design Decisions
//!
//! - **Path-based handles**: a handle is a filesystem plus a path. Nothing
//!   is cached, so a stale handle reports errors instead of old data.
//! - **Adapters return metadata, not handles**: the facade owns handle
//!   construction and refuses to guess when an adapter cannot classify.
//! - **Streams are lazy**: read streams open on first poll; write streams
//!   create or truncate their target when opened.
//!
//! ```no_run
//! # async fn demo() -> hako_vfs::VfsResult<()> {
//! let fs = hako_vfs::Filesystem::local("/srv/data");
//! let file = fs.write("/notes/today.txt", "hello").await?;
//! file.append(", world").await?;
//! assert_eq!(file.read().await?, "hello, world");
//! # Ok(())
//! # }
//! ```

mod adapter;
pub mod backends;
mod config;
mod error;
mod filesystem;
pub mod mime;
mod node;
pub mod path;

pub use adapter::{lazy_reader, Adapter, ReadStream, WriteStream};
pub use backends::{LocalBackend, MemoryBackend};
pub use config::{LocalConfig, DEFAULT_COPY_BUFFER_SIZE};
pub use error::{VfsError, VfsResult};
pub use filesystem::Filesystem;
pub use node::{Directory, File, Node};

pub use hako_types::{NodeMeta, NodeType};
