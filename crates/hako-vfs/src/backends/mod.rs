//! VFS backends.
//!
//! Backends implement [`Adapter`](crate::Adapter) for different storage types.

mod local;
mod memory;

pub use local::LocalBackend;
pub use memory::MemoryBackend;
