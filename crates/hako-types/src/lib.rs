//! Node metadata types for hako.
//!
//! These are the only values that cross the boundary between an adapter
//! and the `Filesystem` facade in `hako-vfs`. They are plain data: no
//! handles, no back-references, nothing cached.
//!
//! | Type         | Purpose                                         |
//! |--------------|-------------------------------------------------|
//! | [`NodeType`] | What an entry is (file, directory, or unknown)  |
//! | [`NodeMeta`] | Path + type, as produced by an adapter          |

mod node;

pub use node::{NodeMeta, NodeType};
