//! Path normalization shared by the backends.
//!
//! Adapters accept paths with or without a leading `/` and hand back
//! metadata in virtual form: `/` is the adapter root, everything else is
//! `/segment/segment`.

use std::path::{Component, Path, PathBuf};

use crate::error::{VfsError, VfsResult};

/// Lexically normalize a path into a root-relative path.
///
/// Leading `/` and `.` segments are dropped, `..` pops a segment. The root
/// itself normalizes to the empty path. Climbing above the root is an error.
pub fn normalize(path: &Path) -> VfsResult<PathBuf> {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
            Component::ParentDir => {
                if !result.pop() {
                    return Err(VfsError::path_escapes_root(path.display().to_string()));
                }
            }
            Component::Normal(s) => result.push(s),
        }
    }
    Ok(result)
}

/// Render a normalized root-relative path in virtual form.
pub fn to_virtual(relative: &Path) -> PathBuf {
    Path::new("/").join(relative)
}

/// Normalize and render in virtual form in one step.
pub fn virtualize(path: &Path) -> VfsResult<PathBuf> {
    normalize(path).map(|p| to_virtual(&p))
}
