//! Path utilities

use std::path::{Component, Path, PathBuf};

/// Convert absolute path to relative path from base
pub fn path_relative_to(path: &Path, base: &Path) -> Option<PathBuf> {
    path.strip_prefix(base).ok().map(|p| p.to_path_buf())
}

/// Join the normal components of a local relative path with `/` (remote servers expect it
/// regardless of the local separator). `.`, `..` and roots are dropped.
pub fn path_to_remote_string(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
