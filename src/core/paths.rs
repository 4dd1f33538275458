//! Shared path manipulation utilities.

use std::env;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Resolve a path to an absolute, normalized path.
///
/// If `fs::canonicalize` succeeds (path exists), it is used to resolve
/// symlinks and normalize components. If it fails (e.g. path does not exist
/// yet, like a snapshot file on first run), the path is made absolute
/// relative to CWD and `..`/`.` components are resolved syntactically.
pub fn resolve_absolute_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };

    if let Ok(canonical) = fs::canonicalize(&absolute) {
        return canonical;
    }

    normalize_syntactic(&absolute)
}

/// Resolve a configured scan root for walking.
///
/// A root that is itself a symlink (the common live-document-root layout,
/// where a `current` link repoints on every deploy) is dereferenced exactly
/// once, before the walk begins. Symlinks encountered *during* a walk are
/// never followed — that policy lives in the walker, not here.
///
/// Returns `(physical, was_symlink)`: the directory the walk should actually
/// read, and whether dereferencing happened. Errors bubble up as `io::Error`
/// so the caller can record them as non-fatal walk errors.
pub fn resolve_symlink_root(root: &Path) -> io::Result<(PathBuf, bool)> {
    let meta = fs::symlink_metadata(root)?;
    if meta.file_type().is_symlink() {
        let target = fs::canonicalize(root)?;
        return Ok((target, true));
    }
    Ok((resolve_absolute_path(root), false))
}

fn normalize_syntactic(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(..) | Component::RootDir | Component::Normal(_) => {
                components.push(component);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                }
            }
        }
    }
    components.into_iter().collect()
}
