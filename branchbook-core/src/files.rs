//! Filesystem helpers shared by the marker, the injector, and the reconciler.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{io_err, CoreError};

/// Write `content` to `path` atomically.
///
/// Writes to `<path>.branchbook.tmp` then renames over `path`, so readers
/// (the HTTP server included) see either the old or the new file, never a
/// partial one. Parent directories are created as needed.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let tmp = PathBuf::from(format!("{}.branchbook.tmp", path.display()));
    std::fs::write(&tmp, content).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

/// Remove a directory tree. Returns `false` when it was already absent.
pub fn remove_dir_if_exists(path: &Path) -> Result<bool, CoreError> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(io_err(path, err)),
    }
}

/// Remove a directory tree, except for any directory listed in `keep` that
/// lies strictly inside it. Returns `false` when `dir` was already absent.
///
/// Nested branch names share subtrees (`feature` holds `feature/x`), so a
/// branch's artifact is cleared entry by entry around the live ones. `dir`
/// itself is removed once nothing is left in it.
pub fn remove_dir_except(dir: &Path, keep: &[PathBuf]) -> Result<bool, CoreError> {
    let nested: Vec<&Path> = keep
        .iter()
        .map(PathBuf::as_path)
        .filter(|k| k.starts_with(dir) && *k != dir)
        .collect();
    if nested.is_empty() {
        return remove_dir_if_exists(dir);
    }
    match std::fs::symlink_metadata(dir) {
        Ok(_) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(io_err(dir, err)),
    }
    clear_dir_except(dir, &nested)?;
    let _ = std::fs::remove_dir(dir);
    Ok(true)
}

fn clear_dir_except(dir: &Path, keep: &[&Path]) -> Result<(), CoreError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| io_err(&path, e))?;
        if file_type.is_dir() {
            if keep.iter().any(|k| *k == path) {
                continue;
            }
            if keep.iter().any(|k| k.starts_with(&path)) {
                clear_dir_except(&path, keep)?;
                let _ = std::fs::remove_dir(&path);
                continue;
            }
            std::fs::remove_dir_all(&path).map_err(|e| io_err(&path, e))?;
        } else {
            std::fs::remove_file(&path).map_err(|e| io_err(&path, e))?;
        }
    }
    Ok(())
}

/// Read a file to a string. Returns `None` when the file (or its directory)
/// does not exist.
pub fn read_optional(path: &Path) -> Result<Option<String>, CoreError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_err(path, err)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
