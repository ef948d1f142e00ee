//! Filesystem helpers for the preprocessing pipeline.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::utils::{PreprocessError, PreprocessResult};

/// Get file size in bytes
pub fn file_size(path: impl AsRef<Path>) -> PreprocessResult<u64> {
    fs::metadata(path.as_ref())
        .map(|m| m.len())
        .map_err(|e| {
            PreprocessError::resource(format!(
                "failed to stat {}: {}",
                path.as_ref().display(),
                e
            ))
        })
}

/// Create a directory (and any missing parents), succeeding if it already exists
pub fn create_dir_idempotent(path: impl AsRef<Path>) -> PreprocessResult<()> {
    fs::create_dir_all(path.as_ref()).map_err(|e| {
        PreprocessError::resource(format!(
            "failed to create directory {}: {}",
            path.as_ref().display(),
            e
        ))
    })
}

/// Recursively remove a directory if it exists. Best effort: failures are
/// logged and swallowed so cleanup can never mask an earlier error.
pub fn remove_dir_best_effort(path: impl AsRef<Path>) {
    let path = path.as_ref();
    if !path.exists() {
        return;
    }
    if let Err(e) = fs::remove_dir_all(path) {
        warn!("failed to remove directory {}: {}", path.display(), e);
    }
}

/// Remove the contents of a directory, keeping the directory itself
pub fn clear_dir(path: impl AsRef<Path>) -> PreprocessResult<()> {
    let path = path.as_ref();
    let entries = fs::read_dir(path).map_err(|e| {
        PreprocessError::resource(format!("failed to read directory {}: {}", path.display(), e))
    })?;
    for entry in entries {
        let entry = entry.map_err(|e| {
            PreprocessError::resource(format!(
                "failed to read entry in {}: {}",
                path.display(),
                e
            ))
        })?;
        let entry_path = entry.path();
        let removed = if entry_path.is_dir() {
            fs::remove_dir_all(&entry_path)
        } else {
            fs::remove_file(&entry_path)
        };
        removed.map_err(|e| {
            PreprocessError::resource(format!("failed to remove {}: {}", entry_path.display(), e))
        })?;
    }
    Ok(())
}

/// Copy a file into a directory, keeping its file name
pub fn copy_into_dir(src: impl AsRef<Path>, dir: impl AsRef<Path>) -> PreprocessResult<PathBuf> {
    let src = src.as_ref();
    let file_name = src.file_name().ok_or_else(|| {
        PreprocessError::resource(format!("path has no file name: {}", src.display()))
    })?;
    let dest = dir.as_ref().join(file_name);
    fs::copy(src, &dest).map_err(|e| {
        PreprocessError::resource(format!(
            "failed to copy {} to {}: {}",
            src.display(),
            dest.display(),
            e
        ))
    })?;
    Ok(dest)
}

/// Get the file stem (name without extension) as an owned string
pub fn file_stem(path: impl AsRef<Path>) -> PreprocessResult<String> {
    path.as_ref()
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            PreprocessError::resource(format!("path has no file stem: {}", path.as_ref().display()))
        })
}

/// List page image files in a directory, filtered by extension and sorted
/// lexicographically by path. The sorted order is load-bearing: binding
/// identification and averaged-override determinism both depend on it.
pub fn list_page_files(
    dir: impl AsRef<Path>,
    valid_exts: &[String],
) -> PreprocessResult<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir).map_err(|e| {
        PreprocessError::resource(format!(
            "failed to read source directory {}: {}",
            dir.display(),
            e
        ))
    })?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            PreprocessError::resource(format!("failed to read entry in {}: {}", dir.display(), e))
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_lowercase()));
        if let Some(ext) = ext {
            if valid_exts.iter().any(|v| v.eq_ignore_ascii_case(&ext)) {
                paths.push(path);
            }
        }
    }
    paths.sort();
    Ok(paths)
}
