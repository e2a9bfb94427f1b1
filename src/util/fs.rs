//! Filesystem utilities.

use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context, Result};
use glob::glob;
use walkdir::WalkDir;

/// Remove a directory and all its contents, if it exists.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("failed to remove directory: {}", path.display()))?;
    }
    Ok(())
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Remove a directory if it exists and create it again, empty.
pub fn recreate_dir(path: &Path) -> Result<()> {
    remove_dir_all_if_exists(path)?;
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory: {}", path.display()))
}

/// Read a file to string, with nice error messages.
pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read file: {}", path.display()))
}

/// Write a string to a file, creating parent directories if needed.
pub fn write_string(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("failed to write file: {}", path.display()))
}

/// Replace every occurrence of `search` in a text file.
///
/// Fails if the pattern does not occur at all.
pub fn replace_in_file(path: &Path, search: &str, replace: &str) -> Result<()> {
    let contents = read_to_string(path)?;
    if !contents.contains(search) {
        bail!(
            "pattern `{}` not found in {}",
            search,
            path.display()
        );
    }
    write_string(path, &contents.replace(search, replace))
}

/// Copy files matching `pattern` (relative to `src_dir`) into `dst_dir`.
///
/// Returns the destination paths. Zero matches is not an error here; callers
/// decide whether an empty result is acceptable.
pub fn copy_matching(pattern: &str, src_dir: &Path, dst_dir: &Path) -> Result<Vec<PathBuf>> {
    let full_pattern = src_dir.join(pattern);
    let pattern_str = full_pattern.to_string_lossy();

    let mut copied = Vec::new();
    for entry in glob(&pattern_str).with_context(|| format!("invalid glob pattern: {}", pattern))? {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!("glob error: {}", e);
                continue;
            }
        };
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name() else {
            continue;
        };

        ensure_dir(dst_dir)?;
        let dst = dst_dir.join(name);
        fs::copy(&path, &dst).with_context(|| {
            format!("failed to copy {} to {}", path.display(), dst.display())
        })?;
        copied.push(dst);
    }

    copied.sort();
    Ok(copied)
}

/// Rename a file or directory.
pub fn rename(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        ensure_dir(parent)?;
    }
    fs::rename(src, dst)
        .with_context(|| format!("failed to rename {} to {}", src.display(), dst.display()))
}

/// Check whether a directory contains no files (subdirectories may exist).
pub fn has_no_files(path: &Path) -> bool {
    !WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .any(|e| !e.file_type().is_dir())
}

/// List every file below `root`, sorted, as paths relative to `root`.
pub fn list_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
        if entry.file_type().is_dir() {
            continue;
        }
        files.push(relative_path(root, entry.path()));
    }
    Ok(files)
}

/// Normalize an absolute path for comparison.
///
/// `.` and `..` are removed lexically, then the longest existing prefix is
/// canonicalized so symlinked directories compare equal to their targets.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut lexical = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                lexical.pop();
            }
            other => lexical.push(other),
        }
    }

    let mut existing = lexical.as_path();
    let mut rest = Vec::new();
    loop {
        if let Ok(canonical) = fs::canonicalize(existing) {
            return rest.iter().rev().fold(canonical, |acc, part| acc.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name.to_os_string());
                existing = parent;
            }
            _ => return lexical,
        }
    }
}

/// Get the relative path from `base` to `path`.
pub fn relative_path(base: &Path, path: &Path) -> PathBuf {
    pathdiff::diff_paths(path, base).unwrap_or_else(|| path.to_path_buf())
}
