use crate::error::Result;
use std::ffi::OsStr;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use walkdir::{DirEntry, WalkDir};

/// Directory names never descended into, on top of hidden (`.`) and
/// ignored (`_`) names.
pub const SKIPPED_DIRS: &[&str] = &["node_modules", "vendor", "testdata"];

pub fn is_skipped_dir_name(name: &OsStr) -> bool {
    let Some(name) = name.to_str() else {
        return true;
    };
    name.starts_with('.') || name.starts_with('_') || SKIPPED_DIRS.contains(&name)
}

fn is_go_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("go")
        && !path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'))
}

fn walk(root: &Path) -> impl Iterator<Item = walkdir::Result<DirEntry>> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !(e.file_type().is_dir() && is_skipped_dir_name(e.file_name())))
}

/// The root and every non-skipped directory below it, in sorted walk order.
pub fn collect_dirs(root: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in walk(root) {
        let entry = entry?;
        if entry.file_type().is_dir() {
            dirs.push(entry.into_path());
        }
    }
    Ok(dirs)
}

/// Go files directly inside `dir`, sorted by name.
pub fn go_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_file() && is_go_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Newest modification time among the Go files of the tree.
pub fn latest_mod_time(root: &Path) -> Result<Option<SystemTime>> {
    let mut latest = None;
    for entry in walk(root) {
        let entry = entry?;
        if !entry.file_type().is_file() || !is_go_file(entry.path()) {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        if latest.is_none_or(|l| modified > l) {
            latest = Some(modified);
        }
    }
    Ok(latest)
}

/// Whether a change at `path` can affect the extracted model.
///
/// Go files and extension-less paths (directories) count, unless they sit
/// in a skipped directory.
pub fn is_relevant_path(root: &Path, path: &Path) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut components = relative.components().peekable();
    while let Some(component) = components.next() {
        let Component::Normal(name) = component else {
            continue;
        };
        let last = components.peek().is_none();
        if !last && is_skipped_dir_name(name) {
            return false;
        }
        if last && name.to_str().is_some_and(|n| n.starts_with('.')) {
            return false;
        }
    }
    path.extension().is_none() || is_go_file(path)
}
