// src/task/resolve.rs

//! `which`-style executable discovery, routed through [`FileSystem`].

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::fs::FileSystem;

/// Locate `command`.
///
/// If it contains path separators it is treated as a path (relative paths
/// are taken relative to `working_dir`); otherwise each entry of `path_var`
/// is searched in order.
pub fn resolve_executable(
    fs: &dyn FileSystem,
    command: &str,
    working_dir: Option<&Path>,
    path_var: Option<&OsStr>,
) -> Option<PathBuf> {
    let candidate = Path::new(command);
    if has_path(candidate) {
        let on_disk = resolve_relative(candidate, working_dir);
        return fs.is_file(&on_disk).then_some(on_disk);
    }

    let path_var = path_var?;
    std::env::split_paths(path_var).find_map(|dir| resolve_in_dir(fs, &dir, command))
}

/// Join a relative path onto the working directory, if there is one.
pub fn resolve_relative(path: &Path, working_dir: Option<&Path>) -> PathBuf {
    match working_dir {
        Some(dir) if path.is_relative() => dir.join(path),
        _ => path.to_path_buf(),
    }
}

fn has_path(candidate: &Path) -> bool {
    candidate.components().count() > 1
}

fn resolve_in_dir(fs: &dyn FileSystem, dir: &Path, command: &str) -> Option<PathBuf> {
    let direct = dir.join(command);
    if fs.is_file(&direct) {
        return Some(direct);
    }

    if !cfg!(windows) {
        return None;
    }

    [".exe", ".cmd", ".bat", ".com"]
        .into_iter()
        .map(|ext| dir.join(format!("{command}{ext}")))
        .find(|candidate| fs.is_file(candidate))
}
