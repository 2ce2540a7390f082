use std::path::{Component, Path, PathBuf};

use crate::TransferError;

/// Checks that `relative` names something strictly inside its base
/// directory: non-blank, not rooted, no drive or UNC prefix, no `..`.
pub fn validate_relative_path(relative: &str) -> Result<(), TransferError> {
    let reject = |why: &str| -> Result<(), TransferError> {
        Err(TransferError::InvalidPath(format!("{why}: {relative}")))
    };

    if relative.trim().is_empty() {
        return Err(TransferError::InvalidPath("empty path".into()));
    }
    if Path::new(relative).has_root() {
        return reject("rooted path");
    }
    match Path::new(relative)
        .components()
        .find(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        None => Ok(()),
        Some(Component::ParentDir) => reject("escapes its directory"),
        Some(_) => reject("rooted path"),
    }
}

/// Joins `relative` onto `root` after validating it.
pub fn confine(root: &Path, relative: &str) -> Result<PathBuf, TransferError> {
    validate_relative_path(relative)?;
    Ok(root.join(relative))
}

/// Normalizes a slash-separated remote path.
///
/// Leading slashes and `.` segments are dropped; `..` and backslashes
/// are rejected since the robot resolves paths against its own root.
pub fn normalize_remote_path(remote_path: &str) -> Result<String, TransferError> {
    if remote_path.contains('\\') {
        return Err(TransferError::InvalidPath(format!(
            "backslash not allowed in remote path: {remote_path}"
        )));
    }

    let mut segments = Vec::new();
    for segment in remote_path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                return Err(TransferError::InvalidPath(format!(
                    "parent directory traversal not allowed: {remote_path}"
                )));
            }
            s => segments.push(s),
        }
    }

    if segments.is_empty() {
        return Err(TransferError::InvalidPath("empty path".into()));
    }
    Ok(segments.join("/"))
}
