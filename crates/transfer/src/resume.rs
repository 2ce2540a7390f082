//! Resume-offset decisions for downloads.
//!
//! Only the local file's size is consulted. A size match is not proof
//! of integrity (no checksum or ETag exists on the robot side), so an
//! artifact that is already complete or oversized is downloaded again.

use std::path::Path;

use tracing::debug;

/// Byte offset at which a download of `expected_size` bytes continues,
/// given the size of the local artifact (`None` when there is none).
///
/// Only a non-empty artifact strictly smaller than the expected size is
/// resumed; everything else restarts at zero.
pub fn resume_offset_for(local_size: Option<u64>, expected_size: u64) -> u64 {
    match local_size {
        Some(size) if size > 0 && size < expected_size => size,
        _ => 0,
    }
}

/// Stats `local_path` and applies [`resume_offset_for`].
///
/// Directories and unreadable paths count as no artifact.
pub async fn resolve_resume_offset(local_path: &Path, expected_size: u64) -> u64 {
    let local_size = match tokio::fs::metadata(local_path).await {
        Ok(meta) if meta.is_file() => Some(meta.len()),
        _ => None,
    };
    let offset = resume_offset_for(local_size, expected_size);
    debug!(
        path = %local_path.display(),
        local_size,
        expected_size,
        offset,
        "resume offset resolved"
    );
    offset
}
