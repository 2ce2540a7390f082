//! Phase one: bounded spooling of a request body to a scratch file.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::{MultipartError, SCRATCH_PREFIX};

/// A scratch file that is deleted when dropped.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
    size: u64,
}

impl ScratchFile {
    fn new(dir: &Path) -> Self {
        let name = format!("{SCRATCH_PREFIX}{}", uuid::Uuid::new_v4().simple());
        Self {
            path: dir.join(name),
            size: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of bytes spooled.
    pub fn size(&self) -> u64 {
        self.size
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "scratch file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove scratch file"),
        }
    }
}

/// Writes `body` to a new scratch file in `dir`, failing once more than
/// `limit` bytes have arrived.
///
/// Each chunk is fully written before the next one is polled, so a slow
/// disk pauses the upstream reader instead of buffering in memory.
pub async fn spool_body<S, E>(body: S, dir: &Path, limit: u64) -> Result<ScratchFile, MultipartError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::fmt::Display,
{
    tokio::fs::create_dir_all(dir).await?;

    let mut scratch = ScratchFile::new(dir);
    let mut file = tokio::fs::File::create(&scratch.path).await?;
    let mut body = std::pin::pin!(body);

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| MultipartError::Body(e.to_string()))?;

        let size = scratch.size + chunk.len() as u64;
        if size > limit {
            warn!(limit, received = size, "request body exceeds spool ceiling");
            return Err(MultipartError::PayloadTooLarge { limit });
        }

        file.write_all(&chunk).await?;
        scratch.size = size;
    }

    file.flush().await?;
    debug!(path = %scratch.path.display(), size = scratch.size, "request body spooled");
    Ok(scratch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn chunks(parts: Vec<&'static str>) -> impl Stream<Item = Result<Bytes, std::io::Error>> {
        stream::iter(parts.into_iter().map(|p| Ok(Bytes::from_static(p.as_bytes()))))
    }

    fn dir_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn spools_all_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = spool_body(chunks(vec!["hello ", "world"]), dir.path(), 1024)
            .await
            .unwrap();

        assert_eq!(scratch.size(), 11);
        assert_eq!(std::fs::read(scratch.path()).unwrap(), b"hello world");
        assert!(
            scratch
                .path()
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with(SCRATCH_PREFIX)
        );
    }

    #[tokio::test]
    async fn scratch_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = spool_body(chunks(vec!["abc"]), dir.path(), 1024)
            .await
            .unwrap();
        let path = scratch.path().to_path_buf();
        assert!(path.exists());

        drop(scratch);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn one_byte_over_limit_is_rejected_and_cleaned() {
        let dir = tempfile::tempdir().unwrap();
        let result = spool_body(chunks(vec!["12345", "678", "9"]), dir.path(), 8).await;

        assert!(matches!(
            result,
            Err(MultipartError::PayloadTooLarge { limit: 8 })
        ));
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn exactly_at_limit_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = spool_body(chunks(vec!["1234", "5678"]), dir.path(), 8)
            .await
            .unwrap();
        assert_eq!(scratch.size(), 8);
    }

    #[tokio::test]
    async fn body_error_aborts_and_cleans() {
        let dir = tempfile::tempdir().unwrap();
        let body = stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(std::io::Error::other("connection reset")),
        ]);
        let result = spool_body(body, dir.path(), 1024).await;

        match result {
            Err(MultipartError::Body(msg)) => assert!(msg.contains("connection reset")),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn creates_missing_scratch_dir() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("temp").join("uploads");
        let scratch = spool_body(chunks(vec!["x"]), &dir, 16).await.unwrap();
        assert!(scratch.path().starts_with(&dir));
    }
}
