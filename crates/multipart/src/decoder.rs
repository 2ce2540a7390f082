use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures_util::Stream;
use tracing::debug;

use crate::parse::{FormData, parse_form};
use crate::spool::spool_body;
use crate::{MultipartError, SPOOL_LIMIT_BYTES};

/// Extracts the boundary token from a `multipart/form-data` content type.
pub fn parse_boundary(content_type: &str) -> Result<String, MultipartError> {
    if !content_type
        .to_ascii_lowercase()
        .contains("multipart/form-data")
    {
        return Err(MultipartError::InvalidContentType);
    }

    let boundary = content_type
        .split(';')
        .filter_map(|param| param.trim().split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .unwrap_or_default();

    if boundary.is_empty() {
        return Err(MultipartError::MissingBoundary);
    }
    Ok(boundary)
}

/// Decodes streamed multipart request bodies through a scratch directory.
#[derive(Debug, Clone)]
pub struct MultipartDecoder {
    scratch_dir: PathBuf,
    limit: u64,
}

impl MultipartDecoder {
    /// Creates a decoder spooling into `scratch_dir` with the default ceiling.
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            limit: SPOOL_LIMIT_BYTES,
        }
    }

    /// Overrides the spool ceiling.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Validates `content_type`, spools `body`, and parses the result.
    ///
    /// Validation happens before any byte is read. The scratch file is
    /// gone by the time this returns.
    pub async fn decode<S, E>(&self, content_type: &str, body: S) -> Result<FormData, MultipartError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: std::fmt::Display,
    {
        let boundary = parse_boundary(content_type)?;
        let scratch = spool_body(body, &self.scratch_dir, self.limit).await?;

        let payload = Bytes::from(tokio::fs::read(scratch.path()).await?);
        drop(scratch);

        let form = parse_form(payload, &boundary);
        debug!(boundary = %boundary, files = form.files().len(), "multipart request decoded");
        Ok(form)
    }
}
