//! Error types for multipart decoding.

/// Errors produced while decoding a multipart request.
///
/// Everything except `Io` and `Body` is a validation error and maps to a
/// 4xx response.
#[derive(Debug, thiserror::Error)]
pub enum MultipartError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid content type")]
    InvalidContentType,

    #[error("No boundary found")]
    MissingBoundary,

    #[error("payload too large (max {limit} bytes)")]
    PayloadTooLarge { limit: u64 },

    #[error("No file provided in field '{0}'")]
    MissingFilePart(String),

    #[error("request body error: {0}")]
    Body(String),
}

impl MultipartError {
    /// Returns true for errors caused by the request itself.
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::Io(_) | Self::Body(_))
    }
}
