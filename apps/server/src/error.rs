//! JSON error responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use robofile_multipart::MultipartError;
use robofile_transfer::TransferError;
use serde_json::json;

/// An error rendered as `{success: false, error}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = self.status.as_u16(), error = %self.message, "request failed");
        } else {
            tracing::debug!(status = self.status.as_u16(), error = %self.message, "request rejected");
        }
        let body = Json(json!({ "success": false, "error": self.message }));
        (self.status, body).into_response()
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        match e {
            MultipartError::PayloadTooLarge { limit } => Self::new(
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("File too large (max {}MB)", limit / (1024 * 1024)),
            ),
            e if e.is_validation() => Self::bad_request(e.to_string()),
            e => Self::internal(e.to_string()),
        }
    }
}

impl From<TransferError> for ApiError {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::InvalidPath(_) | TransferError::Rejected(_) => {
                Self::bad_request(e.to_string())
            }
            e => Self::internal(e.to_string()),
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        Self::internal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multipart_errors_map_to_status() {
        let too_large = ApiError::from(MultipartError::PayloadTooLarge {
            limit: 512 * 1024 * 1024,
        });
        assert_eq!(too_large.status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(too_large.message, "File too large (max 512MB)");

        let bad = ApiError::from(MultipartError::MissingBoundary);
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);
        assert_eq!(bad.message, "No boundary found");

        let io = ApiError::from(MultipartError::Body("connection reset".into()));
        assert_eq!(io.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn unhealthy_robot_is_server_error() {
        let e = ApiError::from(TransferError::Unhealthy);
        assert_eq!(e.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(e.message, "Robot file service not responding to health check");

        let e = ApiError::from(TransferError::InvalidPath("..".into()));
        assert_eq!(e.status, StatusCode::BAD_REQUEST);
    }
}
