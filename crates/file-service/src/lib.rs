//! Client for the robot-side file service.
//!
//! The service exposes four operations under a fixed prefix
//! (`/api/files` by default): `health`, `list`, `download` (optionally
//! ranged) and `upload` (multipart). Every transport failure is
//! classified into [`FileServiceError`] with the robot's host and port
//! attached.

pub mod client;
pub mod envelope;
pub mod error;

pub use client::{DownloadResponse, FileServiceClient, Timeouts};
pub use envelope::UploadEnvelope;
pub use error::FileServiceError;

use std::time::Duration;

/// Path prefix of the robot file service.
pub const API_PREFIX: &str = "/api/files";

/// Port used when a robot URL carries none.
pub const DEFAULT_PORT: u16 = 8080;

/// Timeout for the health check.
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for control calls (listing, connection setup).
pub const CONTROL_TIMEOUT: Duration = Duration::from_secs(15);

/// Timeout for bulk transfer calls.
pub const TRANSFER_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Read size when streaming a local file into an upload body (64 KiB).
pub const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;
