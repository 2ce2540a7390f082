//! Seam between the orchestrator and the robot file service.
//!
//! `FileServiceClient` implements [`RemoteFiles`]; tests substitute an
//! in-memory robot.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Duration;

use robofile_file_service::{DownloadResponse, FileServiceClient, FileServiceError};
use robofile_protocol::{RemoteEntry, UploadResponse};

/// Boxed future returned by [`RemoteFiles`] operations.
pub type RemoteFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The four operations of a robot file service.
pub trait RemoteFiles: Send + Sync {
    /// Never fails; any problem reads as unhealthy.
    fn health_check(&self, timeout: Duration) -> RemoteFuture<'_, bool>;

    fn list<'a>(
        &'a self,
        remote_dir: &'a str,
    ) -> RemoteFuture<'a, Result<Vec<RemoteEntry>, FileServiceError>>;

    fn download<'a>(
        &'a self,
        remote_path: &'a str,
        range_from: Option<u64>,
    ) -> RemoteFuture<'a, Result<DownloadResponse, FileServiceError>>;

    /// Streams `local_path` to `destination/file_name`, advancing `sent`
    /// as file bytes leave.
    fn upload<'a>(
        &'a self,
        local_path: &'a Path,
        file_name: &'a str,
        destination: &'a str,
        sent: Arc<AtomicU64>,
    ) -> RemoteFuture<'a, Result<UploadResponse, FileServiceError>>;

    /// `host:port` for log lines.
    fn endpoint(&self) -> String;
}

impl RemoteFiles for FileServiceClient {
    fn health_check(&self, timeout: Duration) -> RemoteFuture<'_, bool> {
        Box::pin(FileServiceClient::health_check(self, timeout))
    }

    fn list<'a>(
        &'a self,
        remote_dir: &'a str,
    ) -> RemoteFuture<'a, Result<Vec<RemoteEntry>, FileServiceError>> {
        Box::pin(FileServiceClient::list(self, remote_dir))
    }

    fn download<'a>(
        &'a self,
        remote_path: &'a str,
        range_from: Option<u64>,
    ) -> RemoteFuture<'a, Result<DownloadResponse, FileServiceError>> {
        Box::pin(FileServiceClient::download(self, remote_path, range_from))
    }

    fn upload<'a>(
        &'a self,
        local_path: &'a Path,
        file_name: &'a str,
        destination: &'a str,
        sent: Arc<AtomicU64>,
    ) -> RemoteFuture<'a, Result<UploadResponse, FileServiceError>> {
        Box::pin(FileServiceClient::upload(
            self,
            local_path,
            file_name,
            destination,
            sent,
        ))
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.host(), self.port())
    }
}
