//! Robot file-service client.
//!
//! Async HTTP client using `reqwest`; one instance per robot address.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::{self, BoxStream};
use futures_util::{Stream, StreamExt, TryStreamExt};
use reqwest::StatusCode;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, RANGE};
use robofile_protocol::{HealthResponse, ListResponse, RemoteEntry, UploadResponse};
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use crate::envelope::UploadEnvelope;
use crate::error::FileServiceError;
use crate::{
    API_PREFIX, CONTROL_TIMEOUT, DEFAULT_PORT, HEALTH_TIMEOUT, TRANSFER_TIMEOUT, UPLOAD_CHUNK_SIZE,
};

/// Per-operation timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub health: Duration,
    pub control: Duration,
    pub transfer: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            health: HEALTH_TIMEOUT,
            control: CONTROL_TIMEOUT,
            transfer: TRANSFER_TIMEOUT,
        }
    }
}

/// An open download.
pub struct DownloadResponse {
    /// True when the robot answered 206 to a ranged request.
    pub partial: bool,
    /// Declared length of this response's body.
    pub content_length: Option<u64>,
    pub stream: BoxStream<'static, Result<Bytes, FileServiceError>>,
}

impl std::fmt::Debug for DownloadResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadResponse")
            .field("partial", &self.partial)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Client for one robot's file service.
#[derive(Debug, Clone)]
pub struct FileServiceClient {
    http: reqwest::Client,
    host: String,
    port: u16,
    api_prefix: String,
    timeouts: Timeouts,
}

impl FileServiceClient {
    /// Creates a client for `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, FileServiceError> {
        Self::with_timeouts(host, port, Timeouts::default())
    }

    pub fn with_timeouts(
        host: impl Into<String>,
        port: u16,
        timeouts: Timeouts,
    ) -> Result<Self, FileServiceError> {
        let http = reqwest::Client::builder()
            .connect_timeout(timeouts.control)
            .build()
            .map_err(|e| FileServiceError::Client(e.to_string()))?;

        Ok(Self {
            http,
            host: host.into(),
            port,
            api_prefix: API_PREFIX.to_string(),
            timeouts,
        })
    }

    /// Creates a client from a robot URL such as `http://10.0.0.2:8080`.
    ///
    /// Missing ports fall back to `default_port`, or [`DEFAULT_PORT`].
    pub fn from_url(url: &str, default_port: Option<u16>) -> Result<Self, FileServiceError> {
        Self::from_url_with_timeouts(url, default_port, Timeouts::default())
    }

    pub fn from_url_with_timeouts(
        url: &str,
        default_port: Option<u16>,
        timeouts: Timeouts,
    ) -> Result<Self, FileServiceError> {
        let parsed =
            reqwest::Url::parse(url).map_err(|e| FileServiceError::InvalidUrl(format!("{url}: {e}")))?;
        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| FileServiceError::InvalidUrl(format!("{url}: missing host")))?;
        let port = parsed.port().or(default_port).unwrap_or(DEFAULT_PORT);
        Self::with_timeouts(host, port, timeouts)
    }

    /// Overrides the path prefix (default `/api/files`).
    pub fn with_api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = prefix.into().trim_end_matches('/').to_string();
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    fn url(&self, op: &str) -> String {
        format!("http://{}:{}{}/{op}", self.host, self.port, self.api_prefix)
    }

    fn classify(&self, err: reqwest::Error) -> FileServiceError {
        FileServiceError::classify(&err, &self.host, self.port)
    }

    fn timed_out(&self) -> FileServiceError {
        FileServiceError::TimedOut {
            host: self.host.clone(),
            port: self.port,
        }
    }

    /// Probes `GET /health`.
    ///
    /// Any failure (transport, non-2xx, unparseable body, `success:false`)
    /// reads as unhealthy.
    pub async fn health_check(&self, timeout: Duration) -> bool {
        let resp = match self.http.get(self.url("health")).timeout(timeout).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = %self.classify(e), "health check failed");
                return false;
            }
        };

        if !resp.status().is_success() {
            warn!(host = %self.host, port = self.port, status = resp.status().as_u16(), "health check failed");
            return false;
        }

        match resp.json::<HealthResponse>().await {
            Ok(health) => health.success,
            Err(e) => {
                warn!(host = %self.host, port = self.port, error = %e, "malformed health response");
                false
            }
        }
    }

    /// Lists one remote directory level.
    pub async fn list(&self, remote_path: &str) -> Result<Vec<RemoteEntry>, FileServiceError> {
        let resp = self
            .http
            .get(self.url("list"))
            .query(&[("path", remote_path)])
            .timeout(self.timeouts.control)
            .send()
            .await
            .map_err(|e| self.classify(e))?;
        let resp = check_status(resp).await?;

        let body = resp.bytes().await.map_err(|e| self.classify(e))?;
        let listing: ListResponse = serde_json::from_slice(&body)
            .map_err(|e| FileServiceError::Protocol(e.to_string()))?;
        if !listing.success {
            return Err(FileServiceError::Rejected(
                listing.message.unwrap_or_else(|| "List failed".into()),
            ));
        }

        debug!(path = remote_path, entries = listing.items.len(), "remote directory listed");
        Ok(listing.items)
    }

    /// Opens a download of `remote_path`.
    ///
    /// A `range_from` above zero sends `Range: bytes=<from>-`. Both 200
    /// and 206 are accepted; the caller checks [`DownloadResponse::partial`]
    /// to learn whether the range was honoured.
    ///
    /// The transfer timeout is an idle limit: the response head and every
    /// body chunk must each arrive within it. A slow but steady body is
    /// never cut off.
    pub async fn download(
        &self,
        remote_path: &str,
        range_from: Option<u64>,
    ) -> Result<DownloadResponse, FileServiceError> {
        let mut req = self
            .http
            .get(self.url("download"))
            .query(&[("path", remote_path)]);
        if let Some(from) = range_from.filter(|from| *from > 0) {
            req = req.header(RANGE, format!("bytes={from}-"));
        }

        let resp = tokio::time::timeout(self.timeouts.transfer, req.send())
            .await
            .map_err(|_| self.timed_out())?
            .map_err(|e| self.classify(e))?;
        let status = resp.status();
        if status != StatusCode::OK && status != StatusCode::PARTIAL_CONTENT {
            return Err(status_error(resp).await);
        }

        let content_length = resp.content_length();
        let (host, port) = (self.host.clone(), self.port);
        let body = resp
            .bytes_stream()
            .map_err(move |e| FileServiceError::classify(&e, &host, port));
        let stream = idle_limited(body, self.timeouts.transfer, self.timed_out());

        debug!(
            path = remote_path,
            status = status.as_u16(),
            content_length,
            "download opened"
        );
        Ok(DownloadResponse {
            partial: status == StatusCode::PARTIAL_CONTENT,
            content_length,
            stream,
        })
    }

    /// Uploads `local_path` as `file_name` into the remote `destination`
    /// directory.
    ///
    /// The file is streamed from disk between the envelope's prefix and
    /// suffix. `sent` advances by each file chunk as the connection pulls
    /// it from the body. Pulls follow socket writes, but the connection
    /// buffers up to a few chunks, so `sent` may run ahead of the bytes
    /// the robot has received by that much.
    ///
    /// The transfer timeout is an idle limit: the upload fails only when
    /// `sent` stops moving, or the response is not back, for a whole
    /// timeout window.
    pub async fn upload(
        &self,
        local_path: &Path,
        file_name: &str,
        destination: &str,
        sent: Arc<AtomicU64>,
    ) -> Result<UploadResponse, FileServiceError> {
        let file = tokio::fs::File::open(local_path).await?;
        let file_size = file.metadata().await?.len();
        let envelope = UploadEnvelope::new(file_name, destination);

        let counter = Arc::clone(&sent);
        let content = ReaderStream::with_capacity(file, UPLOAD_CHUNK_SIZE).inspect_ok(move |chunk| {
            counter.fetch_add(chunk.len() as u64, Ordering::Relaxed);
        });
        let body = stream::iter([Ok::<_, std::io::Error>(envelope.prefix())])
            .chain(content)
            .chain(stream::iter([Ok(envelope.suffix())]));

        debug!(
            path = %local_path.display(),
            file_name,
            destination,
            size = file_size,
            "upload started"
        );
        let request = self
            .http
            .post(self.url("upload"))
            .header(CONTENT_TYPE, envelope.content_type())
            .header(CONTENT_LENGTH, envelope.content_length(file_size))
            .body(reqwest::Body::wrap_stream(body))
            .send();
        let resp = tokio::select! {
            resp = request => resp.map_err(|e| self.classify(e))?,
            () = stalled(&sent, self.timeouts.transfer) => {
                warn!(
                    host = %self.host,
                    port = self.port,
                    sent = sent.load(Ordering::Relaxed),
                    "upload stalled"
                );
                return Err(self.timed_out());
            }
        };
        let resp = check_status(resp).await?;

        let body = resp.bytes().await.map_err(|e| self.classify(e))?;
        let result: UploadResponse = serde_json::from_slice(&body)
            .map_err(|e| FileServiceError::Protocol(e.to_string()))?;
        if !result.success {
            return Err(FileServiceError::Rejected(
                result.message.unwrap_or_else(|| "Upload failed".into()),
            ));
        }
        Ok(result)
    }
}

/// Fails `body` with `on_idle` when no chunk arrives for `idle`.
fn idle_limited<S>(
    body: S,
    idle: Duration,
    on_idle: FileServiceError,
) -> BoxStream<'static, Result<Bytes, FileServiceError>>
where
    S: Stream<Item = Result<Bytes, FileServiceError>> + Send + 'static,
{
    stream::unfold(Some((body.boxed(), on_idle)), move |state| async move {
        let (mut body, on_idle) = state?;
        match tokio::time::timeout(idle, body.next()).await {
            Ok(Some(item)) => Some((item, Some((body, on_idle)))),
            Ok(None) => None,
            Err(_) => Some((Err(on_idle), None)),
        }
    })
    .boxed()
}

/// Resolves once `counter` has not moved for a whole `idle` window.
async fn stalled(counter: &AtomicU64, idle: Duration) {
    let mut last = counter.load(Ordering::Relaxed);
    loop {
        tokio::time::sleep(idle).await;
        let now = counter.load(Ordering::Relaxed);
        if now == last {
            return;
        }
        last = now;
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, FileServiceError> {
    if resp.status().is_success() {
        Ok(resp)
    } else {
        Err(status_error(resp).await)
    }
}

/// Builds a `Status` error, preferring the service's `message` field.
async fn status_error(resp: reqwest::Response) -> FileServiceError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<UploadResponse>(&body)
        .ok()
        .and_then(|r| r.message)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
    FileServiceError::Status {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// Reads one request: headers plus a `Content-Length` body.
    async fn read_request(stream: &mut TcpStream) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut chunk = vec![0u8; 8192];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let headers = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
                let len = headers
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + len {
                    break;
                }
            }
        }
        buf
    }

    /// Starts a mock HTTP server that answers one request with `response`
    /// and hands back the raw request it received.
    async fn mock_server(response: Vec<u8>) -> (u16, tokio::task::JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = read_request(&mut stream).await;
            let _ = stream.write_all(&response).await;
            let _ = stream.shutdown().await;
            request
        });

        (port, handle)
    }

    fn response(status: &str, body: &[u8]) -> Vec<u8> {
        let mut out = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        )
        .into_bytes();
        out.extend_from_slice(body);
        out
    }

    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    async fn collect(resp: DownloadResponse) -> Vec<u8> {
        resp.stream
            .try_fold(Vec::new(), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok(acc)
            })
            .await
            .unwrap()
    }

    fn lossy(request: &[u8]) -> String {
        String::from_utf8_lossy(request).to_ascii_lowercase()
    }

    #[tokio::test]
    async fn health_check_ok() {
        let (port, handle) = mock_server(response("200 OK", br#"{"success":true}"#)).await;
        let client = FileServiceClient::new("127.0.0.1", port).unwrap();

        assert!(client.health_check(HEALTH_TIMEOUT).await);
        let request = lossy(&handle.await.unwrap());
        assert!(request.starts_with("get /api/files/health "));
    }

    #[tokio::test]
    async fn health_check_unhealthy_variants() {
        for (status, body) in [
            ("200 OK", &br#"{"success":false}"#[..]),
            ("200 OK", &b"<html>not json</html>"[..]),
            ("500 Internal Server Error", &br#"{"success":true}"#[..]),
        ] {
            let (port, handle) = mock_server(response(status, body)).await;
            let client = FileServiceClient::new("127.0.0.1", port).unwrap();
            assert!(!client.health_check(HEALTH_TIMEOUT).await, "{status}");
            handle.abort();
        }
    }

    #[tokio::test]
    async fn health_check_never_errors_on_refusal() {
        let client = FileServiceClient::new("127.0.0.1", closed_port().await).unwrap();
        assert!(!client.health_check(Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn list_returns_entries() {
        let json = br#"{"success":true,"items":[
            {"name":"office.pgm","type":"file","size":2048,"path":"maps/office/office.pgm"},
            {"name":"old","type":"directory","size":null}
        ]}"#;
        let (port, handle) = mock_server(response("200 OK", json)).await;
        let client = FileServiceClient::new("127.0.0.1", port).unwrap();

        let items = client.list("maps/office").await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].size, Some(2048));
        assert!(!items[1].is_file());

        let request = lossy(&handle.await.unwrap());
        assert!(request.starts_with("get /api/files/list?path=maps%2foffice "));
    }

    #[tokio::test]
    async fn list_failure_uses_service_message() {
        let body = br#"{"success":false,"message":"Path does not exist"}"#;
        let (port, _handle) = mock_server(response("404 Not Found", body)).await;
        let client = FileServiceClient::new("127.0.0.1", port).unwrap();

        match client.list("nope").await {
            Err(FileServiceError::Status { status, message }) => {
                assert_eq!(status, 404);
                assert_eq!(message, "Path does not exist");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn list_refused_carries_address() {
        let port = closed_port().await;
        let client = FileServiceClient::new("127.0.0.1", port).unwrap();

        let err = client.list("maps").await.unwrap_err();
        assert!(matches!(err, FileServiceError::ConnectionRefused { .. }), "{err:?}");
        assert_eq!(err.to_string(), format!("Connection refused (127.0.0.1:{port})"));
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(stream);
        });

        let timeouts = Timeouts {
            control: Duration::from_millis(200),
            ..Timeouts::default()
        };
        let client = FileServiceClient::with_timeouts("127.0.0.1", port, timeouts).unwrap();
        let err = client.list("maps").await.unwrap_err();
        assert!(matches!(err, FileServiceError::TimedOut { .. }), "{err:?}");
        handle.abort();
    }

    #[tokio::test]
    async fn full_download_sends_no_range() {
        let mut resp = b"HTTP/1.1 200 OK\r\nContent-Length: 6\r\nConnection: close\r\n\r\n".to_vec();
        resp.extend_from_slice(b"abcdef");
        let (port, handle) = mock_server(resp).await;
        let client = FileServiceClient::new("127.0.0.1", port).unwrap();

        let download = client.download("maps/a.pgm", Some(0)).await.unwrap();
        assert!(!download.partial);
        assert_eq!(download.content_length, Some(6));
        assert_eq!(collect(download).await, b"abcdef");

        let request = lossy(&handle.await.unwrap());
        assert!(request.starts_with("get /api/files/download?path=maps%2fa.pgm "));
        assert!(!request.contains("range:"));
    }

    #[tokio::test]
    async fn ranged_download_is_partial() {
        let mut resp =
            b"HTTP/1.1 206 Partial Content\r\nContent-Length: 3\r\nContent-Range: bytes 3-5/6\r\nConnection: close\r\n\r\n"
                .to_vec();
        resp.extend_from_slice(b"def");
        let (port, handle) = mock_server(resp).await;
        let client = FileServiceClient::new("127.0.0.1", port).unwrap();

        let download = client.download("maps/a.pgm", Some(3)).await.unwrap();
        assert!(download.partial);
        assert_eq!(collect(download).await, b"def");

        let request = lossy(&handle.await.unwrap());
        assert!(request.contains("range: bytes=3-\r\n"));
    }

    /// Answers one download with `head`, then writes `body` one byte per
    /// `gap`, then holds the connection open for `hold`.
    async fn trickle_server(
        head: &'static str,
        body: Vec<u8>,
        gap: Duration,
        hold: Duration,
    ) -> (u16, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.set_nodelay(true).unwrap();
            read_request(&mut stream).await;
            stream.write_all(head.as_bytes()).await.unwrap();
            for byte in body {
                if stream.write_all(&[byte]).await.is_err() {
                    return;
                }
                tokio::time::sleep(gap).await;
            }
            tokio::time::sleep(hold).await;
        });

        (port, handle)
    }

    fn short_transfer(transfer: Duration) -> Timeouts {
        Timeouts {
            transfer,
            ..Timeouts::default()
        }
    }

    #[tokio::test]
    async fn steady_download_outlives_transfer_timeout() {
        let body: Vec<u8> = (b'a'..=b't').collect();
        let (port, handle) = trickle_server(
            "HTTP/1.1 200 OK\r\nContent-Length: 20\r\nConnection: close\r\n\r\n",
            body.clone(),
            Duration::from_millis(100),
            Duration::ZERO,
        )
        .await;
        let client =
            FileServiceClient::with_timeouts("127.0.0.1", port, short_transfer(Duration::from_secs(1)))
                .unwrap();

        let download = client.download("maps/slow.pcd", None).await.unwrap();
        assert_eq!(collect(download).await, body);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn silent_body_times_out() {
        let (port, handle) = trickle_server(
            "HTTP/1.1 200 OK\r\nContent-Length: 10\r\nConnection: close\r\n\r\n",
            b"abc".to_vec(),
            Duration::ZERO,
            Duration::from_secs(5),
        )
        .await;
        let client = FileServiceClient::with_timeouts(
            "127.0.0.1",
            port,
            short_transfer(Duration::from_millis(300)),
        )
        .unwrap();

        let mut download = client.download("maps/stuck.pcd", None).await.unwrap();
        let mut received = 0;
        let err = loop {
            match download.stream.next().await {
                Some(Ok(chunk)) => received += chunk.len(),
                Some(Err(e)) => break e,
                None => panic!("stream ended without error"),
            }
        };
        assert_eq!(received, 3);
        assert!(matches!(err, FileServiceError::TimedOut { .. }), "{err:?}");
        assert!(download.stream.next().await.is_none());
        handle.abort();
    }

    #[tokio::test]
    async fn upload_without_response_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.yaml");
        std::fs::write(&path, b"image: a.pgm").unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_request(&mut stream).await;
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let client = FileServiceClient::with_timeouts(
            "127.0.0.1",
            port,
            short_transfer(Duration::from_millis(300)),
        )
        .unwrap();
        let sent = Arc::new(AtomicU64::new(0));
        let err = client
            .upload(&path, "a.yaml", "map", Arc::clone(&sent))
            .await
            .unwrap_err();

        assert!(matches!(err, FileServiceError::TimedOut { .. }), "{err:?}");
        assert_eq!(sent.load(Ordering::Relaxed), 12);
        handle.abort();
    }

    #[tokio::test]
    async fn download_rejects_other_status() {
        let body = br#"{"success":false,"message":"File not found"}"#;
        let (port, _handle) = mock_server(response("404 Not Found", body)).await;
        let client = FileServiceClient::new("127.0.0.1", port).unwrap();

        let err = client.download("missing.pcd", None).await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP 404: File not found");
    }

    #[tokio::test]
    async fn upload_streams_file_and_counts_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cloud.pcd");
        let content: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &content).unwrap();

        let body = br#"{"success":true,"message":"File uploaded","path":"maps/office/cloud.pcd"}"#;
        let (port, handle) = mock_server(response("200 OK", body)).await;
        let client = FileServiceClient::new("127.0.0.1", port).unwrap();
        let sent = Arc::new(AtomicU64::new(0));

        let result = client
            .upload(&path, "cloud.pcd", "maps/office", Arc::clone(&sent))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(sent.load(Ordering::Relaxed), content.len() as u64);

        let request = handle.await.unwrap();
        let split = request.windows(4).position(|w| w == b"\r\n\r\n").unwrap();
        let head = String::from_utf8_lossy(&request[..split]).to_string();
        let boundary = head
            .lines()
            .find_map(|l| l.split_once("boundary="))
            .map(|(_, b)| b.trim().to_string())
            .unwrap();
        let declared: usize = head
            .to_ascii_lowercase()
            .lines()
            .find_map(|l| l.strip_prefix("content-length:").map(|v| v.trim().parse().unwrap()))
            .unwrap();
        let payload = Bytes::copy_from_slice(&request[split + 4..]);
        assert_eq!(payload.len(), declared);

        let form = robofile_multipart::parse_form(payload, &boundary);
        let file = form.require_file("file").unwrap();
        assert_eq!(file.filename, "cloud.pcd");
        assert_eq!(&file.data[..], &content[..]);
        assert_eq!(form.field("destination"), Some("maps/office"));
    }

    #[tokio::test]
    async fn upload_rejection_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.yaml");
        std::fs::write(&path, b"x").unwrap();

        let body = br#"{"success":false,"message":"Invalid destination path"}"#;
        let (port, _handle) = mock_server(response("200 OK", body)).await;
        let client = FileServiceClient::new("127.0.0.1", port).unwrap();

        let err = client
            .upload(&path, "a.yaml", "../etc", Arc::new(AtomicU64::new(0)))
            .await
            .unwrap_err();
        assert!(matches!(err, FileServiceError::Rejected(ref m) if m == "Invalid destination path"));
    }

    #[tokio::test]
    async fn upload_of_missing_local_file_is_io() {
        let client = FileServiceClient::new("127.0.0.1", 1).unwrap();
        let err = client
            .upload(
                Path::new("/definitely/not/here.pgm"),
                "here.pgm",
                "map",
                Arc::new(AtomicU64::new(0)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FileServiceError::Io(_)));
    }

    #[test]
    fn from_url_defaults_port() {
        let client = FileServiceClient::from_url("http://192.168.1.20", None).unwrap();
        assert_eq!(client.host(), "192.168.1.20");
        assert_eq!(client.port(), DEFAULT_PORT);

        let client = FileServiceClient::from_url("http://robot.local:9000/", Some(8080)).unwrap();
        assert_eq!(client.port(), 9000);

        let client = FileServiceClient::from_url("http://robot.local", Some(8081)).unwrap();
        assert_eq!(client.port(), 8081);

        assert!(matches!(
            FileServiceClient::from_url("not a url", None),
            Err(FileServiceError::InvalidUrl(_))
        ));
    }

    #[test]
    fn api_prefix_override() {
        let client = FileServiceClient::new("h", 1)
            .unwrap()
            .with_api_prefix("/files/");
        assert_eq!(client.url("list"), "http://h:1/files/list");
    }
}
