//! Error taxonomy of the file-service client.

/// Errors produced by [`FileServiceClient`](crate::FileServiceClient).
///
/// Transport failures carry the robot's address so the message alone is
/// enough to diagnose an unreachable robot.
#[derive(Debug, thiserror::Error)]
pub enum FileServiceError {
    #[error("Connection refused ({host}:{port})")]
    ConnectionRefused { host: String, port: u16 },

    #[error("Connection timeout ({host}:{port})")]
    TimedOut { host: String, port: u16 },

    #[error("Hostname not found ({host})")]
    HostNotFound { host: String },

    #[error("Transfer error ({host}:{port}): {message}")]
    Transport {
        host: String,
        port: u16,
        message: String,
    },

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid response: {0}")]
    Protocol(String),

    #[error("{0}")]
    Rejected(String),

    #[error("invalid robot URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FileServiceError {
    /// Classifies a reqwest failure against `host:port`.
    pub(crate) fn classify(err: &reqwest::Error, host: &str, port: u16) -> Self {
        let host = host.to_string();

        if err.is_timeout() || io_kind(err) == Some(std::io::ErrorKind::TimedOut) {
            return Self::TimedOut { host, port };
        }
        if io_kind(err) == Some(std::io::ErrorKind::ConnectionRefused) {
            return Self::ConnectionRefused { host, port };
        }
        if err.is_connect() && mentions_dns(err) {
            return Self::HostNotFound { host };
        }
        Self::Transport {
            host,
            port,
            message: error_chain(err),
        }
    }
}

/// Kind of the first `io::Error` in the source chain.
fn io_kind(err: &(dyn std::error::Error + 'static)) -> Option<std::io::ErrorKind> {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            return Some(io.kind());
        }
        source = e.source();
    }
    None
}

fn mentions_dns(err: &(dyn std::error::Error + 'static)) -> bool {
    let chain = error_chain(err).to_ascii_lowercase();
    chain.contains("dns error")
        || chain.contains("failed to lookup address")
        || chain.contains("name or service not known")
        || chain.contains("no such host")
}

/// Joins the messages of an error and all of its sources.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(e) = source {
        let msg = e.to_string();
        if !out.contains(&msg) {
            out.push_str(": ");
            out.push_str(&msg);
        }
        source = e.source();
    }
    out
}
