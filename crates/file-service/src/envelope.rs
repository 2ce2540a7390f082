//! Hand-built multipart envelope for streamed uploads.
//!
//! The body is `prefix ‖ file bytes ‖ suffix`. The prefix opens the
//! `file` part; the suffix closes it, carries the `destination` field
//! and the closing delimiter. Only the two literals are held in memory.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

/// Literal prefix and suffix of one upload request body.
#[derive(Debug, Clone)]
pub struct UploadEnvelope {
    boundary: String,
    prefix: Bytes,
    suffix: Bytes,
}

impl UploadEnvelope {
    /// Builds an envelope with a freshly generated boundary.
    pub fn new(file_name: &str, destination: &str) -> Self {
        Self::with_boundary(generate_boundary(), file_name, destination)
    }

    pub fn with_boundary(boundary: String, file_name: &str, destination: &str) -> Self {
        let file_name = quote_safe(file_name);
        let prefix = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        );
        let suffix = format!(
            "\r\n--{boundary}\r\n\
             Content-Disposition: form-data; name=\"destination\"\r\n\r\n\
             {destination}\r\n\
             --{boundary}--\r\n"
        );
        Self {
            boundary,
            prefix: Bytes::from(prefix),
            suffix: Bytes::from(suffix),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn prefix(&self) -> Bytes {
        self.prefix.clone()
    }

    pub fn suffix(&self) -> Bytes {
        self.suffix.clone()
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Exact body length for a file of `file_size` bytes.
    pub fn content_length(&self, file_size: u64) -> u64 {
        self.prefix.len() as u64 + file_size + self.suffix.len() as u64
    }
}

fn generate_boundary() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    format!("----formdata-{millis}-{}", &nonce[..12])
}

/// Keeps a file name inside its quoted header parameter.
fn quote_safe(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '\r' && *c != '\n')
        .map(|c| if c == '"' { '\'' } else { c })
        .collect()
}
