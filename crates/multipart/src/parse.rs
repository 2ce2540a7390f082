//! Phase two: split a spooled payload into fields and file parts.

use std::collections::HashMap;

use bytes::Bytes;
use tracing::debug;

use crate::MultipartError;

const CRLF: &[u8] = b"\r\n";
const HEADER_END: &[u8] = b"\r\n\r\n";

/// One uploaded file.
#[derive(Debug, Clone, PartialEq)]
pub struct FilePart {
    pub field_name: String,
    pub filename: String,
    pub content_type: Option<String>,
    /// Slice of the spooled payload; no copy is made.
    pub data: Bytes,
}

/// Decoded form: text fields by name plus file parts in body order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: Vec<FilePart>,
}

impl FormData {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn fields(&self) -> &HashMap<String, String> {
        &self.fields
    }

    pub fn files(&self) -> &[FilePart] {
        &self.files
    }

    /// First file part uploaded under `field_name`.
    pub fn file(&self, field_name: &str) -> Option<&FilePart> {
        self.files.iter().find(|f| f.field_name == field_name)
    }

    pub fn files_named<'a>(&'a self, field_name: &'a str) -> impl Iterator<Item = &'a FilePart> {
        self.files.iter().filter(move |f| f.field_name == field_name)
    }

    /// Like [`file`](Self::file), for endpoints that cannot proceed without one.
    pub fn require_file(&self, field_name: &str) -> Result<&FilePart, MultipartError> {
        self.file(field_name)
            .ok_or_else(|| MultipartError::MissingFilePart(field_name.to_string()))
    }

    pub fn into_files(self) -> Vec<FilePart> {
        self.files
    }
}

/// Parses a complete multipart payload.
///
/// Parts without a `name` in their `Content-Disposition` are skipped, as
/// are file parts with an empty filename.
pub fn parse_form(payload: Bytes, boundary: &str) -> FormData {
    let marker = format!("--{boundary}");
    let offsets = delimiter_offsets(&payload, marker.as_bytes());
    let mut form = FormData::default();

    for pair in offsets.windows(2) {
        let start = pair[0] + marker.len();
        if payload[start..].starts_with(b"--") {
            // Closing delimiter; anything after it is epilogue.
            break;
        }
        let start = if payload[start..].starts_with(CRLF) {
            start + CRLF.len()
        } else {
            start
        };
        // Every non-initial delimiter is preceded by CRLF.
        let end = pair[1] - CRLF.len();
        if end <= start {
            continue;
        }
        add_part(&mut form, payload.slice(start..end));
    }

    debug!(
        fields = form.fields.len(),
        files = form.files.len(),
        "multipart payload parsed"
    );
    form
}

fn add_part(form: &mut FormData, part: Bytes) {
    let Some(header_end) = find(&part, HEADER_END, 0) else {
        return;
    };
    let headers = String::from_utf8_lossy(&part[..header_end]);
    let body = part.slice(header_end + HEADER_END.len()..);

    let mut name = None;
    let mut filename = None;
    let mut content_type = None;
    for line in headers.split("\r\n") {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        if key.trim().eq_ignore_ascii_case("content-disposition") {
            for (k, v) in header_params(value) {
                match k.to_ascii_lowercase().as_str() {
                    "name" => name = Some(v),
                    "filename" => filename = Some(v),
                    _ => {}
                }
            }
        } else if key.trim().eq_ignore_ascii_case("content-type") {
            content_type = Some(value.trim().to_string());
        }
    }

    let Some(field_name) = name.filter(|n| !n.is_empty()) else {
        return;
    };
    match filename {
        Some(filename) if filename.is_empty() => {}
        Some(filename) => form.files.push(FilePart {
            field_name,
            filename,
            content_type,
            data: body,
        }),
        None => {
            let value = String::from_utf8_lossy(&body).trim().to_string();
            form.fields.insert(field_name, value);
        }
    }
}

/// Offsets of every aligned occurrence of `marker`.
///
/// A delimiter must start the payload or follow CRLF, and must be
/// followed by CRLF, `--`, or the end of the payload. Any other
/// occurrence belongs to part content.
fn delimiter_offsets(payload: &[u8], marker: &[u8]) -> Vec<usize> {
    let mut offsets = Vec::new();
    let mut from = 0;

    while let Some(pos) = find(payload, marker, from) {
        let after = &payload[pos + marker.len()..];
        let aligned_start = pos == 0 || payload[..pos].ends_with(CRLF);
        let aligned_end = after.is_empty() || after.starts_with(CRLF) || after.starts_with(b"--");

        if aligned_start && aligned_end {
            offsets.push(pos);
            from = pos + marker.len();
        } else {
            from = pos + 1;
        }
    }
    offsets
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// Splits `form-data; name="a"; filename="b"` into key/value pairs,
/// honouring quotes. Unquoted values run to the next `;`.
fn header_params(value: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let mut rest = value;

    while let Some(eq) = rest.find('=') {
        let key = rest[..eq]
            .rsplit(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        let after = &rest[eq + 1..];

        let (val, remaining) = if let Some(quoted) = after.strip_prefix('"') {
            match quoted.find('"') {
                Some(close) => (&quoted[..close], &quoted[close + 1..]),
                None => (quoted, ""),
            }
        } else {
            match after.find(';') {
                Some(semi) => (&after[..semi], &after[semi..]),
                None => (after, ""),
            }
        };

        params.push((key, val.trim().to_string()));
        rest = remaining;
    }
    params
}
