//! Streamed multipart/form-data decoding.
//!
//! Decoding runs in two phases:
//!
//! 1. **Spool**: the request body is written chunk by chunk to a uniquely
//!    named scratch file, bounded by a hard byte ceiling.
//! 2. **Scan**: the spooled payload is read back once and split on
//!    aligned `--boundary` delimiters into fields and file parts.
//!
//! The scratch file is removed when decoding returns, whatever the outcome.

pub mod decoder;
pub mod error;
pub mod parse;
pub mod spool;

pub use decoder::{MultipartDecoder, parse_boundary};
pub use error::MultipartError;
pub use parse::{FilePart, FormData, parse_form};
pub use spool::{ScratchFile, spool_body};

/// Hard ceiling on a spooled request body (512 MiB).
pub const SPOOL_LIMIT_BYTES: u64 = 512 * 1024 * 1024;

/// Prefix of every scratch file name.
pub const SCRATCH_PREFIX: &str = "upload_";
