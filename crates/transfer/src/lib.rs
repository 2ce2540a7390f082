//! Resumable batch transfers with progress telemetry.
//!
//! A [`TransferBatch`] moves files in one direction between the local
//! maps directory and a robot's file service. The
//! [`TransferOrchestrator`] runs it strictly one file at a time:
//!
//! 1. **Initialize**: health gate, then size resolution
//! 2. **Run**: per file, resume offset, transfer, events
//! 3. **Finish**: a single `complete` event with every file's outcome
//!
//! Events go through a [`ProgressChannel`]; losing the listener never
//! stops the batch.

mod channel;
mod lease;
mod orchestrator;
mod progress;
mod remote;
mod resume;
mod types;
mod validation;

pub use channel::{ProgressChannel, ProgressListener};
pub use lease::{PathLease, PathLeases};
pub use orchestrator::{BatchReport, TransferOrchestrator, gate};
pub use progress::{ProgressThrottle, percent_of};
pub use remote::{RemoteFiles, RemoteFuture};
pub use resume::{resolve_resume_offset, resume_offset_for};
pub use types::{BatchState, FileTransferTask, TransferBatch};
pub use validation::{confine, normalize_remote_path, validate_relative_path};

use std::time::Duration;

use robofile_protocol::TaskStatus;

/// Minimum wall-clock gap between two download `progress` events.
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

/// Poll period of the upload sent-bytes counter.
pub const UPLOAD_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Declared-vs-received length gap still considered a quirk (64 KiB).
pub const LENGTH_MISMATCH_TOLERANCE: u64 = 64 * 1024;

/// Queue depth of a progress channel.
pub const CHANNEL_CAPACITY: usize = 256;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("Robot file service not responding to health check")]
    Unhealthy,

    #[error("{0}")]
    Remote(#[from] robofile_file_service::FileServiceError),

    #[error("batch is {actual:?}, expected {expected:?}")]
    InvalidState {
        expected: BatchState,
        actual: BatchState,
    },

    #[error("task {file}: cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        file: String,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("{0}")]
    Rejected(String),
}
