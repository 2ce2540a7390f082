pub mod events;
pub mod remote;
pub mod requests;
pub mod types;

// Re-export primary types for convenience.
pub use events::ProgressEvent;
pub use remote::{EntryKind, HealthResponse, ListResponse, RemoteEntry, UploadResponse};
pub use requests::{
    CopyInstruction, DownloadFromRobotRequest, LocalFileSpec, MapConfig, RemoteFileSpec,
    SendToRobotRequest,
};
pub use types::{Direction, FileOutcome, TaskStatus};
