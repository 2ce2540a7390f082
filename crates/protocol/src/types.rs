use serde::{Deserialize, Serialize};

/// Direction of a transfer batch, seen from the control server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Robot file service → local maps directory.
    Download,
    /// Local maps directory → robot file service.
    Upload,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Download => f.write_str("download"),
            Self::Upload => f.write_str("upload"),
        }
    }
}

/// Lifecycle of a single file inside a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    #[serde(rename = "in_progress")]
    InProgress,
    Complete,
    Failed,
}

/// Final record for one file of a batch.
///
/// `bytes_transferred` is what the file contributed to the batch
/// aggregate, including a resumed prefix already on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOutcome {
    pub file_name: String,
    pub status: TaskStatus,
    pub bytes_transferred: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub resumed_from: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileOutcome {
    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Complete
    }
}

fn is_zero_u64(v: &u64) -> bool {
    *v == 0
}
