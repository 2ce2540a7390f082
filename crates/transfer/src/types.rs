use std::path::{Path, PathBuf};

use robofile_protocol::{Direction, FileOutcome, TaskStatus};

use crate::TransferError;
use crate::validation::{confine, normalize_remote_path};

/// Lifecycle of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Created,
    /// Health gate passed and sizes resolved.
    Initialized,
    Running,
    Finished,
}

/// One file of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct FileTransferTask {
    pub file_name: String,
    /// Slash-separated, relative to the robot's file root.
    pub remote_path: String,
    /// Absolute, under the batch's local root.
    pub local_path: PathBuf,
    /// 0 when unknown.
    pub expected_size: u64,
    pub resume_offset: u64,
    status: TaskStatus,
    /// Set for entries that were invalid when the batch was built.
    rejection: Option<String>,
}

impl FileTransferTask {
    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn rejection(&self) -> Option<&str> {
        self.rejection.as_deref()
    }

    /// Remote directory the file lives in (empty for the root).
    pub fn remote_dir(&self) -> &str {
        self.remote_path
            .rsplit_once('/')
            .map(|(dir, _)| dir)
            .unwrap_or("")
    }

    pub(crate) fn start(&mut self) -> Result<(), TransferError> {
        self.transition(TaskStatus::Pending, TaskStatus::InProgress)
    }

    pub(crate) fn finish(&mut self, success: bool) -> Result<(), TransferError> {
        let to = if success {
            TaskStatus::Complete
        } else {
            TaskStatus::Failed
        };
        self.transition(TaskStatus::InProgress, to)
    }

    fn transition(&mut self, from: TaskStatus, to: TaskStatus) -> Result<(), TransferError> {
        if self.status != from {
            return Err(TransferError::InvalidTransition {
                file: self.file_name.clone(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}

/// A directional set of files moved together.
///
/// `transferred_bytes` only grows; `results` is append-only.
#[derive(Debug)]
pub struct TransferBatch {
    id: String,
    direction: Direction,
    local_root: PathBuf,
    tasks: Vec<FileTransferTask>,
    total_bytes: u64,
    transferred_bytes: u64,
    results: Vec<FileOutcome>,
    state: BatchState,
}

impl TransferBatch {
    /// Creates an empty batch pulling files from the robot into `local_root`.
    pub fn download(local_root: impl Into<PathBuf>) -> Self {
        Self::new(Direction::Download, local_root.into())
    }

    /// Creates an empty batch pushing files from `local_root` to the robot.
    pub fn upload(local_root: impl Into<PathBuf>) -> Self {
        Self::new(Direction::Upload, local_root.into())
    }

    fn new(direction: Direction, local_root: PathBuf) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            direction,
            local_root,
            tasks: Vec::new(),
            total_bytes: 0,
            transferred_bytes: 0,
            results: Vec::new(),
            state: BatchState::Created,
        }
    }

    /// Adds a download of `remote_path` into `local_relative` (under the
    /// local root). `size` is the caller-supplied size, if any.
    pub fn add_download(
        &mut self,
        file_name: &str,
        remote_path: &str,
        local_relative: &str,
        size: Option<u64>,
    ) -> Result<(), TransferError> {
        let remote_path = normalize_remote_path(remote_path)?;
        let local_path = confine(&self.local_root, local_relative)?;
        self.push(file_name, remote_path, local_path, size.unwrap_or(0));
        Ok(())
    }

    /// Adds an upload of `local_relative` into the remote directory
    /// `destination`, stored there as `file_name`.
    pub fn add_upload(
        &mut self,
        local_relative: &str,
        file_name: &str,
        destination: &str,
    ) -> Result<(), TransferError> {
        let local_path = confine(&self.local_root, local_relative)?;
        let remote_path = match normalize_remote_path(destination) {
            Ok(dir) => format!("{dir}/{file_name}"),
            Err(_) if destination.trim_matches('/').is_empty() => file_name.to_string(),
            Err(e) => return Err(e),
        };
        let remote_path = normalize_remote_path(&remote_path)?;
        self.push(file_name, remote_path, local_path, 0);
        Ok(())
    }

    /// Adds an entry that is reported as failed without being attempted.
    pub fn add_rejected(&mut self, file_name: &str, reason: impl Into<String>) {
        let index = self.tasks.len();
        self.push(file_name, String::new(), PathBuf::new(), 0);
        self.tasks[index].rejection = Some(reason.into());
    }

    fn push(&mut self, file_name: &str, remote_path: String, local_path: PathBuf, size: u64) {
        self.tasks.push(FileTransferTask {
            file_name: file_name.to_string(),
            remote_path,
            local_path,
            expected_size: size,
            resume_offset: 0,
            status: TaskStatus::Pending,
            rejection: None,
        });
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn local_root(&self) -> &Path {
        &self.local_root
    }

    pub fn tasks(&self) -> &[FileTransferTask] {
        &self.tasks
    }

    pub(crate) fn tasks_mut(&mut self) -> &mut [FileTransferTask] {
        &mut self.tasks
    }

    pub(crate) fn task_mut(&mut self, index: usize) -> &mut FileTransferTask {
        &mut self.tasks[index]
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes
    }

    pub fn results(&self) -> &[FileOutcome] {
        &self.results
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Recomputes the total from the tasks' expected sizes.
    pub(crate) fn recompute_total(&mut self) {
        self.total_bytes = self.tasks.iter().map(|t| t.expected_size).sum();
    }

    /// Adds moved bytes to the aggregate. The aggregate may pass the
    /// total when a size was unknown.
    pub(crate) fn credit(&mut self, bytes: u64) {
        self.transferred_bytes = self.transferred_bytes.saturating_add(bytes);
    }

    pub(crate) fn record(&mut self, outcome: FileOutcome) {
        self.results.push(outcome);
    }

    pub(crate) fn advance(&mut self, expected: BatchState, next: BatchState) -> Result<(), TransferError> {
        if self.state != expected {
            return Err(TransferError::InvalidState {
                expected,
                actual: self.state,
            });
        }
        self.state = next;
        Ok(())
    }

    pub(crate) fn into_results(self) -> Vec<FileOutcome> {
        self.results
    }
}
