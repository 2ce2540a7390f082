//! Batch orchestrator.
//!
//! Drives a [`TransferBatch`] through `Created → Initialized → Running →
//! Finished`, one file at a time, isolating per-file failures and
//! reporting everything through a [`ProgressChannel`].

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use robofile_file_service::HEALTH_TIMEOUT;
use robofile_protocol::{Direction, FileOutcome, ProgressEvent, TaskStatus};
use tokio::io::AsyncWriteExt;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::channel::ProgressChannel;
use crate::lease::PathLeases;
use crate::progress::{ProgressThrottle, percent_of};
use crate::remote::RemoteFiles;
use crate::resume::resolve_resume_offset;
use crate::types::{BatchState, FileTransferTask, TransferBatch};
use crate::{LENGTH_MISMATCH_TOLERANCE, PROGRESS_INTERVAL, TransferError, UPLOAD_POLL_INTERVAL};

/// Health gate of the `Initializing` state.
pub fn gate(healthy: bool) -> Result<(), TransferError> {
    if healthy {
        Ok(())
    } else {
        Err(TransferError::Unhealthy)
    }
}

/// Final totals and per-file outcomes of a finished batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub batch_id: String,
    pub direction: Direction,
    pub transferred_bytes: u64,
    pub total_bytes: u64,
    pub results: Vec<FileOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

/// Bytes one file contributed to the batch aggregate.
#[derive(Debug, Default)]
struct FileProgress {
    credited: u64,
    resumed_from: u64,
}

/// Runs transfer batches against one robot.
pub struct TransferOrchestrator {
    remote: Arc<dyn RemoteFiles>,
    leases: PathLeases,
    health_timeout: Duration,
    progress_interval: Duration,
    upload_poll_interval: Duration,
}

impl TransferOrchestrator {
    pub fn new(remote: Arc<dyn RemoteFiles>) -> Self {
        Self {
            remote,
            leases: PathLeases::new(),
            health_timeout: HEALTH_TIMEOUT,
            progress_interval: PROGRESS_INTERVAL,
            upload_poll_interval: UPLOAD_POLL_INTERVAL,
        }
    }

    /// Shares a lease registry with other orchestrators.
    pub fn with_leases(mut self, leases: PathLeases) -> Self {
        self.leases = leases;
        self
    }

    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn with_upload_poll_interval(mut self, interval: Duration) -> Self {
        self.upload_poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Initializes then executes `batch`.
    pub async fn run(
        &self,
        mut batch: TransferBatch,
        channel: &ProgressChannel,
    ) -> Result<BatchReport, TransferError> {
        self.initialize(&mut batch).await?;
        self.execute(batch, channel).await
    }

    /// Health gate and size resolution.
    ///
    /// An unhealthy robot fails the batch before any file is touched.
    pub async fn initialize(&self, batch: &mut TransferBatch) -> Result<(), TransferError> {
        if batch.state() != BatchState::Created {
            return Err(TransferError::InvalidState {
                expected: BatchState::Created,
                actual: batch.state(),
            });
        }

        let healthy = self.remote.health_check(self.health_timeout).await;
        if let Err(e) = gate(healthy) {
            warn!(
                batch = batch.id(),
                endpoint = %self.remote.endpoint(),
                "robot failed health check, batch aborted"
            );
            return Err(e);
        }

        match batch.direction() {
            Direction::Download => self.resolve_remote_sizes(batch).await,
            Direction::Upload => resolve_local_sizes(batch).await,
        }
        batch.recompute_total();
        batch.advance(BatchState::Created, BatchState::Initialized)?;

        info!(
            batch = batch.id(),
            direction = %batch.direction(),
            files = batch.len(),
            total_bytes = batch.total_bytes(),
            "batch initialized"
        );
        Ok(())
    }

    /// Transfers every file in order and emits the final `complete` event.
    pub async fn execute(
        &self,
        batch: TransferBatch,
        channel: &ProgressChannel,
    ) -> Result<BatchReport, TransferError> {
        self.execute_with(batch, channel, |_| async {}).await
    }

    /// Like [`execute`](Self::execute), running `before_complete` once the
    /// last file has finished and before `complete` is emitted.
    pub async fn execute_with<F, Fut>(
        &self,
        mut batch: TransferBatch,
        channel: &ProgressChannel,
        before_complete: F,
    ) -> Result<BatchReport, TransferError>
    where
        F: FnOnce(&BatchReport) -> Fut,
        Fut: Future<Output = ()>,
    {
        batch.advance(BatchState::Initialized, BatchState::Running)?;

        channel
            .emit(ProgressEvent::Init {
                total_size: batch.total_bytes(),
                total_files: batch.len(),
            })
            .await;

        for index in 0..batch.len() {
            self.run_task(&mut batch, index, channel).await;
        }

        batch.advance(BatchState::Running, BatchState::Finished)?;

        let report = BatchReport {
            batch_id: batch.id().to_string(),
            direction: batch.direction(),
            transferred_bytes: batch.transferred_bytes(),
            total_bytes: batch.total_bytes(),
            results: batch.into_results(),
        };
        before_complete(&report).await;
        channel
            .emit(ProgressEvent::Complete {
                transferred_bytes: report.transferred_bytes,
                total_bytes: report.total_bytes,
                results: report.results.clone(),
            })
            .await;

        info!(
            batch = %report.batch_id,
            direction = %report.direction,
            succeeded = report.succeeded(),
            failed = report.failed(),
            transferred_bytes = report.transferred_bytes,
            total_bytes = report.total_bytes,
            listener_dropped = channel.is_closed(),
            "batch finished"
        );
        Ok(report)
    }

    async fn run_task(&self, batch: &mut TransferBatch, index: usize, channel: &ProgressChannel) {
        let task = batch.tasks()[index].clone();
        if let Err(e) = batch.task_mut(index).start() {
            error!(batch = batch.id(), error = %e, "task not startable");
            return;
        }

        let mut progress = FileProgress::default();
        let result = match task.rejection() {
            Some(reason) => Err(TransferError::Rejected(reason.to_string())),
            None => {
                channel
                    .emit(ProgressEvent::FileStart {
                        file_name: task.file_name.clone(),
                        file_index: index + 1,
                        total_files: batch.len(),
                        file_size: task.expected_size,
                    })
                    .await;
                match batch.direction() {
                    Direction::Download => {
                        self.download_one(batch, index, &task, channel, &mut progress)
                            .await
                    }
                    Direction::Upload => {
                        self.upload_one(batch, &task, channel, &mut progress).await
                    }
                }
            }
        };

        if let Err(e) = batch.task_mut(index).finish(result.is_ok()) {
            error!(batch = batch.id(), error = %e, "task not finishable");
        }

        let error = match result {
            Ok(()) => {
                info!(
                    batch = batch.id(),
                    file = %task.file_name,
                    bytes = progress.credited,
                    resumed_from = progress.resumed_from,
                    "file transferred"
                );
                channel
                    .emit(ProgressEvent::FileComplete {
                        file_name: task.file_name.clone(),
                        transferred_bytes: batch.transferred_bytes(),
                        total_bytes: batch.total_bytes(),
                        percent: percent_of(batch.transferred_bytes(), batch.total_bytes()),
                    })
                    .await;
                None
            }
            Err(e) => {
                let message = e.to_string();
                warn!(batch = batch.id(), file = %task.file_name, error = %message, "file failed");
                channel
                    .emit(ProgressEvent::FileError {
                        file_name: task.file_name.clone(),
                        error: message.clone(),
                    })
                    .await;
                Some(message)
            }
        };

        batch.record(FileOutcome {
            file_name: task.file_name,
            status: if error.is_none() {
                TaskStatus::Complete
            } else {
                TaskStatus::Failed
            },
            bytes_transferred: progress.credited,
            resumed_from: progress.resumed_from,
            error,
        });
    }

    async fn download_one(
        &self,
        batch: &mut TransferBatch,
        index: usize,
        task: &FileTransferTask,
        channel: &ProgressChannel,
        progress: &mut FileProgress,
    ) -> Result<(), TransferError> {
        let _lease = self.leases.acquire(&task.local_path).await;
        if let Some(parent) = task.local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut offset = resolve_resume_offset(&task.local_path, task.expected_size).await;
        let response = self
            .remote
            .download(&task.remote_path, (offset > 0).then_some(offset))
            .await?;

        if offset > 0 && !response.partial {
            warn!(
                file = %task.file_name,
                offset,
                "range not honoured by robot, downloading from zero"
            );
            offset = 0;
        }
        batch.task_mut(index).resume_offset = offset;

        let mut file = if offset > 0 {
            tokio::fs::OpenOptions::new()
                .append(true)
                .open(&task.local_path)
                .await?
        } else {
            tokio::fs::File::create(&task.local_path).await?
        };

        if offset > 0 {
            info!(file = %task.file_name, offset, size = task.expected_size, "resuming download");
            batch.credit(offset);
            progress.credited += offset;
            progress.resumed_from = offset;
        }

        let declared = response.content_length;
        let mut stream = response.stream;
        let mut throttle = ProgressThrottle::new(self.progress_interval);
        let mut received: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;

            let n = chunk.len() as u64;
            received += n;
            batch.credit(n);
            progress.credited += n;

            let file_transferred = offset + received;
            let reached_end = task.expected_size > 0 && file_transferred >= task.expected_size;
            if throttle.ready(Instant::now()) || reached_end {
                channel
                    .emit(ProgressEvent::Progress {
                        file_name: task.file_name.clone(),
                        file_size: task.expected_size,
                        file_transferred,
                        transferred_bytes: batch.transferred_bytes(),
                        total_bytes: batch.total_bytes(),
                        percent: percent_of(batch.transferred_bytes(), batch.total_bytes()),
                    })
                    .await;
            }
        }

        file.flush().await?;
        file.sync_all().await?;

        if let Some(declared) = declared {
            check_length(&task.file_name, "content-length", declared, received);
        }
        if task.expected_size > 0 {
            check_length(
                &task.file_name,
                "expected size",
                task.expected_size,
                offset + received,
            );
        }
        Ok(())
    }

    async fn upload_one(
        &self,
        batch: &mut TransferBatch,
        task: &FileTransferTask,
        channel: &ProgressChannel,
        progress: &mut FileProgress,
    ) -> Result<(), TransferError> {
        let _lease = self.leases.acquire(&task.local_path).await;

        let sent = Arc::new(AtomicU64::new(0));
        let mut upload = self.remote.upload(
            &task.local_path,
            &task.file_name,
            task.remote_dir(),
            Arc::clone(&sent),
        );

        let mut ticker = tokio::time::interval(self.upload_poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;

        let mut reported: u64 = 0;
        let result = loop {
            tokio::select! {
                biased;

                result = &mut upload => break result,

                _ = ticker.tick() => {
                    let now = sent.load(Ordering::Relaxed);
                    if now > reported {
                        batch.credit(now - reported);
                        progress.credited += now - reported;
                        reported = now;
                        channel
                            .emit(ProgressEvent::Progress {
                                file_name: task.file_name.clone(),
                                file_size: task.expected_size,
                                file_transferred: now,
                                transferred_bytes: batch.transferred_bytes(),
                                total_bytes: batch.total_bytes(),
                                percent: percent_of(batch.transferred_bytes(), batch.total_bytes()),
                            })
                            .await;
                    }
                }
            }
        };

        let response = result?;
        let now = sent.load(Ordering::Relaxed);
        if now > reported {
            batch.credit(now - reported);
            progress.credited += now - reported;
        }
        debug!(
            file = %task.file_name,
            destination = task.remote_dir(),
            message = response.message.as_deref().unwrap_or_default(),
            "upload accepted"
        );
        Ok(())
    }

    /// Fills unknown download sizes from one listing per remote directory.
    async fn resolve_remote_sizes(&self, batch: &mut TransferBatch) {
        let mut listings: HashMap<String, Option<HashMap<String, u64>>> = HashMap::new();

        for task in batch.tasks_mut() {
            if task.expected_size > 0 || task.rejection().is_some() {
                continue;
            }

            let dir = task.remote_dir().to_string();
            if !listings.contains_key(&dir) {
                let sizes = match self.remote.list(&dir).await {
                    Ok(entries) => Some(
                        entries
                            .into_iter()
                            .filter(|e| e.is_file())
                            .filter_map(|e| Some((e.name, e.size?)))
                            .collect::<HashMap<_, _>>(),
                    ),
                    Err(e) => {
                        warn!(dir = %dir, error = %e, "size discovery failed, sizes stay unknown");
                        None
                    }
                };
                listings.insert(dir.clone(), sizes);
            }

            let name = task.remote_path.rsplit('/').next().unwrap_or_default();
            if let Some(size) = listings
                .get(&dir)
                .and_then(|sizes| sizes.as_ref())
                .and_then(|sizes| sizes.get(name))
            {
                task.expected_size = *size;
            }
        }
    }
}

/// Fills upload sizes from the local files.
async fn resolve_local_sizes(batch: &mut TransferBatch) {
    for task in batch.tasks_mut() {
        if task.rejection().is_some() {
            continue;
        }
        match tokio::fs::metadata(&task.local_path).await {
            Ok(meta) if meta.is_file() => task.expected_size = meta.len(),
            Ok(_) => warn!(path = %task.local_path.display(), "upload source is not a file"),
            Err(e) => warn!(path = %task.local_path.display(), error = %e, "upload source unreadable"),
        }
    }
}

/// Logs a gap between `expected` and `received` bytes. Small gaps are a
/// length-reporting quirk; large ones are flagged. Neither fails the file.
fn check_length(file: &str, source: &str, expected: u64, received: u64) {
    let gap = expected.abs_diff(received);
    if gap == 0 {
        return;
    }
    if gap <= LENGTH_MISMATCH_TOLERANCE {
        debug!(file, source, expected, received, "length mismatch within tolerance");
    } else {
        warn!(file, source, expected, received, flagged = true, "large length mismatch");
    }
}
