//! Push channel carrying one batch's events to one listener.
//!
//! Delivery is ordered and best-effort. Lifecycle events wait for queue
//! space; `progress` events are offered and dropped when the listener
//! lags, since the next one supersedes them. Once the listener is gone
//! every further event is discarded and the batch carries on.

use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use bytes::Bytes;
use futures_util::Stream;
use futures_util::stream;
use robofile_protocol::ProgressEvent;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::CHANNEL_CAPACITY;

/// Sending half, owned by the batch run.
#[derive(Debug)]
pub struct ProgressChannel {
    tx: mpsc::Sender<ProgressEvent>,
    closed: AtomicBool,
    dropped: AtomicU64,
}

/// Receiving half, owned by the caller's connection.
#[derive(Debug)]
pub struct ProgressListener {
    rx: mpsc::Receiver<ProgressEvent>,
}

impl ProgressChannel {
    /// Creates a channel with the default queue depth.
    pub fn new() -> (Self, ProgressListener) {
        Self::with_capacity(CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> (Self, ProgressListener) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let channel = Self {
            tx,
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        };
        (channel, ProgressListener { rx })
    }

    /// Delivers `event`, or discards it if the listener is gone.
    pub async fn emit(&self, event: ProgressEvent) {
        if self.closed.load(Ordering::Relaxed) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }
        if self.tx.is_closed() {
            self.mark_closed();
            return;
        }

        if event.is_progress() {
            match self.tx.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Closed(_)) => self.mark_closed(),
            }
        } else if self.tx.send(event).await.is_err() {
            self.mark_closed();
        }
    }

    /// True once the listener has disconnected.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed) || self.tx.is_closed()
    }

    /// Number of events that were never delivered.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn mark_closed(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        if !self.closed.swap(true, Ordering::Relaxed) {
            debug!("progress listener disconnected, dropping further events");
        }
    }
}

impl ProgressListener {
    /// Next event, or `None` after the batch has finished.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.rx.recv().await
    }

    /// Adapts the listener into a stream of `data: <json>\n\n` frames.
    ///
    /// The stream ends with the `complete` frame, or when the batch goes
    /// away without one.
    pub fn into_frames(self) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
        stream::unfold(Some(self.rx), |rx| async move {
            let mut rx = rx?;
            loop {
                let event = rx.recv().await?;
                match event.to_frame() {
                    Ok(frame) => {
                        let next = (!event.is_terminal()).then_some(rx);
                        return Some((Ok(Bytes::from(frame)), next));
                    }
                    Err(e) => warn!(kind = event.kind(), error = %e, "failed to encode event"),
                }
            }
        })
    }
}
