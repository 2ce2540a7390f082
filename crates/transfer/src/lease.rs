//! Per-target-path leases.
//!
//! Concurrent batches may share the local maps directory, but two of
//! them must never write the same file at once. Every transfer holds the
//! lease for its local path; a competing transfer waits for it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;
use tracing::debug;

type LeaseMap = HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>;

/// Shared registry of path leases. Cloning shares the registry.
#[derive(Debug, Clone, Default)]
pub struct PathLeases {
    inner: Arc<Mutex<LeaseMap>>,
}

/// Exclusive hold on one path, released on drop.
#[derive(Debug)]
pub struct PathLease {
    path: PathBuf,
    registry: PathLeases,
    _guard: OwnedMutexGuard<()>,
}

impl PathLeases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until `path` is free and takes it.
    pub async fn acquire(&self, path: &Path) -> PathLease {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(map.entry(path.to_path_buf()).or_default())
        };

        let guard = match Arc::clone(&lock).try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                debug!(path = %path.display(), "waiting for path lease");
                lock.lock_owned().await
            }
        };

        PathLease {
            path: path.to_path_buf(),
            registry: self.clone(),
            _guard: guard,
        }
    }

}

impl PathLease {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PathLease {
    fn drop(&mut self) {
        let mut map = self.registry.inner.lock().unwrap_or_else(|e| e.into_inner());
        // One reference in the map, one in our guard: nobody is waiting.
        let idle = map
            .get(&self.path)
            .is_some_and(|lock| Arc::strong_count(lock) <= 2);
        if idle {
            map.remove(&self.path);
        }
    }
}
