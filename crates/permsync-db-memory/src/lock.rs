//! Named locks with a bounded wait.
//!
//! [`MemoryLock`] serializes runs inside one process. [`FileLock`] uses an
//! advisory lock file so separate CLI invocations exclude each other.

use async_trait::async_trait;
use fs2::FileExt;
use papaya::HashMap as PapayaHashMap;
use permsync_storage::{LockLease, MutualExclusionLock, StorageError};
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;

const FILE_LOCK_POLL: Duration = Duration::from_millis(50);

/// In-process lock registry.
#[derive(Debug, Default)]
pub struct MemoryLock {
    locks: PapayaHashMap<String, Arc<Mutex<()>>>,
}

impl MemoryLock {
    pub fn new() -> Self {
        Self::default()
    }
}

struct MemoryLease {
    name: String,
    _guard: OwnedMutexGuard<()>,
}

impl LockLease for MemoryLease {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for MemoryLease {
    fn drop(&mut self) {
        tracing::debug!(lock = %self.name, "lock released");
    }
}

#[async_trait]
impl MutualExclusionLock for MemoryLock {
    async fn acquire(
        &self,
        name: &str,
        wait: Duration,
    ) -> Result<Box<dyn LockLease>, StorageError> {
        let mutex = self
            .locks
            .pin()
            .get_or_insert_with(name.to_string(), || Arc::new(Mutex::new(())))
            .clone();
        match tokio::time::timeout(wait, mutex.lock_owned()).await {
            Ok(guard) => {
                tracing::debug!(lock = %name, "lock acquired");
                Ok(Box::new(MemoryLease {
                    name: name.to_string(),
                    _guard: guard,
                }))
            }
            Err(_) => Err(StorageError::lock_unavailable(name)),
        }
    }
}

/// Advisory lock files under a directory, one file per lock name.
#[derive(Debug, Clone)]
pub struct FileLock {
    dir: PathBuf,
}

impl FileLock {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.lock"))
    }
}

struct FileLease {
    name: String,
    file: File,
}

impl LockLease for FileLease {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for FileLease {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(lock = %self.name, error = %e, "failed to release lock file");
        }
    }
}

#[async_trait]
impl MutualExclusionLock for FileLock {
    async fn acquire(
        &self,
        name: &str,
        wait: Duration,
    ) -> Result<Box<dyn LockLease>, StorageError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| StorageError::internal(format!("creating lock dir: {e}")))?;
        let path = self.path_for(name);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| StorageError::internal(format!("opening {}: {e}", path.display())))?;

        let deadline = Instant::now() + wait;
        loop {
            if FileExt::try_lock_exclusive(&file).is_ok() {
                tracing::debug!(lock = %name, path = %path.display(), "lock acquired");
                return Ok(Box::new(FileLease {
                    name: name.to_string(),
                    file,
                }));
            }
            if Instant::now() >= deadline {
                return Err(StorageError::lock_unavailable(name));
            }
            tokio::time::sleep(FILE_LOCK_POLL).await;
        }
    }
}
