//! Exclusive advisory lock on an index directory.
//!
//! The lock is an OS file lock on `write.lock`, so it is scoped to the open
//! file and released by the kernel if the holding process dies. It is not
//! reentrant: a second acquisition on the same directory fails even from the
//! same process.

use std::fs::{File, OpenOptions, TryLockError};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{OnionIndexError, Result};
use crate::storage::LOCK_FILE;

/// A held lock on an index directory. Released on [`release`](Self::release)
/// or drop.
#[derive(Debug)]
pub struct DirectoryLock {
    path: PathBuf,
    file: Option<File>,
}

impl DirectoryLock {
    /// Try to lock `directory`, retrying every `poll_interval` until `timeout`
    /// has elapsed.
    pub fn acquire(directory: &Path, timeout: Duration, poll_interval: Duration) -> Result<Self> {
        let path = directory.join(LOCK_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                OnionIndexError::storage_io(format!(
                    "failed to open lock file {}: {e}",
                    path.display()
                ))
            })?;

        let deadline = Instant::now() + timeout;
        loop {
            match file.try_lock() {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), "acquired index lock");
                    return Ok(DirectoryLock {
                        path,
                        file: Some(file),
                    });
                }
                Err(TryLockError::WouldBlock) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(OnionIndexError::lock_contention(format!(
                            "{} is held by another process (waited {} ms)",
                            path.display(),
                            timeout.as_millis()
                        )));
                    }
                    thread::sleep(poll_interval.min(deadline - now));
                }
                Err(TryLockError::Error(e)) => {
                    return Err(OnionIndexError::storage_io(format!(
                        "failed to lock {}: {e}",
                        path.display()
                    )));
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Release the lock.
    pub fn release(mut self) -> Result<()> {
        self.unlock()
    }

    fn unlock(&mut self) -> Result<()> {
        if let Some(file) = self.file.take() {
            file.unlock().map_err(|e| {
                OnionIndexError::storage_io(format!(
                    "failed to release lock {}: {e}",
                    self.path.display()
                ))
            })?;
            tracing::debug!(path = %self.path.display(), "released index lock");
        }
        Ok(())
    }
}

impl Drop for DirectoryLock {
    fn drop(&mut self) {
        if let Err(e) = self.unlock() {
            tracing::warn!(error = %e, "failed to release index lock on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const NO_WAIT: Duration = Duration::ZERO;
    const POLL: Duration = Duration::from_millis(5);

    #[test]
    fn test_second_acquire_fails() {
        let temp_dir = TempDir::new().unwrap();

        let lock = DirectoryLock::acquire(temp_dir.path(), NO_WAIT, POLL).unwrap();
        assert!(lock.is_held());
        assert!(temp_dir.path().join(LOCK_FILE).exists());

        let second = DirectoryLock::acquire(temp_dir.path(), NO_WAIT, POLL);
        assert!(matches!(second, Err(OnionIndexError::LockContention(_))));
    }

    #[test]
    fn test_release_allows_reacquire() {
        let temp_dir = TempDir::new().unwrap();

        let lock = DirectoryLock::acquire(temp_dir.path(), NO_WAIT, POLL).unwrap();
        lock.release().unwrap();

        let lock = DirectoryLock::acquire(temp_dir.path(), NO_WAIT, POLL).unwrap();
        drop(lock);

        DirectoryLock::acquire(temp_dir.path(), NO_WAIT, POLL).unwrap();
    }

    #[test]
    fn test_waits_for_release() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().to_path_buf();

        let lock = DirectoryLock::acquire(&dir, NO_WAIT, POLL).unwrap();
        let waiter = thread::spawn(move || {
            DirectoryLock::acquire(&dir, Duration::from_secs(5), POLL).map(|_| ())
        });

        thread::sleep(Duration::from_millis(50));
        lock.release().unwrap();

        assert!(waiter.join().unwrap().is_ok());
    }
}
