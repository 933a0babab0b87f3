//! Bounded-wait exclusive advisory lock on a target path.
//!
//! This is the OS primitive the detached lock is built on: `flock(2)` via
//! `fs2`, retried with a fixed backoff until a deadline. The lock belongs to
//! the open file description, so it lives exactly as long as the returned
//! [`HeldLock`] (or the process that owns it).

use crate::error::{ExflockError, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

/// An acquired exclusive lock; released when dropped.
#[derive(Debug)]
pub struct HeldLock {
    _file: File,
    path: PathBuf,
    waited: Duration,
}

impl HeldLock {
    /// Get the path that is locked.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Time spent waiting before the lock was granted.
    pub fn waited(&self) -> Duration {
        self.waited
    }
}

/// Open `path` without blocking (FIFOs would otherwise wait for a writer)
/// and without acquiring a controlling terminal.
fn open_target(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK | libc::O_NOCTTY)
        .open(path)
}

/// Acquire an exclusive lock on `path`, waiting up to `wait`.
///
/// Fails with `AcquisitionTimeout` if another holder keeps the lock past the
/// deadline. A `wait` of zero makes exactly one attempt; a `wait` too large
/// to represent as a deadline retries until the lock is granted.
pub fn acquire_exclusive(path: &Path, wait: Duration, retry: Duration) -> Result<HeldLock> {
    let file = open_target(path)
        .map_err(|e| ExflockError::Io(format!("failed to open '{}': {}", path.display(), e)))?;

    let started = Instant::now();
    let deadline = started.checked_add(wait);

    loop {
        match file.try_lock_exclusive() {
            Ok(()) => {
                return Ok(HeldLock {
                    _file: file,
                    path: path.to_path_buf(),
                    waited: started.elapsed(),
                });
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                let pause = match deadline {
                    Some(deadline) => {
                        let now = Instant::now();
                        if now >= deadline {
                            return Err(ExflockError::AcquisitionTimeout {
                                target: path.to_path_buf(),
                                wait_secs: wait.as_secs(),
                            });
                        }
                        retry.min(deadline - now)
                    }
                    None => retry,
                };
                thread::sleep(pause);
            }
            Err(e) => {
                return Err(ExflockError::Io(format!(
                    "failed to lock '{}': {}",
                    path.display(),
                    e
                )));
            }
        }
    }
}
