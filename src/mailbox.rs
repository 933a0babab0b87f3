//! Rendezvous mailbox shared by a launcher and its holder.
//!
//! The mailbox is a single, exclusively created, randomly named file that
//! carries exactly one [`MailboxEntry`] at a time:
//!
//! 1. The launcher creates it and writes `provisional=<watchdog pid>`.
//! 2. The holder overwrites it with `final=<holder pid>`, then signals the
//!    watchdog.
//! 3. The launcher reads it once after the watchdog is gone and removes it.
//!
//! Only the launcher ever creates or deletes the file. The holder opens the
//! existing path for writing and never creates it, so a mailbox removed by an
//! interrupted launcher is never resurrected.

use crate::error::{ExflockError, Result};
use crate::process::Pid;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tempfile::TempPath;

/// Prefix for mailbox file names.
const MAILBOX_PREFIX: &str = "exflock.";

/// Suffix for mailbox file names.
const MAILBOX_SUFFIX: &str = ".mbox";

/// The single identity a mailbox holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxEntry {
    /// Watchdog placeholder written by the launcher.
    Provisional(Pid),
    /// Holder identity written once the lock is held.
    Final(Pid),
}

impl fmt::Display for MailboxEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MailboxEntry::Provisional(pid) => write!(f, "provisional={}", pid),
            MailboxEntry::Final(pid) => write!(f, "final={}", pid),
        }
    }
}

impl FromStr for MailboxEntry {
    type Err = io::Error;

    fn from_str(s: &str) -> io::Result<Self> {
        let invalid = || {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unrecognized mailbox entry '{}'", s.trim()),
            )
        };

        let (tag, pid) = s.trim().split_once('=').ok_or_else(invalid)?;
        let pid: Pid = pid.parse().map_err(|_| invalid())?;
        match tag {
            "provisional" => Ok(MailboxEntry::Provisional(pid)),
            "final" => Ok(MailboxEntry::Final(pid)),
            _ => Err(invalid()),
        }
    }
}

/// Read the entry stored at `path`.
pub fn read_entry(path: &Path) -> io::Result<MailboxEntry> {
    fs::read_to_string(path)?.parse()
}

/// Replace the entry stored at `path`.
///
/// Opens without `create`: a missing mailbox is an error, never recreated.
/// The content is synced before returning so a signal sent afterwards is
/// always observed after the write.
pub fn write_entry(path: &Path, entry: MailboxEntry) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).truncate(true).open(path)?;
    file.write_all(format!("{}\n", entry).as_bytes())?;
    file.sync_all()
}

/// Launcher-owned mailbox; removed when dropped.
#[derive(Debug)]
pub struct HandleMailbox {
    path: PathBuf,
    temp: Option<TempPath>,
}

impl HandleMailbox {
    /// Exclusively create a fresh, randomly named mailbox in `dir`.
    pub fn create_in(dir: &Path) -> Result<Self> {
        let temp = tempfile::Builder::new()
            .prefix(MAILBOX_PREFIX)
            .suffix(MAILBOX_SUFFIX)
            .tempfile_in(dir)
            .map_err(|e| ExflockError::Mailbox(format!("'{}': {}", dir.display(), e)))?
            .into_temp_path();

        Ok(Self {
            path: temp.to_path_buf(),
            temp: Some(temp),
        })
    }

    /// Get the path to the mailbox file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `entry`, replacing whatever the mailbox held.
    pub fn publish(&self, entry: MailboxEntry) -> Result<()> {
        write_entry(&self.path, entry).map_err(|e| {
            ExflockError::Mailbox(format!("failed to write '{}': {}", self.path.display(), e))
        })
    }

    /// Read the current entry.
    pub fn read(&self) -> Result<MailboxEntry> {
        read_entry(&self.path).map_err(|e| {
            ExflockError::Io(format!(
                "failed to read mailbox '{}': {}",
                self.path.display(),
                e
            ))
        })
    }

    /// Remove the mailbox. Calling this more than once, or after the file has
    /// vanished, is not an error.
    pub fn remove(&mut self) -> Result<()> {
        let Some(temp) = self.temp.take() else {
            return Ok(());
        };
        match temp.close() {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(ExflockError::Io(format!(
                "failed to remove mailbox '{}': {}",
                self.path.display(),
                e
            ))),
            _ => Ok(()),
        }
    }
}

impl Drop for HandleMailbox {
    fn drop(&mut self) {
        if let Err(e) = self.remove() {
            eprintln!("Warning: {}", e);
        }
    }
}
