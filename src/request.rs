//! Validated launcher input.

use crate::error::{ExflockError, Result};
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};

/// Parse a non-negative whole number of seconds.
///
/// Only plain ASCII digits are accepted; signs, whitespace and fractions are
/// rejected.
pub fn parse_seconds(raw: &str) -> Option<u64> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

/// A detached-lock request, validated before any process is spawned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRequest {
    target: PathBuf,
    wait_secs: u64,
    max_lifetime_secs: u64,
}

impl LockRequest {
    /// Validate raw command-line values.
    ///
    /// `default_lifetime_secs` applies when `max_lifetime` is omitted.
    pub fn from_args(
        wait: &str,
        target: &Path,
        max_lifetime: Option<&str>,
        default_lifetime_secs: u64,
    ) -> Result<Self> {
        let wait_secs = parse_seconds(wait).ok_or_else(|| {
            ExflockError::Usage(format!(
                "wait-seconds must be a non-negative integer (found '{}')",
                wait
            ))
        })?;

        let max_lifetime_secs = match max_lifetime {
            Some(raw) => parse_seconds(raw).ok_or_else(|| {
                ExflockError::Usage(format!(
                    "max-lifetime-seconds must be a non-negative integer (found '{}')",
                    raw
                ))
            })?,
            None => default_lifetime_secs,
        };

        validate_target(target)?;

        Ok(Self {
            target: target.to_path_buf(),
            wait_secs,
            max_lifetime_secs,
        })
    }

    /// Path to lock.
    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn wait_secs(&self) -> u64 {
        self.wait_secs
    }

    pub fn max_lifetime_secs(&self) -> u64 {
        self.max_lifetime_secs
    }
}

/// The target must exist and be a regular file, character device or FIFO.
fn validate_target(target: &Path) -> Result<()> {
    let metadata = std::fs::metadata(target).map_err(|e| {
        ExflockError::Usage(format!("cannot lock '{}': {}", target.display(), e))
    })?;

    let file_type = metadata.file_type();
    if file_type.is_file() || file_type.is_char_device() || file_type.is_fifo() {
        Ok(())
    } else {
        Err(ExflockError::Usage(format!(
            "cannot lock '{}': not a regular file, character device or FIFO",
            target.display()
        )))
    }
}
