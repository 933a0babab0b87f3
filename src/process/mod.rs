//! Process identity, process-table introspection, and signal delivery.
//!
//! Everything here is a thin layer over the host OS: `/proc` (or `ps` on
//! other Unix systems) for ancestry and liveness, `kill(2)` for signals, and
//! tokio signal streams for the cleanup paths.

mod signal;
pub(crate) mod table;

pub use signal::{TerminationSignals, terminate};
pub use table::{ProcessTable, SystemProcessTable};

use std::fmt;
use std::str::FromStr;

/// A positive operating-system process id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pid(u32);

impl Pid {
    /// Wrap a raw id, rejecting 0 and values that do not fit `pid_t`.
    pub fn from_raw(raw: u32) -> Option<Self> {
        if raw == 0 || raw > i32::MAX as u32 {
            return None;
        }
        Some(Self(raw))
    }

    /// The calling process.
    pub fn current() -> Self {
        Self(std::process::id())
    }

    /// The calling process's parent.
    pub fn parent() -> Option<Self> {
        Self::from_raw(std::os::unix::process::parent_id())
    }

    /// The id as `libc::pid_t`.
    pub fn as_raw(self) -> libc::pid_t {
        // from_raw guarantees the value fits.
        self.0 as libc::pid_t
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when a string is not a valid pid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePidError(String);

impl fmt::Display for ParsePidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a positive process id", self.0)
    }
}

impl std::error::Error for ParsePidError {}

impl FromStr for Pid {
    type Err = ParsePidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Reject signs and whitespace that u32::from_str would tolerate.
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParsePidError(s.to_string()));
        }
        s.parse::<u32>()
            .ok()
            .and_then(Pid::from_raw)
            .ok_or_else(|| ParsePidError(s.to_string()))
    }
}
