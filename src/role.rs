//! Role selection for a single exflock entry point.
//!
//! One binary plays three parts. The launcher re-invokes itself with an
//! explicit internal sub-command for the other two, so the role of a
//! process is read off its arguments rather than guessed.
//!
//! The process-ancestry walk survives as [`lineage_role`], which the holder
//! uses to confirm that the requester it was handed really is the process
//! that started its launcher.

use crate::process::{Pid, ProcessTable};
use std::ffi::OsStr;

/// Internal sub-command selecting the holder role.
pub const HOLD_COMMAND: &str = "__hold";

/// Internal sub-command selecting the watchdog role.
pub const WATCHDOG_COMMAND: &str = "__watchdog";

/// The part a process plays in a detached lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Invoked by the caller; prints the holder pid.
    Launcher,
    /// Owns the OS lock for the lifetime of the session.
    Holder,
    /// Placeholder the launcher waits on.
    Watchdog,
}

impl Role {
    /// Pick the role from the raw argument vector (program name first).
    pub fn detect<S: AsRef<OsStr>>(args: &[S]) -> Self {
        match args.get(1).and_then(|arg| arg.as_ref().to_str()) {
            Some(HOLD_COMMAND) => Role::Holder,
            Some(WATCHDOG_COMMAND) => Role::Watchdog,
            _ => Role::Launcher,
        }
    }
}

/// Walk two levels up from `me` and decide whether the chain looks like
/// `requester → launcher → holder`.
///
/// The parent must run the same executable as `me` and the grandparent must
/// be `requester`. Any break in the chain resolves to [`Role::Launcher`].
pub fn lineage_role<T: ProcessTable>(table: &T, me: Pid, requester: Pid) -> Role {
    let Some(parent) = table.parent_of(me) else {
        return Role::Launcher;
    };

    if !same_executable(table, me, parent) {
        return Role::Launcher;
    }

    match table.parent_of(parent) {
        Some(grandparent) if grandparent == requester => Role::Holder,
        _ => Role::Launcher,
    }
}

/// Compare program images, so a launcher started through a symlink still
/// matches the holder it re-executed. Names are the fallback when either
/// image is unknown.
fn same_executable<T: ProcessTable>(table: &T, a: Pid, b: Pid) -> bool {
    match (table.executable_of(a), table.executable_of(b)) {
        (Some(a), Some(b)) => a == b,
        _ => matches!(
            (table.name_of(a), table.name_of(b)),
            (Some(a), Some(b)) if a == b
        ),
    }
}
