//! Process-table introspection: parent, executable, and liveness.

use super::Pid;
use crate::error::{ExflockError, Result};
use std::io;
use std::path::{Path, PathBuf};
#[cfg(not(target_os = "linux"))]
use std::process::Command;

/// Read-only view of the host process table.
///
/// The holder's lineage check and liveness loop go through this trait so the
/// decision logic can be exercised against a fixed table in tests.
pub trait ProcessTable {
    /// Parent of `pid`, if `pid` exists and has one.
    fn parent_of(&self, pid: Pid) -> Option<Pid>;

    /// Short executable name of `pid` (as `ps -o comm=` would show it).
    fn name_of(&self, pid: Pid) -> Option<String>;

    /// Resolved path of the program image `pid` is running, when the host
    /// exposes it. Unlike the name, this does not depend on how the program
    /// was invoked.
    fn executable_of(&self, pid: Pid) -> Option<PathBuf>;

    /// Whether `pid` exists and has not exited.
    fn is_alive(&self, pid: Pid) -> bool;
}

/// The process table of the running host.
#[derive(Debug, Clone, Copy)]
pub struct SystemProcessTable {
    _private: (),
}

impl SystemProcessTable {
    /// Probe the host for a usable process table.
    ///
    /// Linux needs a mounted `/proc`; other Unix systems use `ps`.
    pub fn detect() -> Result<Self> {
        if cfg!(target_os = "linux") && !Path::new("/proc/self/stat").exists() {
            return Err(ExflockError::Platform(
                "/proc is not mounted; cannot inspect processes".to_string(),
            ));
        }
        Ok(Self { _private: () })
    }
}

/// Probe existence with `kill(pid, 0)`. EPERM means it exists but belongs to
/// someone else.
fn signal_probe(pid: Pid) -> bool {
    // SAFETY: signal 0 performs the permission and existence checks only.
    if unsafe { libc::kill(pid.as_raw(), 0) } == 0 {
        return true;
    }
    matches!(
        io::Error::last_os_error().raw_os_error(),
        Some(code) if code == libc::EPERM
    )
}

/// Fields of `/proc/<pid>/stat` after the parenthesised command name.
#[cfg(target_os = "linux")]
fn proc_stat(pid: Pid) -> Option<(char, u32)> {
    let stat = std::fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
    parse_stat(&stat)
}

/// Extract `(state, ppid)` from a stat line. The command name may itself
/// contain spaces and parentheses, so split after the last `)`.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_stat(stat: &str) -> Option<(char, u32)> {
    let rest = &stat[stat.rfind(')')? + 1..];
    let mut fields = rest.split_whitespace();
    let state = fields.next()?.chars().next()?;
    let ppid = fields.next()?.parse().ok()?;
    Some((state, ppid))
}

#[cfg(target_os = "linux")]
impl ProcessTable for SystemProcessTable {
    fn parent_of(&self, pid: Pid) -> Option<Pid> {
        proc_stat(pid).and_then(|(_, ppid)| Pid::from_raw(ppid))
    }

    fn name_of(&self, pid: Pid) -> Option<String> {
        let comm = std::fs::read_to_string(format!("/proc/{}/comm", pid)).ok()?;
        let comm = comm.trim_end_matches('\n');
        if comm.is_empty() {
            return None;
        }
        Some(comm.to_string())
    }

    fn executable_of(&self, pid: Pid) -> Option<PathBuf> {
        std::fs::read_link(format!("/proc/{}/exe", pid)).ok()
    }

    fn is_alive(&self, pid: Pid) -> bool {
        if !signal_probe(pid) {
            return false;
        }
        // Zombies still answer kill(0) until reaped.
        !matches!(proc_stat(pid), Some(('Z', _)) | Some(('X', _)))
    }
}

#[cfg(not(target_os = "linux"))]
fn ps_field(pid: Pid, field: &str) -> Option<String> {
    let output = Command::new("ps")
        .args(["-o", field, "-p", &pid.to_string()])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if value.is_empty() {
        return None;
    }
    Some(value)
}

#[cfg(not(target_os = "linux"))]
impl ProcessTable for SystemProcessTable {
    fn parent_of(&self, pid: Pid) -> Option<Pid> {
        ps_field(pid, "ppid=")?.parse().ok()
    }

    fn name_of(&self, pid: Pid) -> Option<String> {
        let command = ps_field(pid, "comm=")?;
        let basename = Path::new(&command)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&command);
        Some(basename.to_string())
    }

    fn executable_of(&self, pid: Pid) -> Option<PathBuf> {
        std::fs::canonicalize(ps_field(pid, "comm=")?).ok()
    }

    fn is_alive(&self, pid: Pid) -> bool {
        if !signal_probe(pid) {
            return false;
        }
        !matches!(ps_field(pid, "stat="), Some(stat) if stat.starts_with('Z'))
    }
}
