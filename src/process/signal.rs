//! Signal delivery and termination-signal streams.

use super::Pid;
use crate::error::{ExflockError, Result};
use std::io;
use tokio::signal::unix::{Signal, SignalKind, signal};

/// Deliver `signo` to `pid`.
fn send_signal(pid: Pid, signo: libc::c_int) -> io::Result<()> {
    // SAFETY: kill(2) has no memory-safety preconditions; Pid is always > 0
    // so this never targets a process group.
    let rc = unsafe { libc::kill(pid.as_raw(), signo) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// Send SIGTERM to `pid`. A process that is already gone is not an error.
pub fn terminate(pid: Pid) -> io::Result<()> {
    match send_signal(pid, libc::SIGTERM) {
        Err(e) if e.raw_os_error() == Some(libc::ESRCH) => Ok(()),
        other => other,
    }
}

/// The interruption signals that trigger a cleanup path.
///
/// Installing the streams replaces the default "terminate immediately"
/// disposition, so the owning process must poll [`TerminationSignals::recv`]
/// and exit on its own.
pub struct TerminationSignals {
    interrupt: Signal,
    terminate: Signal,
    hangup: Signal,
}

impl TerminationSignals {
    /// Register SIGINT, SIGTERM and SIGHUP handlers. Must run inside a tokio runtime.
    pub fn install() -> Result<Self> {
        let register = |kind: SignalKind, name: &str| {
            signal(kind).map_err(|e| {
                ExflockError::Io(format!("failed to install {} handler: {}", name, e))
            })
        };

        Ok(Self {
            interrupt: register(SignalKind::interrupt(), "SIGINT")?,
            terminate: register(SignalKind::terminate(), "SIGTERM")?,
            hangup: register(SignalKind::hangup(), "SIGHUP")?,
        })
    }

    /// Wait for the next termination signal and return its number.
    pub async fn recv(&mut self) -> i32 {
        tokio::select! {
            _ = self.interrupt.recv() => libc::SIGINT,
            _ = self.terminate.recv() => libc::SIGTERM,
            _ = self.hangup.recv() => libc::SIGHUP,
        }
    }
}
