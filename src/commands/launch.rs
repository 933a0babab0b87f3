//! Implementation of the launcher role (`exflock <wait> <file> [lifetime]`).
//!
//! # Transaction Steps
//!
//! 1. Validate the request and the platform
//! 2. Catch termination signals, then create the rendezvous mailbox
//! 3. Start the watchdog and record it as the provisional entry
//! 4. Start the holder, detached
//! 5. Wait once: for the watchdog, the holder, or a termination signal
//! 6. Read the mailbox, remove it, and print the holder pid on success
//!
//! The mailbox is removed on every path; its guard covers early returns.

use super::{runtime, watchdog};
use crate::cli::Cli;
use crate::config::Config;
use crate::error::{ExflockError, Result};
use crate::events::{Event, EventAction, EventLog};
use crate::mailbox::{HandleMailbox, MailboxEntry};
use crate::process::{self, Pid, SystemProcessTable, TerminationSignals};
use crate::request::LockRequest;
use crate::role::HOLD_COMMAND;
use serde_json::json;
use std::ffi::OsString;
use std::io::Write;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::Child;

/// How long a holder that never published gets to exit on its own.
const HOLDER_EXIT_GRACE: Duration = Duration::from_secs(1);

/// What ended the launcher's single wait.
#[derive(Debug)]
enum Wake {
    Signal(i32),
    Watchdog,
    Holder(Option<ExitStatus>),
}

/// Execute the launcher role.
///
/// # Exit Codes
///
/// - 0: Lock held; holder pid printed
/// - 1: Usage error, acquisition timeout, or holder failure
/// - 2: Mailbox could not be created
/// - 3: Unsupported platform
/// - 128+n: Interrupted by signal n
pub fn cmd_launch(cli: Cli, config: &Config) -> Result<()> {
    let request = LockRequest::from_args(
        &cli.wait,
        &cli.file,
        cli.max_lifetime.as_deref(),
        config.default_max_lifetime_secs,
    )?;
    SystemProcessTable::detect()?;
    let requester = Pid::parent().ok_or_else(|| {
        ExflockError::Platform("cannot determine the calling process".to_string())
    })?;

    let holder = runtime()?.block_on(launch(&request, requester, config))?;

    let mut stdout = std::io::stdout().lock();
    if let Err(e) = writeln!(stdout, "{}", holder).and_then(|()| stdout.flush()) {
        // Nobody learned the pid, so nobody can release the lock.
        let _ = process::terminate(holder);
        return Err(ExflockError::Io(format!("failed to print holder pid: {}", e)));
    }

    Ok(())
}

/// Own the mailbox from creation to removal.
///
/// Termination signals are caught before the mailbox exists, so no signal
/// can end the launcher while it is on disk.
async fn launch(request: &LockRequest, requester: Pid, config: &Config) -> Result<Pid> {
    let mut signals = TerminationSignals::install()?;
    let events = EventLog::new(config.event_log.clone());
    let mut mailbox = HandleMailbox::create_in(&config.mailbox_dir())?;

    events.record(
        &Event::new(EventAction::Launch)
            .with_target(request.target())
            .with_details(json!({
                "wait_secs": request.wait_secs(),
                "max_lifetime_secs": request.max_lifetime_secs(),
                "requester": requester.get(),
                "mailbox": mailbox.path().display().to_string(),
            })),
    );

    let outcome = handshake(request, requester, &mailbox, &mut signals, config, &events).await;
    if let Err(e) = mailbox.remove() {
        eprintln!("Warning: {}", e);
    }
    outcome
}

/// Run the watchdog/holder exchange and return the published holder pid.
async fn handshake(
    request: &LockRequest,
    requester: Pid,
    mailbox: &HandleMailbox,
    signals: &mut TerminationSignals,
    config: &Config,
    events: &EventLog,
) -> Result<Pid> {
    let exe = std::env::current_exe()
        .map_err(|e| ExflockError::Io(format!("failed to locate own executable: {}", e)))?;

    let watchdog_secs = request
        .wait_secs()
        .saturating_add(config.watchdog_grace_secs);
    let mut watchdog = spawn_detached(watchdog::command(&exe, watchdog_secs), "watchdog")?;
    let watchdog_pid = child_pid(&watchdog, "watchdog")?;

    if let Err(e) = mailbox.publish(MailboxEntry::Provisional(watchdog_pid)) {
        let _ = watchdog.start_kill();
        return Err(e);
    }

    let mut holder = match spawn_detached(
        hold_command(&exe, request, requester, mailbox.path()),
        "holder",
    ) {
        Ok(child) => child,
        Err(e) => {
            let _ = watchdog.start_kill();
            return Err(e);
        }
    };
    let holder_pid = child_pid(&holder, "holder")?;

    let wake = tokio::select! {
        biased;
        signo = signals.recv() => Wake::Signal(signo),
        _ = watchdog.wait() => Wake::Watchdog,
        status = holder.wait() => Wake::Holder(status.ok()),
    };

    let holder_status = match wake {
        Wake::Signal(signo) => {
            return Err(interrupt(signo, holder_pid, &mut watchdog, request, events));
        }
        Wake::Watchdog => None,
        Wake::Holder(status) => {
            let _ = watchdog.start_kill();
            tokio::select! {
                biased;
                signo = signals.recv() => {
                    return Err(interrupt(signo, holder_pid, &mut watchdog, request, events));
                }
                _ = watchdog.wait() => {}
            }
            status
        }
    };

    match mailbox.read()? {
        MailboxEntry::Final(pid) => Ok(pid),
        MailboxEntry::Provisional(_) => {
            let status = match holder_status {
                Some(status) => Some(status),
                None => tokio::time::timeout(HOLDER_EXIT_GRACE, holder.wait())
                    .await
                    .ok()
                    .and_then(|status| status.ok()),
            };
            Err(acquisition_failure(status, holder_pid, request, events))
        }
    }
}

/// Classify a holder that exited (or hung) without publishing.
fn acquisition_failure(
    status: Option<ExitStatus>,
    holder_pid: Pid,
    request: &LockRequest,
    events: &EventLog,
) -> ExflockError {
    let timeout = ExflockError::AcquisitionTimeout {
        target: request.target().to_path_buf(),
        wait_secs: request.wait_secs(),
    };

    let Some(status) = status else {
        // Outlived the watchdog bound; it must not take the lock later.
        let _ = process::terminate(holder_pid);
        return timeout;
    };

    if status.code() == Some(crate::exit_codes::USAGE_ERROR) {
        return timeout;
    }

    events.record(
        &Event::new(EventAction::HolderFailed)
            .with_target(request.target())
            .with_details(json!({
                "holder": holder_pid.get(),
                "code": status.code(),
            })),
    );
    ExflockError::HolderFailed {
        code: status.code(),
    }
}

/// Tear down both children after a termination signal.
fn interrupt(
    signo: i32,
    holder_pid: Pid,
    watchdog: &mut Child,
    request: &LockRequest,
    events: &EventLog,
) -> ExflockError {
    let _ = process::terminate(holder_pid);
    let _ = watchdog.start_kill();
    events.record(
        &Event::new(EventAction::Interrupted)
            .with_target(request.target())
            .with_details(json!({ "signal": signo })),
    );
    ExflockError::Interrupted(signo)
}

/// Build the re-invocation that starts a holder for `request`.
fn hold_command(exe: &Path, request: &LockRequest, requester: Pid, mailbox: &Path) -> Command {
    let mut file_arg = OsString::from("--file=");
    file_arg.push(request.target());

    let mut cmd = Command::new(exe);
    cmd.arg(HOLD_COMMAND)
        .arg(format!("--wait={}", request.wait_secs()))
        .arg(file_arg)
        .arg("--")
        .arg(requester.to_string())
        .arg(request.max_lifetime_secs().to_string())
        .arg(mailbox);
    cmd
}

/// Spawn with no stdio, in a new process group, so the child neither holds
/// the caller's pipes open nor receives the caller's terminal signals.
fn spawn_detached(mut cmd: Command, what: &str) -> Result<Child> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .process_group(0);
    tokio::process::Command::from(cmd)
        .spawn()
        .map_err(|e| ExflockError::Io(format!("failed to start {}: {}", what, e)))
}

fn child_pid(child: &Child, what: &str) -> Result<Pid> {
    child
        .id()
        .and_then(Pid::from_raw)
        .ok_or_else(|| ExflockError::Io(format!("{} exited before it could be identified", what)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;
    use tempfile::NamedTempFile;

    fn request(file: &NamedTempFile) -> LockRequest {
        LockRequest::from_args("7", file.path(), Some("30"), 45).unwrap()
    }

    #[test]
    fn hold_command_carries_request_and_rendezvous() {
        let file = NamedTempFile::new().unwrap();
        let requester = Pid::from_raw(321).unwrap();
        let cmd = hold_command(
            Path::new("/usr/bin/exflock"),
            &request(&file),
            requester,
            Path::new("/tmp/exflock.x.mbox"),
        );

        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        assert_eq!(
            args,
            vec![
                "__hold".to_string(),
                "--wait=7".to_string(),
                format!("--file={}", file.path().display()),
                "--".to_string(),
                "321".to_string(),
                "30".to_string(),
                "/tmp/exflock.x.mbox".to_string(),
            ]
        );
    }

    #[test]
    fn timeout_exit_is_reported_as_acquisition_timeout() {
        let file = NamedTempFile::new().unwrap();
        let status = ExitStatus::from_raw(1 << 8);
        let err = acquisition_failure(
            Some(status),
            Pid::from_raw(999_999).unwrap(),
            &request(&file),
            &EventLog::quiet(None),
        );
        assert!(matches!(err, ExflockError::AcquisitionTimeout { wait_secs: 7, .. }));
    }

    #[test]
    fn other_exits_are_reported_as_holder_failure() {
        let file = NamedTempFile::new().unwrap();
        let err = acquisition_failure(
            Some(ExitStatus::from_raw(13 << 8)),
            Pid::from_raw(999_999).unwrap(),
            &request(&file),
            &EventLog::quiet(None),
        );
        assert!(matches!(err, ExflockError::HolderFailed { code: Some(13) }));
        assert_eq!(err.exit_code(), crate::exit_codes::USAGE_ERROR);
    }

    #[test]
    fn killed_holder_is_reported_without_code() {
        let file = NamedTempFile::new().unwrap();
        let err = acquisition_failure(
            Some(ExitStatus::from_raw(libc::SIGKILL)),
            Pid::from_raw(999_999).unwrap(),
            &request(&file),
            &EventLog::quiet(None),
        );
        assert!(matches!(err, ExflockError::HolderFailed { code: None }));
        assert!(err.to_string().contains("on a signal"));
    }

    #[test]
    fn holder_setup_failure_is_not_reported_as_timeout() {
        let file = NamedTempFile::new().unwrap();
        let err = acquisition_failure(
            Some(ExitStatus::from_raw(crate::exit_codes::HOLD_FAILURE << 8)),
            Pid::from_raw(999_999).unwrap(),
            &request(&file),
            &EventLog::quiet(None),
        );
        assert!(matches!(err, ExflockError::HolderFailed { code: Some(14) }));
    }

    #[test]
    fn holder_failure_is_logged_distinctly() {
        let file = NamedTempFile::new().unwrap();
        let dir = tempfile::TempDir::new().unwrap();
        let log = dir.path().join("events.ndjson");
        acquisition_failure(
            Some(ExitStatus::from_raw(crate::exit_codes::HOLD_FAILURE << 8)),
            Pid::from_raw(999_999).unwrap(),
            &request(&file),
            &EventLog::quiet(Some(log.clone())),
        );
        acquisition_failure(
            Some(ExitStatus::from_raw(1 << 8)),
            Pid::from_raw(999_999).unwrap(),
            &request(&file),
            &EventLog::quiet(Some(log.clone())),
        );

        let content = std::fs::read_to_string(&log).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("\"holder_failed\""));
        assert!(lines[0].contains("\"code\":14"));
    }

    #[tokio::test]
    async fn spawned_children_are_detached() {
        let child = spawn_detached(Command::new("true"), "probe").unwrap();
        let pid = child_pid(&child, "probe").unwrap();
        // SAFETY: getpgid(2) only reads process metadata.
        let group = unsafe { libc::getpgid(pid.as_raw()) };
        // Already reaped children report ESRCH; otherwise the group is their own.
        assert!(group == pid.as_raw() || group == -1);
    }
}
