//! Implementation of the holder role.
//!
//! The holder is started by a launcher with no stdio and in its own process
//! group. It owns the OS lock for the whole detached session.
//!
//! # Lifecycle
//!
//! 1. Validate `<requester-pid> <max-lifetime-seconds> <mailbox>` (exit 10-13)
//! 2. Confirm the requester started our launcher (exit 11)
//! 3. Acquire the lock within `--wait` (timeout: release the watchdog, exit 1;
//!    any other failure exits 14)
//! 4. Overwrite the mailbox with `final=<own pid>`, then SIGTERM the watchdog
//! 5. Hold until the requester exits, the lifetime expires, or a signal arrives
//! 6. Drop the lock and exit 0
//!
//! Signal handlers are installed only after step 4. Until then the default
//! disposition applies, so a terminated holder never leaves a lock behind.

mod session;


use super::runtime;
use crate::cli::HoldArgs;
use crate::config::Config;
use crate::error::{ExflockError, Result};
use crate::events::{Event, EventAction, EventLog};
use crate::flock;
use crate::mailbox::{self, MailboxEntry};
use crate::process::{self, Pid, ProcessTable, SystemProcessTable, TerminationSignals};
use crate::request::parse_seconds;
use crate::role::{Role, lineage_role};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use session::{LockSession, ReleaseReason, wait_for_release};

/// The positional part of a holder invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldEntry {
    pub requester: Pid,
    pub max_lifetime: Duration,
    pub mailbox: PathBuf,
}

impl HoldEntry {
    /// Validate the positional arguments, each failure with its own exit code.
    pub fn parse(entry: &[String]) -> Result<Self> {
        let [requester, lifetime, mailbox] = entry else {
            return Err(ExflockError::HoldArguments(format!(
                "expected <requester-pid> <max-lifetime-seconds> <mailbox>, got {} argument(s)",
                entry.len()
            )));
        };

        let requester: Pid = requester
            .parse()
            .map_err(|e| ExflockError::InvalidRequester(format!("{}", e)))?;

        let max_lifetime = parse_seconds(lifetime).ok_or_else(|| {
            ExflockError::InvalidLifetime(format!(
                "'{}' is not a non-negative number of seconds",
                lifetime
            ))
        })?;

        let mailbox = PathBuf::from(mailbox);
        if !mailbox.is_file() {
            return Err(ExflockError::InvalidMailbox(format!(
                "'{}' is not an existing regular file",
                mailbox.display()
            )));
        }

        Ok(Self {
            requester,
            max_lifetime: Duration::from_secs(max_lifetime),
            mailbox,
        })
    }
}

/// Check that `requester` is alive and, when enabled, that it started the
/// launcher that started us.
fn verify_requester<T: ProcessTable>(
    table: &T,
    me: Pid,
    requester: Pid,
    verify_ancestry: bool,
) -> Result<()> {
    if !table.is_alive(requester) {
        return Err(ExflockError::InvalidRequester(format!(
            "process {} does not exist",
            requester
        )));
    }
    if verify_ancestry && lineage_role(table, me, requester) != Role::Holder {
        return Err(ExflockError::InvalidRequester(format!(
            "process {} did not start this holder's launcher",
            requester
        )));
    }
    Ok(())
}

/// Best-effort release of the watchdog recorded in the mailbox.
fn terminate_provisional(mailbox_path: &Path) {
    if let Ok(MailboxEntry::Provisional(watchdog)) = mailbox::read_entry(mailbox_path) {
        let _ = process::terminate(watchdog);
    }
}

/// Replace the provisional entry with our own pid, then signal the watchdog.
///
/// Returns the watchdog pid and whether it could be signalled.
fn publish_identity(mailbox_path: &Path, me: Pid) -> Result<(Pid, bool)> {
    let watchdog = match mailbox::read_entry(mailbox_path) {
        Ok(MailboxEntry::Provisional(pid)) => pid,
        Ok(entry) => {
            return Err(ExflockError::InvalidMailbox(format!(
                "expected a provisional entry, found '{}'",
                entry
            )));
        }
        Err(e) => {
            return Err(ExflockError::InvalidMailbox(format!(
                "'{}': {}",
                mailbox_path.display(),
                e
            )));
        }
    };

    mailbox::write_entry(mailbox_path, MailboxEntry::Final(me)).map_err(|e| {
        ExflockError::InvalidMailbox(format!("'{}': {}", mailbox_path.display(), e))
    })?;

    Ok((watchdog, process::terminate(watchdog).is_ok()))
}

/// Execute the holder role.
pub fn cmd_hold(args: HoldArgs, config: &Config) -> Result<()> {
    let entry = HoldEntry::parse(&args.entry)?;
    let table = SystemProcessTable::detect()?;
    let me = Pid::current();
    verify_requester(&table, me, entry.requester, config.verify_ancestry)?;

    let events = EventLog::quiet(config.event_log.clone());

    let lock = match flock::acquire_exclusive(
        &args.file,
        Duration::from_secs(args.wait),
        config.lock_retry(),
    ) {
        Ok(lock) => lock,
        Err(err) => {
            if matches!(err, ExflockError::AcquisitionTimeout { .. }) {
                events.record(
                    &Event::new(EventAction::AcquireTimeout)
                        .with_target(&args.file)
                        .with_details(json!({ "wait_secs": args.wait })),
                );
            }
            terminate_provisional(&entry.mailbox);
            return Err(err);
        }
    };

    events.record(
        &Event::new(EventAction::Acquired)
            .with_target(lock.path())
            .with_details(json!({
                "waited_ms": lock.waited().as_millis() as u64,
                "requester": entry.requester.get(),
                "max_lifetime_secs": entry.max_lifetime.as_secs(),
            })),
    );

    let target = lock.path().to_path_buf();
    let mut session = LockSession::new(me, entry.requester, entry.max_lifetime, lock);

    let (watchdog, signalled) = publish_identity(&entry.mailbox, session.holder())?;
    session.mark_holding();
    events.record(
        &Event::new(EventAction::Published)
            .with_target(&target)
            .with_details(json!({
                "watchdog": watchdog.get(),
                "watchdog_signalled": signalled,
            })),
    );

    let runtime = runtime()?;
    let reason = runtime.block_on(async {
        let mut signals = TerminationSignals::install()?;
        Ok::<_, ExflockError>(
            wait_for_release(
                &table,
                session.requester(),
                session.deadline(),
                config.poll_interval(),
                signals.recv(),
            )
            .await,
        )
    })?;

    let held = session.release();
    let mut details = json!({
        "reason": reason.as_str(),
        "held_ms": held.as_millis() as u64,
    });
    if let ReleaseReason::Signal(signo) = reason {
        details["signal"] = json!(signo);
    }
    events.record(
        &Event::new(EventAction::Released)
            .with_target(&target)
            .with_details(details),
    );

    Ok(())
}
