//! The watchdog role: a placeholder the launcher waits on.
//!
//! The watchdog has no signal handlers of its own. The holder ends it with
//! SIGTERM once the final identity is in the mailbox, which is the launcher's
//! cue to read it. The sleep bound only matters when the holder is lost.

use crate::cli::WatchdogArgs;
use crate::error::Result;
use crate::role::WATCHDOG_COMMAND;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

/// Execute the watchdog role.
pub fn cmd_watchdog(args: WatchdogArgs) -> Result<()> {
    std::thread::sleep(Duration::from_secs(args.seconds));
    Ok(())
}

/// Build the re-invocation that starts a watchdog sleeping at most `seconds`.
pub fn command(exe: &Path, seconds: u64) -> Command {
    let mut cmd = Command::new(exe);
    cmd.arg(WATCHDOG_COMMAND).arg(seconds.to_string());
    cmd
}
