//! CLI argument parsing for exflock.
//!
//! Uses clap derive macros for declarative argument definitions. The public
//! surface is a single positional form; the holder and watchdog roles are
//! internal sub-commands the launcher passes to its own executable.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Exflock: advisory file locks that outlive the command that took them.
///
/// Acquires an exclusive lock on FILE in a detached background holder and
/// prints the holder's pid. The lock is released when the holder is killed,
/// when the calling shell exits, or after MAX_LIFETIME_SECONDS.
#[derive(Parser, Debug)]
#[command(name = "exflock")]
#[command(author, version, about, long_about = None)]
#[command(allow_negative_numbers = true)]
pub struct Cli {
    /// Seconds to wait for the lock before giving up.
    #[arg(value_name = "WAIT_SECONDS")]
    pub wait: String,

    /// File to lock (regular file, character device, or FIFO).
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Seconds until the lock is released automatically (0 = never).
    ///
    /// Defaults to `default_max_lifetime_secs` from the config (45).
    #[arg(value_name = "MAX_LIFETIME_SECONDS")]
    pub max_lifetime: Option<String>,
}

/// Re-invocations issued by the launcher.
#[derive(Parser, Debug)]
#[command(name = "exflock")]
pub struct InternalCli {
    #[command(subcommand)]
    pub command: InternalCommand,
}

#[derive(Subcommand, Debug)]
pub enum InternalCommand {
    /// Acquire the lock and hold it until released.
    #[command(name = "__hold")]
    Hold(HoldArgs),

    /// Sleep until terminated; the launcher waits on this process.
    #[command(name = "__watchdog")]
    Watchdog(WatchdogArgs),
}

/// Arguments for the holder role.
#[derive(Parser, Debug)]
pub struct HoldArgs {
    /// Seconds to wait for the lock.
    #[arg(long)]
    pub wait: u64,

    /// File to lock.
    #[arg(long)]
    pub file: PathBuf,

    /// `<requester-pid> <max-lifetime-seconds> <mailbox-path>`, validated by
    /// the holder itself so each has its own exit code.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, num_args = 0..)]
    pub entry: Vec<String>,
}

/// Arguments for the watchdog role.
#[derive(Parser, Debug)]
pub struct WatchdogArgs {
    /// Upper bound on how long the watchdog sleeps.
    pub seconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::{HOLD_COMMAND, WATCHDOG_COMMAND};
    use clap::CommandFactory;

    #[test]
    fn cli_debug_assert() {
        Cli::command().debug_assert();
        InternalCli::command().debug_assert();
    }

    #[test]
    fn parse_wait_and_file() {
        let cli = Cli::try_parse_from(["exflock", "5", "/tmp/f"]).unwrap();
        assert_eq!(cli.wait, "5");
        assert_eq!(cli.file, PathBuf::from("/tmp/f"));
        assert!(cli.max_lifetime.is_none());
    }

    #[test]
    fn parse_with_lifetime() {
        let cli = Cli::try_parse_from(["exflock", "0", "/tmp/f", "0"]).unwrap();
        assert_eq!(cli.max_lifetime.as_deref(), Some("0"));
    }

    #[test]
    fn negative_values_reach_validation() {
        let cli = Cli::try_parse_from(["exflock", "-1", "/tmp/f", "-3"]).unwrap();
        assert_eq!(cli.wait, "-1");
        assert_eq!(cli.max_lifetime.as_deref(), Some("-3"));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(Cli::try_parse_from(["exflock", "5"]).is_err());
    }

    #[test]
    fn extra_positional_is_an_error() {
        assert!(Cli::try_parse_from(["exflock", "5", "/tmp/f", "1", "2"]).is_err());
    }

    #[test]
    fn parse_hold() {
        let cli = InternalCli::try_parse_from([
            "exflock", "__hold", "--wait", "3", "--file", "/tmp/f", "--", "123", "45",
            "/tmp/exflock.abc.mbox",
        ])
        .unwrap();
        let InternalCommand::Hold(args) = cli.command else {
            panic!("Expected Hold command");
        };
        assert_eq!(args.wait, 3);
        assert_eq!(args.file, PathBuf::from("/tmp/f"));
        assert_eq!(args.entry, vec!["123", "45", "/tmp/exflock.abc.mbox"]);
    }

    #[test]
    fn parse_hold_keeps_malformed_entry_for_validation() {
        let cli = InternalCli::try_parse_from([
            "exflock", "__hold", "--wait", "3", "--file", "/tmp/f", "--", "-7",
        ])
        .unwrap();
        let InternalCommand::Hold(args) = cli.command else {
            panic!("Expected Hold command");
        };
        assert_eq!(args.entry, vec!["-7"]);
    }

    #[test]
    fn parse_watchdog() {
        let cli = InternalCli::try_parse_from(["exflock", "__watchdog", "65"]).unwrap();
        let InternalCommand::Watchdog(args) = cli.command else {
            panic!("Expected Watchdog command");
        };
        assert_eq!(args.seconds, 65);
    }

    #[test]
    fn internal_command_names_match_role_detection() {
        let internal = InternalCli::command();
        assert!(internal.find_subcommand(HOLD_COMMAND).is_some());
        assert!(internal.find_subcommand(WATCHDOG_COMMAND).is_some());
    }

    #[test]
    fn internal_commands_are_not_public() {
        let help = Cli::command().render_help().to_string();
        assert!(!help.contains(HOLD_COMMAND));
        assert!(!help.contains(WATCHDOG_COMMAND));
    }
}
