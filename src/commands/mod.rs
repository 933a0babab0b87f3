//! Role implementations for exflock.
//!
//! This module provides the dispatcher that routes an invocation to the
//! launcher, the holder, or the watchdog, depending on the role read off the
//! raw argument vector.

mod hold;
mod launch;
mod watchdog;

use crate::cli::{Cli, InternalCli, InternalCommand};
use crate::config::Config;
use crate::error::{ExflockError, Result};
use crate::role::Role;
use clap::Parser;
use std::ffi::OsString;
use tokio::runtime::Runtime;

/// Dispatch an invocation to its role.
///
/// This is the main entry point for command execution. `args` is the full
/// argument vector, program name first.
pub fn dispatch(args: &[OsString]) -> Result<()> {
    match Role::detect(args) {
        Role::Launcher => {
            let cli = Cli::try_parse_from(args)?;
            let config = Config::resolve()?;
            launch::cmd_launch(cli, &config)
        }
        Role::Holder => {
            let cli = InternalCli::try_parse_from(args)
                .map_err(|e| {
                    ExflockError::HoldArguments(
                        e.kind().as_str().unwrap_or("invalid arguments").to_string(),
                    )
                })?;
            let InternalCommand::Hold(hold_args) = cli.command else {
                return Err(ExflockError::HoldArguments(
                    "expected the hold command".to_string(),
                ));
            };
            let config =
                Config::resolve().map_err(|e| ExflockError::HoldFailure(e.to_string()))?;
            hold::cmd_hold(hold_args, &config).map_err(holder_failure)
        }
        Role::Watchdog => {
            let cli = InternalCli::try_parse_from(args)?;
            match cli.command {
                InternalCommand::Watchdog(watchdog_args) => watchdog::cmd_watchdog(watchdog_args),
                InternalCommand::Hold(_) => Err(ExflockError::Usage(
                    "expected the watchdog command".to_string(),
                )),
            }
        }
    }
}

/// A holder exit of 1 means a timeout to the launcher; other I/O failures
/// need their own code.
fn holder_failure(err: ExflockError) -> ExflockError {
    match err {
        ExflockError::Io(message) => ExflockError::HoldFailure(message),
        other => other,
    }
}

/// Single-threaded runtime for the signal and child-process waits.
fn runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| ExflockError::Io(format!("failed to start async runtime: {}", e)))
}
