//! Exflock: advisory file locks that outlive the command that requested them.
//!
//! This is the main entry point for the `exflock` CLI. It picks the role for
//! this invocation, dispatches to its handler, and handles errors with
//! proper exit codes.

mod cli;
mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod exit_codes;
pub mod flock;
pub mod mailbox;
pub mod process;
pub mod request;
pub mod role;

#[cfg(test)]
mod test_support;

use error::ExflockError;
use std::ffi::OsString;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<OsString> = std::env::args_os().collect();

    match commands::dispatch(&args) {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(err) => {
            match &err {
                // clap renders its own usage, help and version output
                ExflockError::Cli(clap_err) => {
                    let _ = clap_err.print();
                }
                _ => eprintln!("Error: {}", err),
            }

            // Return appropriate exit code
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
