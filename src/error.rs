//! Error types for the exflock CLI.
//!
//! Uses thiserror for derive macros and provides user-actionable error messages.

use crate::exit_codes;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for exflock operations.
///
/// Each variant maps to a specific exit code. Holder-side variants are only
/// ever observed as exit statuses, since the holder runs with no stderr.
#[derive(Error, Debug)]
pub enum ExflockError {
    /// Command-line parsing failed, or help/version was requested.
    #[error("{0}")]
    Cli(#[from] clap::Error),

    /// Malformed or missing launcher arguments.
    #[error("{0}")]
    Usage(String),

    /// The rendezvous mailbox could not be created.
    #[error("failed to create rendezvous mailbox: {0}")]
    Mailbox(String),

    /// The current platform has no process table or signal support.
    #[error("unsupported platform: {0}")]
    Platform(String),

    /// The lock could not be acquired within the wait bound.
    #[error("timed out after {wait_secs}s waiting for exclusive lock on '{}'", .target.display())]
    AcquisitionTimeout { target: PathBuf, wait_secs: u64 },

    /// The holder exited before publishing its identity.
    #[error("lock holder exited{} before publishing its identity", describe_code(.code))]
    HolderFailed { code: Option<i32> },

    /// The launcher received a termination signal while waiting.
    #[error("interrupted by signal {0}")]
    Interrupted(i32),

    /// Holder invoked with the wrong argument shape.
    #[error("malformed holder invocation: {0}")]
    HoldArguments(String),

    /// Holder requester pid is malformed or not in the expected lineage.
    #[error("invalid requester: {0}")]
    InvalidRequester(String),

    /// Holder max lifetime is malformed.
    #[error("invalid max lifetime: {0}")]
    InvalidLifetime(String),

    /// Holder mailbox path is unusable.
    #[error("invalid mailbox: {0}")]
    InvalidMailbox(String),

    /// Holder failure other than a timeout or a bad argument.
    #[error("lock holder failed: {0}")]
    HoldFailure(String),

    /// Any other I/O failure (spawn, signal, file access).
    #[error("{0}")]
    Io(String),
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!(" with code {}", code),
        None => " on a signal".to_string(),
    }
}

impl ExflockError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ExflockError::Cli(e) if !e.use_stderr() => exit_codes::SUCCESS,
            ExflockError::Cli(_) => exit_codes::USAGE_ERROR,
            ExflockError::Usage(_) => exit_codes::USAGE_ERROR,
            ExflockError::Mailbox(_) => exit_codes::MAILBOX_FAILURE,
            ExflockError::Platform(_) => exit_codes::UNSUPPORTED_PLATFORM,
            ExflockError::AcquisitionTimeout { .. } => exit_codes::USAGE_ERROR,
            ExflockError::HolderFailed { .. } => exit_codes::USAGE_ERROR,
            ExflockError::Interrupted(signo) => exit_codes::SIGNAL_BASE + signo,
            ExflockError::HoldArguments(_) => exit_codes::HOLD_ARG_COUNT,
            ExflockError::InvalidRequester(_) => exit_codes::HOLD_BAD_REQUESTER,
            ExflockError::InvalidLifetime(_) => exit_codes::HOLD_BAD_LIFETIME,
            ExflockError::InvalidMailbox(_) => exit_codes::HOLD_BAD_MAILBOX,
            ExflockError::HoldFailure(_) => exit_codes::HOLD_FAILURE,
            ExflockError::Io(_) => exit_codes::USAGE_ERROR,
        }
    }
}

/// Result type alias for exflock operations.
pub type Result<T> = std::result::Result<T, ExflockError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launcher_errors_have_correct_exit_codes() {
        assert_eq!(
            ExflockError::Usage("bad".into()).exit_code(),
            exit_codes::USAGE_ERROR
        );
        assert_eq!(
            ExflockError::Mailbox("denied".into()).exit_code(),
            exit_codes::MAILBOX_FAILURE
        );
        assert_eq!(
            ExflockError::Platform("windows".into()).exit_code(),
            exit_codes::UNSUPPORTED_PLATFORM
        );
    }

    #[test]
    fn timeout_is_indistinguishable_from_usage_by_code() {
        let err = ExflockError::AcquisitionTimeout {
            target: PathBuf::from("/tmp/f"),
            wait_secs: 2,
        };
        assert_eq!(err.exit_code(), exit_codes::USAGE_ERROR);
        assert_eq!(
            err.to_string(),
            "timed out after 2s waiting for exclusive lock on '/tmp/f'"
        );
    }

    #[test]
    fn holder_argument_errors_have_distinct_codes() {
        assert_eq!(ExflockError::HoldArguments("x".into()).exit_code(), 10);
        assert_eq!(ExflockError::InvalidRequester("x".into()).exit_code(), 11);
        assert_eq!(ExflockError::InvalidLifetime("x".into()).exit_code(), 12);
        assert_eq!(ExflockError::InvalidMailbox("x".into()).exit_code(), 13);
        assert_eq!(ExflockError::HoldFailure("x".into()).exit_code(), 14);
    }

    #[test]
    fn holder_failure_is_not_a_timeout_code() {
        let failure = ExflockError::HoldFailure("failed to open '/dev/tty'".into());
        let timeout = ExflockError::AcquisitionTimeout {
            target: PathBuf::from("/dev/tty"),
            wait_secs: 7,
        };
        assert_ne!(failure.exit_code(), timeout.exit_code());
    }

    #[test]
    fn help_request_exits_successfully() {
        use clap::{Command, error::ErrorKind};
        let help = Command::new("exflock").error(ErrorKind::DisplayHelp, "help");
        assert_eq!(ExflockError::from(help).exit_code(), exit_codes::SUCCESS);
        let bad = Command::new("exflock").error(ErrorKind::MissingRequiredArgument, "missing");
        assert_eq!(ExflockError::from(bad).exit_code(), exit_codes::USAGE_ERROR);
    }

    #[test]
    fn interrupted_maps_to_signal_base() {
        assert_eq!(ExflockError::Interrupted(15).exit_code(), 143);
        assert_eq!(ExflockError::Interrupted(2).exit_code(), 130);
    }

    #[test]
    fn holder_failed_message_mentions_code() {
        let err = ExflockError::HolderFailed { code: Some(13) };
        assert_eq!(
            err.to_string(),
            "lock holder exited with code 13 before publishing its identity"
        );
        let err = ExflockError::HolderFailed { code: None };
        assert_eq!(
            err.to_string(),
            "lock holder exited on a signal before publishing its identity"
        );
    }
}
