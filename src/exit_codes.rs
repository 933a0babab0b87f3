//! Exit code constants for the exflock CLI.
//!
//! Launcher codes:
//! - 0: Success (holder pid printed)
//! - 1: Usage error, acquisition timeout, or holder failure
//! - 2: Rendezvous mailbox could not be created
//! - 3: Unsupported platform
//! - 128+n: Interrupted by signal n
//!
//! Holder codes (internal invocation only):
//! - 10: Wrong argument count
//! - 11: Invalid requester pid
//! - 12: Invalid max lifetime
//! - 13: Invalid mailbox path
//! - 14: Any other failure before the identity was published

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// Bad arguments, or the lock could not be acquired within the wait bound.
pub const USAGE_ERROR: i32 = 1;

/// The rendezvous mailbox could not be created.
pub const MAILBOX_FAILURE: i32 = 2;

/// The running platform cannot host a detached lock.
pub const UNSUPPORTED_PLATFORM: i32 = 3;

/// Holder: wrong number of positional arguments.
pub const HOLD_ARG_COUNT: i32 = 10;

/// Holder: requester pid malformed or not found in the expected lineage.
pub const HOLD_BAD_REQUESTER: i32 = 11;

/// Holder: max lifetime is not a non-negative integer.
pub const HOLD_BAD_LIFETIME: i32 = 12;

/// Holder: mailbox path is missing or does not hold a provisional entry.
pub const HOLD_BAD_MAILBOX: i32 = 13;

/// Holder: the target could not be opened or locked, or setup failed.
///
/// Kept apart from `USAGE_ERROR` so the launcher never mistakes it for a
/// timeout.
pub const HOLD_FAILURE: i32 = 14;

/// Base added to a signal number when the launcher is interrupted.
pub const SIGNAL_BASE: i32 = 128;
