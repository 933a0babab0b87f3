//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for exflock.
///
/// Unknown fields in the YAML are ignored for forward compatibility. The
/// holder re-reads the same file through the inherited environment, so both
/// sides of a detached lock see identical settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Lock lifetime
    // =========================================================================
    /// Max lifetime applied when the command line omits one (0 = unbounded).
    #[serde(default = "default_max_lifetime_secs")]
    pub default_max_lifetime_secs: u64,

    /// Interval between requester liveness checks in the holder.
    ///
    /// This is the worst-case release latency after the requester dies.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Backoff between non-blocking lock attempts while waiting.
    #[serde(default = "default_lock_retry_ms")]
    pub lock_retry_ms: u64,

    // =========================================================================
    // Handshake
    // =========================================================================
    /// Extra seconds the watchdog outlives the wait bound.
    #[serde(default = "default_watchdog_grace_secs")]
    pub watchdog_grace_secs: u64,

    /// Directory for rendezvous mailboxes (default: system temp dir).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mailbox_dir: Option<PathBuf>,

    /// Whether the holder checks that its parent and grandparent match the
    /// launcher and requester before acquiring.
    #[serde(default = "default_true")]
    pub verify_ancestry: bool,

    // =========================================================================
    // Logging
    // =========================================================================
    /// NDJSON event log path (disabled when unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_log: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_max_lifetime_secs: default_max_lifetime_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            lock_retry_ms: default_lock_retry_ms(),
            watchdog_grace_secs: default_watchdog_grace_secs(),
            mailbox_dir: None,
            verify_ancestry: default_true(),
            event_log: None,
        }
    }
}
