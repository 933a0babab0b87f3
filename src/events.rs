//! Event logging subsystem for exflock.
//!
//! Lock lifecycle events are appended to an optional NDJSON log (one JSON
//! object per line) so that detached holders, which run with no stdio, remain
//! observable.
//!
//! # Event Format
//!
//! Each event is a JSON object with the following fields:
//! - `ts`: RFC3339 timestamp
//! - `action`: The lifecycle step (launch, acquired, released, etc.)
//! - `actor`: The owner string (e.g., `user@HOST`)
//! - `pid`: The process that recorded the event
//! - `target`: Optional locked path
//! - `details`: Freeform object with action-specific details
//!
//! # Usage
//!
//! ```no_run
//! use exflock::events::{Event, EventAction, EventLog};
//! use serde_json::json;
//!
//! let log = EventLog::new(Some("/tmp/exflock.ndjson".into()));
//! log.record(&Event::new(EventAction::Launch).with_details(json!({"wait_secs": 5})));
//! ```

use crate::error::{ExflockError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

/// Actions that can be logged as events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    /// Launcher validated a request and is about to spawn.
    Launch,
    /// Holder acquired the OS lock.
    Acquired,
    /// Holder could not acquire within the wait bound.
    AcquireTimeout,
    /// Holder wrote its final identity and released the watchdog.
    Published,
    /// Holder dropped the lock.
    Released,
    /// Holder exited before publishing (launcher-side observation).
    HolderFailed,
    /// Launcher was interrupted by a signal.
    Interrupted,
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventAction::Launch => write!(f, "launch"),
            EventAction::Acquired => write!(f, "acquired"),
            EventAction::AcquireTimeout => write!(f, "acquire_timeout"),
            EventAction::Published => write!(f, "published"),
            EventAction::Released => write!(f, "released"),
            EventAction::HolderFailed => write!(f, "holder_failed"),
            EventAction::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// An event record for the lifecycle log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// RFC3339 timestamp when the event occurred.
    pub ts: DateTime<Utc>,

    /// The action that was performed.
    pub action: EventAction,

    /// The actor who performed the action (e.g., `user@HOST`).
    pub actor: String,

    /// Process that recorded the event.
    pub pid: u32,

    /// Locked path, when the event concerns one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    /// Freeform details object with action-specific information.
    pub details: Value,
}

impl Event {
    /// Create a new event with the given action.
    ///
    /// The timestamp is set to the current time, and the actor is
    /// determined from the environment (USER@HOSTNAME).
    pub fn new(action: EventAction) -> Self {
        Self {
            ts: Utc::now(),
            action,
            actor: get_actor_string(),
            pid: std::process::id(),
            target: None,
            details: Value::Object(serde_json::Map::new()),
        }
    }

    /// Set the target path for this event.
    pub fn with_target(mut self, target: &Path) -> Self {
        self.target = Some(target.display().to_string());
        self
    }

    /// Set the details object for this event.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Serialize the event to a single-line JSON string.
    pub fn to_ndjson_line(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| ExflockError::Io(format!("failed to serialize event to JSON: {}", e)))
    }
}

/// Get the actor string for event metadata.
fn get_actor_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}

/// Append an event to the NDJSON file at `path`.
///
/// The file and its parent directory are created if needed. Each append
/// results in one line with a trailing newline.
pub fn append_event(path: &Path, event: &Event) -> Result<()> {
    let json_line = event.to_ndjson_line()?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| {
            ExflockError::Io(format!(
                "failed to create event log directory '{}': {}",
                parent.display(),
                e
            ))
        })?;
    }

    // A FIFO log with no reader fails here instead of blocking the caller.
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
        .map_err(|e| {
            ExflockError::Io(format!(
                "failed to open event log '{}': {}",
                path.display(),
                e
            ))
        })?;

    // One write call per line keeps concurrent appenders from interleaving.
    file.write_all(format!("{}\n", json_line).as_bytes())
        .map_err(|e| {
            ExflockError::Io(format!(
                "failed to write event to '{}': {}",
                path.display(),
                e
            ))
        })?;

    Ok(())
}

/// Best-effort event sink shared by the launcher and the holder.
///
/// Logging never changes the outcome of a lock operation. When `warn` is set
/// failures are reported on stderr; the holder has no stderr and drops them.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: Option<PathBuf>,
    warn: bool,
}

impl EventLog {
    /// Create a sink that reports append failures on stderr.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path, warn: true }
    }

    /// Create a sink that drops append failures.
    pub fn quiet(path: Option<PathBuf>) -> Self {
        Self { path, warn: false }
    }

    /// Append `event` if logging is enabled.
    pub fn record(&self, event: &Event) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = append_event(path, event)
            && self.warn
        {
            eprintln!("Warning: {}", e);
        }
    }
}
