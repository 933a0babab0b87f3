//! Configuration defaults and environment variable names for exflock.

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "EXFLOCK_CONFIG";

/// Environment variable overriding `event_log`.
pub const EVENT_LOG_ENV: &str = "EXFLOCK_EVENT_LOG";

/// Environment variable overriding `poll_interval_ms`.
pub const POLL_INTERVAL_ENV: &str = "EXFLOCK_POLL_INTERVAL_MS";

/// Config file location relative to the user config directory.
pub const CONFIG_RELATIVE_PATH: &str = "exflock/config.yaml";

// Default value functions for serde
pub(crate) fn default_max_lifetime_secs() -> u64 {
    45
}
pub(crate) fn default_poll_interval_ms() -> u64 {
    1000
}
pub(crate) fn default_lock_retry_ms() -> u64 {
    100
}
pub(crate) fn default_watchdog_grace_secs() -> u64 {
    60
}
pub(crate) fn default_true() -> bool {
    true
}
