//! Config loading, validation, and environment resolution.

use super::model::Config;
use super::types::{CONFIG_ENV, CONFIG_RELATIVE_PATH, EVENT_LOG_ENV, POLL_INTERVAL_ENV};
use crate::error::{ExflockError, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            ExflockError::Usage(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document deserializes to unit, not a mapping.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| ExflockError::Usage(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Resolve the effective config from the process environment.
    ///
    /// Lookup order: `EXFLOCK_CONFIG`, `$XDG_CONFIG_HOME/exflock/config.yaml`,
    /// `$HOME/.config/exflock/config.yaml`. A missing default file yields the
    /// defaults; a missing explicit file is an error. Environment overrides
    /// are applied last.
    pub fn resolve() -> Result<Self> {
        Self::resolve_with(|key| std::env::var_os(key))
    }

    pub(crate) fn resolve_with<F>(env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let mut config = match env(CONFIG_ENV) {
            Some(explicit) => Self::load(PathBuf::from(explicit))?,
            None => match default_config_path(&env) {
                Some(path) if path.is_file() => Self::load(&path)?,
                _ => Self::default(),
            },
        };

        config.apply_env_overrides(&env)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides<F>(&mut self, env: &F) -> Result<()>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        if let Some(path) = env(EVENT_LOG_ENV).filter(|v| !v.is_empty()) {
            self.event_log = Some(PathBuf::from(path));
        }

        if let Some(raw) = env(POLL_INTERVAL_ENV) {
            let raw = raw.to_string_lossy();
            self.poll_interval_ms = raw.trim().parse().map_err(|_| {
                ExflockError::Usage(format!(
                    "{} must be a positive integer (found '{}')",
                    POLL_INTERVAL_ENV, raw
                ))
            })?;
        }

        Ok(())
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - `poll_interval_ms` must be positive
    /// - `lock_retry_ms` must be positive
    /// - `watchdog_grace_secs` must be positive
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(ExflockError::Usage(
                "config validation failed: poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.lock_retry_ms == 0 {
            return Err(ExflockError::Usage(
                "config validation failed: lock_retry_ms must be greater than 0".to_string(),
            ));
        }

        if self.watchdog_grace_secs == 0 {
            return Err(ExflockError::Usage(
                "config validation failed: watchdog_grace_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Requester liveness poll interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Backoff between lock attempts.
    pub fn lock_retry(&self) -> Duration {
        Duration::from_millis(self.lock_retry_ms)
    }

    /// Directory in which mailboxes are created.
    pub fn mailbox_dir(&self) -> PathBuf {
        self.mailbox_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

fn default_config_path<F>(env: &F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<OsString>,
{
    if let Some(xdg) = env("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(xdg).join(CONFIG_RELATIVE_PATH));
    }

    env("HOME")
        .filter(|v| !v.is_empty())
        .map(|home| PathBuf::from(home).join(".config").join(CONFIG_RELATIVE_PATH))
}
