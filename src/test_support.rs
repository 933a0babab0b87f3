use std::ffi::OsString;
use std::sync::{LazyLock, Mutex, MutexGuard};

static ENV_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

/// Sets process environment variables for the lifetime of the guard.
pub(crate) struct EnvGuard {
    saved: Vec<(String, Option<OsString>)>,
    _lock: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// `None` values unset the variable.
    pub(crate) fn set(vars: &[(&str, Option<&str>)]) -> Self {
        // The environment is global and not thread-safe.
        // Lock it so tests don't race even if a #[serial] annotation is missed.
        let lock = ENV_LOCK.lock().unwrap_or_else(|poison| poison.into_inner());
        let saved = vars
            .iter()
            .map(|(key, value)| {
                let previous = std::env::var_os(key);
                write_var(key, value.map(OsString::from));
                (key.to_string(), previous)
            })
            .collect();
        Self { saved, _lock: lock }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, previous) in self.saved.drain(..).rev() {
            write_var(&key, previous);
        }
    }
}

fn write_var(key: &str, value: Option<OsString>) {
    // SAFETY: callers hold ENV_LOCK and run under #[serial].
    unsafe {
        match value {
            Some(value) => std::env::set_var(key, value),
            None => std::env::remove_var(key),
        }
    }
}
