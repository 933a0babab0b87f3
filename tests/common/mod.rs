//! Common helpers for driving the exflock binary end to end.

#![allow(dead_code)] // Functions used across different test binaries

use fs2::FileExt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Liveness poll used by holders under test.
pub const POLL_MS: u64 = 100;

/// Scratch directory with a lock target, a mailbox directory, an event log,
/// and a config file pointing at all of them.
pub struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("target"), "").unwrap();
        fs::create_dir(dir.path().join("mailboxes")).unwrap();

        let sandbox = Self { dir };
        sandbox.write_config("");
        sandbox
    }

    /// Rewrite the config file, appending `extra` YAML lines.
    pub fn write_config(&self, extra: &str) {
        let config = format!(
            "poll_interval_ms: {}\nlock_retry_ms: 20\nwatchdog_grace_secs: 10\nmailbox_dir: {}\nevent_log: {}\n{}",
            POLL_MS,
            self.mailbox_dir().display(),
            self.event_log().display(),
            extra
        );
        fs::write(self.config_path(), config).unwrap();
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn target(&self) -> PathBuf {
        self.dir.path().join("target")
    }

    pub fn mailbox_dir(&self) -> PathBuf {
        self.dir.path().join("mailboxes")
    }

    pub fn event_log(&self) -> PathBuf {
        self.dir.path().join("events.ndjson")
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("config.yaml")
    }

    /// A command for the exflock binary with this sandbox's config.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_exflock"));
        cmd.env("EXFLOCK_CONFIG", self.config_path())
            .env_remove("EXFLOCK_EVENT_LOG")
            .env_remove("EXFLOCK_POLL_INTERVAL_MS")
            .current_dir(self.dir.path());
        cmd
    }

    /// Run exflock with `args` and wait for the launcher to exit.
    pub fn run(&self, args: &[&str]) -> Output {
        self.command()
            .args(args)
            .output()
            .expect("failed to run exflock")
    }

    /// Lock the sandbox target, expecting success, and return the holder pid.
    pub fn acquire(&self, wait: &str, lifetime: &str) -> u32 {
        let target = self.target();
        let output = self.run(&[wait, target.to_str().unwrap(), lifetime]);
        assert!(
            output.status.success(),
            "exflock failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        holder_pid(&output)
    }

    pub fn mailboxes(&self) -> Vec<PathBuf> {
        fs::read_dir(self.mailbox_dir())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }

    pub fn events(&self) -> Vec<serde_json::Value> {
        fs::read_to_string(self.event_log())
            .unwrap_or_default()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

/// Parse the single stdout line of a successful launch.
pub fn holder_pid(output: &Output) -> u32 {
    let stdout = String::from_utf8(output.stdout.clone()).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 1, "expected one stdout line, got {:?}", stdout);
    assert!(stdout.ends_with('\n'));
    lines[0].parse().unwrap()
}

/// Whether the target can be locked right now from a fresh descriptor.
pub fn is_unlocked(path: &Path) -> bool {
    let file = File::open(path).unwrap();
    let free = file.try_lock_exclusive().is_ok();
    if free {
        file.unlock().unwrap();
    }
    free
}

/// Whether `pid` exists and is not a zombie.
pub fn is_running(pid: u32) -> bool {
    // SAFETY: signal 0 only checks for existence.
    if unsafe { libc::kill(pid as libc::pid_t, 0) } != 0 {
        return false;
    }
    match fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(stat) => {
            let state = stat
                .rfind(')')
                .and_then(|i| stat[i + 1..].split_whitespace().next());
            !matches!(state, Some("Z") | Some("X"))
        }
        Err(_) => !Path::new("/proc/self").exists(),
    }
}

/// Poll until `pid` is gone; returns false on timeout.
pub fn wait_until_gone(pid: u32, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if !is_running(pid) {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    !is_running(pid)
}

pub fn send_signal(pid: u32, signo: libc::c_int) {
    // SAFETY: kill(2) has no memory-safety preconditions.
    unsafe {
        libc::kill(pid as libc::pid_t, signo);
    }
}

/// Terminate a holder and wait for its lock to drop.
pub fn release(pid: u32) {
    send_signal(pid, libc::SIGTERM);
    assert!(
        wait_until_gone(pid, Duration::from_secs(5)),
        "holder {} ignored SIGTERM",
        pid
    );
}
