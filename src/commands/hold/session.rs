//! Lock session state and the release wait.

use crate::flock::HeldLock;
use crate::process::{Pid, ProcessTable};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;

/// Holder lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HolderState {
    Starting,
    PublishingIdentity,
    Holding,
    Releasing,
    Terminated,
}

impl HolderState {
    /// The state that follows this one.
    pub fn next(self) -> Self {
        match self {
            HolderState::Starting => HolderState::PublishingIdentity,
            HolderState::PublishingIdentity => HolderState::Holding,
            HolderState::Holding => HolderState::Releasing,
            HolderState::Releasing | HolderState::Terminated => HolderState::Terminated,
        }
    }
}

/// Why a holder gave up its lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseReason {
    RequesterExited,
    LifetimeExpired,
    Signal(i32),
}

impl ReleaseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseReason::RequesterExited => "requester_exited",
            ReleaseReason::LifetimeExpired => "lifetime_expired",
            ReleaseReason::Signal(_) => "signal",
        }
    }
}

/// An acquired lock plus everything that decides when it is released.
#[derive(Debug)]
pub struct LockSession {
    holder: Pid,
    requester: Pid,
    max_lifetime: Duration,
    acquired_at: Instant,
    state: HolderState,
    lock: Option<HeldLock>,
}

impl LockSession {
    /// Start a session for a freshly acquired lock. A zero `max_lifetime`
    /// never expires.
    pub fn new(holder: Pid, requester: Pid, max_lifetime: Duration, lock: HeldLock) -> Self {
        Self {
            holder,
            requester,
            max_lifetime,
            acquired_at: Instant::now(),
            state: HolderState::Starting.next(),
            lock: Some(lock),
        }
    }

    pub fn holder(&self) -> Pid {
        self.holder
    }

    pub fn requester(&self) -> Pid {
        self.requester
    }

    #[cfg(test)]
    pub fn state(&self) -> HolderState {
        self.state
    }

    /// The identity is published; the lock is now the caller's.
    pub fn mark_holding(&mut self) {
        if self.state == HolderState::PublishingIdentity {
            self.state = self.state.next();
        }
    }

    /// Instant at which the lifetime expires, if bounded. A lifetime past
    /// what the clock can represent never expires.
    pub fn deadline(&self) -> Option<Instant> {
        if self.max_lifetime.is_zero() {
            None
        } else {
            self.acquired_at.checked_add(self.max_lifetime)
        }
    }

    /// Drop the lock and return how long it was held. Later calls are no-ops.
    pub fn release(&mut self) -> Duration {
        while self.state != HolderState::Releasing && self.state != HolderState::Terminated {
            self.state = self.state.next();
        }
        self.lock.take();
        self.state = self.state.next();
        self.acquired_at.elapsed()
    }
}

/// Wait until the lock should be released.
///
/// Resolves on the first of: `shutdown` completing with a signal number, the
/// deadline passing, or a poll finding `requester` gone. The first poll runs
/// immediately.
pub async fn wait_for_release<T, F>(
    table: &T,
    requester: Pid,
    deadline: Option<Instant>,
    poll: Duration,
    shutdown: F,
) -> ReleaseReason
where
    T: ProcessTable,
    F: Future<Output = i32>,
{
    let expiry = async {
        match deadline {
            Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(expiry);
    tokio::pin!(shutdown);

    let mut ticks = tokio::time::interval(poll);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            signo = &mut shutdown => return ReleaseReason::Signal(signo),
            _ = &mut expiry => return ReleaseReason::LifetimeExpired,
            _ = ticks.tick() => {
                if !table.is_alive(requester) {
                    return ReleaseReason::RequesterExited;
                }
            }
        }
    }
}
