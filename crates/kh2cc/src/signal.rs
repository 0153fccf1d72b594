use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use strum::{Display, IntoStaticStr};

/// Why a running instance (or a background loop) was told to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, IntoStaticStr, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CancelReason {
    /// Explicit stop request for the effect
    Requested,
    /// A conflicting effect was requested
    Superseded,
    /// Stop-all from the host
    StopAll,
    /// The scheduler or process is going away
    Shutdown,
}

/// A cancellation signal that supports interruptible waits.
///
/// Unlike `thread::sleep()`, waits on this signal return as soon as the
/// signal is triggered. The first reason given is the one kept.
#[derive(Debug, Default)]
pub struct CancelSignal {
    reason: Mutex<Option<CancelReason>>,
    condvar: Condvar,
}

impl CancelSignal {
    /// Create a new signal in the non-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger the signal, waking all waiting threads.
    ///
    /// Returns `true` if this call was the one that cancelled.
    pub fn cancel(&self, reason: CancelReason) -> bool {
        let mut guard = self.lock();
        let first = guard.is_none();
        if first {
            *guard = Some(reason);
        }
        drop(guard);
        self.condvar.notify_all();
        first
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock().is_some()
    }

    pub fn reason(&self) -> Option<CancelReason> {
        *self.lock()
    }

    /// Wait for `duration` or until cancelled.
    ///
    /// Returns `true` if the signal was triggered, `false` if the wait
    /// completed normally.
    ///
    /// A duration too large to add to the current instant waits until
    /// cancelled.
    pub fn wait(&self, duration: Duration) -> bool {
        let deadline = Instant::now().checked_add(duration);
        let mut guard = self.lock();
        loop {
            if guard.is_some() {
                return true;
            }
            guard = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    match self.condvar.wait_timeout(guard, deadline - now) {
                        Ok((guard, _)) => guard,
                        Err(poisoned) => poisoned.into_inner().0,
                    }
                }
                None => self
                    .condvar
                    .wait(guard)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<CancelReason>> {
        self.reason.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
