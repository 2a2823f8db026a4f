//! Conduit-wide drain completion signal
//!
//! Posters that must wait for consumption block here instead of re-scanning
//! drain sets in a loop. Every drain completion on the conduit (an item
//! leaving a pull container, a drain deregistering, the conduit closing)
//! advances the epoch and wakes all waiters, who then re-check their own
//! condition.
//!
//! Waiters read the epoch *before* checking their condition and wait for it
//! to move past that value, so a completion that lands between the check
//! and the wait is never lost.

use crate::sync::lock;
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Instant;

/// Epoch counter plus condition variable shared by one conduit's drains
#[derive(Debug, Default)]
pub struct DrainSignal {
    epoch: Mutex<u64>,
    advanced: Condvar,
}

impl DrainSignal {
    /// Creates a signal at epoch zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current epoch
    pub fn epoch(&self) -> u64 {
        *lock(&self.epoch)
    }

    /// Records a drain completion and wakes every waiter
    pub fn notify(&self) {
        let mut epoch = lock(&self.epoch);
        *epoch = epoch.wrapping_add(1);
        self.advanced.notify_all();
    }

    /// Blocks until the epoch differs from `seen`
    ///
    /// Returns `false` if `deadline` passed first.
    pub fn wait_past(&self, seen: u64, deadline: Option<Instant>) -> bool {
        let mut epoch = lock(&self.epoch);
        while *epoch == seen {
            match deadline {
                None => {
                    epoch = self
                        .advanced
                        .wait(epoch)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    let (guard, _) = self
                        .advanced
                        .wait_timeout(epoch, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner);
                    epoch = guard;
                }
            }
        }
        true
    }
}
