//! Push drains: callbacks invoked on the posting thread
//!
//! A registered push drain lives in a [`PushSlot`]. The slot's gate counts
//! callbacks in flight: deactivation clears the active flag, then waits for
//! the count to reach zero. So deregistration waits for in-flight callbacks,
//! and once it returns no callback into that drain can start. Nested
//! deliveries (a callback posting into its own conduit) just raise the count.
//!
//! A push drain must not deregister itself from inside its own callback;
//! deactivation would wait for that same callback to return.
//! The same holds for closing the conduit from inside a callback.

use crate::error::{ConduitError, DrainFailure};
use crate::sync::lock;
use identity::ConduitId;
use ipc::{Item, Receipt, ReceiptKind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

/// Consumer invoked synchronously for every post
///
/// The returned kind becomes the drain's receipt: `Delivery` when handled,
/// `Unwanted` when declined.
pub trait PushDrain: Send + Sync {
    fn post_listener(&self, item: &Item) -> Result<ReceiptKind, DrainFailure>;
}

impl<F> PushDrain for F
where
    F: Fn(&Item) -> Result<ReceiptKind, DrainFailure> + Send + Sync,
{
    fn post_listener(&self, item: &Item) -> Result<ReceiptKind, DrainFailure> {
        self(item)
    }
}

/// Wraps a closure as a shareable push drain
pub fn drain_fn<F>(f: F) -> Arc<dyn PushDrain>
where
    F: Fn(&Item) -> Result<ReceiptKind, DrainFailure> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Checks whether two handles point at the same drain object
pub(crate) fn same_drain<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

#[derive(Debug)]
struct Gate {
    active: bool,
    in_flight: usize,
}

/// A registered push drain
pub(crate) struct PushSlot {
    id: ConduitId,
    drain: Arc<dyn PushDrain>,
    gate: Mutex<Gate>,
    idle: Condvar,
    tokens: AtomicU64,
}

/// Leaves the gate when the callback returns or unwinds
struct InFlight<'a>(&'a PushSlot);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut gate = lock(&self.0.gate);
        gate.in_flight -= 1;
        if gate.in_flight == 0 {
            self.0.idle.notify_all();
        }
    }
}

impl PushSlot {
    pub(crate) fn new(id: ConduitId, drain: Arc<dyn PushDrain>) -> Self {
        Self {
            id,
            drain,
            gate: Mutex::new(Gate {
                active: true,
                in_flight: 0,
            }),
            idle: Condvar::new(),
            tokens: AtomicU64::new(0),
        }
    }

    pub(crate) fn id(&self) -> &ConduitId {
        &self.id
    }

    pub(crate) fn holds(&self, drain: &Arc<dyn PushDrain>) -> bool {
        same_drain(&self.drain, drain)
    }

    /// Runs the callback, or returns `None` if the slot was deactivated
    pub(crate) fn deliver(&self, item: &Item) -> Option<Result<Receipt, ConduitError>> {
        let _in_flight = self.enter()?;
        let token = self.tokens.fetch_add(1, Ordering::Relaxed) + 1;
        let outcome = match self.drain.post_listener(item) {
            Ok(kind) => Ok(Receipt::new(self.id.clone(), item.id, token, kind)),
            Err(source) => Err(ConduitError::PostFailed {
                drain: self.id.clone(),
                item: item.id,
                source,
            }),
        };
        Some(outcome)
    }

    fn enter(&self) -> Option<InFlight<'_>> {
        let mut gate = lock(&self.gate);
        if !gate.active {
            return None;
        }
        gate.in_flight += 1;
        Some(InFlight(self))
    }

    /// Stops further callbacks, then blocks until in-flight ones finish
    pub(crate) fn deactivate(&self) {
        let mut gate = lock(&self.gate);
        gate.active = false;
        while gate.in_flight > 0 {
            gate = self.idle.wait(gate).unwrap_or_else(PoisonError::into_inner);
        }
    }

    #[cfg(test)]
    pub(crate) fn is_active(&self) -> bool {
        lock(&self.gate).active
    }
}
