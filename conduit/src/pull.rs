//! Pull drains: buffered queues polled by consumer threads
//!
//! ## Per-item lifecycle
//!
//! ```text
//! posted ──► queued ──► (poll | wait_item) ──► drained
//! ```
//!
//! ## Locking
//!
//! [`BasicPullDrain`] keeps its FIFO queue and its catalog of undrained
//! items behind one mutex, so an item is in the catalog exactly while a copy
//! of it is queued. Removals notify the container's own condition variable
//! (local waiters) and then, with the container lock released, the attached
//! conduit's [`DrainSignal`] (blocked posters).

use crate::error::ConduitError;
use crate::signal::DrainSignal;
use crate::sync::lock;
use identity::ConduitId;
use ipc::{Item, ItemId, Receipt};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// A consumer that buffers items for independent retrieval
///
/// The conduit calls [`attach`](Self::attach) on registration and
/// [`detach`](Self::detach) on deregistration; injectors call
/// [`post_listener`](Self::post_listener) and [`is_drained`](Self::is_drained).
/// Everything else is the consumer side.
pub trait PullDrainContainer: Send + Sync {
    /// Binds the container to a conduit under a conduit-scoped identity
    fn attach(&self, id: ConduitId, signal: Arc<DrainSignal>) -> Result<(), ConduitError>;

    /// Unbinds the container; queued items stay available
    fn detach(&self);

    /// Identity assigned at the most recent registration
    fn id(&self) -> Option<ConduitId>;

    /// Enqueues an item and acknowledges it
    fn post_listener(&self, item: Item) -> Result<Receipt, ConduitError>;

    /// Removes the oldest item, if any
    fn poll(&self) -> Option<Item>;

    /// Removes the oldest item, blocking until one arrives
    fn wait_item(&self) -> Result<Item, ConduitError>;

    /// Like [`wait_item`](Self::wait_item), giving up after `timeout`
    fn wait_item_timeout(&self, timeout: Duration) -> Result<Option<Item>, ConduitError>;

    /// True iff no copy of `item` is waiting in this container
    fn is_drained(&self, item: &Item) -> bool;

    /// Returns once some item has left the container (immediately if empty)
    fn wait_for_drain(&self) -> Result<(), ConduitError>;

    /// Interrupts a blocked (or the next) wait
    fn interrupt(&self);

    /// Number of queued items
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
struct PullState {
    id: Option<ConduitId>,
    signal: Option<Arc<DrainSignal>>,
    queue: VecDeque<Item>,
    /// Undrained item ids with the number of queued copies
    catalog: HashMap<ItemId, usize>,
    next_token: u64,
    drained: u64,
    interrupted: bool,
}

impl PullState {
    fn take_front(&mut self) -> Option<Item> {
        let item = self.queue.pop_front()?;
        if let Entry::Occupied(mut copies) = self.catalog.entry(item.id) {
            if *copies.get() > 1 {
                *copies.get_mut() -= 1;
            } else {
                copies.remove();
            }
        }
        self.drained = self.drained.wrapping_add(1);
        Some(item)
    }

    fn take_interrupt(&mut self) -> bool {
        std::mem::take(&mut self.interrupted)
    }
}

/// Mutex-and-condvar pull drain
#[derive(Debug, Default)]
pub struct BasicPullDrain {
    state: Mutex<PullState>,
    changed: Condvar,
}

impl BasicPullDrain {
    /// Creates an unattached container
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a container ready to hand to `Conduit::register_pull_drain`
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Removes every queued item in FIFO order
    pub fn drain_pending(&self) -> Vec<Item> {
        let mut state = self.lock();
        let mut items = Vec::with_capacity(state.queue.len());
        while let Some(item) = state.take_front() {
            items.push(item);
        }
        self.finish_removal(state, !items.is_empty());
        items
    }

    /// Total number of items removed so far
    pub fn drained_count(&self) -> u64 {
        self.lock().drained
    }

    /// Checks if the container is currently bound to a conduit
    pub fn is_attached(&self) -> bool {
        self.lock().signal.is_some()
    }

    fn lock(&self) -> MutexGuard<'_, PullState> {
        lock(&self.state)
    }

    fn wait<'a>(&self, state: MutexGuard<'a, PullState>) -> MutexGuard<'a, PullState> {
        self.changed
            .wait(state)
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_until<'a>(
        &self,
        state: MutexGuard<'a, PullState>,
        deadline: Instant,
    ) -> MutexGuard<'a, PullState> {
        let timeout = deadline.saturating_duration_since(Instant::now());
        let (state, _) = self
            .changed
            .wait_timeout(state, timeout)
            .unwrap_or_else(PoisonError::into_inner);
        state
    }

    // Wakes local waiters, then the conduit, with the container lock released.
    fn finish_removal(&self, state: MutexGuard<'_, PullState>, removed: bool) {
        if !removed {
            return;
        }
        let signal = state.signal.clone();
        drop(state);
        self.changed.notify_all();
        if let Some(signal) = signal {
            signal.notify();
        }
    }
}

impl PullDrainContainer for BasicPullDrain {
    fn attach(&self, id: ConduitId, signal: Arc<DrainSignal>) -> Result<(), ConduitError> {
        let mut state = self.lock();
        if state.signal.is_some() {
            let current = state.id.clone().unwrap_or(id);
            return Err(ConduitError::AlreadyRegistered(current));
        }
        state.id = Some(id);
        state.signal = Some(signal);
        Ok(())
    }

    fn detach(&self) {
        self.lock().signal = None;
    }

    fn id(&self) -> Option<ConduitId> {
        self.lock().id.clone()
    }

    fn post_listener(&self, item: Item) -> Result<Receipt, ConduitError> {
        let mut state = self.lock();
        let id = state.id.clone().ok_or(ConduitError::NotInitialized)?;
        state.next_token += 1;
        let token = state.next_token;
        *state.catalog.entry(item.id).or_insert(0) += 1;
        let item_id = item.id;
        state.queue.push_back(item);
        drop(state);

        self.changed.notify_all();
        Ok(Receipt::acceptance(id, item_id, token))
    }

    fn poll(&self) -> Option<Item> {
        let mut state = self.lock();
        let item = state.take_front();
        self.finish_removal(state, item.is_some());
        item
    }

    fn wait_item(&self) -> Result<Item, ConduitError> {
        let mut state = self.lock();
        loop {
            if let Some(item) = state.take_front() {
                self.finish_removal(state, true);
                return Ok(item);
            }
            if state.take_interrupt() {
                return Err(ConduitError::WaitInterrupted);
            }
            state = self.wait(state);
        }
    }

    fn wait_item_timeout(&self, timeout: Duration) -> Result<Option<Item>, ConduitError> {
        let deadline = match Instant::now().checked_add(timeout) {
            Some(deadline) => deadline,
            None => return self.wait_item().map(Some),
        };
        let mut state = self.lock();
        loop {
            if let Some(item) = state.take_front() {
                self.finish_removal(state, true);
                return Ok(Some(item));
            }
            if state.take_interrupt() {
                return Err(ConduitError::WaitInterrupted);
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            state = self.wait_until(state, deadline);
        }
    }

    fn is_drained(&self, item: &Item) -> bool {
        !self.lock().catalog.contains_key(&item.id)
    }

    fn wait_for_drain(&self) -> Result<(), ConduitError> {
        let mut state = self.lock();
        if state.queue.is_empty() {
            return Ok(());
        }
        let seen = state.drained;
        loop {
            if state.drained != seen {
                return Ok(());
            }
            if state.take_interrupt() {
                return Err(ConduitError::WaitInterrupted);
            }
            state = self.wait(state);
        }
    }

    fn interrupt(&self) {
        self.lock().interrupted = true;
        self.changed.notify_all();
    }

    fn len(&self) -> usize {
        self.lock().queue.len()
    }
}
