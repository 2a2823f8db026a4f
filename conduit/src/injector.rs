//! Injectors: producer handles bound to one delivery discipline
//!
//! | Discipline            | Zero drains  | Blocks until                                  |
//! |-----------------------|--------------|-----------------------------------------------|
//! | `Broadcast`           | empty list   | never                                         |
//! | `Unspecified`         | empty list   | never                                         |
//! | `RequireFirstDrain`   | `NoDrains`   | one push drain ran, or one pull drain drained |
//! | `RequireAllDrain`     | `NoDrains`   | every push drain ran and every pull drain drained |
//!
//! Blocking posts wait on the conduit's [`DrainSignal`](crate::DrainSignal),
//! bounded by the injector's post timeout when one is configured.

use crate::drain::PushSlot;
use crate::error::ConduitError;
use crate::pull::PullDrainContainer;
use crate::signal::DrainSignal;
use identity::ConduitId;
use ipc::{Item, ReceiptList};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{trace, warn};

/// Delivery discipline of an injector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InjectorType {
    /// Treated as broadcast
    #[default]
    Unspecified,
    /// Fan out to every drain without waiting
    Broadcast,
    /// Wait until at least one drain consumed the item
    RequireFirstDrain,
    /// Wait until every drain consumed the item
    RequireAllDrain,
}

impl InjectorType {
    /// Checks if posts of this type may block the poster
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            InjectorType::RequireFirstDrain | InjectorType::RequireAllDrain
        )
    }
}

impl fmt::Display for InjectorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InjectorType::Unspecified => write!(f, "UNSPECIFIED"),
            InjectorType::Broadcast => write!(f, "BROADCAST"),
            InjectorType::RequireFirstDrain => write!(f, "REQUIRE_FIRST_DRAIN"),
            InjectorType::RequireAllDrain => write!(f, "REQUIRE_ALL_DRAIN"),
        }
    }
}

/// The part of a conduit an injector may touch
pub(crate) trait DrainAccess: Send + Sync {
    fn conduit_id(&self) -> &ConduitId;
    fn push_drains(&self) -> Vec<Arc<PushSlot>>;
    fn pull_drains(&self) -> Vec<Arc<dyn PullDrainContainer>>;
    fn holds_pull_drain(&self, drain: &Arc<dyn PullDrainContainer>) -> bool;
    fn drain_signal(&self) -> &DrainSignal;
    fn is_closed(&self) -> bool;
}

#[derive(Clone, Copy)]
enum Await {
    Any,
    All,
}

/// A pull drain that accepted the item and has not yet drained it
struct Pending {
    receipt: usize,
    drain: Arc<dyn PullDrainContainer>,
}

/// Producer-side handle created by [`Conduit::get_injector`](crate::Conduit::get_injector)
pub struct Injector {
    id: ConduitId,
    kind: InjectorType,
    post_timeout: Option<Duration>,
    disposed: AtomicBool,
    access: Arc<dyn DrainAccess>,
}

impl Injector {
    pub(crate) fn new(
        id: ConduitId,
        kind: InjectorType,
        post_timeout: Option<Duration>,
        access: Arc<dyn DrainAccess>,
    ) -> Self {
        Self {
            id,
            kind,
            post_timeout,
            disposed: AtomicBool::new(false),
            access,
        }
    }

    pub fn id(&self) -> &ConduitId {
        &self.id
    }

    pub fn kind(&self) -> InjectorType {
        self.kind
    }

    /// Identity of the conduit this injector posts into
    pub fn conduit_id(&self) -> &ConduitId {
        self.access.conduit_id()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Returns true the first time only
    pub(crate) fn mark_disposed(&self) -> bool {
        !self.disposed.swap(true, Ordering::AcqRel)
    }

    /// Posts an item under this injector's discipline
    ///
    /// Blocking disciplines wait at most the configured post timeout.
    pub fn post(&self, item: Item) -> Result<ReceiptList, ConduitError> {
        self.post_within(item, self.post_timeout)
    }

    /// Posts an item, waiting at most `timeout` for blocking disciplines
    pub fn post_timeout(&self, item: Item, timeout: Duration) -> Result<ReceiptList, ConduitError> {
        self.post_within(item, Some(timeout))
    }

    fn post_within(
        &self,
        item: Item,
        timeout: Option<Duration>,
    ) -> Result<ReceiptList, ConduitError> {
        if self.is_disposed() {
            return Err(ConduitError::InjectorDisposed(self.id.clone()));
        }
        if self.access.is_closed() {
            return Err(ConduitError::Closed(self.access.conduit_id().clone()));
        }
        trace!(injector = %self.id, item = %item, kind = %self.kind, "post");

        let result = match self.kind {
            InjectorType::Unspecified | InjectorType::Broadcast => self.broadcast(&item),
            InjectorType::RequireFirstDrain => self.require_drain(&item, Await::Any, timeout),
            InjectorType::RequireAllDrain => self.require_drain(&item, Await::All, timeout),
        };
        if let Err(err) = &result {
            if err.is_fault() {
                warn!(injector = %self.id, item = %item, error = %err, "post failed");
            }
        }
        result
    }

    fn broadcast(&self, item: &Item) -> Result<ReceiptList, ConduitError> {
        let mut receipts = ReceiptList::new();
        for drain in self.access.pull_drains() {
            receipts.push(self.enqueue(drain.as_ref(), item)?);
        }
        for slot in self.access.push_drains() {
            if let Some(receipt) = slot.deliver(item) {
                receipts.push(receipt?);
            }
        }
        Ok(receipts)
    }

    fn require_drain(
        &self,
        item: &Item,
        need: Await,
        timeout: Option<Duration>,
    ) -> Result<ReceiptList, ConduitError> {
        let pushes = self.access.push_drains();
        let pulls = self.access.pull_drains();
        if pushes.is_empty() && pulls.is_empty() {
            return Err(ConduitError::NoDrains(self.access.conduit_id().clone()));
        }
        let started = Instant::now();

        // Push delivery is synchronous, so each callback that ran is a
        // completed drain.
        let mut receipts = ReceiptList::new();
        let mut completed = 0usize;
        for slot in &pushes {
            if let Some(receipt) = slot.deliver(item) {
                receipts.push(receipt?);
                completed += 1;
            }
        }

        let mut pending = Vec::with_capacity(pulls.len());
        for drain in pulls {
            let receipt = self.enqueue(drain.as_ref(), item)?;
            pending.push(Pending {
                receipt: receipts.len(),
                drain,
            });
            receipts.push(receipt);
        }

        if pending.is_empty() {
            if completed == 0 {
                // Every push drain deregistered between snapshot and delivery.
                return Err(ConduitError::NoDrains(self.access.conduit_id().clone()));
            }
            return Ok(receipts);
        }
        if matches!(need, Await::Any) && completed > 0 {
            return Ok(receipts);
        }

        trace!(
            injector = %self.id,
            item = %item,
            remaining = pending.len(),
            "waiting for pull drains"
        );
        self.await_drains(item, need, pending, &mut receipts, started, timeout)?;
        Ok(receipts)
    }

    fn await_drains(
        &self,
        item: &Item,
        need: Await,
        mut pending: Vec<Pending>,
        receipts: &mut ReceiptList,
        started: Instant,
        timeout: Option<Duration>,
    ) -> Result<(), ConduitError> {
        let signal = self.access.drain_signal();
        // A deadline past the clock's range means no deadline.
        let deadline = timeout.and_then(|timeout| started.checked_add(timeout));

        loop {
            let seen = signal.epoch();
            if self.access.is_closed() {
                return Err(ConduitError::Closed(self.access.conduit_id().clone()));
            }

            let mut drained_any = false;
            pending.retain(|entry| {
                if entry.drain.is_drained(item) {
                    if let Some(receipt) = receipts.get_mut(entry.receipt) {
                        *receipt = receipt.clone().delivered();
                    }
                    drained_any = true;
                    false
                } else {
                    // A drain deregistered mid-wait releases the poster; its
                    // receipt stays an acceptance.
                    self.access.holds_pull_drain(&entry.drain)
                }
            });

            let satisfied = match need {
                Await::Any => drained_any || pending.is_empty(),
                Await::All => pending.is_empty(),
            };
            if satisfied {
                return Ok(());
            }

            if !signal.wait_past(seen, deadline) {
                let waited = started.elapsed();
                warn!(
                    injector = %self.id,
                    item = %item,
                    remaining = pending.len(),
                    ?waited,
                    "drain wait timed out"
                );
                return Err(ConduitError::DrainTimeout {
                    conduit: self.access.conduit_id().clone(),
                    item: item.id,
                    waited,
                });
            }
        }
    }

    fn enqueue(
        &self,
        drain: &dyn PullDrainContainer,
        item: &Item,
    ) -> Result<ipc::Receipt, ConduitError> {
        drain
            .post_listener(item.clone())
            .map_err(|err| ConduitError::PostFailed {
                drain: drain
                    .id()
                    .unwrap_or_else(|| self.access.conduit_id().clone()),
                item: item.id,
                source: Box::new(err),
            })
    }
}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injector")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("post_timeout", &self.post_timeout)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
