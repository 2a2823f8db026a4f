//! The conduit: drain sets, injector tracking and lifecycle

use crate::config::ConduitConfig;
use crate::drain::{same_drain, PushDrain, PushSlot};
use crate::error::ConduitError;
use crate::injector::{DrainAccess, Injector, InjectorType};
use crate::pull::PullDrainContainer;
use crate::signal::DrainSignal;
use crate::sync::{lock, read, write};
use identity::ConduitId;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use tracing::debug;

/// Named in-process delivery channel
///
/// A conduit is created empty and must be [`init`](Self::init)ialized with its
/// identity exactly once; every other operation fails with
/// [`ConduitError::NotInitialized`] until then. Push and pull drain sets are
/// locked independently of each other, and posts work on snapshots of them,
/// so registration never waits for a post in progress (except push drain
/// deregistration, which waits for that drain's in-flight callback).
pub struct Conduit {
    config: ConduitConfig,
    core: OnceLock<Arc<ConduitCore>>,
}

impl Conduit {
    /// Creates an uninitialized conduit with default settings
    pub fn new() -> Self {
        Self::with_config(ConduitConfig::default())
    }

    /// Creates an uninitialized conduit
    pub fn with_config(config: ConduitConfig) -> Self {
        Self {
            config,
            core: OnceLock::new(),
        }
    }

    /// Creates and initializes a conduit in one step
    pub fn with_id(id: ConduitId, config: ConduitConfig) -> Self {
        let conduit = Self::with_config(config);
        let core = Arc::new(ConduitCore::new(id));
        // A fresh OnceLock cannot be occupied.
        let _ = conduit.core.set(core);
        conduit
    }

    /// Assigns the conduit's identity; a second call is a fault
    pub fn init(&self, id: ConduitId) -> Result<(), ConduitError> {
        let core = Arc::new(ConduitCore::new(id));
        self.core.set(core).map_err(|rejected| {
            let current = self
                .core
                .get()
                .map(|core| core.id.clone())
                .unwrap_or_else(|| rejected.id.clone());
            ConduitError::AlreadyInitialized(current)
        })?;
        debug!(conduit = %self.core()?.id, "conduit initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.core.get().is_some()
    }

    pub fn id(&self) -> Result<&ConduitId, ConduitError> {
        Ok(&self.core()?.id)
    }

    pub fn config(&self) -> &ConduitConfig {
        &self.config
    }

    /// Creates an injector with a generated name (`"{prefix}-{n}"`)
    pub fn get_injector(&self, kind: InjectorType) -> Result<Injector, ConduitError> {
        let core = self.open_core()?;
        let mut injectors = lock(&core.injectors);
        let id = loop {
            let n = core.injector_seq.fetch_add(1, Ordering::Relaxed) + 1;
            let candidate = core
                .id
                .birth_my_child(&format!("{}-{}", self.config.injector_prefix, n));
            if !injectors.contains_key(&candidate) {
                break candidate;
            }
        };
        Ok(self.track_injector(core, &mut injectors, id, kind))
    }

    /// Creates an injector with a caller-chosen name
    pub fn get_injector_named(
        &self,
        kind: InjectorType,
        name: &str,
    ) -> Result<Injector, ConduitError> {
        let core = self.open_core()?;
        let mut injectors = lock(&core.injectors);
        let id = core.id.birth_my_child(name);
        if injectors.contains_key(&id) {
            return Err(ConduitError::AlreadyRegistered(id));
        }
        Ok(self.track_injector(core, &mut injectors, id, kind))
    }

    fn track_injector(
        &self,
        core: &Arc<ConduitCore>,
        injectors: &mut HashMap<ConduitId, InjectorType>,
        id: ConduitId,
        kind: InjectorType,
    ) -> Injector {
        injectors.insert(id.clone(), kind);
        debug!(conduit = %core.id, injector = %id, %kind, "injector created");
        let access: Arc<dyn DrainAccess> = Arc::clone(core) as Arc<dyn DrainAccess>;
        Injector::new(id, kind, self.config.post_timeout, access)
    }

    /// Stops tracking an injector and disables it
    ///
    /// Idempotent; an injector this conduit does not know is left alone.
    pub fn dispose_injector(&self, injector: &Injector) -> Result<(), ConduitError> {
        let core = self.core()?;
        if injector.conduit_id() != &core.id {
            return Ok(());
        }
        let removed = lock(&core.injectors).remove(injector.id()).is_some();
        if injector.mark_disposed() || removed {
            debug!(conduit = %core.id, injector = %injector.id(), "injector disposed");
        }
        Ok(())
    }

    /// Number of live injectors
    pub fn injector_count(&self) -> Result<usize, ConduitError> {
        Ok(lock(&self.core()?.injectors).len())
    }

    /// Registers a pull drain under a conduit-scoped identity
    pub fn register_pull_drain(
        &self,
        drain: Arc<dyn PullDrainContainer>,
    ) -> Result<ConduitId, ConduitError> {
        let core = self.open_core()?;
        let n = core.pull_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let id = core
            .id
            .birth_my_child(&format!("{}-{}", self.config.pull_prefix, n));
        drain.attach(id.clone(), Arc::clone(&core.signal))?;
        {
            // `close` swaps the flag before taking this lock, so either it
            // sees the drain or the drain sees the flag.
            let mut drains = write(&core.pull_drains);
            if core.closed.load(Ordering::Acquire) {
                drop(drains);
                drain.detach();
                return Err(ConduitError::Closed(core.id.clone()));
            }
            drains.push(drain);
        }
        debug!(conduit = %core.id, drain = %id, "pull drain registered");
        Ok(id)
    }

    /// Removes a pull drain; its queued items stay with it
    ///
    /// Returns false if the drain was not registered here.
    pub fn deregister_pull_drain(
        &self,
        drain: &Arc<dyn PullDrainContainer>,
    ) -> Result<bool, ConduitError> {
        let core = self.core()?;
        let removed = {
            let mut drains = write(&core.pull_drains);
            let before = drains.len();
            drains.retain(|registered| !same_drain(registered, drain));
            drains.len() != before
        };
        if removed {
            drain.detach();
            // Posters waiting on this drain re-check and let go of it.
            core.signal.notify();
            debug!(conduit = %core.id, drain = ?drain.id(), "pull drain deregistered");
        }
        Ok(removed)
    }

    /// Registers a push drain under a conduit-scoped identity
    ///
    /// From now on the drain may be called on any posting thread.
    pub fn register_push_drain(
        &self,
        drain: Arc<dyn PushDrain>,
    ) -> Result<ConduitId, ConduitError> {
        let core = self.open_core()?;
        let mut slots = write(&core.push_drains);
        if core.closed.load(Ordering::Acquire) {
            return Err(ConduitError::Closed(core.id.clone()));
        }
        if let Some(existing) = slots.iter().find(|slot| slot.holds(&drain)) {
            return Err(ConduitError::AlreadyRegistered(existing.id().clone()));
        }
        let n = core.push_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let id = core
            .id
            .birth_my_child(&format!("{}-{}", self.config.push_prefix, n));
        slots.push(Arc::new(PushSlot::new(id.clone(), drain)));
        debug!(conduit = %core.id, drain = %id, "push drain registered");
        Ok(id)
    }

    /// Removes a push drain
    ///
    /// Blocks until any callback into this drain already in progress has
    /// returned; no callback starts after this returns.
    pub fn deregister_push_drain(&self, drain: &Arc<dyn PushDrain>) -> Result<bool, ConduitError> {
        let core = self.core()?;
        let slot = {
            let mut slots = write(&core.push_drains);
            slots
                .iter()
                .position(|slot| slot.holds(drain))
                .map(|index| slots.remove(index))
        };
        match slot {
            Some(slot) => {
                // The set lock is released first so posts to other drains
                // are not held up behind this callback.
                slot.deactivate();
                debug!(conduit = %core.id, drain = %slot.id(), "push drain deregistered");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn push_drain_count(&self) -> Result<usize, ConduitError> {
        Ok(read(&self.core()?.push_drains).len())
    }

    pub fn pull_drain_count(&self) -> Result<usize, ConduitError> {
        Ok(read(&self.core()?.pull_drains).len())
    }

    /// Shuts the conduit down
    ///
    /// Deregisters every drain, disables every injector and wakes blocked
    /// posters, which fail with [`ConduitError::Closed`]. Further
    /// registrations and posts fail the same way. Closing twice is a no-op.
    ///
    /// Must not be called from inside a push drain callback of this conduit:
    /// closing waits for in-flight callbacks, including the caller's own.
    pub fn close(&self) -> Result<(), ConduitError> {
        let core = self.core()?;
        if core.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let slots = std::mem::take(&mut *write(&core.push_drains));
        for slot in &slots {
            slot.deactivate();
        }
        let pulls = std::mem::take(&mut *write(&core.pull_drains));
        for drain in &pulls {
            drain.detach();
        }
        lock(&core.injectors).clear();
        core.signal.notify();

        debug!(
            conduit = %core.id,
            push_drains = slots.len(),
            pull_drains = pulls.len(),
            "conduit closed"
        );
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.core
            .get()
            .map(|core| core.closed.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    fn core(&self) -> Result<&Arc<ConduitCore>, ConduitError> {
        self.core.get().ok_or(ConduitError::NotInitialized)
    }

    fn open_core(&self) -> Result<&Arc<ConduitCore>, ConduitError> {
        let core = self.core()?;
        if core.closed.load(Ordering::Acquire) {
            return Err(ConduitError::Closed(core.id.clone()));
        }
        Ok(core)
    }
}

impl Default for Conduit {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Conduit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conduit")
            .field("id", &self.core.get().map(|core| &core.id))
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Initialized state, shared with injectors through [`DrainAccess`]
struct ConduitCore {
    id: ConduitId,
    push_drains: RwLock<Vec<Arc<PushSlot>>>,
    pull_drains: RwLock<Vec<Arc<dyn PullDrainContainer>>>,
    injectors: Mutex<HashMap<ConduitId, InjectorType>>,
    injector_seq: AtomicU64,
    push_seq: AtomicU64,
    pull_seq: AtomicU64,
    signal: Arc<DrainSignal>,
    closed: AtomicBool,
}

impl ConduitCore {
    fn new(id: ConduitId) -> Self {
        Self {
            id,
            push_drains: RwLock::new(Vec::new()),
            pull_drains: RwLock::new(Vec::new()),
            injectors: Mutex::new(HashMap::new()),
            injector_seq: AtomicU64::new(0),
            push_seq: AtomicU64::new(0),
            pull_seq: AtomicU64::new(0),
            signal: Arc::new(DrainSignal::new()),
            closed: AtomicBool::new(false),
        }
    }
}

impl DrainAccess for ConduitCore {
    fn conduit_id(&self) -> &ConduitId {
        &self.id
    }

    fn push_drains(&self) -> Vec<Arc<PushSlot>> {
        read(&self.push_drains).clone()
    }

    fn pull_drains(&self) -> Vec<Arc<dyn PullDrainContainer>> {
        read(&self.pull_drains).clone()
    }

    fn holds_pull_drain(&self, drain: &Arc<dyn PullDrainContainer>) -> bool {
        read(&self.pull_drains)
            .iter()
            .any(|registered| same_drain(registered, drain))
    }

    fn drain_signal(&self) -> &DrainSignal {
        &self.signal
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drain::drain_fn;
    use crate::pull::BasicPullDrain;
    use ipc::{Item, ReceiptKind};
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Duration;

    fn conduit(name: &str) -> Conduit {
        Conduit::with_id(ConduitId::new(name), ConduitConfig::default())
    }

    fn counting_drain(kind: ReceiptKind) -> (Arc<dyn PushDrain>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let drain = drain_fn(move |_item: &Item| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(kind)
        });
        (drain, calls)
    }

    #[test]
    fn test_operations_before_init_fail() {
        let conduit = Conduit::new();
        assert!(!conduit.is_initialized());
        assert!(matches!(conduit.id(), Err(ConduitError::NotInitialized)));
        assert!(matches!(
            conduit.get_injector(InjectorType::Broadcast),
            Err(ConduitError::NotInitialized)
        ));
        assert!(matches!(
            conduit.register_pull_drain(BasicPullDrain::shared()),
            Err(ConduitError::NotInitialized)
        ));
        assert!(matches!(conduit.close(), Err(ConduitError::NotInitialized)));
    }

    #[test]
    fn test_init_once() {
        let conduit = Conduit::new();
        conduit.init(ConduitId::new("first")).unwrap();
        assert_eq!(conduit.id().unwrap().name(), "first");

        let err = conduit.init(ConduitId::new("second")).unwrap_err();
        assert!(matches!(err, ConduitError::AlreadyInitialized(ref id) if id.name() == "first"));
        assert!(err.is_fault());
        assert_eq!(conduit.id().unwrap().name(), "first");
    }

    #[test]
    fn test_injectors_are_scoped_and_unique() {
        let conduit = conduit("bus");
        let a = conduit.get_injector(InjectorType::Broadcast).unwrap();
        let b = conduit.get_injector(InjectorType::Broadcast).unwrap();

        assert_ne!(a.id(), b.id());
        assert!(conduit.id().unwrap().is_ancestor_of(a.id()));
        assert_eq!(a.id().name(), "bus.injector-1");
        assert_eq!(conduit.injector_count().unwrap(), 2);
    }

    #[test]
    fn test_named_injector_collision() {
        let conduit = conduit("bus");
        let named = conduit
            .get_injector_named(InjectorType::RequireAllDrain, "injector-1")
            .unwrap();
        assert_eq!(named.kind(), InjectorType::RequireAllDrain);

        assert!(matches!(
            conduit.get_injector_named(InjectorType::Broadcast, "injector-1"),
            Err(ConduitError::AlreadyRegistered(_))
        ));

        // Generated names skip the taken one.
        let generated = conduit.get_injector(InjectorType::Broadcast).unwrap();
        assert_eq!(generated.id().name(), "bus.injector-2");
    }

    #[test]
    fn test_dispose_injector_is_idempotent() {
        let conduit = conduit("bus");
        let injector = conduit.get_injector(InjectorType::Broadcast).unwrap();

        conduit.dispose_injector(&injector).unwrap();
        conduit.dispose_injector(&injector).unwrap();
        assert_eq!(conduit.injector_count().unwrap(), 0);
        assert!(injector.is_disposed());
        assert!(matches!(
            injector.post(Item::numeric(1)),
            Err(ConduitError::InjectorDisposed(_))
        ));
    }

    #[test]
    fn test_dispose_foreign_injector_is_noop() {
        let mine = conduit("mine");
        let theirs = conduit("theirs");
        let foreign = theirs.get_injector(InjectorType::Broadcast).unwrap();

        mine.dispose_injector(&foreign).unwrap();
        assert!(!foreign.is_disposed());
        assert_eq!(theirs.injector_count().unwrap(), 1);
    }

    #[test]
    fn test_broadcast_with_no_drains_is_empty() {
        let conduit = conduit("quiet");
        let injector = conduit.get_injector(InjectorType::Broadcast).unwrap();
        let receipts = injector.post(Item::numeric(1)).unwrap();
        assert!(receipts.is_empty());

        let unspecified = conduit.get_injector(InjectorType::Unspecified).unwrap();
        assert!(unspecified.post(Item::numeric(2)).unwrap().is_empty());
    }

    #[test]
    fn test_broadcast_reaches_pull_then_push() {
        let conduit = conduit("fan");
        let pull = BasicPullDrain::shared();
        let pull_id = conduit.register_pull_drain(pull.clone()).unwrap();
        let (push, calls) = counting_drain(ReceiptKind::Delivery);
        let push_id = conduit.register_push_drain(push).unwrap();

        let injector = conduit.get_injector(InjectorType::Broadcast).unwrap();
        let item = Item::numeric(3);
        let receipts = injector.post(item.clone()).unwrap();

        assert_eq!(receipts.len(), 2);
        assert_eq!(receipts.get(0).unwrap().source, pull_id);
        assert_eq!(receipts.get(0).unwrap().kind, ReceiptKind::Acceptance);
        assert_eq!(receipts.get(1).unwrap().source, push_id);
        assert_eq!(receipts.get(1).unwrap().kind, ReceiptKind::Delivery);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(pull.poll(), Some(item));
    }

    #[test]
    fn test_unwanted_receipt_from_push_drain() {
        let conduit = conduit("picky");
        let (push, _) = counting_drain(ReceiptKind::Unwanted);
        conduit.register_push_drain(push).unwrap();

        let injector = conduit.get_injector(InjectorType::Broadcast).unwrap();
        let receipts = injector.post(Item::numeric(1)).unwrap();
        assert_eq!(receipts.count(ReceiptKind::Unwanted), 1);
    }

    #[test]
    fn test_blocking_disciplines_fail_fast_without_drains() {
        let conduit = conduit("empty");
        for kind in [InjectorType::RequireFirstDrain, InjectorType::RequireAllDrain] {
            let injector = conduit.get_injector(kind).unwrap();
            let err = injector.post(Item::numeric(1)).unwrap_err();
            assert!(matches!(err, ConduitError::NoDrains(ref id) if id.name() == "empty"));
            assert!(err.is_recoverable());
        }
    }

    #[test]
    fn test_first_drain_satisfied_by_push() {
        let conduit = conduit("first");
        let pull = BasicPullDrain::shared();
        conduit.register_pull_drain(pull.clone()).unwrap();
        let (push, calls) = counting_drain(ReceiptKind::Delivery);
        conduit.register_push_drain(push).unwrap();

        let injector = conduit.get_injector(InjectorType::RequireFirstDrain).unwrap();
        let receipts = injector.post(Item::numeric(5)).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(receipts.has_delivery());
        assert_eq!(receipts.count(ReceiptKind::Acceptance), 1);
        assert_eq!(pull.len(), 1);
    }

    #[test]
    fn test_first_drain_waits_for_pull_consumer() {
        let conduit = conduit("first.pull");
        let pull = BasicPullDrain::shared();
        conduit.register_pull_drain(pull.clone()).unwrap();

        let consumer = {
            let pull = Arc::clone(&pull);
            thread::spawn(move || pull.wait_item().unwrap())
        };

        let injector = conduit.get_injector(InjectorType::RequireFirstDrain).unwrap();
        let item = Item::numeric(6);
        let receipts = injector
            .post_timeout(item.clone(), Duration::from_secs(5))
            .unwrap();

        assert_eq!(consumer.join().unwrap(), item);
        assert_eq!(receipts.count(ReceiptKind::Delivery), 1);
        assert!(pull.is_drained(&item));
    }

    #[test]
    fn test_all_drain_waits_for_every_pull() {
        let conduit = conduit("all");
        let fast = BasicPullDrain::shared();
        let slow = BasicPullDrain::shared();
        conduit.register_pull_drain(fast.clone()).unwrap();
        conduit.register_pull_drain(slow.clone()).unwrap();
        let slow_done = Arc::new(AtomicBool::new(false));

        let consumers = vec![
            {
                let fast = Arc::clone(&fast);
                thread::spawn(move || {
                    fast.wait_item().unwrap();
                })
            },
            {
                let slow = Arc::clone(&slow);
                let slow_done = Arc::clone(&slow_done);
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(50));
                    slow_done.store(true, Ordering::SeqCst);
                    slow.wait_item().unwrap();
                })
            },
        ];

        let injector = conduit.get_injector(InjectorType::RequireAllDrain).unwrap();
        let item = Item::numeric(7);
        let receipts = injector
            .post_timeout(item.clone(), Duration::from_secs(5))
            .unwrap();

        assert!(slow_done.load(Ordering::SeqCst));
        assert_eq!(receipts.count(ReceiptKind::Delivery), 2);
        assert!(fast.is_drained(&item) && slow.is_drained(&item));
        for consumer in consumers {
            consumer.join().unwrap();
        }
    }

    #[test]
    fn test_all_drain_times_out() {
        let conduit = conduit("stalled");
        let pull = BasicPullDrain::shared();
        conduit.register_pull_drain(pull.clone()).unwrap();

        let injector = conduit.get_injector(InjectorType::RequireAllDrain).unwrap();
        let item = Item::numeric(8);
        let err = injector
            .post_timeout(item.clone(), Duration::from_millis(30))
            .unwrap_err();

        match err {
            ConduitError::DrainTimeout { item: id, waited, .. } => {
                assert_eq!(id, item.id);
                assert!(waited >= Duration::from_millis(30));
            }
            other => panic!("expected DrainTimeout, got {:?}", other),
        }
        // Not transactional: the item stays queued.
        assert_eq!(pull.poll(), Some(item));
    }

    #[test]
    fn test_config_timeout_applies_to_post() {
        let config = ConduitConfig::default().with_post_timeout(Duration::from_millis(20));
        let conduit = Conduit::with_id(ConduitId::new("cfg"), config);
        conduit.register_pull_drain(BasicPullDrain::shared()).unwrap();

        let injector = conduit.get_injector(InjectorType::RequireFirstDrain).unwrap();
        assert!(matches!(
            injector.post(Item::numeric(1)),
            Err(ConduitError::DrainTimeout { .. })
        ));
    }

    #[test]
    fn test_push_failure_is_not_rolled_back() {
        let conduit = conduit("failing");
        let pull = BasicPullDrain::shared();
        conduit.register_pull_drain(pull.clone()).unwrap();
        let failing = drain_fn(|_item: &Item| Err("callback exploded".into()));
        let failing_id = conduit.register_push_drain(failing).unwrap();

        let injector = conduit.get_injector(InjectorType::Broadcast).unwrap();
        let item = Item::numeric(9);
        let err = injector.post(item.clone()).unwrap_err();

        assert!(matches!(err, ConduitError::PostFailed { ref drain, .. } if *drain == failing_id));
        assert!(err.is_fault());
        assert_eq!(pull.poll(), Some(item));
    }

    #[test]
    fn test_deregistered_push_drain_is_not_called() {
        let conduit = conduit("dereg");
        let (push, calls) = counting_drain(ReceiptKind::Delivery);
        conduit.register_push_drain(Arc::clone(&push)).unwrap();

        assert!(conduit.deregister_push_drain(&push).unwrap());
        assert!(!conduit.deregister_push_drain(&push).unwrap());

        let injector = conduit.get_injector(InjectorType::Broadcast).unwrap();
        assert!(injector.post(Item::numeric(1)).unwrap().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_push_drain_registered_twice_is_rejected() {
        let conduit = conduit("twice");
        let (push, _) = counting_drain(ReceiptKind::Delivery);
        let id = conduit.register_push_drain(Arc::clone(&push)).unwrap();
        assert!(matches!(
            conduit.register_push_drain(push),
            Err(ConduitError::AlreadyRegistered(existing)) if existing == id
        ));
        assert_eq!(conduit.push_drain_count().unwrap(), 1);
    }

    #[test]
    fn test_deregister_pull_drain_keeps_queue() {
        let conduit = conduit("keep");
        let pull = BasicPullDrain::shared();
        let handle: Arc<dyn PullDrainContainer> = pull.clone();
        conduit.register_pull_drain(Arc::clone(&handle)).unwrap();

        let injector = conduit.get_injector(InjectorType::Broadcast).unwrap();
        let item = Item::numeric(10);
        injector.post(item.clone()).unwrap();

        assert!(conduit.deregister_pull_drain(&handle).unwrap());
        assert!(!conduit.deregister_pull_drain(&handle).unwrap());
        assert_eq!(conduit.pull_drain_count().unwrap(), 0);
        assert!(injector.post(Item::numeric(11)).unwrap().is_empty());
        assert_eq!(pull.poll(), Some(item));
    }

    #[test]
    fn test_deregistration_releases_waiting_poster() {
        let conduit = Arc::new(conduit("release"));
        let pull = BasicPullDrain::shared();
        let handle: Arc<dyn PullDrainContainer> = pull.clone();
        conduit.register_pull_drain(Arc::clone(&handle)).unwrap();

        let remover = {
            let conduit = Arc::clone(&conduit);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                conduit.deregister_pull_drain(&handle).unwrap()
            })
        };

        let injector = conduit.get_injector(InjectorType::RequireAllDrain).unwrap();
        let receipts = injector
            .post_timeout(Item::numeric(12), Duration::from_secs(5))
            .unwrap();

        assert!(remover.join().unwrap());
        assert_eq!(receipts.count(ReceiptKind::Acceptance), 1);
        assert_eq!(pull.len(), 1);
    }

    #[test]
    fn test_close_wakes_waiting_poster() {
        let conduit = Arc::new(conduit("closing"));
        conduit.register_pull_drain(BasicPullDrain::shared()).unwrap();

        let closer = {
            let conduit = Arc::clone(&conduit);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                conduit.close().unwrap();
            })
        };

        let injector = conduit.get_injector(InjectorType::RequireAllDrain).unwrap();
        let err = injector
            .post_timeout(Item::numeric(13), Duration::from_secs(5))
            .unwrap_err();
        closer.join().unwrap();

        assert!(matches!(err, ConduitError::Closed(_)));
        assert!(conduit.is_closed());
    }

    #[test]
    fn test_closed_conduit_rejects_work() {
        let conduit = conduit("done");
        let pull = BasicPullDrain::shared();
        conduit.register_pull_drain(pull.clone()).unwrap();
        let injector = conduit.get_injector(InjectorType::Broadcast).unwrap();

        conduit.close().unwrap();
        conduit.close().unwrap();

        assert!(!pull.is_attached());
        assert_eq!(conduit.pull_drain_count().unwrap(), 0);
        assert_eq!(conduit.injector_count().unwrap(), 0);
        assert!(matches!(injector.post(Item::numeric(1)), Err(ConduitError::Closed(_))));
        assert!(matches!(
            conduit.get_injector(InjectorType::Broadcast),
            Err(ConduitError::Closed(_))
        ));
        assert!(matches!(
            conduit.register_pull_drain(BasicPullDrain::shared()),
            Err(ConduitError::Closed(_))
        ));
        let (push, _) = counting_drain(ReceiptKind::Delivery);
        assert!(matches!(
            conduit.register_push_drain(push),
            Err(ConduitError::Closed(_))
        ));
        assert_eq!(conduit.push_drain_count().unwrap(), 0);
    }

    #[test]
    fn test_registration_racing_close_leaves_nothing_attached() {
        use std::sync::Barrier;

        for round in 0..200 {
            let conduit = Arc::new(conduit(&format!("race.{}", round)));
            let pull = BasicPullDrain::shared();
            let (push, _) = counting_drain(ReceiptKind::Delivery);
            let barrier = Arc::new(Barrier::new(2));

            let registrar = {
                let conduit = Arc::clone(&conduit);
                let pull = Arc::clone(&pull);
                let push = Arc::clone(&push);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let pulled = conduit.register_pull_drain(pull);
                    let pushed = conduit.register_push_drain(push);
                    (pulled.is_ok(), pushed.is_ok())
                })
            };
            barrier.wait();
            conduit.close().unwrap();
            registrar.join().unwrap();

            // Whichever side won, the closed conduit holds no drains.
            assert!(!pull.is_attached());
            assert_eq!(conduit.pull_drain_count().unwrap(), 0);
            assert_eq!(conduit.push_drain_count().unwrap(), 0);

            // The container is free for a fresh conduit.
            let fresh = Conduit::with_id(ConduitId::new("fresh"), ConduitConfig::default());
            fresh.register_pull_drain(pull).unwrap();
        }
    }

    #[test]
    fn test_post_timeout_beyond_clock_range() {
        let conduit = conduit("unbounded");
        let pull = BasicPullDrain::shared();
        conduit.register_pull_drain(pull.clone()).unwrap();

        let consumer = {
            let pull = Arc::clone(&pull);
            thread::spawn(move || {
                for _ in 0..2 {
                    thread::sleep(Duration::from_millis(20));
                    pull.wait_item().unwrap();
                }
            })
        };

        for kind in [InjectorType::RequireAllDrain, InjectorType::RequireFirstDrain] {
            let injector = conduit.get_injector(kind).unwrap();
            let receipts = injector.post_timeout(Item::numeric(14), Duration::MAX).unwrap();
            assert_eq!(receipts.count(ReceiptKind::Delivery), 1);
        }
        consumer.join().unwrap();
    }

    #[test]
    fn test_push_callback_may_post_into_its_own_conduit() {
        let conduit = conduit("reentrant");
        let pull = BasicPullDrain::shared();
        conduit.register_pull_drain(pull.clone()).unwrap();

        let inner = conduit.get_injector(InjectorType::Broadcast).unwrap();
        let echoed = Arc::new(AtomicBool::new(false));
        let calls = Arc::new(AtomicUsize::new(0));
        let echo = Item::numeric(16);
        let drain = {
            let echoed = Arc::clone(&echoed);
            let calls = Arc::clone(&calls);
            let echo = echo.clone();
            drain_fn(move |_item: &Item| {
                calls.fetch_add(1, Ordering::SeqCst);
                if !echoed.swap(true, Ordering::SeqCst) {
                    inner.post(echo.clone())?;
                }
                Ok(ReceiptKind::Delivery)
            })
        };
        conduit.register_push_drain(drain).unwrap();

        let outer = conduit.get_injector(InjectorType::Broadcast).unwrap();
        let first = Item::numeric(15);
        let receipts = outer.post(first.clone()).unwrap();

        assert_eq!(receipts.count(ReceiptKind::Delivery), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(pull.poll(), Some(first));
        assert_eq!(pull.poll(), Some(echo));
    }
}
