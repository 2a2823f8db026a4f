//! Resilience Test Utilities
//!
//! This crate provides shared utilities for concurrency and scenario tests
//! of the conduit subsystem.
//!
//! ## Test Philosophy
//!
//! - **Real threads**: guarantees are checked with actual contention, not mocks
//! - **Bounded waits**: blocking posts in tests always carry a timeout
//! - **Observable drains**: push drains record what they saw

use conduit::{drain_fn, Item, PushDrain, ReceiptKind};
use core_types::TaskId;
use services_conduit::BasicConduitController;
use std::sync::{Arc, Mutex};

/// The owning side of a conduit deployment
///
/// Holds the controller the host would construct at startup together with
/// the identity of the task using it.
pub struct TestHost {
    pub task: TaskId,
    pub controller: Arc<BasicConduitController>,
}

impl TestHost {
    /// Shares the controller with another task
    pub fn spawn_task(&self) -> TestHost {
        TestHost {
            task: TaskId::new(),
            controller: Arc::clone(&self.controller),
        }
    }
}

/// Bootstrap helper for tests
///
/// Creates a controller with default settings and a fresh task identity.
pub fn test_bootstrap() -> TestHost {
    TestHost {
        task: TaskId::new(),
        controller: Arc::new(BasicConduitController::new()),
    }
}

/// Items seen by a recording drain, in delivery order
pub type Seen = Arc<Mutex<Vec<Item>>>;

/// Creates a push drain that records every item and answers with `kind`
pub fn recording_drain(kind: ReceiptKind) -> (Arc<dyn PushDrain>, Seen) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let drain = drain_fn(move |item: &Item| {
        log.lock()
            .map_err(|_| "recording drain poisoned")?
            .push(item.clone());
        Ok(kind)
    });
    (drain, seen)
}
