//! # Conduit Controller
//!
//! This crate implements name-based conduit discovery.
//!
//! ## Philosophy
//!
//! Conduits are looked up by identity, never constructed directly by their
//! users. The controller memoizes one conduit per name, so every producer
//! and consumer that tunes into the same name shares the same drains.
//!
//! ## Non-Goals
//!
//! - No process-wide singleton: the host builds one controller and hands
//!   out `Arc` clones
//! - No cross-process channels

use conduit::{Conduit, ConduitConfig, ConduitError};
use core_types::TaskId;
use identity::ConduitId;
use kernel_api::{AccessPolicy, AllowAll};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, warn};

/// Error types for controller operations
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Task {caller} may not tune conduit {channel}")]
    AccessDenied { caller: TaskId, channel: ConduitId },

    #[error(transparent)]
    Conduit(#[from] ConduitError),
}

/// Hands out conduits by name
pub trait ConduitController: Send + Sync {
    /// Returns the conduit named `channel`, creating it on first use
    ///
    /// Concurrent first calls for the same name all receive the same conduit.
    fn tune(&self, channel: &ConduitId, caller: TaskId) -> Result<Arc<Conduit>, ControllerError>;
}

/// Conduit registry
///
/// Maps conduit names to live conduits. The registry lock covers only the
/// check-and-create step; conduit operations never hold it.
pub struct BasicConduitController {
    /// Live conduits by name
    conduits: Mutex<HashMap<String, Arc<Conduit>>>,
    /// Settings given to every conduit this controller creates
    config: ConduitConfig,
    policy: Arc<dyn AccessPolicy>,
}

impl BasicConduitController {
    /// Creates a controller with default settings that admits every caller
    pub fn new() -> Self {
        Self::with_config(ConduitConfig::default())
    }

    /// Creates a controller whose conduits use `config`
    pub fn with_config(config: ConduitConfig) -> Self {
        Self {
            conduits: Mutex::new(HashMap::new()),
            config,
            policy: Arc::new(AllowAll),
        }
    }

    /// Replaces the access policy (builder pattern)
    pub fn with_policy(mut self, policy: Arc<dyn AccessPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &ConduitConfig {
        &self.config
    }

    /// Looks up a conduit without creating it
    pub fn lookup(&self, name: &str) -> Option<Arc<Conduit>> {
        self.registry().get(name).cloned()
    }

    /// Returns the number of live conduits
    pub fn count(&self) -> usize {
        self.registry().len()
    }

    /// Lists live conduit names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry().keys().cloned().collect();
        names.sort();
        names
    }

    /// Closes a conduit and forgets it
    ///
    /// Returns false if no conduit has that name. A later `tune` for the
    /// same name creates a fresh conduit.
    pub fn close(&self, name: &str) -> bool {
        let removed = self.registry().remove(name);
        match removed {
            Some(conduit) => {
                if let Err(err) = conduit.close() {
                    warn!(conduit = name, error = %err, "close failed");
                }
                debug!(conduit = name, "conduit closed by controller");
                true
            }
            None => false,
        }
    }

    /// Closes every conduit
    pub fn close_all(&self) {
        let drained: Vec<(String, Arc<Conduit>)> = self.registry().drain().collect();
        for (name, conduit) in &drained {
            if let Err(err) = conduit.close() {
                warn!(conduit = %name, error = %err, "close failed");
            }
        }
        debug!(closed = drained.len(), "controller shut down");
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<String, Arc<Conduit>>> {
        self.conduits.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ConduitController for BasicConduitController {
    fn tune(&self, channel: &ConduitId, caller: TaskId) -> Result<Arc<Conduit>, ControllerError> {
        if !self.policy.may_tune(caller, channel) {
            warn!(%caller, conduit = %channel, "tune denied");
            return Err(ControllerError::AccessDenied {
                caller,
                channel: channel.clone(),
            });
        }

        let mut conduits = self.registry();
        if let Some(existing) = conduits.get(channel.name()) {
            return Ok(Arc::clone(existing));
        }

        let conduit = Conduit::with_config(self.config.clone());
        conduit.init(channel.clone())?;
        let conduit = Arc::new(conduit);
        conduits.insert(channel.name().to_string(), Arc::clone(&conduit));
        debug!(%caller, conduit = %channel, "conduit created");
        Ok(conduit)
    }
}

impl Default for BasicConduitController {
    fn default() -> Self {
        Self::new()
    }
}
