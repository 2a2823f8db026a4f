//! Conduit error types

use identity::ConduitId;
use ipc::ItemId;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by a drain callback
pub type DrainFailure = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by conduits, injectors and drains
///
/// Faults (see [`ConduitError::is_fault`]) are lifecycle or programming
/// errors meant to reach the owning process's supervisor. The rest are
/// expected conditions the immediate caller handles.
#[derive(Debug, Error)]
pub enum ConduitError {
    /// Operation before `init`
    #[error("Conduit used before init")]
    NotInitialized,

    /// `init` called on an initialized instance
    #[error("Already initialized as {0}")]
    AlreadyInitialized(ConduitId),

    /// Drain or injector identity already in use
    #[error("Already registered as {0}")]
    AlreadyRegistered(ConduitId),

    /// First-drain or all-drain post with nothing registered
    #[error("Posted to no drains on {0}")]
    NoDrains(ConduitId),

    /// A drain failed while handling a post
    #[error("Post of {item} failed at drain {drain}: {source}")]
    PostFailed {
        drain: ConduitId,
        item: ItemId,
        #[source]
        source: DrainFailure,
    },

    /// A blocking wait was interrupted
    #[error("Wait interrupted")]
    WaitInterrupted,

    /// A first-drain or all-drain post gave up waiting
    #[error("Timed out after {waited:?} waiting for {item} to drain on {conduit}")]
    DrainTimeout {
        conduit: ConduitId,
        item: ItemId,
        waited: Duration,
    },

    /// Post through a disposed injector
    #[error("Injector disposed: {0}")]
    InjectorDisposed(ConduitId),

    /// Operation on a closed conduit
    #[error("Conduit closed: {0}")]
    Closed(ConduitId),
}

impl ConduitError {
    /// Checks if this is a fault to escalate rather than handle locally
    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            ConduitError::NotInitialized
                | ConduitError::AlreadyInitialized(_)
                | ConduitError::AlreadyRegistered(_)
                | ConduitError::PostFailed { .. }
        )
    }

    /// Checks if the caller can reasonably recover (retry, fall back, re-register)
    pub fn is_recoverable(&self) -> bool {
        !self.is_fault()
    }
}
