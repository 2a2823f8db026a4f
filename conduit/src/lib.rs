//! # Conduit
//!
//! This crate implements the kernel's in-process messaging primitive.
//!
//! ## Philosophy
//!
//! - **Named channels**: a [`Conduit`] is identified by a [`ConduitId`] and
//!   owns the drains registered on it
//! - **Explicit delivery guarantees**: producers pick a discipline per
//!   [`Injector`] (broadcast, first-drain, all-drain)
//! - **Two consumption models**: [`PushDrain`] callbacks run on the posting
//!   thread; [`PullDrainContainer`]s buffer items for consumer threads
//! - **Receipts, not silence**: every post returns a [`ReceiptList`], and
//!   every failure names the drain and item involved
//!
//! ## Architecture
//!
//! ```text
//!  producer ──► Injector ──┬──► PushDrain callback (same thread) ──► DELIVERY / UNWANTED
//!                          └──► PullDrainContainer queue ──────────► ACCEPTANCE
//!                                        │
//!                         consumer: poll / wait_item
//!                                        │
//!                                        ▼
//!                   DrainSignal (wakes first/all-drain posters)
//! ```
//!
//! Conduits are normally obtained from a controller that memoizes one
//! conduit per name (see the `services_conduit` crate).

pub mod conduit;
pub mod config;
pub mod drain;
pub mod error;
pub mod injector;
pub mod pull;
pub mod signal;
mod sync;

pub use conduit::Conduit;
pub use config::ConduitConfig;
pub use drain::{drain_fn, PushDrain};
pub use error::{ConduitError, DrainFailure};
pub use identity::ConduitId;
pub use injector::{Injector, InjectorType};
pub use ipc::{Item, ItemId, Receipt, ReceiptKind, ReceiptList};
pub use pull::{BasicPullDrain, PullDrainContainer};
pub use signal::DrainSignal;
