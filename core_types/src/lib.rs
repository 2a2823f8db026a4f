//! # Core Types
//!
//! This crate defines the fundamental types shared by the kernel and the
//! conduit subsystem.
//!
//! ## Philosophy
//!
//! - **Explicit over implicit**: callers are identified by value, never by
//!   ambient thread-local state.
//! - **Type safety first**: identities cannot be confused with one another.
//!
//! ## Key Types
//!
//! - [`TaskId`]: Unique identifier for a kernel task (a process-like owner
//!   or caller of conduit operations)

pub mod ids;

pub use ids::TaskId;
