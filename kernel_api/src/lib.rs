//! # Kernel API
//!
//! This crate defines what the conduit subsystem needs from its host kernel.
//!
//! ## Philosophy
//!
//! The kernel provides **mechanisms**, not policies:
//! - Configuration is an opaque key lookup ([`ConfigSource`])
//! - Caller clearance is a pluggable decision ([`AccessPolicy`])
//! - Callers are named by [`core_types::TaskId`], never by ambient state
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - A property tree or configuration file format
//! - A security model (the policy seam is where one plugs in)
//! - A scheduler interface

pub mod access;
pub mod config;
pub mod error;

pub use access::{AccessPolicy, AllowAll, AllowList};
pub use config::{ConfigSource, StaticConfig};
pub use error::KernelError;
