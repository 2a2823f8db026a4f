//! # Inter-Process Communication (IPC)
//!
//! This crate defines the values that travel through conduits.
//!
//! ## Philosophy
//!
//! - **Opaque payloads**: conduits never interpret what they carry
//! - **Trackable items**: every item has an identity, so a drain can answer
//!   "has this exact item drained yet?"
//! - **Explicit disposition**: every post returns receipts describing what each
//!   drain did with the item
//!
//! ## Architecture
//!
//! An [`Item`] is an identity ([`ItemId`]), a numeric discriminant and an
//! [`ItemPayload`]. Posting an item yields a [`ReceiptList`] with one
//! [`Receipt`] per drain visited.

pub mod item;
pub mod receipt;

pub use item::{Item, ItemId, ItemPayload};
pub use receipt::{Receipt, ReceiptKind, ReceiptList};
