//! # Identity
//!
//! This crate provides the naming primitive for conduits and the entities
//! scoped beneath them (injectors, push drains, pull drains).
//!
//! ## Philosophy
//!
//! - **Names are values**: a [`ConduitId`] is immutable once created
//! - **Hierarchy is lexical**: a child is named `"{parent}.{child}"`
//! - **Identity does NOT grant authority by itself**
//! - **No hidden global state**: deriving a child is a pure function
//!
//! ## Core Concepts
//!
//! - `ConduitId`: authoritative name plus a non-authoritative mnemonic tag
//! - Equality, ordering and hashing consider the name only; the tag is
//!   display metadata

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use thiserror::Error;

/// Separator between a parent name and a child name
pub const NAME_SEPARATOR: char = '.';

/// Identity of a conduit or of an entity scoped to one
///
/// The name is the stable key used by registries and in logs. The tag is a
/// mnemonic that defaults to the name and is inherited by children unless a
/// child tag is supplied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConduitId {
    name: String,
    tag: String,
}

impl ConduitId {
    /// Creates an identity whose tag equals its name
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            tag: name.clone(),
            name,
        }
    }

    /// Creates an identity with an explicit tag
    pub fn with_tag(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: tag.into(),
        }
    }

    /// Creates an identity, rejecting empty or blank names
    pub fn try_new(name: impl Into<String>) -> Result<Self, IdentityError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(IdentityError::EmptyName);
        }
        Ok(Self::new(name))
    }

    /// Returns the authoritative name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the mnemonic tag
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Derives a child identity `"{self}.{name}"` carrying this identity's tag
    pub fn birth_my_child(&self, name: &str) -> ConduitId {
        Self {
            name: format!("{}{}{}", self.name, NAME_SEPARATOR, name),
            tag: self.tag.clone(),
        }
    }

    /// Derives a child identity with its own tag
    pub fn birth_my_child_tagged(&self, name: &str, tag: impl Into<String>) -> ConduitId {
        Self {
            name: format!("{}{}{}", self.name, NAME_SEPARATOR, name),
            tag: tag.into(),
        }
    }

    /// Returns the parent identity, if this name has one
    ///
    /// The parent keeps this identity's tag, since tags are not recorded per
    /// level.
    pub fn parent(&self) -> Option<ConduitId> {
        self.name
            .rfind(NAME_SEPARATOR)
            .map(|idx| Self::with_tag(&self.name[..idx], self.tag.clone()))
    }

    /// Returns the last segment of the name
    pub fn leaf(&self) -> &str {
        match self.name.rfind(NAME_SEPARATOR) {
            Some(idx) => &self.name[idx + 1..],
            None => &self.name,
        }
    }

    /// Checks if `other` is a (transitive) child of this identity
    pub fn is_ancestor_of(&self, other: &ConduitId) -> bool {
        other.name.len() > self.name.len()
            && other.name.starts_with(&self.name)
            && other.name[self.name.len()..].starts_with(NAME_SEPARATOR)
    }
}

impl PartialEq for ConduitId {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ConduitId {}

impl Hash for ConduitId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl PartialOrd for ConduitId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ConduitId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl fmt::Display for ConduitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl From<&str> for ConduitId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ConduitId {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// Identity-related errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Identity name must not be empty")]
    EmptyName,
}
