//! Opaque configuration lookups supplied by the host

use crate::KernelError;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

/// Source of configuration values
///
/// The kernel's property tree stays outside this crate; consumers only see
/// string values by dotted key (`"conduit.post_timeout_ms"`).
pub trait ConfigSource {
    /// Returns the raw value for `key`, if set
    fn get(&self, key: &str) -> Option<String>;

    /// Parses the value for `key`, returning `None` when unset
    fn parse<T>(&self, key: &str) -> Result<Option<T>, KernelError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
        Self: Sized,
    {
        parse_value(self, key)
    }
}

/// Parses a value through a `dyn ConfigSource`
pub fn parse_value<T, S>(source: &S, key: &str) -> Result<Option<T>, KernelError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    S: ConfigSource + ?Sized,
{
    match source.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|err| KernelError::invalid_setting(key, raw.clone(), err.to_string())),
    }
}

impl ConfigSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

impl ConfigSource for BTreeMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        BTreeMap::get(self, key).cloned()
    }
}

/// Fixed set of values, built up front
///
/// Used by hosts that resolve their configuration once at startup, and by
/// tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticConfig {
    values: BTreeMap<String, String>,
}

impl StaticConfig {
    /// Creates an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a value (builder pattern)
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.values.insert(key.into(), value.to_string());
        self
    }

    /// Sets a value
    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) {
        self.values.insert(key.into(), value.to_string());
    }

    /// Returns the number of values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Checks if no values are set
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl ConfigSource for StaticConfig {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}
