//! Conduit configuration
//!
//! Settings are read from the host through [`ConfigSource`]. Every key is
//! optional; an absent key keeps the default.
//!
//! | Key                       | Default     | Meaning                                   |
//! |---------------------------|-------------|-------------------------------------------|
//! | `conduit.post_timeout_ms` | `0`         | First/all-drain wait limit (`0` = none)   |
//! | `conduit.injector_prefix` | `injector`  | Prefix of auto-named injectors            |
//! | `conduit.push_prefix`     | `push`      | Prefix of push drain identities           |
//! | `conduit.pull_prefix`     | `pull`      | Prefix of pull drain identities           |

use identity::NAME_SEPARATOR;
use kernel_api::config::parse_value;
use kernel_api::{ConfigSource, KernelError};
use std::time::Duration;

pub const POST_TIMEOUT_KEY: &str = "conduit.post_timeout_ms";
pub const INJECTOR_PREFIX_KEY: &str = "conduit.injector_prefix";
pub const PUSH_PREFIX_KEY: &str = "conduit.push_prefix";
pub const PULL_PREFIX_KEY: &str = "conduit.pull_prefix";

/// Settings shared by every conduit a controller creates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConduitConfig {
    /// Default wait limit for first-drain and all-drain posts.
    ///
    /// `None` waits until the drain condition holds, however long that takes.
    pub post_timeout: Option<Duration>,
    /// Prefix for injectors created without a name (`"{prefix}-{n}"`)
    pub injector_prefix: String,
    /// Prefix for push drain identities
    pub push_prefix: String,
    /// Prefix for pull drain identities
    pub pull_prefix: String,
}

impl Default for ConduitConfig {
    fn default() -> Self {
        Self {
            post_timeout: None,
            injector_prefix: "injector".to_string(),
            push_prefix: "push".to_string(),
            pull_prefix: "pull".to_string(),
        }
    }
}

impl ConduitConfig {
    /// Reads the configuration from a host source
    pub fn from_source(source: &dyn ConfigSource) -> Result<Self, KernelError> {
        let mut config = Self::default();

        if let Some(millis) = parse_value::<u64, _>(source, POST_TIMEOUT_KEY)? {
            config.post_timeout = (millis > 0).then(|| Duration::from_millis(millis));
        }
        if let Some(prefix) = prefix_value(source, INJECTOR_PREFIX_KEY)? {
            config.injector_prefix = prefix;
        }
        if let Some(prefix) = prefix_value(source, PUSH_PREFIX_KEY)? {
            config.push_prefix = prefix;
        }
        if let Some(prefix) = prefix_value(source, PULL_PREFIX_KEY)? {
            config.pull_prefix = prefix;
        }

        Ok(config)
    }

    /// Sets the default post wait limit (builder pattern)
    pub fn with_post_timeout(mut self, timeout: Duration) -> Self {
        self.post_timeout = Some(timeout);
        self
    }
}

// Prefixes become a single name segment, so they may not be blank or
// contain the separator.
fn prefix_value(source: &dyn ConfigSource, key: &str) -> Result<Option<String>, KernelError> {
    match source.get(key) {
        None => Ok(None),
        Some(raw) => {
            let prefix = raw.trim();
            if prefix.is_empty() {
                Err(KernelError::invalid_setting(key, raw.clone(), "empty prefix"))
            } else if prefix.contains(NAME_SEPARATOR) {
                Err(KernelError::invalid_setting(
                    key,
                    raw.clone(),
                    format!("prefix may not contain '{}'", NAME_SEPARATOR),
                ))
            } else {
                Ok(Some(prefix.to_string()))
            }
        }
    }
}
