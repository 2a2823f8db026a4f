//! Kernel error types

use thiserror::Error;

/// Errors raised at the kernel boundary
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KernelError {
    /// A configuration value could not be interpreted
    #[error("Invalid setting {key}={value}: {reason}")]
    InvalidSetting {
        key: String,
        value: String,
        reason: String,
    },
}

impl KernelError {
    /// Creates an invalid setting error
    pub fn invalid_setting(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidSetting {
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}
