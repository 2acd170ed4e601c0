// Configuration error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Configuration error code constants
///
/// Error code range: 2001-2002
pub struct ConfigErrorCodes {}

impl ConfigErrorCodes {
    /// Required external resource absent or malformed
    pub const CONFIGURATION_MISSING: i32 = 2001;

    /// Resource parsed but a value is unusable
    pub const INVALID_VALUE: i32 = 2002;
}

/// Log a configuration error with structured context
pub fn log_config_error(err: &ConfigError, context: &str) {
    error!(
        "Config error in {}: code={}, component=AppConfig, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Configuration-related errors
///
/// Surfaced only while the application is being constructed, never from
/// inside a run.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Settings file or sample list could not be read or parsed
    ConfigurationMissing { resource: String, reason: String },

    /// A value in an otherwise well-formed resource is unusable
    InvalidValue { key: String, reason: String },
}

impl ErrorCode for ConfigError {
    fn code(&self) -> i32 {
        match self {
            ConfigError::ConfigurationMissing { .. } => ConfigErrorCodes::CONFIGURATION_MISSING,
            ConfigError::InvalidValue { .. } => ConfigErrorCodes::INVALID_VALUE,
        }
    }

    fn message(&self) -> String {
        match self {
            ConfigError::ConfigurationMissing { resource, reason } => {
                format!("Configuration missing: {} ({})", resource, reason)
            }
            ConfigError::InvalidValue { key, reason } => {
                format!("Invalid configuration value for {}: {}", key, reason)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConfigError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ConfigError {}
