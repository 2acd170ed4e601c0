// Error types for the acquisition recorder
//
// This module defines custom error types for acquisition and configuration
// operations, providing structured error handling with stable numeric codes
// that run reports and the CLI can surface.

mod acquisition;
mod config;

pub use acquisition::{log_acquisition_error, AcquisitionError, AcquisitionErrorCodes};
pub use config::{log_config_error, ConfigError, ConfigErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent reporting in run events
/// and CLI summaries.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
