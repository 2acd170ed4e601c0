// Acquisition error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Acquisition error code constants
///
/// Single source of truth for the codes written into run reports.
///
/// Error code range: 1001-1005
pub struct AcquisitionErrorCodes {}

impl AcquisitionErrorCodes {
    /// Channel could not be opened or read
    pub const HARDWARE_UNAVAILABLE: i32 = 1001;

    /// Lifecycle operation called out of order
    pub const INVALID_STATE: i32 = 1002;

    /// Run parameters failed validation
    pub const INVALID_PARAMETERS: i32 = 1003;

    /// Consumer of emitted samples went away
    pub const SINK_CLOSED: i32 = 1004;

    /// Results file could not be written or copied
    pub const STORAGE: i32 = 1005;
}

/// Log an acquisition error with structured context
///
/// This function logs acquisition errors with structured fields including:
/// - error_code: Numeric error code for programmatic handling
/// - component: The component where the error occurred
/// - message: Human-readable error message
/// - context: Additional contextual information
pub fn log_acquisition_error(err: &AcquisitionError, context: &str) {
    error!(
        "Acquisition error in {}: code={}, component=AcquisitionProcedure, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Acquisition-related errors
///
/// These errors cover the procedure lifecycle, hardware access and the
/// persistence of emitted samples.
///
/// Error code range: 1001-1005
#[derive(Debug, Clone, PartialEq)]
pub enum AcquisitionError {
    /// Device missing, disconnected, port busy, or a read failed
    HardwareUnavailable { details: String },

    /// Lifecycle operation invoked from the wrong state
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },

    /// Run parameters are unusable
    InvalidParameters { reason: String },

    /// Sample sink refused further points
    SinkClosed,

    /// Results file I/O failed
    Storage { details: String },
}

impl ErrorCode for AcquisitionError {
    fn code(&self) -> i32 {
        match self {
            AcquisitionError::HardwareUnavailable { .. } => {
                AcquisitionErrorCodes::HARDWARE_UNAVAILABLE
            }
            AcquisitionError::InvalidState { .. } => AcquisitionErrorCodes::INVALID_STATE,
            AcquisitionError::InvalidParameters { .. } => {
                AcquisitionErrorCodes::INVALID_PARAMETERS
            }
            AcquisitionError::SinkClosed => AcquisitionErrorCodes::SINK_CLOSED,
            AcquisitionError::Storage { .. } => AcquisitionErrorCodes::STORAGE,
        }
    }

    fn message(&self) -> String {
        match self {
            AcquisitionError::HardwareUnavailable { details } => {
                format!("Hardware unavailable: {}", details)
            }
            AcquisitionError::InvalidState { expected, actual } => {
                format!("Invalid state: expected {}, procedure is {}", expected, actual)
            }
            AcquisitionError::InvalidParameters { reason } => {
                format!("Invalid parameters: {}", reason)
            }
            AcquisitionError::SinkClosed => "Sample sink closed".to_string(),
            AcquisitionError::Storage { details } => format!("Storage error: {}", details),
        }
    }
}

impl fmt::Display for AcquisitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AcquisitionError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AcquisitionError {}

/// Results files are the only I/O the acquisition path performs itself
impl From<std::io::Error> for AcquisitionError {
    fn from(err: std::io::Error) -> Self {
        AcquisitionError::Storage {
            details: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquisition_error_codes() {
        assert_eq!(
            AcquisitionError::HardwareUnavailable {
                details: "test".to_string()
            }
            .code(),
            1001
        );
        assert_eq!(
            AcquisitionError::InvalidState {
                expected: "Created",
                actual: "Started"
            }
            .code(),
            1002
        );
        assert_eq!(
            AcquisitionError::InvalidParameters {
                reason: "test".to_string()
            }
            .code(),
            1003
        );
        assert_eq!(AcquisitionError::SinkClosed.code(), 1004);
        assert_eq!(
            AcquisitionError::Storage {
                details: "test".to_string()
            }
            .code(),
            1005
        );
    }

    #[test]
    fn test_acquisition_error_messages() {
        let err = AcquisitionError::HardwareUnavailable {
            details: "Dev1/ai0 busy".to_string(),
        };
        assert_eq!(err.message(), "Hardware unavailable: Dev1/ai0 busy");

        let err = AcquisitionError::InvalidState {
            expected: "Started",
            actual: "Created",
        };
        assert!(err.message().contains("expected Started"));
        assert!(err.message().contains("Created"));
    }

    #[test]
    fn test_acquisition_error_display() {
        let err = AcquisitionError::SinkClosed;
        let display = format!("{}", err);
        assert!(display.contains("AcquisitionError"));
        assert!(display.contains(&err.code().to_string()));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: AcquisitionError = io_err.into();

        match err {
            AcquisitionError::Storage { details } => assert!(details.contains("read-only")),
            other => panic!("Expected Storage variant, got {:?}", other),
        }
    }
}
