// Sensor backend error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Sensor error code constants shared with the host shell
///
/// Error code range: 2001-2007
pub struct SensorErrorCodes {}

impl SensorErrorCodes {
    /// No accelerometer is present (or it was revoked)
    pub const UNAVAILABLE: i32 = 2001;

    /// Backend is already producing readings
    pub const ALREADY_RUNNING: i32 = 2002;

    /// Backend is not producing readings
    pub const NOT_RUNNING: i32 = 2003;

    /// Platform refused the listener registration
    pub const REGISTRATION_FAILED: i32 = 2004;

    /// Mutex/RwLock was poisoned
    pub const LOCK_POISONED: i32 = 2005;

    /// Android context was not initialized before the backend started
    pub const CONTEXT_NOT_INITIALIZED: i32 = 2006;

    /// Reading producer thread died or its channel closed unexpectedly
    pub const STREAM_FAILURE: i32 = 2007;
}

/// Log a sensor error with structured context
///
/// Fields: error code, component, message and the caller supplied context.
pub fn log_sensor_error(err: &SensorError, context: &str) {
    error!(
        "Sensor error in {}: code={}, component=SensorBackend, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised by sensor backends
///
/// Error code range: 2001-2007
#[derive(Debug, Clone, PartialEq)]
pub enum SensorError {
    /// No accelerometer is present
    Unavailable { sensor: String },

    /// Backend is already running
    AlreadyRunning,

    /// Backend is not running
    NotRunning,

    /// Platform refused the listener registration
    RegistrationFailed { reason: String },

    /// Mutex/RwLock was poisoned
    LockPoisoned { component: String },

    /// Android context was not initialized
    ContextNotInitialized,

    /// Reading producer died unexpectedly
    StreamFailure { reason: String },
}

impl ErrorCode for SensorError {
    fn code(&self) -> i32 {
        match self {
            SensorError::Unavailable { .. } => SensorErrorCodes::UNAVAILABLE,
            SensorError::AlreadyRunning => SensorErrorCodes::ALREADY_RUNNING,
            SensorError::NotRunning => SensorErrorCodes::NOT_RUNNING,
            SensorError::RegistrationFailed { .. } => SensorErrorCodes::REGISTRATION_FAILED,
            SensorError::LockPoisoned { .. } => SensorErrorCodes::LOCK_POISONED,
            SensorError::ContextNotInitialized => SensorErrorCodes::CONTEXT_NOT_INITIALIZED,
            SensorError::StreamFailure { .. } => SensorErrorCodes::STREAM_FAILURE,
        }
    }

    fn message(&self) -> String {
        match self {
            SensorError::Unavailable { sensor } => {
                format!("Sensor unavailable: {}", sensor)
            }
            SensorError::AlreadyRunning => {
                "Sensor backend already running. Call stop() first.".to_string()
            }
            SensorError::NotRunning => {
                "Sensor backend not running. Call start() first.".to_string()
            }
            SensorError::RegistrationFailed { reason } => {
                format!("Sensor listener registration failed: {}", reason)
            }
            SensorError::LockPoisoned { component } => {
                format!("Lock poisoned on {}", component)
            }
            SensorError::ContextNotInitialized => {
                "Android context not initialized. Call NativeTilt.nativeInit(context) before nativeActivate.".to_string()
            }
            SensorError::StreamFailure { reason } => {
                format!("Sensor stream failed: {}", reason)
            }
        }
    }
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SensorError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for SensorError {}

impl From<std::io::Error> for SensorError {
    fn from(err: std::io::Error) -> Self {
        SensorError::StreamFailure {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_error_codes() {
        assert_eq!(
            SensorError::Unavailable {
                sensor: "accelerometer".to_string()
            }
            .code(),
            SensorErrorCodes::UNAVAILABLE
        );
        assert_eq!(
            SensorError::AlreadyRunning.code(),
            SensorErrorCodes::ALREADY_RUNNING
        );
        assert_eq!(SensorError::NotRunning.code(), SensorErrorCodes::NOT_RUNNING);
        assert_eq!(
            SensorError::LockPoisoned {
                component: "registry".to_string()
            }
            .code(),
            2005
        );
        assert_eq!(
            SensorError::StreamFailure {
                reason: "gone".to_string()
            }
            .code(),
            2007
        );
    }

    #[test]
    fn test_sensor_error_messages() {
        let err = SensorError::Unavailable {
            sensor: "accelerometer".to_string(),
        };
        assert_eq!(err.message(), "Sensor unavailable: accelerometer");

        assert!(SensorError::AlreadyRunning
            .message()
            .contains("already running"));
        assert!(SensorError::NotRunning.message().contains("not running"));

        let context = SensorError::ContextNotInitialized.message();
        assert!(context.contains("nativeInit"));
        assert!(!context.contains("JNI_OnLoad"));
    }

    #[test]
    fn test_sensor_error_display() {
        let err = SensorError::NotRunning;
        let display = format!("{}", err);
        assert!(display.contains("SensorError"));
        assert!(display.contains("2003"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::other("pipe closed");
        let sensor_err: SensorError = io_err.into();
        match sensor_err {
            SensorError::StreamFailure { reason } => assert!(reason.contains("pipe closed")),
            other => panic!("Expected StreamFailure, got {:?}", other),
        }
    }
}
