// Error types for the tilt sensor core
//
// This module defines custom error types for sensor backends and sink
// subscriptions, providing structured error handling with error codes suitable
// for the JNI boundary.

mod sensor;
mod subscription;

pub use sensor::{log_sensor_error, SensorError, SensorErrorCodes};
pub use subscription::{log_subscription_error, SubscriptionError, SubscriptionErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the JNI boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
