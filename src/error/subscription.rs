// Subscription error types and constants

use crate::error::{ErrorCode, SensorError};
use log::error;
use std::fmt;

/// Subscription error code constants shared with the host shell
///
/// Error code range: 2101-2104
pub struct SubscriptionErrorCodes {}

impl SubscriptionErrorCodes {
    /// Hardware sensor absent; subscribe rejected without activating
    pub const SENSOR_UNAVAILABLE: i32 = 2101;

    /// The same sink is already registered with this source
    pub const ALREADY_SUBSCRIBED: i32 = 2102;

    /// Handle is stale or was already released
    pub const UNKNOWN_HANDLE: i32 = 2103;

    /// Backend failed while (de)registering
    pub const BACKEND: i32 = 2104;
}

/// Log a subscription error with structured context
pub fn log_subscription_error(err: &SubscriptionError, context: &str) {
    error!(
        "Subscription error in {}: code={}, component=OrientationSource, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors returned by `OrientationSource::subscribe` / `unsubscribe`
///
/// `AlreadySubscribed` and `UnknownHandle` are caller logic errors.
/// `SensorUnavailable` may be retried later by the host shell.
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionError {
    /// No hardware sensor; the source stays inactive
    SensorUnavailable,

    /// Sink already registered with this source
    AlreadySubscribed { subscription_id: u64 },

    /// Handle is stale or already released
    UnknownHandle { subscription_id: u64 },

    /// Backend failure during start/stop
    Backend(SensorError),
}

impl ErrorCode for SubscriptionError {
    fn code(&self) -> i32 {
        match self {
            SubscriptionError::SensorUnavailable => SubscriptionErrorCodes::SENSOR_UNAVAILABLE,
            SubscriptionError::AlreadySubscribed { .. } => {
                SubscriptionErrorCodes::ALREADY_SUBSCRIBED
            }
            SubscriptionError::UnknownHandle { .. } => SubscriptionErrorCodes::UNKNOWN_HANDLE,
            SubscriptionError::Backend(_) => SubscriptionErrorCodes::BACKEND,
        }
    }

    fn message(&self) -> String {
        match self {
            SubscriptionError::SensorUnavailable => {
                "Accelerometer unavailable on this device. Tilt input disabled.".to_string()
            }
            SubscriptionError::AlreadySubscribed { subscription_id } => format!(
                "Sink already subscribed (subscription #{}). Unsubscribe it first.",
                subscription_id
            ),
            SubscriptionError::UnknownHandle { subscription_id } => format!(
                "Unknown or already released subscription #{}",
                subscription_id
            ),
            SubscriptionError::Backend(err) => {
                format!("Sensor backend failure: {}", err.message())
            }
        }
    }
}

impl fmt::Display for SubscriptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SubscriptionError (code {}): {}",
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for SubscriptionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SubscriptionError::Backend(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SensorError> for SubscriptionError {
    fn from(err: SensorError) -> Self {
        match err {
            SensorError::Unavailable { .. } => SubscriptionError::SensorUnavailable,
            other => SubscriptionError::Backend(other),
        }
    }
}
