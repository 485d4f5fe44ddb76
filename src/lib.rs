// Tilt Sensor Core - Rust orientation sample engine
// Accelerometer ingestion, per-sink delivery and tilt indicator geometry

// Module declarations
pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod indicator;
pub mod managers;
pub mod sensor;
pub mod telemetry;

#[cfg(target_os = "android")]
mod android;

// Re-exports for convenience
pub use config::AppConfig;
pub use engine::TiltEngine;
pub use error::{SensorError, SubscriptionError};
pub use indicator::{IndicatorSnapshot, TiltIndicator};
pub use sensor::{
    AccuracyHint, OrientationSample, OrientationSource, RateHint, RawReading, SampleSink,
    SubscriptionHandle,
};

/// Initialize Android logging
#[cfg(target_os = "android")]
pub fn init_logging() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let layer = match tracing_android::layer("TiltSensor") {
        Ok(layer) => layer,
        Err(err) => {
            eprintln!("tracing-android unavailable: {}", err);
            return;
        }
    };
    let _ = tracing_subscriber::registry()
        .with(layer)
        .with(tracing_subscriber::filter::LevelFilter::DEBUG)
        .try_init();
}

/// Initialize desktop logging on stderr; `RUST_LOG` overrides the `info` default.
#[cfg(not(target_os = "android"))]
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// JNI_OnLoad is called when the native library is loaded by Android
#[cfg(target_os = "android")]
#[no_mangle]
pub extern "system" fn JNI_OnLoad(
    _vm: jni::JavaVM,
    _reserved: *mut std::ffi::c_void,
) -> jni::sys::jint {
    init_logging();
    telemetry::hub().record_lifecycle(telemetry::LifecyclePhase::LibraryLoaded);
    log::info!("JNI_OnLoad called - waiting for NativeTilt.nativeInit");

    jni::sys::JNI_VERSION_1_6
}

#[cfg(target_os = "android")]
#[no_mangle]
pub extern "system" fn JNI_OnUnload(_vm: jni::JavaVM, _reserved: *mut std::ffi::c_void) {
    if let Err(err) = api::deactivate() {
        error::log_subscription_error(&err, "JNI_OnUnload");
    }
    telemetry::hub().record_lifecycle(telemetry::LifecyclePhase::LibraryUnloaded);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_repeatable() {
        init_logging();
        init_logging();
        log::debug!("logging initialized twice without panicking");
        tracing::debug!("tracing events share the same subscriber");
    }
}
