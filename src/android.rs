//! JNI entry points for `com.asknsolve.tiltsensor.NativeTilt`.
//!
//! The Kotlin shell keeps its `SensorEventListener` and forwards every
//! callback here:
//!
//! ```kotlin
//! object NativeTilt {
//!     external fun nativeInit(context: Context): Boolean
//!     external fun nativeActivate(): Boolean
//!     external fun nativeDeactivate(): Boolean
//!     external fun nativeSetSensorAvailable(available: Boolean)
//!     external fun nativeRequestedDelayUs(): Int
//!     external fun nativeOnSensorChanged(values: FloatArray, timestampNanos: Long)
//!     external fun nativeOnAccuracyChanged(status: Int)
//!     external fun nativeSetCanvas(width: Float, height: Float)
//!     external fun nativeIndicatorX(): Float
//!     external fun nativeIndicatorY(): Float
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};

use jni::objects::{JClass, JFloatArray, JObject};
use jni::sys::{jboolean, jfloat, jint, jlong, JNI_FALSE, JNI_TRUE};
use jni::JNIEnv;
use log::{info, warn};

use crate::api;
use crate::error::{log_sensor_error, log_subscription_error, SensorError};
use crate::sensor::AXIS_COUNT;
use crate::telemetry::{self, LifecyclePhase};

static CONTEXT_READY: AtomicBool = AtomicBool::new(false);

fn as_jboolean(value: bool) -> jboolean {
    if value {
        JNI_TRUE
    } else {
        JNI_FALSE
    }
}

fn require_context(operation: &str) -> Result<(), SensorError> {
    if CONTEXT_READY.load(Ordering::SeqCst) {
        Ok(())
    } else {
        let err = SensorError::ContextNotInitialized;
        log_sensor_error(&err, operation);
        Err(err)
    }
}

/// Hand the application context to ndk-context. Must precede `nativeActivate`.
#[no_mangle]
pub extern "system" fn Java_com_asknsolve_tiltsensor_NativeTilt_nativeInit(
    env: JNIEnv,
    _class: JClass,
    context: JObject,
) -> jboolean {
    if CONTEXT_READY.load(Ordering::SeqCst) {
        return JNI_TRUE;
    }

    let vm = match env.get_java_vm() {
        Ok(vm) => vm,
        Err(err) => {
            warn!("[JNI] Failed to obtain JavaVM: {}", err);
            return JNI_FALSE;
        }
    };
    let global = match env.new_global_ref(context) {
        Ok(global) => global,
        Err(err) => {
            warn!("[JNI] Failed to pin application context: {}", err);
            return JNI_FALSE;
        }
    };

    // SAFETY: the JavaVM outlives the library and the leaked global
    // reference keeps the context object alive.
    unsafe {
        ndk_context::initialize_android_context(
            vm.get_java_vm_pointer().cast(),
            global.as_obj().as_raw().cast(),
        );
    }
    std::mem::forget(global);

    CONTEXT_READY.store(true, Ordering::SeqCst);
    telemetry::hub().record_lifecycle(LifecyclePhase::ContextInitialized);
    info!("[JNI] Android context initialized");
    JNI_TRUE
}

/// `onResume`
#[no_mangle]
pub extern "system" fn Java_com_asknsolve_tiltsensor_NativeTilt_nativeActivate(
    _env: JNIEnv,
    _class: JClass,
) -> jboolean {
    if require_context("nativeActivate").is_err() {
        return JNI_FALSE;
    }

    let result = api::activate();
    if let Err(err) = &result {
        log_subscription_error(err, "nativeActivate");
    }
    as_jboolean(result.is_ok())
}

/// `onPause`
#[no_mangle]
pub extern "system" fn Java_com_asknsolve_tiltsensor_NativeTilt_nativeDeactivate(
    _env: JNIEnv,
    _class: JClass,
) -> jboolean {
    let result = api::deactivate();
    if let Err(err) = &result {
        log_subscription_error(err, "nativeDeactivate");
    }
    as_jboolean(result.is_ok())
}

#[no_mangle]
pub extern "system" fn Java_com_asknsolve_tiltsensor_NativeTilt_nativeSetSensorAvailable(
    _env: JNIEnv,
    _class: JClass,
    available: jboolean,
) {
    api::set_sensor_available(available != JNI_FALSE);
}

/// Sampling period for `SensorManager.registerListener`, or -1 while stopped.
#[no_mangle]
pub extern "system" fn Java_com_asknsolve_tiltsensor_NativeTilt_nativeRequestedDelayUs(
    _env: JNIEnv,
    _class: JClass,
) -> jint {
    match api::requested_rate() {
        Some(rate) => rate.nominal_period().as_micros().min(jint::MAX as u128) as jint,
        None => -1,
    }
}

/// `onSensorChanged(SensorEvent)`: forwards `event.values` and `event.timestamp`.
#[no_mangle]
pub extern "system" fn Java_com_asknsolve_tiltsensor_NativeTilt_nativeOnSensorChanged(
    env: JNIEnv,
    _class: JClass,
    values: JFloatArray,
    timestamp_nanos: jlong,
) {
    if values.is_null() {
        return;
    }

    let len = match env.get_array_length(&values) {
        Ok(len) => len.max(0) as usize,
        Err(err) => {
            warn!("[JNI] Failed to read sensor array length: {}", err);
            return;
        }
    };

    // Partial arrays are copied as-is; the source drops them as malformed.
    let mut buf = vec![0.0f32; len.min(AXIS_COUNT)];
    if let Err(err) = env.get_float_array_region(&values, 0, &mut buf) {
        warn!("[JNI] Failed to copy sensor values: {}", err);
        return;
    }

    api::on_sensor_changed(&buf, timestamp_nanos);
}

/// `onAccuracyChanged(Sensor, int)`
#[no_mangle]
pub extern "system" fn Java_com_asknsolve_tiltsensor_NativeTilt_nativeOnAccuracyChanged(
    _env: JNIEnv,
    _class: JClass,
    status: jint,
) {
    api::on_accuracy_changed(status);
}

/// `TiltView.onSizeChanged`
#[no_mangle]
pub extern "system" fn Java_com_asknsolve_tiltsensor_NativeTilt_nativeSetCanvas(
    _env: JNIEnv,
    _class: JClass,
    width: jfloat,
    height: jfloat,
) {
    api::set_canvas(width, height);
}

#[no_mangle]
pub extern "system" fn Java_com_asknsolve_tiltsensor_NativeTilt_nativeIndicatorX(
    _env: JNIEnv,
    _class: JClass,
) -> jfloat {
    api::indicator().bubble.x
}

#[no_mangle]
pub extern "system" fn Java_com_asknsolve_tiltsensor_NativeTilt_nativeIndicatorY(
    _env: JNIEnv,
    _class: JClass,
) -> jfloat {
    api::indicator().bubble.y
}
