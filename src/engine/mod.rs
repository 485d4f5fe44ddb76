//! Engine module housing the reusable sensor core.
//!
//! This module exposes trait-based backends (`backend`), the host lifecycle
//! binding (`lifecycle`) and the `TiltEngine` orchestration layer (`core`)
//! shared by the JNI bridge, the CLI and the debug HTTP server.

pub mod backend;
pub mod core;
pub mod lifecycle;

pub use backend::{
    ForwardedBackend, SensorBackend, SimulatedBackend, StubTimeSource, SystemTimeSource,
    TimeSource,
};
pub use core::{TelemetryEvent, TelemetryEventKind, TiltEngine};
pub use lifecycle::HostSession;
