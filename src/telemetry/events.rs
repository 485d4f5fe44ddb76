//! Core telemetry event types describing diagnostics data exposed to the
//! CLI and debug HTTP surfaces.

use serde::{Deserialize, Serialize};

use crate::sensor::SourceState;

/// High-level lifecycle stages reported by JNI/host instrumentation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    LibraryLoaded,
    ContextInitialized,
    HostActivated,
    HostDeactivated,
    LibraryUnloaded,
}

/// Why a reading never became a delivered sample.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    Malformed,
    Stale,
}

/// Metric events covering sample rate, drops, sink faults and lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    SampleRate {
        hz: f32,
        window: usize,
    },
    ReadingDropped {
        reason: DropReason,
        total: u64,
    },
    SinkFault {
        subscription_id: u64,
        sink: String,
    },
    SourceState {
        state: SourceState,
        timestamp_ms: u64,
    },
    Lifecycle {
        phase: LifecyclePhase,
        timestamp_ms: u64,
    },
}
