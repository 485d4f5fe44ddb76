//! Orientation sample ingestion and delivery.
//!
//! An [`OrientationSource`] owns one accelerometer backend and fans every
//! valid reading out to the [`SampleSink`]s subscribed to it. The source is
//! active exactly while at least one sink is registered.

mod dispatch;
mod rate;
mod registry;
mod sample;
mod sink;
mod source;

pub use dispatch::{DispatchMode, SourceStats};
pub use rate::RateHint;
pub use sample::{AccuracyHint, OrientationSample, RawReading, AXIS_COUNT};
pub use sink::{ChannelSink, FnSink, SampleLogger, SampleSink};
pub use source::{
    IngestOutcome, OrientationSource, ReadingIngest, SourceOptions, SourceState,
    SubscriptionHandle,
};
