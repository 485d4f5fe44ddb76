use std::convert::Infallible;
use std::pin::Pin;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::engine::TiltEngine;

use super::routes::HttpServerError;

pub type SampleStream = Sse<Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>>;

/// Build a Server-Sent Events stream of live orientation samples.
///
/// Each sample is a `sample` event and each accuracy change an `accuracy`
/// event. Events only flow while the host is active; lagged messages are
/// skipped.
pub fn samples(engine: &'static TiltEngine) -> Result<SampleStream, HttpServerError> {
    let samples = engine
        .sample_receiver()
        .ok_or(HttpServerError::ServiceUnavailable(
            "sample channel not initialized",
        ))?;

    let events = match engine.accuracy_receiver() {
        Some(accuracy) => {
            stream::select(named_events(samples, "sample"), named_events(accuracy, "accuracy"))
                .boxed()
        }
        None => named_events(samples, "sample").boxed(),
    };

    Ok(Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(5))
            .text("debug-keepalive"),
    ))
}

fn named_events<T>(
    receiver: broadcast::Receiver<T>,
    name: &'static str,
) -> impl Stream<Item = Result<Event, Infallible>> + Send
where
    T: Clone + Serialize + Send + 'static,
{
    BroadcastStream::new(receiver).filter_map(move |result| async move {
        let payload = serde_json::to_string(&result.ok()?).ok()?;
        Some(Ok(Event::default().event(name).data(payload)))
    })
}
