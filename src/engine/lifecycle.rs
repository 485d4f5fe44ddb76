//! Host lifecycle binding.
//!
//! The host shell only knows two verbs: it becomes visible (`activate`) and
//! it goes to the background (`deactivate`). A [`HostSession`] turns those
//! into exactly one subscription for its sink, so repeated or out-of-order
//! calls from the host never produce duplicate registrations or spurious
//! `UnknownHandle` errors.

use std::sync::{Arc, Mutex, PoisonError};

use log::debug;

use crate::error::SubscriptionError;
use crate::sensor::{OrientationSource, RateHint, SampleSink, SubscriptionHandle};

pub struct HostSession {
    source: OrientationSource,
    sink: Arc<dyn SampleSink>,
    rate: RateHint,
    handle: Mutex<Option<SubscriptionHandle>>,
}

impl HostSession {
    pub fn new(source: OrientationSource, sink: Arc<dyn SampleSink>, rate: RateHint) -> Self {
        Self {
            source,
            sink,
            rate,
            handle: Mutex::new(None),
        }
    }

    /// Subscribe the sink unless already subscribed.
    ///
    /// Returns `true` when this call created the subscription.
    pub fn activate(&self) -> Result<bool, SubscriptionError> {
        let mut handle = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        if handle.is_some() {
            debug!("[HostSession] '{}' already active", self.sink.name());
            return Ok(false);
        }

        *handle = Some(self.source.subscribe(Arc::clone(&self.sink), self.rate)?);
        Ok(true)
    }

    /// Release the subscription if one is held.
    ///
    /// Returns `true` when this call released it. The handle is forgotten even
    /// if the source rejects it, so the next `activate` starts clean.
    pub fn deactivate(&self) -> Result<bool, SubscriptionError> {
        let taken = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match taken {
            Some(handle) => self.source.unsubscribe(handle).map(|()| true),
            None => {
                debug!("[HostSession] '{}' already inactive", self.sink.name());
                Ok(false)
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn handle(&self) -> Option<SubscriptionHandle> {
        *self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn rate(&self) -> RateHint {
        self.rate
    }
}
