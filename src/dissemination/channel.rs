//! Channel-backed observers.
//!
//! [`ChannelSink`] pushes messages into a bounded `tokio::sync::mpsc`
//! channel without waiting. [`ObserverStream`] is the receiving half,
//! exposed as a `Stream`, that detaches its observer when dropped.

use std::pin::Pin;
use std::sync::Weak;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_stream::wrappers::ReceiverStream;

use super::{Dissemination, ObserverSink};
use crate::types::{ObserverId, ObserverMessage};
use crate::{JobcastError, Result};

/// Default number of messages buffered per observer.
///
/// An observer that falls this far behind is detached as lagging.
pub const DEFAULT_OBSERVER_BUFFER: usize = 256;

/// Non-blocking sink over a bounded mpsc channel.
pub struct ChannelSink {
    tx: mpsc::Sender<ObserverMessage>,
}

impl ChannelSink {
    /// Create a sink and the receiver its messages arrive on.
    ///
    /// # Panics
    ///
    /// Panics if `buffer` is zero.
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<ObserverMessage>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }
}

impl ObserverSink for ChannelSink {
    fn send(&self, message: &ObserverMessage) -> Result<()> {
        self.tx.try_send(message.clone()).map_err(|e| match e {
            TrySendError::Full(_) => JobcastError::ObserverLagging,
            TrySendError::Closed(_) => JobcastError::ObserverClosed,
        })
    }

    fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Stream of messages for one attached observer.
///
/// Yields the attach snapshot first, then status events in publication
/// order. Ends if the observer is detached (e.g. for lagging).
pub struct ObserverStream {
    id: ObserverId,
    inner: ReceiverStream<ObserverMessage>,
    dissemination: Weak<Dissemination>,
}

impl ObserverStream {
    pub(crate) fn new(
        id: ObserverId,
        rx: mpsc::Receiver<ObserverMessage>,
        dissemination: Weak<Dissemination>,
    ) -> Self {
        Self {
            id,
            inner: ReceiverStream::new(rx),
            dissemination,
        }
    }

    /// The observer's registration id.
    pub fn id(&self) -> ObserverId {
        self.id
    }
}

impl Stream for ObserverStream {
    type Item = ObserverMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl Drop for ObserverStream {
    fn drop(&mut self) {
        if let Some(dissemination) = self.dissemination.upgrade() {
            dissemination.detach(self.id);
        }
    }
}
