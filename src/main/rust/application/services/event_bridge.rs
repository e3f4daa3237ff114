use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use crate::domain::ports::AttributeCallback;
use crate::domain::value_objects::AttributeEvent;

/// Create a bridge between SDK callbacks and an async consumer.
///
/// The sink may be called from any thread; the stream yields events in the
/// order the sink was called. The queue is unbounded and never drops.
pub fn event_channel() -> (EventSink, EventStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink { tx }, EventStream { rx })
}

/// Producer half, invoked synchronously by SDK threads
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<AttributeEvent>,
}

impl EventSink {
    pub fn put(&self, event: AttributeEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Event consumer gone, dropping SDK callback");
        }
    }

    /// Wrap the sink as a callback suitable for SDK registration
    pub fn into_callback(self) -> AttributeCallback {
        Box::new(move |event| self.put(event))
    }
}

/// Consumer half: an infinite, non-restartable sequence of events
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<AttributeEvent>,
}

impl Stream for EventStream {
    type Item = AttributeEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
