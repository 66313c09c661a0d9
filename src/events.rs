//! Message-passing listeners.
//!
//! [`EventSink`] implements every listener trait by forwarding the
//! callback as a [`HubEvent`] into an unbounded tokio channel. The
//! receiving [`EventStream`] can be awaited directly or consumed as a
//! [`futures::Stream`]. Push-based backends therefore surface through a
//! plain channel, and callers never run code on a backend thread.

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::mpsc;

use crate::listener::{
    ConnectionCallbacks, ConnectionFailedListener, ConnectionHandle, ConnectionResult, Extras,
    FailureHandle, LocationHandle, LocationListener,
};
use crate::location::Location;

/// A callback delivered through the channel.
#[derive(Debug, Clone, PartialEq)]
pub enum HubEvent {
    Connected(Option<Extras>),
    Disconnected,
    ConnectionFailed(ConnectionResult),
    LocationChanged(Location),
}

/// Sending half: implements all listener traits.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<HubEvent>,
}

impl EventSink {
    fn emit(&self, event: HubEvent) {
        if self.tx.send(event).is_err() {
            // Receiver dropped; late events are ignorable.
            tracing::trace!("event stream closed, dropping event");
        }
    }

    /// Handle for registering this sink as connection callbacks.
    pub fn connection_handle(&self) -> ConnectionHandle {
        ConnectionHandle::new(self.clone())
    }

    /// Handle for registering this sink as a failure listener.
    pub fn failure_handle(&self) -> FailureHandle {
        FailureHandle::new(self.clone())
    }

    /// Handle for registering this sink as a location listener.
    pub fn location_handle(&self) -> LocationHandle {
        LocationHandle::new(self.clone())
    }
}

impl ConnectionCallbacks for EventSink {
    fn on_connected(&self, hint: Option<&Extras>) {
        self.emit(HubEvent::Connected(hint.cloned()));
    }

    fn on_disconnected(&self) {
        self.emit(HubEvent::Disconnected);
    }
}

impl ConnectionFailedListener for EventSink {
    fn on_connection_failed(&self, result: &ConnectionResult) {
        self.emit(HubEvent::ConnectionFailed(result.clone()));
    }
}

impl LocationListener for EventSink {
    fn on_location_changed(&self, location: &Location) {
        self.emit(HubEvent::LocationChanged(location.clone()));
    }
}

/// Receiving half.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<HubEvent>,
}

impl EventStream {
    /// Wait for the next event. `None` once every sink is dropped.
    pub async fn recv(&mut self) -> Option<HubEvent> {
        self.rx.recv().await
    }

    /// Take an already-delivered event without waiting.
    pub fn try_recv(&mut self) -> Option<HubEvent> {
        self.rx.try_recv().ok()
    }
}

impl futures::Stream for EventStream {
    type Item = HubEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<HubEvent>> {
        self.rx.poll_recv(cx)
    }
}

/// Create a connected sink/stream pair.
pub fn event_channel() -> (EventSink, EventStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink { tx }, EventStream { rx })
}
