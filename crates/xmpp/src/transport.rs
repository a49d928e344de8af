use std::fmt;
use std::sync::Arc;

use crate::error::TransportError;
use crate::settings::ConnectionSettings;

/// One discrete protocol unit, opaque at this layer.
pub type Stanza = minidom::Element;

/// Lifecycle notifications a transport delivers to its observer.
///
/// `Closed` and `ClosedOnError` are mutually exclusive terminal events for
/// one connection attempt. Backoff scheduling for automatic reconnection is
/// owned by the transport; the supervisor only reacts to `ReconnectingIn` and
/// the reconnection outcome events.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Transport-level connect succeeded; credential exchange may begin.
    Connected,
    /// Login finished; `resumed` reports stream-management resumption.
    Authenticated { resumed: bool },
    /// Clean closure: explicit disconnect or the transport gave up.
    Closed,
    /// Abnormal closure; the transport's reconnection policy takes over.
    ClosedOnError(String),
    /// Automatic reconnection scheduled in the given number of seconds.
    ReconnectingIn(u32),
    ReconnectionSucceeded,
    ReconnectionFailed(String),
    /// Liveness keep-alive went unanswered.
    PingFailed,
    /// Inbound stanza, delivered in receive order.
    Stanza(Stanza),
}

/// Sink for transport events; implemented by the supervisor internals.
pub trait TransportEventSink: Send + Sync + 'static {
    fn deliver(&self, generation: u64, event: TransportEvent);
}

/// Observer handle held by a transport for the lifetime of one attempt.
///
/// Every event is tagged with the generation of the attempt the observer was
/// attached for, so events from a superseded transport can be recognized and
/// dropped after the supervisor swaps in a fresh handle.
#[derive(Clone)]
pub struct TransportObserver {
    sink: Arc<dyn TransportEventSink>,
    generation: u64,
}

impl TransportObserver {
    pub(crate) fn new(sink: Arc<dyn TransportEventSink>, generation: u64) -> Self {
        Self { sink, generation }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn deliver(&self, event: TransportEvent) {
        self.sink.deliver(self.generation, event);
    }
}

impl fmt::Debug for TransportObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportObserver")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// Capability surface of one TCP/TLS XMPP session.
///
/// `connect`, `login` and `disconnect` block; callers run them off-thread
/// (the supervisor uses `spawn_blocking`). A transport is used for exactly
/// one attempt: after a failed handshake the object is discarded, never
/// reconnected.
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send + Sync {
    fn connect(&self) -> Result<(), TransportError>;

    fn login(&self) -> Result<(), TransportError>;

    fn disconnect(&self);

    fn is_connected(&self) -> bool;

    /// Subscribe the observer to all lifecycle events and stanza delivery.
    fn attach(&self, observer: TransportObserver);

    /// Drop the current observer. Called before the supervisor abandons the
    /// transport; events already in flight are filtered by generation.
    fn detach(&self);
}

/// Builds a fresh transport from the current settings for every attempt.
#[cfg_attr(test, mockall::automock)]
pub trait TransportFactory: Send + Sync {
    fn build(&self, settings: &ConnectionSettings) -> Arc<dyn Transport>;
}
