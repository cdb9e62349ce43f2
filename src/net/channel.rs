//! Abstract bidirectional message channel
//!
//! The wire transport is an external collaborator: hosts hand the engine a
//! [`Transport`] that can open a channel to the relay. A channel is a pair of
//! lock-free queues — outbound sends never block the caller, and the frame
//! loop drains only currently-buffered inbound events.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::constants::net::{EVENT_QUEUE_CAPACITY, SEND_QUEUE_CAPACITY};

/// Lifecycle and payload events surfaced by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The channel finished opening and is ready for traffic
    Open,
    /// A complete inbound payload
    Message(Vec<u8>),
    /// The channel closed unexpectedly (transient network loss)
    Closed,
    /// The server ended the session; do not reconnect
    Exit,
    /// The server refused the session (e.g. too many concurrent users)
    AccessDenied,
}

/// Channel opening errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("failed to open channel: {0}")]
    OpenFailed(String),
}

/// Outbound send errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelSendError {
    /// Send queue is full (backpressure); the message is dropped
    Full,
    /// The far side is gone
    Disconnected,
}

/// Connector the host supplies; called on connect and on each reconnect
/// attempt. `open` must not block: readiness arrives later as
/// [`ChannelEvent::Open`].
pub trait Transport: Send + Sync {
    fn open(&self, addr: &str) -> Result<MessageChannel, TransportError>;
}

/// Engine-side handle to an open channel
pub struct MessageChannel {
    outbound: Sender<Vec<u8>>,
    events: Receiver<ChannelEvent>,
}

impl MessageChannel {
    /// Enqueue an outbound payload (non-blocking, fire-and-forget)
    #[inline]
    pub fn try_send(&self, payload: Vec<u8>) -> Result<(), ChannelSendError> {
        self.outbound.try_send(payload).map_err(|e| match e {
            TrySendError::Full(_) => ChannelSendError::Full,
            TrySendError::Disconnected(_) => ChannelSendError::Disconnected,
        })
    }

    /// Drain all currently-buffered events without blocking
    pub fn drain_events(&self) -> Vec<ChannelEvent> {
        self.events.try_iter().collect()
    }
}

/// Transport-side handle: the far end of a channel pair.
///
/// Transport implementations hold this and bridge it to the real socket;
/// tests use it as a loopback relay.
#[derive(Clone)]
pub struct ChannelDriver {
    events: Sender<ChannelEvent>,
    outbound: Receiver<Vec<u8>>,
}

impl ChannelDriver {
    /// Push an event toward the engine; false if the engine side is gone
    pub fn push(&self, event: ChannelEvent) -> bool {
        self.events.try_send(event).is_ok()
    }

    /// Push an inbound payload toward the engine
    pub fn push_message(&self, payload: Vec<u8>) -> bool {
        self.push(ChannelEvent::Message(payload))
    }

    /// Take everything the engine has sent so far
    pub fn drain_outbound(&self) -> Vec<Vec<u8>> {
        self.outbound.try_iter().collect()
    }
}

/// Create a connected channel pair
pub fn channel_pair() -> (MessageChannel, ChannelDriver) {
    let (out_tx, out_rx) = bounded(SEND_QUEUE_CAPACITY);
    let (ev_tx, ev_rx) = bounded(EVENT_QUEUE_CAPACITY);
    (
        MessageChannel {
            outbound: out_tx,
            events: ev_rx,
        },
        ChannelDriver {
            events: ev_tx,
            outbound: out_rx,
        },
    )
}
