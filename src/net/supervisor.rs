//! Connection lifecycle supervision
//!
//! Owns the connect/disconnect/reconnect state machine and the two
//! activities that run outside the frame loop: the keep-alive emitter and
//! the reconnect-delay timer. All state transitions go through one mutex;
//! stale timers are invalidated by an epoch counter rather than cancelled.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::net::channel::{ChannelEvent, ChannelSendError, MessageChannel, Transport};
use crate::net::protocol::{encode, ClientMessage};
use crate::stats::SyncStats;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected and not trying to be
    Disconnected,
    /// Channel opening, waiting for the Open event
    Connecting,
    /// Channel open and traffic flowing
    Connected,
    /// Channel lost; one reconnect timer outstanding
    ReconnectPending,
}

/// Connection supervisor
///
/// Cheap to share behind the engine; `send` is safe from any thread.
pub struct ConnectionSupervisor {
    shared: Arc<Shared>,
    // Keeps the timer tasks alive; dropped with the engine
    _runtime: tokio::runtime::Runtime,
}

struct Shared {
    transport: Arc<dyn Transport>,
    timers: tokio::runtime::Handle,
    stats: Arc<SyncStats>,
    inner: Mutex<Inner>,
}

struct Inner {
    state: ConnectionState,
    channel: Option<MessageChannel>,
    remote_addr: String,
    reconnect_delay: Duration,
    keepalive_interval: Duration,
    /// User intent: stay connected until an explicit disconnect or a fatal
    /// session error. Distinguishes a transient drop from opting out.
    want_connected: bool,
    /// Bumped on every connect/disconnect; timers capture it and no-op if
    /// it moved on before they fired.
    epoch: u64,
}

impl ConnectionSupervisor {
    pub fn new(
        config: &SyncConfig,
        transport: Arc<dyn Transport>,
        stats: Arc<SyncStats>,
    ) -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("overlay-sync-timers")
            .enable_time()
            .build()?;

        let shared = Arc::new(Shared {
            transport,
            timers: runtime.handle().clone(),
            stats,
            inner: Mutex::new(Inner {
                state: ConnectionState::Disconnected,
                channel: None,
                remote_addr: config.remote_addr.clone(),
                reconnect_delay: config.reconnect_delay,
                keepalive_interval: config.keepalive_interval,
                want_connected: false,
                epoch: 0,
            }),
        });

        Ok(Self {
            shared,
            _runtime: runtime,
        })
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.shared.inner.lock().state
    }

    /// Open the channel. Valid from Disconnected and ReconnectPending;
    /// a no-op while already Connecting or Connected.
    pub fn connect(&self) {
        Shared::connect(&self.shared);
    }

    /// Permanently opt out: tear down and stay Disconnected
    pub fn disconnect(&self) {
        let mut inner = self.shared.inner.lock();
        inner.want_connected = false;
        inner.epoch += 1;
        inner.channel = None;
        if inner.state != ConnectionState::Disconnected {
            info!("Disconnected from relay");
        }
        inner.state = ConnectionState::Disconnected;
    }

    /// The channel reported Open. Returns true when this completed a
    /// Connecting transition (the caller then sends the initial burst).
    pub fn mark_open(&self) -> bool {
        let mut inner = self.shared.inner.lock();
        if inner.state != ConnectionState::Connecting {
            debug!("Open event in state {:?} ignored", inner.state);
            return false;
        }
        inner.state = ConnectionState::Connected;
        info!("Connected to {}", inner.remote_addr);

        let epoch = inner.epoch;
        let interval = inner.keepalive_interval;
        let shared = Arc::clone(&self.shared);
        self.shared.timers.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if !Shared::send_keepalive(&shared, epoch) {
                    break;
                }
            }
        });
        true
    }

    /// The channel closed without an explicit disconnect. Schedules the
    /// single reconnect attempt if the user still wants a connection.
    pub fn mark_closed(&self) {
        let mut inner = self.shared.inner.lock();
        inner.channel = None;
        if !inner.want_connected {
            inner.state = ConnectionState::Disconnected;
            return;
        }
        match inner.state {
            ConnectionState::Disconnected => {}
            // A timer is already outstanding; a duplicate close event must
            // not schedule another.
            ConnectionState::ReconnectPending => {
                debug!("Duplicate close event while reconnect pending");
            }
            ConnectionState::Connecting | ConnectionState::Connected => {
                warn!(
                    "Channel closed unexpectedly, reconnecting in {:?}",
                    inner.reconnect_delay
                );
                Shared::schedule_reconnect_locked(&self.shared, &mut inner);
            }
        }
    }

    /// The server ended or refused the session. Fatal: no auto-reconnect.
    pub fn mark_fatal(&self, reason: &str) {
        let mut inner = self.shared.inner.lock();
        warn!("Session ended by server: {}", reason);
        inner.want_connected = false;
        inner.epoch += 1;
        inner.channel = None;
        inner.state = ConnectionState::Disconnected;
    }

    /// Serialize and enqueue a message. Fire-and-forget, never blocks,
    /// callable from any thread; dropped silently when no channel is up.
    pub fn send(&self, message: &ClientMessage) {
        let payload = match encode(message) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to encode outbound message: {}", e);
                return;
            }
        };
        let inner = self.shared.inner.lock();
        Shared::send_payload_locked(&self.shared, &inner, payload);
    }

    /// Drain all buffered channel events without blocking
    pub fn drain_events(&self) -> Vec<ChannelEvent> {
        let inner = self.shared.inner.lock();
        inner
            .channel
            .as_ref()
            .map(|c| c.drain_events())
            .unwrap_or_default()
    }

    /// Live config change: new relay address, used on the next connect
    pub fn set_remote_addr(&self, addr: String) {
        self.shared.inner.lock().remote_addr = addr;
    }
}

impl Shared {
    fn connect(shared: &Arc<Self>) {
        let mut inner = shared.inner.lock();
        match inner.state {
            ConnectionState::Connecting | ConnectionState::Connected => {
                debug!("connect() while {:?} is a no-op", inner.state);
                return;
            }
            ConnectionState::Disconnected | ConnectionState::ReconnectPending => {}
        }
        inner.want_connected = true;
        inner.epoch += 1;
        inner.state = ConnectionState::Connecting;
        let addr = inner.remote_addr.clone();
        match shared.transport.open(&addr) {
            Ok(channel) => {
                info!("Opening channel to {}", addr);
                inner.channel = Some(channel);
            }
            Err(e) => {
                warn!("Failed to open channel to {}: {}", addr, e);
                Self::schedule_reconnect_locked(shared, &mut inner);
            }
        }
    }

    /// Caller holds the lock. Single-outstanding-timer invariant lives here:
    /// entering ReconnectPending is the only way to spawn the timer, and a
    /// close event while already pending returns before reaching this.
    fn schedule_reconnect_locked(shared: &Arc<Self>, inner: &mut Inner) {
        inner.state = ConnectionState::ReconnectPending;
        inner.channel = None;
        SyncStats::bump(&shared.stats.reconnects_scheduled);

        let epoch = inner.epoch;
        let delay = inner.reconnect_delay;
        let shared = Arc::clone(shared);
        shared.timers.clone().spawn(async move {
            tokio::time::sleep(delay).await;
            let still_pending = {
                let inner = shared.inner.lock();
                inner.epoch == epoch && inner.state == ConnectionState::ReconnectPending
            };
            if still_pending {
                info!("Reconnect timer fired, attempting reconnect");
                Shared::connect(&shared);
            } else {
                debug!("Stale reconnect timer ignored");
            }
        });
    }

    /// Keep-alive tick; false stops the emitter task
    fn send_keepalive(shared: &Arc<Self>, epoch: u64) -> bool {
        let inner = shared.inner.lock();
        if inner.epoch != epoch || inner.state != ConnectionState::Connected {
            return false;
        }
        match encode(&ClientMessage::Heartbeat) {
            Ok(payload) => {
                Self::send_payload_locked(shared, &inner, payload);
                true
            }
            Err(_) => false,
        }
    }

    fn send_payload_locked(shared: &Arc<Self>, inner: &Inner, payload: Vec<u8>) {
        let channel = match (&inner.channel, inner.state) {
            (Some(channel), ConnectionState::Connecting | ConnectionState::Connected) => channel,
            _ => {
                debug!("Dropping outbound message while not connected");
                return;
            }
        };
        match channel.try_send(payload) {
            Ok(()) => SyncStats::bump(&shared.stats.messages_sent),
            Err(ChannelSendError::Full) => {
                SyncStats::bump(&shared.stats.send_drops);
                warn!("Outbound queue full, dropping message");
            }
            Err(ChannelSendError::Disconnected) => {
                debug!("Outbound channel gone, dropping message");
            }
        }
    }
}
