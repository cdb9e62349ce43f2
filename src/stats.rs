//! Engine counters for diagnostics
//!
//! Lightweight atomic counters the host can poll for a status overlay.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counter registry for the sync engine
#[derive(Debug, Default)]
pub struct SyncStats {
    /// Messages successfully decoded and dispatched
    pub messages_received: AtomicU64,
    /// Messages serialized and enqueued for send
    pub messages_sent: AtomicU64,
    /// Inbound payloads dropped because decode failed
    pub decode_failures: AtomicU64,
    /// Outbound messages dropped because the send queue was full
    pub send_drops: AtomicU64,
    /// Automatic reconnect attempts scheduled
    pub reconnects_scheduled: AtomicU64,
    /// Peers seen joining over the connection lifetime
    pub peers_joined: AtomicU64,
}

impl SyncStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Read a counter value
    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}
