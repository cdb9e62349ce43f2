//! Room switch handshake
//!
//! A room is the session scope bound to the local player's current map.
//! Switching rooms suppresses peer visibility until the server has
//! acknowledged the new room and one full frame has passed, so peers that
//! were already present are not shown popping in mid-handshake.

use tracing::debug;

/// Map geometry the reconciler needs, supplied by the host on room change
#[derive(Debug, Clone, Copy)]
pub struct RoomGeometry {
    pub width: i32,
    pub height: i32,
    pub loop_horizontal: bool,
    pub loop_vertical: bool,
}

impl RoomGeometry {
    pub fn clamp_x(&self, x: i32) -> i32 {
        if self.width > 0 {
            x.clamp(0, self.width - 1)
        } else {
            x
        }
    }

    pub fn clamp_y(&self, y: i32) -> i32 {
        if self.height > 0 {
            y.clamp(0, self.height - 1)
        } else {
            y
        }
    }
}

impl Default for RoomGeometry {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            loop_horizontal: false,
            loop_vertical: false,
        }
    }
}

/// Outcome of a room acknowledgment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// The server acknowledged the room we asked for
    Acknowledged,
    /// The ack is for a stale room; the join request must be re-sent
    Mismatch,
}

/// Join/leave handshake state for the current room
#[derive(Debug)]
pub struct RoomCoordinator {
    room_id: i32,
    geometry: RoomGeometry,
    /// True from the moment a room change begins until the server acks it
    switching: bool,
    /// True once the ack has been in for a full frame
    settled: bool,
    settle_armed: bool,
}

impl RoomCoordinator {
    pub fn new() -> Self {
        Self {
            room_id: 0,
            geometry: RoomGeometry::default(),
            // Awaiting the first join handshake
            switching: true,
            settled: false,
            settle_armed: false,
        }
    }

    pub fn room_id(&self) -> i32 {
        self.room_id
    }

    pub fn geometry(&self) -> &RoomGeometry {
        &self.geometry
    }

    pub fn is_switching(&self) -> bool {
        self.switching
    }

    pub fn is_settled(&self) -> bool {
        self.settled
    }

    /// Begin a room change. The caller resets the registry, ghosts, and
    /// allow-lists, and re-sends the join request if connected.
    pub fn enter_room(&mut self, room_id: i32, geometry: RoomGeometry) {
        debug!("Entering room {}", room_id);
        self.room_id = room_id;
        self.geometry = geometry;
        self.switching = true;
        self.settled = false;
        self.settle_armed = false;
    }

    /// Handle a room acknowledgment from the server
    pub fn on_ack(&mut self, room_id: i32) -> AckOutcome {
        if room_id == self.room_id {
            self.switching = false;
            AckOutcome::Acknowledged
        } else {
            // Raced against a fast subsequent switch; ask again
            debug!(
                "Room ack for {} but currently in {}, re-requesting",
                room_id, self.room_id
            );
            AckOutcome::Mismatch
        }
    }

    /// Per-frame tick: once switching has been false for one full frame,
    /// the room is settled and newcomers get the full visual introduction.
    pub fn advance(&mut self) {
        if self.switching || self.settled {
            return;
        }
        if self.settle_armed {
            self.settled = true;
        } else {
            self.settle_armed = true;
        }
    }

    /// Drop back to the unjoined state (disconnect)
    pub fn reset(&mut self) {
        self.switching = true;
        self.settled = false;
        self.settle_armed = false;
    }
}

impl Default for RoomCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
