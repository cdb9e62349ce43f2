/// Movement reconciliation constants
pub mod movement {
    /// Maximum queued move commands per remote player.
    /// Oldest entries are dropped beyond this; a fast or laggy peer must not
    /// be able to grow the queue without bound.
    pub const MOVE_QUEUE_LIMIT: usize = 16;

    /// Frames needed to walk one tile, indexed by move-speed 1..=6.
    pub const STEP_FRAMES: [u8; 6] = [64, 32, 16, 8, 4, 2];

    /// Lowest valid move speed
    pub const MIN_SPEED: u8 = 1;
    /// Highest valid move speed
    pub const MAX_SPEED: u8 = 6;
    /// Speed assumed for a peer before its first Speed message
    pub const DEFAULT_SPEED: u8 = 4;
}

/// Opacity / fade constants
pub mod fade {
    /// Fully opaque sprite opacity
    pub const OPACITY_MAX: u8 = 32;
    /// Opacity gained per frame while a newly visible peer fades in
    pub const FADE_IN_STEP: u8 = 1;
    /// Opacity lost per frame by a departing ghost
    pub const GHOST_FADE_STEP: u8 = 1;
}

/// Effect constants
pub mod effects {
    /// Highest valid flash power
    pub const MAX_FLASH_POWER: u8 = 31;
    /// Frames a battle animation stays attached to a peer before aging out
    pub const BATTLE_ANIM_FRAMES: u32 = 120;
}

/// Connection and wire constants
pub mod net {
    /// Delay before the single automatic reconnect attempt
    pub const RECONNECT_DELAY_MS: u64 = 5000;
    /// Keep-alive emission interval while connected
    pub const KEEPALIVE_INTERVAL_MS: u64 = 3000;
    /// Outbound send queue capacity; sends beyond this are dropped
    pub const SEND_QUEUE_CAPACITY: usize = 1024;
    /// Inbound event queue capacity between transport and frame loop
    pub const EVENT_QUEUE_CAPACITY: usize = 4096;
}

/// Remote-resource id translation
pub mod remote_ids {
    /// Stride between per-peer id namespaces for pictures and battle
    /// animations: `local_id = wire_id + (peer_id + 1) * REMOTE_ID_SPAN`.
    /// Collision-free for the expected peer count (~50); the exact value is
    /// not otherwise load-bearing.
    pub const REMOTE_ID_SPAN: u32 = 50;
}

/// Translate a peer's picture or battle-animation id into the local
/// namespace so it cannot collide with ids owned by the local player.
pub fn translate_remote_id(wire_id: u32, peer_id: u32) -> u32 {
    wire_id + (peer_id + 1) * remote_ids::REMOTE_ID_SPAN
}
