use serde::{Deserialize, Serialize};

use crate::player::PeerId;

/// Who a chat line is visible to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatScope {
    /// Only peers in the same room
    Room,
    /// Every connected client
    Global,
}

/// How a synced event was triggered on the sending client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventTrigger {
    /// Player pressed the action key on the event
    Action,
    /// Player walked onto the event
    Touch,
    /// Event started on its own
    Auto,
}

/// Sound effect parameters as the local engine would play them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundDescriptor {
    pub name: String,
    pub volume: u8,
    pub tempo: u8,
    pub balance: u8,
}

/// Picture display parameters forwarded between peers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PictureParams {
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub magnify: i32,
    pub top_opacity: i32,
    pub use_transparent_color: bool,
    pub fixed_to_map: bool,
}

/// The sending client's scroll state at the moment a picture command ran,
/// so the receiver can re-anchor map-fixed pictures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PictureOrigin {
    pub map_x: i32,
    pub map_y: i32,
    pub pan_x: i32,
    pub pan_y: i32,
}

/// Messages from this client to the relay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Keep-alive, sent on a fixed interval while connected
    Heartbeat,
    /// Request to join the session scope for a room
    Room { room_id: i32 },
    /// Local player moved to a tile
    Move { x: i32, y: i32 },
    /// Local player jumped to a tile
    Jump { x: i32, y: i32 },
    /// Local player changed facing (0..=3)
    Facing { facing: u8 },
    /// Local player changed move speed (1..=6)
    Speed { speed: u8 },
    /// Local player changed sprite sheet
    Sprite { name: String, index: u8 },
    /// Local player's sprite visibility toggled
    Hidden { hidden: bool },
    /// Local player's system graphic (window skin) changed
    SystemGraphic { name: String },
    /// One-shot screen flash on the local player
    Flash {
        red: u8,
        green: u8,
        blue: u8,
        power: u8,
        frames: u32,
    },
    /// Flash the local player keeps reasserting every frame
    RepeatingFlash {
        red: u8,
        green: u8,
        blue: u8,
        power: u8,
        frames: u32,
    },
    /// The repeating flash stopped
    RemoveRepeatingFlash,
    /// Display name announcement
    Name { name: String },
    /// Chat line
    Chat {
        scope: ChatScope,
        room_id: i32,
        name: String,
        text: String,
    },
    /// Sound effect played by the local player
    SoundEffect { sound: SoundDescriptor },
    /// Picture shown by the local player (already gate-approved)
    ShowPicture {
        pic_id: u32,
        params: PictureParams,
        origin: PictureOrigin,
    },
    /// Picture moved by the local player
    MovePicture {
        pic_id: u32,
        params: PictureParams,
        origin: PictureOrigin,
        duration: i32,
    },
    /// Picture erased by the local player
    ErasePicture { pic_id: u32 },
    /// Battle animation shown on the local player
    ShowBattleAnim { anim_id: u32 },
    /// Synced switch changed locally
    SyncSwitch { switch_id: u32, value: bool },
    /// Synced variable changed locally
    SyncVariable { var_id: u32, value: i32 },
    /// Synced event triggered locally
    SyncEvent { event_id: u32, trigger: EventTrigger },
}

/// Messages from the relay to this client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServerMessage {
    /// Keep-alive echo; acknowledgment only
    Heartbeat,
    /// Server acknowledged a room join request
    RoomAck { room_id: i32 },
    /// A peer entered the current room
    Join { id: PeerId },
    /// A peer left the current room
    Leave { id: PeerId },
    /// A peer reported a new tile position
    Move { id: PeerId, x: i32, y: i32 },
    /// A peer jumped to a tile
    Jump { id: PeerId, x: i32, y: i32 },
    /// A peer changed facing
    Facing { id: PeerId, facing: u8 },
    /// A peer changed move speed
    Speed { id: PeerId, speed: u8 },
    /// A peer changed sprite sheet
    Sprite { id: PeerId, name: String, index: u8 },
    /// A peer's sprite visibility toggled
    Hidden { id: PeerId, hidden: bool },
    /// A peer's system graphic changed
    SystemGraphic { id: PeerId, name: String },
    /// One-shot flash on a peer
    Flash {
        id: PeerId,
        red: u8,
        green: u8,
        blue: u8,
        power: u8,
        frames: u32,
    },
    /// A peer asserted a repeating flash
    RepeatingFlash {
        id: PeerId,
        red: u8,
        green: u8,
        blue: u8,
        power: u8,
        frames: u32,
    },
    /// A peer's repeating flash stopped
    RemoveRepeatingFlash { id: PeerId },
    /// A peer announced its display name
    Name { id: PeerId, name: String },
    /// Chat line from a peer
    Chat {
        id: PeerId,
        scope: ChatScope,
        room_id: i32,
        name: String,
        text: String,
    },
    /// A peer played a sound effect
    SoundEffect { id: PeerId, sound: SoundDescriptor },
    /// A peer showed a picture
    ShowPicture {
        id: PeerId,
        pic_id: u32,
        params: PictureParams,
        origin: PictureOrigin,
    },
    /// A peer moved a picture
    MovePicture {
        id: PeerId,
        pic_id: u32,
        params: PictureParams,
        origin: PictureOrigin,
        duration: i32,
    },
    /// A peer erased a picture
    ErasePicture { id: PeerId, pic_id: u32 },
    /// A peer showed a battle animation
    ShowBattleAnim { id: PeerId, anim_id: u32 },
    /// The server forwarded a peer's sync request for a picture id;
    /// that id is treated as synced from now on
    SyncPicture { id: PeerId, pic_id: u32 },
    /// A peer changed a synced switch
    SyncSwitch {
        id: PeerId,
        switch_id: u32,
        value: bool,
    },
    /// A peer changed a synced variable
    SyncVariable { id: PeerId, var_id: u32, value: i32 },
    /// A peer triggered a synced event
    SyncEvent {
        id: PeerId,
        event_id: u32,
        trigger: EventTrigger,
    },
    /// Server-pushed picture allow-list for the current room
    PictureNameList {
        names: Vec<String>,
        prefixes: Vec<String>,
    },
    /// Server-pushed battle-animation allow-list for the current room
    BattleAnimIdList { ids: Vec<u32> },
}

/// Encode a message using bincode
/// Uses legacy config for fixed-size integers (stable wire layout)
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, EncodeError> {
    bincode::serde::encode_to_vec(message, bincode::config::legacy())
        .map_err(|e| EncodeError(e.to_string()))
}

/// Decode a message using bincode
/// Uses legacy config for fixed-size integers (stable wire layout)
pub fn decode<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, DecodeError> {
    bincode::serde::decode_from_slice(data, bincode::config::legacy())
        .map(|(msg, _)| msg)
        .map_err(|e| DecodeError(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
#[error("Encode error: {0}")]
pub struct EncodeError(String);

#[derive(Debug, thiserror::Error)]
#[error("Decode error: {0}")]
pub struct DecodeError(String);
