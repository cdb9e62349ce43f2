//! The sync engine
//!
//! One explicitly-constructed context object owns every component; the host
//! game creates it at startup, pumps [`SyncEngine::update`] once per
//! rendered frame, and forwards local-player activity through the
//! `main_player_*` notification family. Inbound side-effects reach the game
//! through the [`GameHost`] trait.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{NameTagMode, SyncConfig};
use crate::effects::{
    EffectBroadcaster, FlashAction, FlashDescriptor, LocalFlashTracker, Tone,
};
use crate::gate::SyncGate;
use crate::net::channel::{ChannelEvent, Transport};
use crate::net::protocol::{
    ChatScope, ClientMessage, EventTrigger, PictureOrigin, PictureParams, SoundDescriptor,
};
use crate::net::router;
use crate::net::supervisor::{ConnectionState, ConnectionSupervisor};
use crate::player::ghost::{GhostFader, GhostPlayer};
use crate::player::movement;
use crate::player::registry::RemotePlayerRegistry;
use crate::player::remote::{clamp_speed, Facing, RemotePlayer};
use crate::player::PeerId;
use crate::room::{RoomCoordinator, RoomGeometry};
use crate::stats::SyncStats;

/// Boundary to the host game. Every method has a no-op default so hosts
/// implement only the collaborators they wire up.
pub trait GameHost {
    /// A chat line arrived from a peer
    fn chat_message(
        &mut self,
        _peer: PeerId,
        _scope: ChatScope,
        _room_id: i32,
        _name: &str,
        _text: &str,
    ) {
    }

    /// A peer played a sound effect
    fn play_sound(&mut self, _peer: PeerId, _sound: &SoundDescriptor) {}

    /// Show a peer's picture; `pic_id` is already translated into the
    /// local namespace
    fn show_picture(&mut self, _pic_id: u32, _params: &PictureParams, _origin: &PictureOrigin) {}

    /// Move a peer's picture
    fn move_picture(
        &mut self,
        _pic_id: u32,
        _params: &PictureParams,
        _origin: &PictureOrigin,
        _duration: i32,
    ) {
    }

    /// Erase a peer's picture
    fn erase_picture(&mut self, _pic_id: u32) {}

    /// Play a battle animation on a peer; `anim_id` is already translated
    fn play_battle_anim(&mut self, _peer: PeerId, _anim_id: u32) {}

    /// Apply a synced switch value to the local game state
    fn set_switch(&mut self, _switch_id: u32, _value: bool) {}

    /// Apply a synced variable value to the local game state
    fn set_variable(&mut self, _var_id: u32, _value: i32) {}

    /// Run a synced event triggered by a peer
    fn run_event(&mut self, _event_id: u32, _trigger: EventTrigger) {}

    /// Connection status changed; shown as a status indicator only
    fn status_changed(&mut self, _status: ConnectionState) {}
}

/// Frame-stepped world state: everything mutated inside `update()`
pub(crate) struct World {
    pub(crate) registry: RemotePlayerRegistry,
    pub(crate) ghosts: GhostFader,
    pub(crate) effects: EffectBroadcaster,
    pub(crate) gate: SyncGate,
    pub(crate) room: RoomCoordinator,
}

impl World {
    fn new() -> Self {
        Self {
            registry: RemotePlayerRegistry::new(),
            ghosts: GhostFader::new(),
            effects: EffectBroadcaster::new(),
            gate: SyncGate::new(),
            room: RoomCoordinator::new(),
        }
    }

    fn clear(&mut self) {
        self.registry.clear();
        self.ghosts.clear();
        self.gate.clear();
        self.effects.reset();
        self.room.reset();
    }
}

/// Mirror of the local player's broadcastable state, kept current by the
/// `main_player_*` notifications and replayed as the initial burst.
struct LocalPlayer {
    x: i32,
    y: i32,
    facing: Facing,
    speed: u8,
    sprite_name: String,
    sprite_index: u8,
    hidden: bool,
    system_skin: String,
}

impl LocalPlayer {
    fn new() -> Self {
        Self {
            x: 0,
            y: 0,
            facing: Facing::Down,
            speed: crate::constants::movement::DEFAULT_SPEED,
            sprite_name: String::new(),
            sprite_index: 0,
            hidden: false,
            system_skin: String::new(),
        }
    }
}

/// Client-side synchronization engine
pub struct SyncEngine {
    config: SyncConfig,
    supervisor: ConnectionSupervisor,
    world: World,
    local: LocalPlayer,
    flash_tracker: LocalFlashTracker,
    host: Box<dyn GameHost>,
    stats: Arc<SyncStats>,
    last_status: ConnectionState,
}

impl SyncEngine {
    pub fn new(
        config: SyncConfig,
        transport: Arc<dyn Transport>,
        host: Box<dyn GameHost>,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let stats = Arc::new(SyncStats::new());
        let supervisor = ConnectionSupervisor::new(&config, transport, stats.clone())?;
        info!("Sync engine initialized for {}", config.remote_addr);

        Ok(Self {
            config,
            supervisor,
            world: World::new(),
            local: LocalPlayer::new(),
            flash_tracker: LocalFlashTracker::new(),
            host,
            stats,
            last_status: ConnectionState::Disconnected,
        })
    }

    // --- Connection lifecycle -------------------------------------------

    pub fn connect(&mut self) {
        self.supervisor.connect();
        self.sync_status();
    }

    /// Permanently opt out of the session and drop all mirrored state
    pub fn disconnect(&mut self) {
        self.supervisor.disconnect();
        self.world.clear();
        self.flash_tracker.reset();
        self.sync_status();
    }

    pub fn connection_status(&self) -> ConnectionState {
        self.supervisor.state()
    }

    // --- Room switching -------------------------------------------------

    /// The local player changed map. Resets all mirrored peers and starts
    /// the join handshake for the new room.
    pub fn switch_room(&mut self, room_id: i32, geometry: RoomGeometry) {
        self.world.registry.clear();
        self.world.ghosts.clear();
        self.world.gate.clear();
        self.world.effects.reset();
        self.world.room.enter_room(room_id, geometry);

        if self.supervisor.state() == ConnectionState::Connected {
            self.send_initial_burst();
        }
    }

    // --- Frame pump -----------------------------------------------------

    /// Advance one rendered frame: pump the channel, reconcile movement,
    /// age effects and ghosts, and tick the room handshake. Never blocks.
    pub fn update(&mut self) {
        for event in self.supervisor.drain_events() {
            match event {
                ChannelEvent::Open => {
                    if self.supervisor.mark_open() {
                        self.send_initial_burst();
                    }
                }
                ChannelEvent::Message(payload) => {
                    if let Err(e) = router::dispatch(
                        &payload,
                        &mut self.world,
                        self.host.as_mut(),
                        &self.supervisor,
                        &self.stats,
                    ) {
                        debug!("Dropping inbound payload: {}", e);
                    }
                }
                ChannelEvent::Closed => self.supervisor.mark_closed(),
                ChannelEvent::Exit => {
                    self.supervisor.mark_fatal("session ended by server");
                    self.world.clear();
                }
                ChannelEvent::AccessDenied => {
                    self.supervisor.mark_fatal("access denied by server");
                    self.world.clear();
                }
            }
        }

        let geometry = *self.world.room.geometry();
        let settled = self.world.room.is_settled();
        movement::advance(
            &mut self.world.registry,
            &geometry,
            settled,
            &mut self.world.ghosts,
        );
        self.world.effects.advance(&mut self.world.registry);
        self.world.ghosts.advance();
        self.world.room.advance();

        if let Some(FlashAction::Remove) = self.flash_tracker.end_of_frame() {
            self.supervisor.send(&ClientMessage::RemoveRepeatingFlash);
        }

        self.sync_status();
    }

    // --- Local-player notifications -------------------------------------

    pub fn main_player_moved(&mut self, x: i32, y: i32) {
        self.local.x = x;
        self.local.y = y;
        self.supervisor.send(&ClientMessage::Move { x, y });
    }

    /// Instant relocation. Sent as a plain Move: the displacement exceeds
    /// one tile, so receivers fall back to teleporting the proxy.
    pub fn main_player_teleported(&mut self, x: i32, y: i32) {
        self.local.x = x;
        self.local.y = y;
        self.supervisor.send(&ClientMessage::Move { x, y });
    }

    pub fn main_player_jumped(&mut self, x: i32, y: i32) {
        self.local.x = x;
        self.local.y = y;
        self.supervisor.send(&ClientMessage::Jump { x, y });
    }

    pub fn main_player_facing_changed(&mut self, facing: Facing) {
        self.local.facing = facing;
        self.supervisor.send(&ClientMessage::Facing {
            facing: facing.to_wire(),
        });
    }

    pub fn main_player_speed_changed(&mut self, speed: u8) {
        self.local.speed = clamp_speed(speed);
        self.supervisor.send(&ClientMessage::Speed {
            speed: self.local.speed,
        });
    }

    pub fn main_player_sprite_changed(&mut self, name: String, index: u8) {
        self.local.sprite_name = name.clone();
        self.local.sprite_index = index;
        self.supervisor.send(&ClientMessage::Sprite { name, index });
    }

    pub fn main_player_sprite_hidden_changed(&mut self, hidden: bool) {
        self.local.hidden = hidden;
        self.supervisor.send(&ClientMessage::Hidden { hidden });
    }

    pub fn main_player_system_graphic_changed(&mut self, name: String) {
        self.local.system_skin = name.clone();
        self.supervisor.send(&ClientMessage::SystemGraphic { name });
    }

    /// The local player's screen flashed. Classified as repeating when the
    /// identical flash is re-issued on consecutive frames.
    pub fn main_player_flashed(&mut self, descriptor: FlashDescriptor) {
        for action in self.flash_tracker.note_flash(descriptor) {
            let message = match action {
                FlashAction::OneShot(d) => ClientMessage::Flash {
                    red: d.red,
                    green: d.green,
                    blue: d.blue,
                    power: d.power,
                    frames: d.frames,
                },
                FlashAction::BeginRepeating(d) => ClientMessage::RepeatingFlash {
                    red: d.red,
                    green: d.green,
                    blue: d.blue,
                    power: d.power,
                    frames: d.frames,
                },
                FlashAction::Remove => ClientMessage::RemoveRepeatingFlash,
            };
            self.supervisor.send(&message);
        }
    }

    pub fn main_player_triggered_event(&mut self, event_id: u32, trigger: EventTrigger) {
        if self.world.gate.is_event_synced(event_id) {
            self.supervisor
                .send(&ClientMessage::SyncEvent { event_id, trigger });
        }
    }

    pub fn main_player_sound_played(&mut self, sound: SoundDescriptor) {
        self.supervisor.send(&ClientMessage::SoundEffect { sound });
    }

    // --- Picture / effect / state notifications -------------------------

    pub fn picture_shown(&mut self, pic_id: u32, params: PictureParams, origin: PictureOrigin) {
        if self.world.gate.is_picture_synced(pic_id, &params.name) {
            self.supervisor.send(&ClientMessage::ShowPicture {
                pic_id,
                params,
                origin,
            });
        }
    }

    pub fn picture_moved(
        &mut self,
        pic_id: u32,
        params: PictureParams,
        origin: PictureOrigin,
        duration: i32,
    ) {
        if self.world.gate.is_picture_synced(pic_id, &params.name) {
            self.supervisor.send(&ClientMessage::MovePicture {
                pic_id,
                params,
                origin,
                duration,
            });
        }
    }

    pub fn picture_erased(&mut self, pic_id: u32) {
        // The cached decision answers whether peers ever saw this picture
        if self.world.gate.is_picture_synced(pic_id, "") {
            self.supervisor.send(&ClientMessage::ErasePicture { pic_id });
        }
        self.world.gate.picture_erased(pic_id);
    }

    pub fn battle_anim_shown(&mut self, anim_id: u32) {
        if self.world.gate.is_battle_anim_synced(anim_id) {
            self.supervisor
                .send(&ClientMessage::ShowBattleAnim { anim_id });
        }
    }

    pub fn switch_set(&mut self, switch_id: u32, value: bool) {
        if self.world.gate.is_switch_synced(switch_id) {
            self.supervisor
                .send(&ClientMessage::SyncSwitch { switch_id, value });
        }
    }

    pub fn variable_set(&mut self, var_id: u32, value: i32) {
        if self.world.gate.is_variable_synced(var_id) {
            self.supervisor
                .send(&ClientMessage::SyncVariable { var_id, value });
        }
    }

    /// The local screen tone changed; remote sprites are tinted to match
    pub fn apply_screen_tone(&mut self, tone: Tone) {
        self.world.effects.set_tone(tone);
    }

    pub fn send_chat(&mut self, scope: ChatScope, text: String) {
        self.supervisor.send(&ClientMessage::Chat {
            scope,
            room_id: self.world.room.room_id(),
            name: self.config.display_name.clone(),
            text,
        });
    }

    // --- Live configuration ---------------------------------------------

    pub fn set_display_name(&mut self, name: String) {
        self.config.display_name = name.clone();
        self.supervisor.send(&ClientMessage::Name { name });
    }

    pub fn set_name_tag_mode(&mut self, mode: NameTagMode) {
        self.config.name_tag_mode = mode;
    }

    pub fn name_tag_mode(&self) -> NameTagMode {
        self.config.name_tag_mode
    }

    pub fn set_remote_addr(&mut self, addr: String) {
        self.config.remote_addr = addr.clone();
        self.supervisor.set_remote_addr(addr);
    }

    // --- Render accessors -----------------------------------------------

    pub fn players(&self) -> impl Iterator<Item = &RemotePlayer> {
        self.world.registry.iter()
    }

    pub fn ghosts(&self) -> impl Iterator<Item = &GhostPlayer> {
        self.world.ghosts.iter()
    }

    pub fn tone(&self) -> Tone {
        self.world.effects.tone()
    }

    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    // --- Internals ------------------------------------------------------

    /// Introduce this client to the room: room id first so the server can
    /// scope the rest, then the full visible state.
    fn send_initial_burst(&self) {
        self.supervisor.send(&ClientMessage::Room {
            room_id: self.world.room.room_id(),
        });
        self.supervisor.send(&ClientMessage::Move {
            x: self.local.x,
            y: self.local.y,
        });
        self.supervisor.send(&ClientMessage::Speed {
            speed: self.local.speed,
        });
        self.supervisor.send(&ClientMessage::Sprite {
            name: self.local.sprite_name.clone(),
            index: self.local.sprite_index,
        });
        self.supervisor.send(&ClientMessage::Facing {
            facing: self.local.facing.to_wire(),
        });
        self.supervisor.send(&ClientMessage::Hidden {
            hidden: self.local.hidden,
        });
        if !self.local.system_skin.is_empty() {
            self.supervisor.send(&ClientMessage::SystemGraphic {
                name: self.local.system_skin.clone(),
            });
        }
        if !self.config.display_name.is_empty() {
            self.supervisor.send(&ClientMessage::Name {
                name: self.config.display_name.clone(),
            });
        }
    }

    fn sync_status(&mut self) {
        let status = self.supervisor.state();
        if status != self.last_status {
            self.last_status = status;
            self.host.status_changed(status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::channel::{channel_pair, ChannelDriver, MessageChannel, TransportError};
    use crate::net::protocol::{decode, encode, ServerMessage};
    use parking_lot::Mutex;

    struct TestTransport {
        drivers: Mutex<Vec<ChannelDriver>>,
    }

    impl TestTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                drivers: Mutex::new(Vec::new()),
            })
        }

        fn driver(&self, index: usize) -> ChannelDriver {
            self.drivers.lock()[index].clone()
        }
    }

    impl Transport for TestTransport {
        fn open(&self, _addr: &str) -> Result<MessageChannel, TransportError> {
            let (channel, driver) = channel_pair();
            self.drivers.lock().push(driver);
            Ok(channel)
        }
    }

    #[derive(Default)]
    struct HostState {
        chats: Vec<(PeerId, String)>,
        sounds: Vec<(PeerId, String)>,
        pictures_shown: Vec<u32>,
        pictures_erased: Vec<u32>,
        battle_anims: Vec<(PeerId, u32)>,
        switches: Vec<(u32, bool)>,
        variables: Vec<(u32, i32)>,
        events: Vec<(u32, EventTrigger)>,
        statuses: Vec<ConnectionState>,
    }

    struct RecordingHost {
        state: Arc<Mutex<HostState>>,
    }

    impl GameHost for RecordingHost {
        fn chat_message(
            &mut self,
            peer: PeerId,
            _scope: ChatScope,
            _room_id: i32,
            _name: &str,
            text: &str,
        ) {
            self.state.lock().chats.push((peer, text.to_string()));
        }

        fn play_sound(&mut self, peer: PeerId, sound: &SoundDescriptor) {
            self.state.lock().sounds.push((peer, sound.name.clone()));
        }

        fn show_picture(
            &mut self,
            pic_id: u32,
            _params: &PictureParams,
            _origin: &PictureOrigin,
        ) {
            self.state.lock().pictures_shown.push(pic_id);
        }

        fn erase_picture(&mut self, pic_id: u32) {
            self.state.lock().pictures_erased.push(pic_id);
        }

        fn play_battle_anim(&mut self, peer: PeerId, anim_id: u32) {
            self.state.lock().battle_anims.push((peer, anim_id));
        }

        fn set_switch(&mut self, switch_id: u32, value: bool) {
            self.state.lock().switches.push((switch_id, value));
        }

        fn set_variable(&mut self, var_id: u32, value: i32) {
            self.state.lock().variables.push((var_id, value));
        }

        fn run_event(&mut self, event_id: u32, trigger: EventTrigger) {
            self.state.lock().events.push((event_id, trigger));
        }

        fn status_changed(&mut self, status: ConnectionState) {
            self.state.lock().statuses.push(status);
        }
    }

    fn geometry() -> RoomGeometry {
        RoomGeometry {
            width: 20,
            height: 15,
            loop_horizontal: false,
            loop_vertical: false,
        }
    }

    fn test_config() -> SyncConfig {
        SyncConfig {
            reconnect_delay: std::time::Duration::from_secs(60),
            keepalive_interval: std::time::Duration::from_secs(60),
            display_name: "tester".to_string(),
            ..SyncConfig::default()
        }
    }

    /// Engine connected with an open channel, before any room join
    fn connected_engine() -> (SyncEngine, Arc<TestTransport>, Arc<Mutex<HostState>>) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("overlay_sync=debug")
            .with_test_writer()
            .try_init();

        let transport = TestTransport::new();
        let state = Arc::new(Mutex::new(HostState::default()));
        let host = Box::new(RecordingHost {
            state: state.clone(),
        });
        let mut engine = SyncEngine::new(test_config(), transport.clone(), host).unwrap();

        engine.connect();
        transport.driver(0).push(ChannelEvent::Open);
        engine.update();
        (engine, transport, state)
    }

    fn push(driver: &ChannelDriver, message: ServerMessage) {
        driver.push_message(encode(&message).unwrap());
    }

    fn sent(driver: &ChannelDriver) -> Vec<ClientMessage> {
        driver
            .drain_outbound()
            .iter()
            .map(|payload| decode(payload).unwrap())
            .filter(|message| !matches!(message, ClientMessage::Heartbeat))
            .collect()
    }

    /// Join room 1 and run the handshake to settled
    fn settle(engine: &mut SyncEngine, driver: &ChannelDriver) {
        engine.switch_room(1, geometry());
        push(driver, ServerMessage::RoomAck { room_id: 1 });
        engine.update();
        engine.update();
        assert!(engine.world.room.is_settled());
        sent(driver);
    }

    #[test]
    fn test_open_sends_initial_burst() {
        let (_engine, transport, _state) = connected_engine();
        let messages = sent(&transport.driver(0));

        assert!(matches!(messages[0], ClientMessage::Room { room_id: 0 }));
        assert!(messages
            .iter()
            .any(|m| matches!(m, ClientMessage::Move { .. })));
        assert!(messages
            .iter()
            .any(|m| matches!(m, ClientMessage::Sprite { .. })));
        assert!(messages
            .iter()
            .any(|m| matches!(m, ClientMessage::Name { name } if name == "tester")));
    }

    #[test]
    fn test_switch_room_resends_burst_with_new_room() {
        let (mut engine, transport, _state) = connected_engine();
        let driver = transport.driver(0);
        sent(&driver);

        engine.switch_room(7, geometry());
        let messages = sent(&driver);
        assert!(matches!(messages[0], ClientMessage::Room { room_id: 7 }));
    }

    #[test]
    fn test_mismatched_room_ack_resends_request() {
        let (mut engine, transport, _state) = connected_engine();
        let driver = transport.driver(0);
        engine.switch_room(7, geometry());
        sent(&driver);

        // Stale ack from an abandoned switch
        push(&driver, ServerMessage::RoomAck { room_id: 3 });
        engine.update();
        let messages = sent(&driver);
        assert_eq!(messages.len(), 1);
        assert!(matches!(messages[0], ClientMessage::Room { room_id: 7 }));

        push(&driver, ServerMessage::RoomAck { room_id: 7 });
        engine.update();
        assert!(!engine.world.room.is_switching());
    }

    #[test]
    fn test_peer_walk_end_to_end() {
        let (mut engine, transport, _state) = connected_engine();
        let driver = transport.driver(0);
        settle(&mut engine, &driver);

        push(&driver, ServerMessage::Join { id: 1 });
        push(&driver, ServerMessage::Move { id: 1, x: 5, y: 5 });
        engine.update();

        // First report: instant relocation, now visible
        {
            let player = engine.players().next().unwrap();
            assert_eq!((player.x, player.y), (5, 5));
            assert!(player.visible);
            assert!(!player.is_stepping());
        }

        push(&driver, ServerMessage::Move { id: 1, x: 6, y: 5 });
        engine.update();

        // One-tile displacement: a step, never a snap to the target
        {
            let player = engine.players().next().unwrap();
            assert!(player.is_stepping());
            let (render_x, _) = player.render_position();
            assert!(render_x >= 5.0 && render_x < 6.0);
        }

        // Default speed is 8 frames per tile
        for _ in 0..8 {
            engine.update();
        }
        let player = engine.players().next().unwrap();
        assert!(!player.is_stepping());
        assert_eq!(player.render_position(), (6.0, 5.0));
    }

    #[test]
    fn test_move_before_join_creates_peer() {
        let (mut engine, transport, _state) = connected_engine();
        let driver = transport.driver(0);
        settle(&mut engine, &driver);

        push(&driver, ServerMessage::Move { id: 9, x: 3, y: 3 });
        engine.update();
        assert_eq!(engine.players().count(), 1);

        // A late Join for the same id is a no-op
        push(&driver, ServerMessage::Join { id: 9 });
        engine.update();
        assert_eq!(engine.players().count(), 1);
    }

    #[test]
    fn test_messages_for_unknown_peer_are_noops() {
        let (mut engine, transport, _state) = connected_engine();
        let driver = transport.driver(0);
        settle(&mut engine, &driver);

        push(&driver, ServerMessage::Facing { id: 42, facing: 1 });
        push(
            &driver,
            ServerMessage::Speed {
                id: 42,
                speed: 3,
            },
        );
        push(&driver, ServerMessage::Leave { id: 42 });
        engine.update();

        assert_eq!(engine.players().count(), 0);
    }

    #[test]
    fn test_leave_converts_visible_peer_to_ghost() {
        let (mut engine, transport, _state) = connected_engine();
        let driver = transport.driver(0);
        settle(&mut engine, &driver);

        push(&driver, ServerMessage::Join { id: 1 });
        push(&driver, ServerMessage::Move { id: 1, x: 5, y: 5 });
        engine.update();
        // Let the fade-in put some opacity on the sprite
        for _ in 0..5 {
            engine.update();
        }

        push(&driver, ServerMessage::Leave { id: 1 });
        engine.update();

        assert_eq!(engine.players().count(), 0);
        assert_eq!(engine.ghosts().count(), 1);
    }

    #[test]
    fn test_malformed_payload_dropped_without_side_effects() {
        let (mut engine, transport, _state) = connected_engine();
        let driver = transport.driver(0);
        settle(&mut engine, &driver);

        driver.push_message(vec![0xFF, 0xFE, 0xFD, 0xFC]);
        engine.update();

        assert_eq!(engine.players().count(), 0);
        assert_eq!(SyncStats::get(&engine.stats().decode_failures), 1);
    }

    #[test]
    fn test_out_of_range_values_clamped() {
        let (mut engine, transport, _state) = connected_engine();
        let driver = transport.driver(0);
        settle(&mut engine, &driver);

        push(&driver, ServerMessage::Join { id: 1 });
        push(&driver, ServerMessage::Facing { id: 1, facing: 250 });
        push(&driver, ServerMessage::Speed { id: 1, speed: 99 });
        push(
            &driver,
            ServerMessage::Move {
                id: 1,
                x: -50,
                y: 900,
            },
        );
        engine.update();

        let player = engine.players().next().unwrap();
        assert_eq!(player.facing, Facing::Left);
        assert_eq!(player.move_speed, 6);
        assert_eq!((player.x, player.y), (0, 14));
    }

    #[test]
    fn test_remote_picture_renders_but_is_not_learned() {
        let (mut engine, transport, state) = connected_engine();
        let driver = transport.driver(0);
        settle(&mut engine, &driver);

        let params = PictureParams {
            name: "secret_fog".to_string(),
            x: 0,
            y: 0,
            magnify: 100,
            top_opacity: 255,
            use_transparent_color: false,
            fixed_to_map: false,
        };
        let origin = PictureOrigin {
            map_x: 0,
            map_y: 0,
            pan_x: 0,
            pan_y: 0,
        };
        push(
            &driver,
            ServerMessage::ShowPicture {
                id: 2,
                pic_id: 3,
                params: params.clone(),
                origin,
            },
        );
        engine.update();
        sent(&driver);

        // Rendered locally under the translated id
        assert_eq!(
            state.lock().pictures_shown,
            vec![crate::constants::translate_remote_id(3, 2)]
        );

        // But the local player's own picture 3 is still not synced
        engine.picture_shown(3, params, origin);
        assert!(sent(&driver).is_empty());
    }

    #[test]
    fn test_sync_picture_request_is_learned() {
        let (mut engine, transport, _state) = connected_engine();
        let driver = transport.driver(0);
        settle(&mut engine, &driver);

        push(&driver, ServerMessage::SyncPicture { id: 2, pic_id: 3 });
        engine.update();
        sent(&driver);

        let params = PictureParams {
            name: "anything".to_string(),
            x: 0,
            y: 0,
            magnify: 100,
            top_opacity: 255,
            use_transparent_color: false,
            fixed_to_map: false,
        };
        let origin = PictureOrigin {
            map_x: 0,
            map_y: 0,
            pan_x: 0,
            pan_y: 0,
        };
        engine.picture_shown(3, params, origin);
        let messages = sent(&driver);
        assert!(matches!(
            messages.as_slice(),
            [ClientMessage::ShowPicture { pic_id: 3, .. }]
        ));
    }

    #[test]
    fn test_allowlisted_picture_is_forwarded() {
        let (mut engine, transport, _state) = connected_engine();
        let driver = transport.driver(0);
        settle(&mut engine, &driver);

        push(
            &driver,
            ServerMessage::PictureNameList {
                names: Vec::new(),
                prefixes: vec!["fx_".to_string()],
            },
        );
        engine.update();
        sent(&driver);

        let params = PictureParams {
            name: "FX_rain".to_string(),
            x: 0,
            y: 0,
            magnify: 100,
            top_opacity: 255,
            use_transparent_color: false,
            fixed_to_map: false,
        };
        let origin = PictureOrigin {
            map_x: 0,
            map_y: 0,
            pan_x: 0,
            pan_y: 0,
        };
        engine.picture_shown(5, params, origin);
        engine.picture_erased(5);

        let messages = sent(&driver);
        assert!(matches!(messages[0], ClientMessage::ShowPicture { pic_id: 5, .. }));
        assert!(matches!(messages[1], ClientMessage::ErasePicture { pic_id: 5 }));
    }

    #[test]
    fn test_switch_sync_gated_until_learned() {
        let (mut engine, transport, state) = connected_engine();
        let driver = transport.driver(0);
        settle(&mut engine, &driver);

        // Unsynced switch changes are never sent
        engine.switch_set(5, true);
        assert!(sent(&driver).is_empty());

        // A peer's sync request teaches the id, and the value applies
        push(
            &driver,
            ServerMessage::SyncSwitch {
                id: 2,
                switch_id: 5,
                value: true,
            },
        );
        engine.update();
        assert_eq!(state.lock().switches, vec![(5, true)]);

        engine.switch_set(5, false);
        let messages = sent(&driver);
        assert!(matches!(
            messages.as_slice(),
            [ClientMessage::SyncSwitch {
                switch_id: 5,
                value: false,
            }]
        ));
    }

    #[test]
    fn test_battle_anim_gate_and_translation() {
        let (mut engine, transport, state) = connected_engine();
        let driver = transport.driver(0);
        settle(&mut engine, &driver);

        push(&driver, ServerMessage::BattleAnimIdList { ids: vec![4] });
        push(&driver, ServerMessage::Join { id: 1 });
        push(&driver, ServerMessage::ShowBattleAnim { id: 1, anim_id: 9 });
        engine.update();
        sent(&driver);

        // Remote anim applied under the translated id
        assert_eq!(
            state.lock().battle_anims,
            vec![(1, crate::constants::translate_remote_id(9, 1))]
        );

        // Sending side honors the server list
        engine.battle_anim_shown(9);
        assert!(sent(&driver).is_empty());
        engine.battle_anim_shown(4);
        assert!(matches!(
            sent(&driver).as_slice(),
            [ClientMessage::ShowBattleAnim { anim_id: 4 }]
        ));
    }

    #[test]
    fn test_local_flash_classification_sequence() {
        let (mut engine, transport, _state) = connected_engine();
        let driver = transport.driver(0);
        settle(&mut engine, &driver);

        let flash = FlashDescriptor {
            red: 255,
            green: 255,
            blue: 255,
            power: 16,
            frames: 8,
        };

        engine.main_player_flashed(flash);
        engine.update();
        assert!(matches!(
            sent(&driver).as_slice(),
            [ClientMessage::Flash { .. }]
        ));

        engine.main_player_flashed(flash);
        engine.update();
        assert!(matches!(
            sent(&driver).as_slice(),
            [ClientMessage::RepeatingFlash { .. }]
        ));

        // Still repeating: nothing more goes out
        engine.main_player_flashed(flash);
        engine.update();
        assert!(sent(&driver).is_empty());

        // First frame without the flash: removal signal
        engine.update();
        assert!(matches!(
            sent(&driver).as_slice(),
            [ClientMessage::RemoveRepeatingFlash]
        ));
    }

    #[test]
    fn test_chat_both_directions() {
        let (mut engine, transport, state) = connected_engine();
        let driver = transport.driver(0);
        settle(&mut engine, &driver);

        push(
            &driver,
            ServerMessage::Chat {
                id: 2,
                scope: ChatScope::Room,
                room_id: 1,
                name: "peer".to_string(),
                text: "hi there".to_string(),
            },
        );
        engine.update();
        assert_eq!(state.lock().chats, vec![(2, "hi there".to_string())]);

        engine.send_chat(ChatScope::Room, "hello".to_string());
        let messages = sent(&driver);
        match &messages[0] {
            ClientMessage::Chat {
                room_id,
                name,
                text,
                ..
            } => {
                assert_eq!(*room_id, 1);
                assert_eq!(name, "tester");
                assert_eq!(text, "hello");
            }
            other => panic!("Unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_sound_and_sync_event_routing() {
        let (mut engine, transport, state) = connected_engine();
        let driver = transport.driver(0);
        settle(&mut engine, &driver);

        push(
            &driver,
            ServerMessage::SoundEffect {
                id: 3,
                sound: SoundDescriptor {
                    name: "chime".to_string(),
                    volume: 80,
                    tempo: 100,
                    balance: 50,
                },
            },
        );
        push(
            &driver,
            ServerMessage::SyncEvent {
                id: 3,
                event_id: 21,
                trigger: EventTrigger::Action,
            },
        );
        engine.update();

        assert_eq!(state.lock().sounds, vec![(3, "chime".to_string())]);
        assert_eq!(state.lock().events, vec![(21, EventTrigger::Action)]);

        // The learned event id is now forwarded when triggered locally
        sent(&driver);
        engine.main_player_triggered_event(21, EventTrigger::Touch);
        assert!(matches!(
            sent(&driver).as_slice(),
            [ClientMessage::SyncEvent { event_id: 21, .. }]
        ));
    }

    #[test]
    fn test_disconnect_clears_mirrored_state() {
        let (mut engine, transport, state) = connected_engine();
        let driver = transport.driver(0);
        settle(&mut engine, &driver);

        push(&driver, ServerMessage::Join { id: 1 });
        push(&driver, ServerMessage::Move { id: 1, x: 5, y: 5 });
        engine.update();
        assert_eq!(engine.players().count(), 1);

        engine.disconnect();

        assert_eq!(engine.players().count(), 0);
        assert_eq!(engine.connection_status(), ConnectionState::Disconnected);
        assert_eq!(
            state.lock().statuses.last(),
            Some(&ConnectionState::Disconnected)
        );
    }

    #[test]
    fn test_access_denied_is_fatal() {
        let (mut engine, transport, state) = connected_engine();
        let driver = transport.driver(0);
        settle(&mut engine, &driver);

        driver.push(ChannelEvent::AccessDenied);
        engine.update();

        assert_eq!(engine.connection_status(), ConnectionState::Disconnected);
        assert_eq!(engine.players().count(), 0);
        // No reconnect was scheduled for a fatal close
        assert_eq!(SyncStats::get(&engine.stats().reconnects_scheduled), 0);
        assert_eq!(
            state.lock().statuses.last(),
            Some(&ConnectionState::Disconnected)
        );
    }

    #[test]
    fn test_tone_applies_to_render_state() {
        let (mut engine, _transport, _state) = connected_engine();
        let dusk = Tone {
            red: 40,
            green: 40,
            blue: 70,
            gray: 10,
        };
        engine.apply_screen_tone(dusk);
        assert_eq!(engine.tone(), dusk);
    }
}
