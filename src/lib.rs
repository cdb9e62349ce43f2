//! Overlay Sync Client
//!
//! Client-side real-time synchronization engine for a multiplayer overlay.
//! The host game embeds a [`engine::SyncEngine`], pumps it once per rendered
//! frame, and forwards local-player activity through the `main_player_*`
//! notification family. Remote peers arrive through an abstract message
//! channel (see [`net::channel::Transport`]) and are mirrored as
//! [`player::remote::RemotePlayer`] proxies the renderer can draw.

pub mod config;
pub mod constants;
pub mod effects;
pub mod engine;
pub mod gate;
pub mod net;
pub mod player;
pub mod room;
pub mod stats;
