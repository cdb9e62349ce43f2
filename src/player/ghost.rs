//! Fading remnants of departed peers
//!
//! A ghost is a frozen render snapshot taken when a peer leaves or jumps a
//! large discontinuity. Ghosts only ever fade; they never receive network
//! updates and never re-enter the registry.

use crate::constants::fade::GHOST_FADE_STEP;
use crate::player::remote::{Facing, RemotePlayer};

/// A frozen, fading copy of a remote player
#[derive(Debug, Clone)]
pub struct GhostPlayer {
    /// Render position in tile units, including mid-step interpolation
    pub x: f32,
    pub y: f32,
    pub facing: Facing,
    pub sprite_name: String,
    pub sprite_index: u8,
    pub opacity: u8,
}

impl GhostPlayer {
    /// Snapshot a player's pose at the moment of departure
    pub fn from_player(player: &RemotePlayer) -> Self {
        let (x, y) = player.render_position();
        Self {
            x,
            y,
            facing: player.facing,
            sprite_name: player.sprite_name.clone(),
            sprite_index: player.sprite_index,
            opacity: player.opacity,
        }
    }
}

/// Decay list for ghosts
#[derive(Debug, Default)]
pub struct GhostFader {
    ghosts: Vec<GhostPlayer>,
}

impl GhostFader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a snapshot into the decay list
    pub fn adopt(&mut self, ghost: GhostPlayer) {
        if ghost.opacity > 0 {
            self.ghosts.push(ghost);
        }
    }

    /// Fade all ghosts one frame, evicting the fully transparent
    pub fn advance(&mut self) {
        for ghost in &mut self.ghosts {
            ghost.opacity = ghost.opacity.saturating_sub(GHOST_FADE_STEP);
        }
        self.ghosts.retain(|ghost| ghost.opacity > 0);
    }

    pub fn iter(&self) -> impl Iterator<Item = &GhostPlayer> {
        self.ghosts.iter()
    }

    pub fn len(&self) -> usize {
        self.ghosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ghosts.is_empty()
    }

    pub fn clear(&mut self) {
        self.ghosts.clear();
    }
}
