use rustc_hash::FxHashMap;

use crate::player::remote::RemotePlayer;
use crate::player::PeerId;

/// Owner of all known remote players
///
/// At most one entry per peer id. Because a player's effects and battle
/// animation live on the aggregate, removal cancels them in the same
/// operation.
#[derive(Debug, Default)]
pub struct RemotePlayerRegistry {
    players: FxHashMap<PeerId, RemotePlayer>,
}

impl RemotePlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the player for a peer id. A fresh Join for a present
    /// id is a no-op beyond returning the existing entry.
    pub fn upsert(&mut self, id: PeerId) -> &mut RemotePlayer {
        self.players.entry(id).or_insert_with(|| RemotePlayer::new(id))
    }

    pub fn contains(&self, id: PeerId) -> bool {
        self.players.contains_key(&id)
    }

    pub fn get(&self, id: PeerId) -> Option<&RemotePlayer> {
        self.players.get(&id)
    }

    pub fn get_mut(&mut self, id: PeerId) -> Option<&mut RemotePlayer> {
        self.players.get_mut(&id)
    }

    /// Remove a player, returning it so the caller can decide whether the
    /// departed peer becomes a fading ghost.
    pub fn remove(&mut self, id: PeerId) -> Option<RemotePlayer> {
        self.players.remove(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RemotePlayer> {
        self.players.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RemotePlayer> {
        self.players.values_mut()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn clear(&mut self) {
        self.players.clear();
    }
}
