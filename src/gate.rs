//! Outbound sync gating
//!
//! The server pushes allow-lists describing which resources may be
//! broadcast between peers; anything else the local player does stays
//! local. Gating applies to the sending side only — a remote event that
//! already arrived is always applied.

use std::collections::{HashMap, HashSet};

/// Allow-lists and learned opt-ins for the current room
#[derive(Debug, Default)]
pub struct SyncGate {
    /// Server-pushed exact picture names, lowercased
    picture_names: HashSet<String>,
    /// Server-pushed picture name prefixes, lowercased
    picture_prefixes: Vec<String>,
    /// Server-pushed battle-animation ids
    battle_anim_ids: HashSet<u32>,
    /// Ids learned reactively from peers' own sync traffic
    learned_pictures: HashSet<u32>,
    learned_switches: HashSet<u32>,
    learned_variables: HashSet<u32>,
    learned_events: HashSet<u32>,
    /// Cached decision per picture id, held for the picture's lifetime
    picture_cache: HashMap<u32, bool>,
}

impl SyncGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the server picture allow-lists. Existing per-picture
    /// decisions stay cached; only pictures shown afterwards see the new
    /// lists.
    pub fn set_picture_lists(&mut self, names: Vec<String>, prefixes: Vec<String>) {
        self.picture_names = names.into_iter().map(|n| n.to_lowercase()).collect();
        self.picture_prefixes = prefixes.into_iter().map(|p| p.to_lowercase()).collect();
    }

    /// Replace the server battle-animation allow-list
    pub fn set_battle_anim_ids(&mut self, ids: Vec<u32>) {
        self.battle_anim_ids = ids.into_iter().collect();
    }

    /// A peer showed this picture; the id is synced from now on
    pub fn learn_picture(&mut self, pic_id: u32) {
        self.learned_pictures.insert(pic_id);
    }

    pub fn learn_switch(&mut self, switch_id: u32) {
        self.learned_switches.insert(switch_id);
    }

    pub fn learn_variable(&mut self, var_id: u32) {
        self.learned_variables.insert(var_id);
    }

    pub fn learn_event(&mut self, event_id: u32) {
        self.learned_events.insert(event_id);
    }

    /// Should a local picture command for this id/name be forwarded?
    /// The answer is computed once per picture id and cached until the
    /// picture is erased.
    pub fn is_picture_synced(&mut self, pic_id: u32, name: &str) -> bool {
        if let Some(&cached) = self.picture_cache.get(&pic_id) {
            return cached;
        }
        let lower = name.to_lowercase();
        let synced = self.picture_names.contains(&lower)
            || self
                .picture_prefixes
                .iter()
                .any(|prefix| lower.starts_with(prefix.as_str()))
            || self.learned_pictures.contains(&pic_id);
        self.picture_cache.insert(pic_id, synced);
        synced
    }

    /// The picture's lifetime ended; its cached decision goes with it
    pub fn picture_erased(&mut self, pic_id: u32) {
        self.picture_cache.remove(&pic_id);
    }

    pub fn is_battle_anim_synced(&self, anim_id: u32) -> bool {
        self.battle_anim_ids.contains(&anim_id)
    }

    pub fn is_switch_synced(&self, switch_id: u32) -> bool {
        self.learned_switches.contains(&switch_id)
    }

    pub fn is_variable_synced(&self, var_id: u32) -> bool {
        self.learned_variables.contains(&var_id)
    }

    pub fn is_event_synced(&self, event_id: u32) -> bool {
        self.learned_events.contains(&event_id)
    }

    /// Drop everything (room reset or disconnect); the server re-pushes
    /// its lists after the next room join.
    pub fn clear(&mut self) {
        self.picture_names.clear();
        self.picture_prefixes.clear();
        self.battle_anim_ids.clear();
        self.learned_pictures.clear();
        self.learned_switches.clear();
        self.learned_variables.clear();
        self.learned_events.clear();
        self.picture_cache.clear();
    }
}
