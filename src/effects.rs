//! Visual effect mirroring
//!
//! Flashes and screen tone arrive per-peer or room-wide and are mirrored
//! onto the remote player aggregates the renderer reads. Repeating flashes
//! are reasserted every frame until removed. The sending side classifies
//! the local player's own flashes the same way peers will see them.

use crate::constants::effects::MAX_FLASH_POWER;
use crate::player::registry::RemotePlayerRegistry;
use crate::player::remote::RemotePlayer;

/// Screen tone applied to every remote player equally (room property)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tone {
    pub red: i16,
    pub green: i16,
    pub blue: i16,
    pub gray: i16,
}

impl Tone {
    pub const NEUTRAL: Tone = Tone {
        red: 100,
        green: 100,
        blue: 100,
        gray: 0,
    };
}

impl Default for Tone {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

/// Flash parameters as asserted by a peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashDescriptor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub power: u8,
    pub frames: u32,
}

/// A flash currently decaying on a player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashState {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub power: u8,
    pub frames_left: u32,
}

impl FlashState {
    fn from_descriptor(descriptor: &FlashDescriptor) -> Self {
        Self {
            red: descriptor.red,
            green: descriptor.green,
            blue: descriptor.blue,
            power: descriptor.power,
            frames_left: descriptor.frames,
        }
    }
}

/// Applies tone and flash effects to remote players and ages them out
#[derive(Debug, Default)]
pub struct EffectBroadcaster {
    tone: Tone,
}

impl EffectBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current room tone; applies to every current and future remote player
    pub fn tone(&self) -> Tone {
        self.tone
    }

    pub fn set_tone(&mut self, tone: Tone) {
        self.tone = tone;
    }

    /// Reset to the neutral tone (room change)
    pub fn reset(&mut self) {
        self.tone = Tone::NEUTRAL;
    }

    /// Apply a one-shot flash, clamping out-of-range power
    pub fn apply_flash(player: &mut RemotePlayer, mut descriptor: FlashDescriptor) {
        descriptor.power = descriptor.power.min(MAX_FLASH_POWER);
        player.flash = Some(FlashState::from_descriptor(&descriptor));
    }

    /// Store a repeating flash; it is reasserted every frame by `advance`
    pub fn apply_repeating_flash(player: &mut RemotePlayer, mut descriptor: FlashDescriptor) {
        descriptor.power = descriptor.power.min(MAX_FLASH_POWER);
        player.flash = Some(FlashState::from_descriptor(&descriptor));
        player.repeating_flash = Some(descriptor);
    }

    pub fn remove_repeating_flash(player: &mut RemotePlayer) {
        player.repeating_flash = None;
    }

    /// Per-frame effect aging: reassert repeating flashes, decay one-shot
    /// flashes, and age battle animations.
    pub fn advance(&mut self, registry: &mut RemotePlayerRegistry) {
        for player in registry.iter_mut() {
            if let Some(descriptor) = player.repeating_flash {
                player.flash = Some(FlashState::from_descriptor(&descriptor));
            } else if let Some(flash) = player.flash.as_mut() {
                flash.frames_left = flash.frames_left.saturating_sub(1);
                if flash.frames_left == 0 {
                    player.flash = None;
                }
            }

            if let Some(anim) = player.battle_anim.as_mut() {
                anim.frames_left = anim.frames_left.saturating_sub(1);
                if anim.frames_left == 0 {
                    player.battle_anim = None;
                }
            }
        }
    }
}

/// What the sending side should do about a locally-issued flash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashAction {
    /// Send a one-shot flash
    OneShot(FlashDescriptor),
    /// The flash turned out to be repeating; announce it once
    BeginRepeating(FlashDescriptor),
    /// The repetition stopped; tell peers to drop it
    Remove,
}

/// Classifies the local player's flashes for sending.
///
/// An identical flash re-issued on consecutive frames with no gap is a
/// repeating flash; anything else is a one-shot. The removal signal goes
/// out on the first frame after the repetition stops.
#[derive(Debug, Default)]
pub struct LocalFlashTracker {
    frame: u64,
    last: Option<(FlashDescriptor, u64)>,
    repeating: bool,
}

impl LocalFlashTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The local player flashed this frame
    pub fn note_flash(&mut self, descriptor: FlashDescriptor) -> Vec<FlashAction> {
        let mut actions = Vec::new();
        let continues = matches!(
            self.last,
            Some((prev, frame)) if prev == descriptor && frame + 1 == self.frame
        );

        if continues {
            if !self.repeating {
                self.repeating = true;
                actions.push(FlashAction::BeginRepeating(descriptor));
            }
        } else {
            if self.repeating {
                self.repeating = false;
                actions.push(FlashAction::Remove);
            }
            actions.push(FlashAction::OneShot(descriptor));
        }

        self.last = Some((descriptor, self.frame));
        actions
    }

    /// End-of-frame hook; returns the removal signal once repetition stops
    pub fn end_of_frame(&mut self) -> Option<FlashAction> {
        let stopped = self.repeating
            && !matches!(self.last, Some((_, frame)) if frame == self.frame);
        if stopped {
            self.repeating = false;
            self.last = None;
        }
        self.frame += 1;
        stopped.then_some(FlashAction::Remove)
    }

    /// Forget history (disconnect or room change)
    pub fn reset(&mut self) {
        self.last = None;
        self.repeating = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::effects::BATTLE_ANIM_FRAMES;
    use crate::player::remote::BattleAnim;

    fn red_flash() -> FlashDescriptor {
        FlashDescriptor {
            red: 255,
            green: 0,
            blue: 0,
            power: 20,
            frames: 10,
        }
    }

    #[test]
    fn test_flash_power_clamped() {
        let mut player = RemotePlayer::new(1);
        let mut descriptor = red_flash();
        descriptor.power = 200;

        EffectBroadcaster::apply_flash(&mut player, descriptor);
        assert_eq!(player.flash.unwrap().power, MAX_FLASH_POWER);
    }

    #[test]
    fn test_one_shot_flash_decays() {
        let mut registry = RemotePlayerRegistry::new();
        let mut effects = EffectBroadcaster::new();
        EffectBroadcaster::apply_flash(registry.upsert(1), red_flash());

        for _ in 0..10 {
            effects.advance(&mut registry);
        }
        assert!(registry.get(1).unwrap().flash.is_none());
    }

    #[test]
    fn test_repeating_flash_reasserted() {
        let mut registry = RemotePlayerRegistry::new();
        let mut effects = EffectBroadcaster::new();
        EffectBroadcaster::apply_repeating_flash(registry.upsert(1), red_flash());

        for _ in 0..50 {
            effects.advance(&mut registry);
        }
        // Still at full strength long after a one-shot would have decayed
        let flash = registry.get(1).unwrap().flash.unwrap();
        assert_eq!(flash.frames_left, red_flash().frames);
    }

    #[test]
    fn test_remove_repeating_lets_flash_decay() {
        let mut registry = RemotePlayerRegistry::new();
        let mut effects = EffectBroadcaster::new();
        EffectBroadcaster::apply_repeating_flash(registry.upsert(1), red_flash());
        effects.advance(&mut registry);

        EffectBroadcaster::remove_repeating_flash(registry.get_mut(1).unwrap());
        for _ in 0..10 {
            effects.advance(&mut registry);
        }
        assert!(registry.get(1).unwrap().flash.is_none());
    }

    #[test]
    fn test_battle_anim_ages_out() {
        let mut registry = RemotePlayerRegistry::new();
        let mut effects = EffectBroadcaster::new();
        registry.upsert(1).battle_anim = Some(BattleAnim {
            anim_id: 4,
            frames_left: BATTLE_ANIM_FRAMES,
        });

        for _ in 0..BATTLE_ANIM_FRAMES {
            effects.advance(&mut registry);
        }
        assert!(registry.get(1).unwrap().battle_anim.is_none());
    }

    #[test]
    fn test_tone_is_global() {
        let mut effects = EffectBroadcaster::new();
        assert_eq!(effects.tone(), Tone::NEUTRAL);

        let dusk = Tone {
            red: 60,
            green: 50,
            blue: 80,
            gray: 20,
        };
        effects.set_tone(dusk);
        assert_eq!(effects.tone(), dusk);

        effects.reset();
        assert_eq!(effects.tone(), Tone::NEUTRAL);
    }

    #[test]
    fn test_tracker_single_flash_is_one_shot() {
        let mut tracker = LocalFlashTracker::new();
        let actions = tracker.note_flash(red_flash());
        assert_eq!(actions, vec![FlashAction::OneShot(red_flash())]);
        assert!(tracker.end_of_frame().is_none());
        // A frame gap later, nothing more is sent
        assert!(tracker.end_of_frame().is_none());
    }

    #[test]
    fn test_tracker_consecutive_flashes_become_repeating() {
        let mut tracker = LocalFlashTracker::new();

        assert_eq!(
            tracker.note_flash(red_flash()),
            vec![FlashAction::OneShot(red_flash())]
        );
        tracker.end_of_frame();

        assert_eq!(
            tracker.note_flash(red_flash()),
            vec![FlashAction::BeginRepeating(red_flash())]
        );
        tracker.end_of_frame();

        // While the repetition continues nothing further goes out
        assert!(tracker.note_flash(red_flash()).is_empty());
        tracker.end_of_frame();

        // First frame without the flash: removal signal
        assert_eq!(tracker.end_of_frame(), Some(FlashAction::Remove));
        assert!(tracker.end_of_frame().is_none());
    }

    #[test]
    fn test_tracker_gap_resets_classification() {
        let mut tracker = LocalFlashTracker::new();
        tracker.note_flash(red_flash());
        tracker.end_of_frame();
        // One empty frame: the next identical flash is one-shot again
        tracker.end_of_frame();

        assert_eq!(
            tracker.note_flash(red_flash()),
            vec![FlashAction::OneShot(red_flash())]
        );
    }

    #[test]
    fn test_tracker_changed_flash_stops_repetition() {
        let mut tracker = LocalFlashTracker::new();
        tracker.note_flash(red_flash());
        tracker.end_of_frame();
        tracker.note_flash(red_flash());
        tracker.end_of_frame();

        let mut blue = red_flash();
        blue.red = 0;
        blue.blue = 255;
        let actions = tracker.note_flash(blue);
        assert_eq!(
            actions,
            vec![FlashAction::Remove, FlashAction::OneShot(blue)]
        );
    }
}
