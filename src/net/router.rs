//! Inbound message routing
//!
//! Decodes raw payloads into the closed [`ServerMessage`] enum and
//! dispatches through one exhaustive match. Decode is all-or-nothing, so a
//! malformed payload is dropped without partial state mutation. Events for
//! unknown peer ids are no-ops — Join/Leave/Move ordering across the wire
//! is not guaranteed — except Join and Move, which create the peer.

use tracing::debug;

use crate::constants::effects::BATTLE_ANIM_FRAMES;
use crate::constants::translate_remote_id;
use crate::effects::{EffectBroadcaster, FlashDescriptor};
use crate::engine::{GameHost, World};
use crate::net::protocol::{decode, ClientMessage, DecodeError, ServerMessage};
use crate::net::supervisor::ConnectionSupervisor;
use crate::player::movement;
use crate::player::remote::{clamp_speed, BattleAnim, Facing};
use crate::room::AckOutcome;
use crate::stats::SyncStats;

/// Decode and dispatch one inbound payload
pub(crate) fn dispatch(
    raw: &[u8],
    world: &mut World,
    host: &mut dyn GameHost,
    supervisor: &ConnectionSupervisor,
    stats: &SyncStats,
) -> Result<(), DecodeError> {
    let message: ServerMessage = match decode(raw) {
        Ok(message) => message,
        Err(e) => {
            SyncStats::bump(&stats.decode_failures);
            return Err(e);
        }
    };
    SyncStats::bump(&stats.messages_received);
    handle(message, world, host, supervisor, stats);
    Ok(())
}

fn handle(
    message: ServerMessage,
    world: &mut World,
    host: &mut dyn GameHost,
    supervisor: &ConnectionSupervisor,
    stats: &SyncStats,
) {
    match message {
        // Acknowledgment only
        ServerMessage::Heartbeat => {}

        ServerMessage::RoomAck { room_id } => {
            if world.room.on_ack(room_id) == AckOutcome::Mismatch {
                supervisor.send(&ClientMessage::Room {
                    room_id: world.room.room_id(),
                });
            }
        }

        ServerMessage::Join { id } => {
            if !world.registry.contains(id) {
                debug!("Peer {} joined", id);
                world.registry.upsert(id);
                SyncStats::bump(&stats.peers_joined);
            }
        }

        ServerMessage::Leave { id } => {
            if let Some(player) = world.registry.remove(id) {
                debug!("Peer {} left", id);
                if player.visible {
                    world
                        .ghosts
                        .adopt(crate::player::ghost::GhostPlayer::from_player(&player));
                }
            }
        }

        ServerMessage::Move { id, x, y } => {
            // Move may arrive before Join; create the peer either way
            if !world.registry.contains(id) {
                world.registry.upsert(id);
            }
            let geometry = *world.room.geometry();
            if let Some(player) = world.registry.get_mut(id) {
                movement::enqueue_move(player, x, y, &geometry);
            }
        }

        ServerMessage::Jump { id, x, y } => {
            let geometry = *world.room.geometry();
            let settled = world.room.is_settled();
            if let Some(player) = world.registry.get_mut(id) {
                player.teleport(geometry.clamp_x(x), geometry.clamp_y(y));
                if settled && !player.visible {
                    player.visible = true;
                }
            }
        }

        ServerMessage::Facing { id, facing } => {
            if let Some(player) = world.registry.get_mut(id) {
                player.facing = Facing::from_wire(facing);
            }
        }

        ServerMessage::Speed { id, speed } => {
            if let Some(player) = world.registry.get_mut(id) {
                player.move_speed = clamp_speed(speed);
            }
        }

        ServerMessage::Sprite { id, name, index } => {
            if let Some(player) = world.registry.get_mut(id) {
                player.sprite_name = name;
                player.sprite_index = index;
            }
        }

        ServerMessage::Hidden { id, hidden } => {
            if let Some(player) = world.registry.get_mut(id) {
                player.hidden = hidden;
            }
        }

        ServerMessage::SystemGraphic { id, name } => {
            if let Some(player) = world.registry.get_mut(id) {
                player.system_skin = Some(name);
            }
        }

        ServerMessage::Flash {
            id,
            red,
            green,
            blue,
            power,
            frames,
        } => {
            if let Some(player) = world.registry.get_mut(id) {
                EffectBroadcaster::apply_flash(
                    player,
                    FlashDescriptor {
                        red,
                        green,
                        blue,
                        power,
                        frames,
                    },
                );
            }
        }

        ServerMessage::RepeatingFlash {
            id,
            red,
            green,
            blue,
            power,
            frames,
        } => {
            if let Some(player) = world.registry.get_mut(id) {
                EffectBroadcaster::apply_repeating_flash(
                    player,
                    FlashDescriptor {
                        red,
                        green,
                        blue,
                        power,
                        frames,
                    },
                );
            }
        }

        ServerMessage::RemoveRepeatingFlash { id } => {
            if let Some(player) = world.registry.get_mut(id) {
                EffectBroadcaster::remove_repeating_flash(player);
            }
        }

        ServerMessage::Name { id, name } => {
            if let Some(player) = world.registry.get_mut(id) {
                player.display_name = Some(name);
            }
        }

        ServerMessage::Chat {
            id,
            scope,
            room_id,
            name,
            text,
        } => {
            host.chat_message(id, scope, room_id, &name, &text);
        }

        ServerMessage::SoundEffect { id, sound } => {
            host.play_sound(id, &sound);
        }

        // Receiving pictures is never gated, and a remote Show alone does
        // not mark the id as synced for sending.
        ServerMessage::ShowPicture {
            id,
            pic_id,
            params,
            origin,
        } => {
            host.show_picture(translate_remote_id(pic_id, id), &params, &origin);
        }

        ServerMessage::MovePicture {
            id,
            pic_id,
            params,
            origin,
            duration,
        } => {
            host.move_picture(translate_remote_id(pic_id, id), &params, &origin, duration);
        }

        ServerMessage::ErasePicture { id, pic_id } => {
            host.erase_picture(translate_remote_id(pic_id, id));
        }

        ServerMessage::ShowBattleAnim { id, anim_id } => {
            if let Some(player) = world.registry.get_mut(id) {
                player.battle_anim = Some(BattleAnim {
                    anim_id,
                    frames_left: BATTLE_ANIM_FRAMES,
                });
                host.play_battle_anim(id, translate_remote_id(anim_id, id));
            }
        }

        ServerMessage::SyncPicture { id: _, pic_id } => {
            world.gate.learn_picture(pic_id);
        }

        ServerMessage::SyncSwitch {
            id: _,
            switch_id,
            value,
        } => {
            world.gate.learn_switch(switch_id);
            host.set_switch(switch_id, value);
        }

        ServerMessage::SyncVariable { id: _, var_id, value } => {
            world.gate.learn_variable(var_id);
            host.set_variable(var_id, value);
        }

        ServerMessage::SyncEvent {
            id: _,
            event_id,
            trigger,
        } => {
            world.gate.learn_event(event_id);
            host.run_event(event_id, trigger);
        }

        ServerMessage::PictureNameList { names, prefixes } => {
            world.gate.set_picture_lists(names, prefixes);
        }

        ServerMessage::BattleAnimIdList { ids } => {
            world.gate.set_battle_anim_ids(ids);
        }
    }
}
