//! Movement reconciliation
//!
//! Turns queued position reports into smooth one-tile steps where the
//! displacement allows it, and instant relocation everywhere else. Teleport
//! is the explicit fallback for lag and packet loss, not an error.

use crate::constants::fade::{FADE_IN_STEP, OPACITY_MAX};
use crate::player::ghost::{GhostFader, GhostPlayer};
use crate::player::registry::RemotePlayerRegistry;
use crate::player::remote::{MoveCommand, RemotePlayer};
use crate::room::RoomGeometry;

/// Queue a peer's reported position, clamped into room bounds
pub fn enqueue_move(player: &mut RemotePlayer, x: i32, y: i32, geometry: &RoomGeometry) {
    player.push_move(MoveCommand {
        x: geometry.clamp_x(x),
        y: geometry.clamp_y(y),
    });
}

/// Advance all remote players by one frame.
///
/// Pops at most one command per stopped player. A player becomes visible on
/// its first reconciled motion after the room has settled, then fades in.
pub fn advance(registry: &mut RemotePlayerRegistry, geometry: &RoomGeometry, settled: bool, ghosts: &mut GhostFader) {
    for player in registry.iter_mut() {
        if player.visible && player.opacity < OPACITY_MAX {
            player.opacity = (player.opacity + FADE_IN_STEP).min(OPACITY_MAX);
        }

        if player.advance_step() {
            continue;
        }

        let Some(command) = player.move_queue.pop_front() else {
            continue;
        };
        apply_command(player, command, geometry, settled, ghosts);
    }
}

fn apply_command(
    player: &mut RemotePlayer,
    command: MoveCommand,
    geometry: &RoomGeometry,
    settled: bool,
    ghosts: &mut GhostFader,
) {
    let dx = wrap_displacement(command.x - player.x, geometry.width, geometry.loop_horizontal);
    let dy = wrap_displacement(command.y - player.y, geometry.height, geometry.loop_vertical);

    if dx == 0 && dy == 0 {
        player.teleport(command.x, command.y);
    } else if dx.abs() <= 1 && dy.abs() <= 1 {
        player.start_step(dx as i8, dy as i8);
    } else {
        // Too far to walk: relocate, leaving a fading remnant behind
        if player.visible {
            ghosts.adopt(GhostPlayer::from_player(player));
        }
        player.teleport(command.x, command.y);
    }

    if settled && !player.visible {
        player.visible = true;
    }
}

/// Reinterpret a displacement on a looping axis: moving from one edge to
/// the other reads as a full-map jump but is really a one-tile wrap step.
fn wrap_displacement(delta: i32, size: i32, looping: bool) -> i32 {
    if looping && size > 1 && delta.abs() == size - 1 {
        -delta.signum()
    } else {
        delta
    }
}
