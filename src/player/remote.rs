use std::collections::VecDeque;

use crate::constants::movement::{
    DEFAULT_SPEED, MAX_SPEED, MIN_SPEED, MOVE_QUEUE_LIMIT, STEP_FRAMES,
};
use crate::effects::{FlashDescriptor, FlashState};
use crate::player::PeerId;

/// Facing direction of a sprite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facing {
    Up,
    Right,
    Down,
    Left,
}

impl Facing {
    /// Decode a wire facing value, clamping out-of-range input
    pub fn from_wire(value: u8) -> Self {
        match value.min(3) {
            0 => Self::Up,
            1 => Self::Right,
            2 => Self::Down,
            _ => Self::Left,
        }
    }

    pub fn to_wire(self) -> u8 {
        match self {
            Self::Up => 0,
            Self::Right => 1,
            Self::Down => 2,
            Self::Left => 3,
        }
    }

    /// Facing implied by a step direction. Horizontal movement wins on
    /// diagonals, matching how the sprite sheets are drawn.
    pub fn from_step(dx: i8, dy: i8) -> Option<Self> {
        if dx > 0 {
            Some(Self::Right)
        } else if dx < 0 {
            Some(Self::Left)
        } else if dy > 0 {
            Some(Self::Down)
        } else if dy < 0 {
            Some(Self::Up)
        } else {
            None
        }
    }
}

/// A queued position report from a peer, in tile coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveCommand {
    pub x: i32,
    pub y: i32,
}

/// An in-progress one-tile step being interpolated over several frames
#[derive(Debug, Clone, Copy)]
pub struct ActiveStep {
    pub dx: i8,
    pub dy: i8,
    pub elapsed: u8,
    pub frames: u8,
}

/// A battle animation attached to a peer, aged out after a fixed window
#[derive(Debug, Clone, Copy)]
pub struct BattleAnim {
    pub anim_id: u32,
    pub frames_left: u32,
}

/// Frames needed to cross one tile at a given move speed
pub fn frames_for_speed(speed: u8) -> u8 {
    let index = speed.clamp(MIN_SPEED, MAX_SPEED) - 1;
    STEP_FRAMES[index as usize]
}

/// Clamp a wire move speed into the valid range
pub fn clamp_speed(speed: u8) -> u8 {
    speed.clamp(MIN_SPEED, MAX_SPEED)
}

/// A remote peer's locally-mirrored avatar.
///
/// One owned aggregate: pose, sprite, movement queue, and attached effects
/// live and die together, so registry removal is a single operation.
#[derive(Debug, Clone)]
pub struct RemotePlayer {
    pub id: PeerId,
    /// Tile position (the target of any active step)
    pub x: i32,
    pub y: i32,
    pub facing: Facing,
    pub move_speed: u8,
    pub sprite_name: String,
    pub sprite_index: u8,
    pub hidden: bool,
    /// Base opacity ramp 0..=32; ramps up after first reconciled motion
    pub opacity: u8,
    /// False until the first successful step or teleport after room settle
    pub visible: bool,
    pub display_name: Option<String>,
    pub system_skin: Option<String>,
    pub move_queue: VecDeque<MoveCommand>,
    pub active_step: Option<ActiveStep>,
    pub battle_anim: Option<BattleAnim>,
    pub repeating_flash: Option<FlashDescriptor>,
    pub flash: Option<FlashState>,
}

impl RemotePlayer {
    pub fn new(id: PeerId) -> Self {
        Self {
            id,
            x: 0,
            y: 0,
            facing: Facing::Down,
            move_speed: DEFAULT_SPEED,
            sprite_name: String::new(),
            sprite_index: 0,
            hidden: false,
            opacity: 0,
            visible: false,
            display_name: None,
            system_skin: None,
            move_queue: VecDeque::new(),
            active_step: None,
            battle_anim: None,
            repeating_flash: None,
            flash: None,
        }
    }

    /// Append a move command, dropping the oldest beyond the queue bound
    pub fn push_move(&mut self, command: MoveCommand) {
        while self.move_queue.len() >= MOVE_QUEUE_LIMIT {
            self.move_queue.pop_front();
        }
        self.move_queue.push_back(command);
    }

    pub fn is_stepping(&self) -> bool {
        self.active_step.is_some()
    }

    /// Begin a one-tile step toward `(x + dx, y + dy)`
    pub fn start_step(&mut self, dx: i8, dy: i8) {
        if let Some(facing) = Facing::from_step(dx, dy) {
            self.facing = facing;
        }
        self.x += dx as i32;
        self.y += dy as i32;
        self.active_step = Some(ActiveStep {
            dx,
            dy,
            elapsed: 0,
            frames: frames_for_speed(self.move_speed),
        });
    }

    /// Advance an active step by one frame; true while still mid-step
    pub fn advance_step(&mut self) -> bool {
        match self.active_step.as_mut() {
            Some(step) => {
                step.elapsed += 1;
                if step.elapsed >= step.frames {
                    self.active_step = None;
                    false
                } else {
                    true
                }
            }
            None => false,
        }
    }

    /// Instantly relocate, discarding any step in progress
    pub fn teleport(&mut self, x: i32, y: i32) {
        self.x = x;
        self.y = y;
        self.active_step = None;
    }

    /// Render position in tile units, interpolated mid-step
    pub fn render_position(&self) -> (f32, f32) {
        match self.active_step {
            Some(step) => {
                let remaining = 1.0 - step.elapsed as f32 / step.frames as f32;
                (
                    self.x as f32 - step.dx as f32 * remaining,
                    self.y as f32 - step.dy as f32 * remaining,
                )
            }
            None => (self.x as f32, self.y as f32),
        }
    }
}
