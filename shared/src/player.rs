//! Avatar constants and per-tick input/state types.

use bevy::prelude::*;

use crate::movement::SweepParams;
use crate::physics::VerticalBody;
use crate::spatial::VolumeId;
use crate::teleport::TeleportCooldown;

/// Collision radius around the avatar's eye point.
pub const AVATAR_RADIUS: f32 = 1.25;

/// Eye height above the feet. The avatar's position is its eye.
pub const AVATAR_EYE_HEIGHT: f32 = 2.0;

/// Walking speed (units per second).
pub const WALK_SPEED: f32 = 7.2;

/// Sprint speed (units per second).
pub const SPRINT_SPEED: f32 = 10.8;

/// Multiplier applied while the run modifier is held.
pub const RUN_MULTIPLIER: f32 = 1.6;

pub const AVATAR_SWEEP: SweepParams = SweepParams {
    radius: AVATAR_RADIUS,
    max_step: 0.05,
    min_steps: 4,
};

/// Total distance one slide covers.
pub const SLIDE_DISTANCE: f32 = 6.0;
pub const SLIDE_SPEED_MULTIPLIER: f32 = 1.5;
pub const SLIDE_SWEEP: SweepParams = SweepParams {
    radius: AVATAR_RADIUS,
    max_step: 0.05,
    min_steps: 3,
};
/// A slide stops rather than carry the avatar off an edge deeper than this.
pub const SLIDE_EDGE_DROP: f32 = 0.3;

/// Ladder activation reach (horizontal and vertical).
pub const LADDER_REACH: f32 = 1.2;
pub const CLIMB_SPEED: f32 = 2.8;

/// Preferred respawn point on the XZ plane.
pub const RESPAWN_POINT: Vec2 = Vec2::new(-95.0, -95.0);

/// Spawn candidates tried when the preferred point is obstructed.
pub const SPAWN_FALLBACKS: [Vec2; 5] = [
    Vec2::new(30.0, 30.0),
    Vec2::new(-30.0, 30.0),
    Vec2::new(30.0, -30.0),
    Vec2::new(-30.0, -30.0),
    Vec2::new(0.0, 0.0),
];

/// Emergency drop-in point; scanned upward until clear.
pub const EMERGENCY_SPAWN: Vec3 = Vec3::new(0.0, 25.0, 0.0);
pub const EMERGENCY_SCAN_STEP: f32 = 5.0;
pub const EMERGENCY_SCAN_LIMIT: usize = 64;

/// Control intent sampled once per tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AvatarIntent {
    pub forward: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
    /// Facing in radians around +Y (0 looks down -Z).
    pub yaw: f32,
    pub jump: bool,
    pub run: bool,
    pub sprint: bool,
    /// Slide trigger; only acts while running.
    pub dash: bool,
    /// Held to climb ladders.
    pub interact: bool,
}

impl AvatarIntent {
    pub fn has_movement(&self) -> bool {
        self.forward || self.back || self.left || self.right
    }

    /// Normalized wish direction on the XZ plane, or zero.
    ///
    /// In Bevy: +X right, +Y up, -Z forward.
    pub fn wish_direction(&self) -> Vec3 {
        let forward = facing(self.yaw);
        let right = Vec3::new(self.yaw.cos(), 0.0, -self.yaw.sin());

        let mut dir = Vec3::ZERO;
        if self.forward {
            dir += forward;
        }
        if self.back {
            dir -= forward;
        }
        if self.right {
            dir += right;
        }
        if self.left {
            dir -= right;
        }
        dir.normalize_or_zero()
    }

    /// Horizontal speed for the held modifiers.
    pub fn speed(&self) -> f32 {
        let base = if self.sprint { SPRINT_SPEED } else { WALK_SPEED };
        if self.run {
            base * RUN_MULTIPLIER
        } else {
            base
        }
    }
}

/// Horizontal facing vector for a yaw angle.
pub fn facing(yaw: f32) -> Vec3 {
    Vec3::new(-yaw.sin(), 0.0, -yaw.cos())
}

/// Locomotion mode of the avatar.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LocomotionState {
    #[default]
    Grounded,
    Airborne,
    Sliding {
        remaining: f32,
        direction: Vec3,
    },
    Climbing {
        ladder: VolumeId,
        bottom_y: f32,
        top_y: f32,
    },
}

/// The controlled avatar.
#[derive(Debug, Clone)]
pub struct Avatar {
    /// Eye position.
    pub position: Vec3,
    pub yaw: f32,
    pub body: VerticalBody,
    pub state: LocomotionState,
    pub teleport: TeleportCooldown,
}

impl Avatar {
    pub fn new(eye: Vec3) -> Self {
        let feet = eye.y - AVATAR_EYE_HEIGHT;
        Self {
            position: eye,
            yaw: 0.0,
            body: VerticalBody {
                feet_y: feet,
                velocity_y: 0.0,
                grounded: feet <= 0.0,
            },
            state: if feet <= 0.0 {
                LocomotionState::Grounded
            } else {
                LocomotionState::Airborne
            },
            teleport: TeleportCooldown::default(),
        }
    }

    pub fn feet_y(&self) -> f32 {
        self.position.y - AVATAR_EYE_HEIGHT
    }

    /// Set the eye from the vertical body.
    pub fn sync_eye(&mut self) {
        self.position.y = self.body.feet_y + AVATAR_EYE_HEIGHT;
    }
}

/// Read-only signals for a HUD.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HudSignals {
    pub ladder_prompt: Option<&'static str>,
    pub sprinting: bool,
    pub sliding: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wish_direction_follows_yaw() {
        let intent = AvatarIntent {
            forward: true,
            ..default()
        };
        assert!((intent.wish_direction() - Vec3::NEG_Z).length() < 1e-5);

        let turned = AvatarIntent {
            forward: true,
            yaw: std::f32::consts::FRAC_PI_2,
            ..default()
        };
        assert!((turned.wish_direction() - Vec3::NEG_X).length() < 1e-5);

        let diagonal = AvatarIntent {
            forward: true,
            right: true,
            ..default()
        };
        assert!((diagonal.wish_direction().length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_speed_modifiers() {
        let walk = AvatarIntent::default();
        let run = AvatarIntent { run: true, ..default() };
        let sprint = AvatarIntent { sprint: true, ..default() };
        assert_eq!(walk.speed(), WALK_SPEED);
        assert!((run.speed() - WALK_SPEED * RUN_MULTIPLIER).abs() < 1e-5);
        assert_eq!(sprint.speed(), SPRINT_SPEED);
    }
}
