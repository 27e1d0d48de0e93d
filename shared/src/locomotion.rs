//! Avatar locomotion: walking with step-up, sliding dash, ladder climbing, teleporting,
//! and safe spawn resolution.

use bevy::prelude::*;

use crate::movement::{resolve_horizontal, step_up_target};
use crate::physics::{FOOT_RADIUS, MAX_AUTO_STEP};
use crate::player::*;
use crate::spatial::{SolidRegistry, VolumeId};
use crate::teleport::{self, Teleporter};
use crate::volume::xz;

pub const LADDER_PROMPT_CLIMB: &str = "Hold interact to climb";
pub const LADDER_PROMPT_CLIMBING: &str = "Release interact to drop";

/// Advance the avatar by one tick. Teleporters are handled by [`apply_avatar_teleport`].
pub fn step_avatar(
    avatar: &mut Avatar,
    intent: &AvatarIntent,
    registry: &SolidRegistry,
    map_half: f32,
    dt: f32,
) -> HudSignals {
    avatar.yaw = intent.yaw;

    if let LocomotionState::Climbing { ladder, bottom_y, top_y } = avatar.state {
        climb(avatar, intent, registry, ladder, bottom_y, top_y, dt);
        return hud(avatar, intent, registry);
    }

    if intent.interact {
        if let Some(id) = registry.ladder_near(xz(avatar.position), avatar.body.feet_y, LADDER_REACH) {
            if let Some(span) = registry.get(id).and_then(|e| e.traits.ladder) {
                avatar.state = LocomotionState::Climbing {
                    ladder: id,
                    bottom_y: span.bottom_y,
                    top_y: span.top_y,
                };
                debug!("Avatar started climbing ladder {:?}", id);
                climb(avatar, intent, registry, id, span.bottom_y, span.top_y, dt);
                return hud(avatar, intent, registry);
            }
        }
    }

    match avatar.state {
        LocomotionState::Sliding { remaining, direction } => {
            slide(avatar, registry, remaining, direction, dt);
        }
        _ if intent.dash && intent.run && avatar.body.grounded => {
            let direction = facing(avatar.yaw);
            avatar.state = LocomotionState::Sliding {
                remaining: SLIDE_DISTANCE,
                direction,
            };
            slide(avatar, registry, SLIDE_DISTANCE, direction, dt);
        }
        _ => walk(avatar, intent, registry, dt),
    }

    let sliding = matches!(avatar.state, LocomotionState::Sliding { .. });
    if intent.jump && !sliding {
        avatar.body.try_jump();
    }
    avatar.body.step(registry, xz(avatar.position), dt);
    avatar.sync_eye();

    let limit = map_half - 1.0;
    avatar.position.x = avatar.position.x.clamp(-limit, limit);
    avatar.position.z = avatar.position.z.clamp(-limit, limit);

    if !sliding {
        avatar.state = if avatar.body.grounded {
            LocomotionState::Grounded
        } else {
            LocomotionState::Airborne
        };
    }

    hud(avatar, intent, registry)
}

fn walk(avatar: &mut Avatar, intent: &AvatarIntent, registry: &SolidRegistry, dt: f32) {
    let dir = intent.wish_direction();
    if dir == Vec3::ZERO {
        return;
    }

    let delta = dir * intent.speed() * dt;
    let result = resolve_horizontal(registry, avatar.position, delta, &AVATAR_SWEEP, None);
    avatar.position = result.position;

    if let Some(top) = step_up_target(registry, avatar.position, avatar.body.feet_y, dir) {
        let lifted = Vec3::new(avatar.position.x, top + AVATAR_EYE_HEIGHT, avatar.position.z);
        if !registry.is_blocked(lifted, AVATAR_RADIUS) {
            trace!("Step-up from {:.2} to {:.2}", avatar.body.feet_y, top);
            avatar.body.land_on(top);
            avatar.sync_eye();
        }
    }
}

fn slide(avatar: &mut Avatar, registry: &SolidRegistry, remaining: f32, direction: Vec3, dt: f32) {
    let speed = WALK_SPEED * RUN_MULTIPLIER * SLIDE_SPEED_MULTIPLIER;
    let distance = (speed * dt).min(remaining);
    let delta = direction * distance;
    let feet = avatar.body.feet_y;
    let from = avatar.position;

    let steps = SLIDE_SWEEP.steps_for(distance);
    let clear = (1..=steps).all(|i| {
        let sample = from + delta * (i as f32 / steps as f32);
        !registry.is_blocked(sample, SLIDE_SWEEP.radius)
            && registry.support_height(xz(sample), feet, FOOT_RADIUS, MAX_AUTO_STEP) >= feet - SLIDE_EDGE_DROP
    });

    if !clear {
        avatar.state = LocomotionState::Grounded;
        return;
    }

    avatar.position = from + delta;
    let left = remaining - distance;
    avatar.state = if left <= 1e-4 {
        LocomotionState::Grounded
    } else {
        LocomotionState::Sliding {
            remaining: left,
            direction,
        }
    };
}

fn climb(
    avatar: &mut Avatar,
    intent: &AvatarIntent,
    registry: &SolidRegistry,
    ladder: VolumeId,
    bottom_y: f32,
    top_y: f32,
    dt: f32,
) {
    let Some(span) = registry.get(ladder).and_then(|e| e.traits.ladder) else {
        // Ladder went away mid-climb.
        avatar.state = LocomotionState::Airborne;
        avatar.body.grounded = false;
        return;
    };

    if !intent.interact {
        avatar.position = Vec3::new(span.column.x, bottom_y + AVATAR_EYE_HEIGHT, span.column.y);
        avatar.body.land_on(bottom_y);
        avatar.state = LocomotionState::Grounded;
        debug!("Avatar let go of ladder {:?}", ladder);
        return;
    }

    let target = top_y + AVATAR_EYE_HEIGHT;
    let eye = (avatar.position.y + CLIMB_SPEED * dt).min(target);
    avatar.position = Vec3::new(span.column.x, eye, span.column.y);
    avatar.body.feet_y = eye - AVATAR_EYE_HEIGHT;
    avatar.body.velocity_y = 0.0;
    avatar.body.grounded = false;

    if eye >= target {
        avatar.position = Vec3::new(span.dismount.x, target, span.dismount.y);
        avatar.body.land_on(top_y);
        avatar.state = LocomotionState::Grounded;
        debug!("Avatar reached the top of ladder {:?}", ladder);
    }
}

fn hud(avatar: &Avatar, intent: &AvatarIntent, registry: &SolidRegistry) -> HudSignals {
    let ladder_prompt = match avatar.state {
        LocomotionState::Climbing { .. } => Some(LADDER_PROMPT_CLIMBING),
        _ => registry
            .ladder_near(xz(avatar.position), avatar.body.feet_y, LADDER_REACH)
            .map(|_| LADDER_PROMPT_CLIMB),
    };
    HudSignals {
        ladder_prompt,
        sprinting: intent.sprint && intent.has_movement(),
        sliding: matches!(avatar.state, LocomotionState::Sliding { .. }),
    }
}

/// Move the avatar through a pad it is standing on, if its cooldown allows.
pub fn apply_avatar_teleport(
    avatar: &mut Avatar,
    registry: &SolidRegistry,
    teleporters: &[Teleporter],
    dt: f32,
) -> bool {
    avatar.teleport.tick(dt);
    if !avatar.teleport.ready() || matches!(avatar.state, LocomotionState::Climbing { .. }) {
        return false;
    }
    let Some(pad) = teleport::triggered(teleporters, xz(avatar.position)) else {
        return false;
    };

    let arrival = pad.clear_arrival(registry, AVATAR_EYE_HEIGHT, AVATAR_RADIUS);
    let feet = registry.support_height(arrival, 0.0, FOOT_RADIUS, MAX_AUTO_STEP);
    avatar.body.land_on(feet);
    avatar.position = Vec3::new(arrival.x, feet + AVATAR_EYE_HEIGHT, arrival.y);
    avatar.state = LocomotionState::Grounded;
    avatar.teleport.arm();
    info!("Avatar teleported from {:?} to {:?}", pad.pad, arrival);
    true
}

/// Eye position for a spawn at `preferred`, falling back through fixed candidates and
/// finally an elevated drop-in above the map center.
pub fn resolve_safe_spawn(registry: &SolidRegistry, preferred: Vec2) -> Vec3 {
    for (i, candidate) in std::iter::once(preferred).chain(SPAWN_FALLBACKS).enumerate() {
        let feet = registry.support_height(candidate, 0.0, FOOT_RADIUS, MAX_AUTO_STEP);
        let eye = Vec3::new(candidate.x, feet + AVATAR_EYE_HEIGHT, candidate.y);
        if !registry.is_blocked(eye, AVATAR_RADIUS) {
            if i > 0 {
                warn!("Spawn {:?} obstructed, using fallback {:?}", preferred, candidate);
            }
            return eye;
        }
    }

    let mut eye = EMERGENCY_SPAWN;
    for _ in 0..EMERGENCY_SCAN_LIMIT {
        if !registry.is_blocked(eye, AVATAR_RADIUS) {
            break;
        }
        eye.y += EMERGENCY_SCAN_STEP;
    }
    warn!("No clear spawn on the ground, dropping in from {:?}", eye);
    eye
}

/// A fresh avatar at `eye`, standing if there is support under its feet.
pub fn spawn_avatar(registry: &SolidRegistry, eye: Vec3) -> Avatar {
    let mut avatar = Avatar::new(eye);
    let feet = avatar.feet_y();
    if registry.support_height(xz(eye), feet, FOOT_RADIUS, MAX_AUTO_STEP) >= feet - 1e-4 {
        avatar.body.land_on(feet);
        avatar.state = LocomotionState::Grounded;
    }
    avatar
}

/// Put the avatar back at the respawn point with a clean state.
pub fn respawn(avatar: &mut Avatar, registry: &SolidRegistry) {
    *avatar = spawn_avatar(registry, resolve_safe_spawn(registry, RESPAWN_POINT));
}
