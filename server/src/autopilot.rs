//! Scripted avatar input for the headless server.
//!
//! With no client attached the avatar wanders: walk a while, turn, occasionally jump or
//! slide, and grab any ladder it ends up next to.

use bevy::prelude::*;
use citysim::locomotion::LADDER_PROMPT_CLIMB;
use citysim::{AvatarIntent, CitySim, LocomotionState};

use crate::systems::LastHud;

/// Seconds each leg of the walk lasts before turning.
pub const LEG_SECS: f32 = 4.0;
/// Yaw added at the end of each leg.
pub const TURN_PER_LEG: f32 = 1.9;
/// Every this many legs the avatar sprints and slides.
pub const SLIDE_EVERY: u32 = 3;

#[derive(Resource, Debug, Default)]
pub struct Autopilot {
    pub intent: AvatarIntent,
    pub leg_timer: f32,
    pub legs: u32,
}

impl Autopilot {
    /// Next intent given the avatar's state and the last HUD signals.
    pub fn next(&mut self, state: LocomotionState, hud: &LastHud, dt: f32) -> AvatarIntent {
        self.leg_timer += dt;
        let mut turned = false;
        if self.leg_timer >= LEG_SECS {
            self.leg_timer = 0.0;
            self.legs += 1;
            self.intent.yaw = (self.intent.yaw + TURN_PER_LEG).rem_euclid(std::f32::consts::TAU);
            turned = true;
        }

        let climbing = matches!(state, LocomotionState::Climbing { .. });
        let at_ladder = hud.0.ladder_prompt == Some(LADDER_PROMPT_CLIMB);

        AvatarIntent {
            forward: !climbing,
            run: self.legs % SLIDE_EVERY == 0,
            dash: turned && self.legs % SLIDE_EVERY == 0,
            jump: turned && self.legs % 2 == 1,
            interact: climbing || at_ladder,
            ..self.intent
        }
    }
}

pub fn drive_avatar(mut autopilot: ResMut<Autopilot>, sim: Res<CitySim>, hud: Res<LastHud>) {
    let dt = 1.0 / citysim::FIXED_TIMESTEP_HZ as f32;
    let intent = autopilot.next(sim.avatar.state, &hud, dt);
    autopilot.intent = intent;
}
