//! Fixed-tick systems driving the city simulation.

use bevy::prelude::*;
use citysim::{CitySim, HudSignals};

use crate::autopilot::Autopilot;

/// Log a stats line every this many ticks.
pub const STATS_INTERVAL_TICKS: u64 = 600;

/// HUD signals from the most recent tick.
#[derive(Resource, Debug, Default, Clone, Copy, PartialEq)]
pub struct LastHud(pub HudSignals);

/// Advance the simulation by one fixed tick.
pub fn step_city(mut sim: ResMut<CitySim>, autopilot: Res<Autopilot>, mut hud: ResMut<LastHud>) {
    let dt = 1.0 / citysim::FIXED_TIMESTEP_HZ as f32;
    let signals = sim.tick(dt, &autopilot.intent);
    hud.0 = signals;
}

/// Log HUD transitions (ladder prompts, sprint and slide toggles).
pub fn report_hud_changes(hud: Res<LastHud>, mut previous: Local<LastHud>) {
    if *hud == *previous {
        return;
    }
    if hud.0.ladder_prompt != previous.0.ladder_prompt {
        if let Some(prompt) = hud.0.ladder_prompt {
            info!("HUD: {}", prompt);
        }
    }
    if hud.0.sliding && !previous.0.sliding {
        debug!("Avatar sliding");
    }
    if hud.0.sprinting != previous.0.sprinting {
        debug!("Avatar sprinting: {}", hud.0.sprinting);
    }
    *previous = *hud;
}

/// Periodic summary of where everything is.
pub fn report_stats(sim: Res<CitySim>) {
    if sim.tick_count == 0 || sim.tick_count % STATS_INTERVAL_TICKS != 0 {
        return;
    }
    let snapshot = sim.snapshot();
    let held = sim.fleet.vehicles.iter().filter(|v| v.hold_timer > 0.0).count();
    info!(
        "Tick {}: avatar at ({:.1}, {:.1}, {:.1}) {:?}, {} bots, {} vehicles ({} held)",
        snapshot.tick,
        snapshot.avatar.position.x,
        snapshot.avatar.position.y,
        snapshot.avatar.position.z,
        snapshot.avatar_state,
        snapshot.bots.len(),
        snapshot.vehicles.len(),
        held
    );
}
