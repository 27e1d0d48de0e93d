//! City Server - Headless Bevy app that generates a city and runs its simulation

mod autopilot;
mod systems;
mod world;

use bevy::app::ScheduleRunnerPlugin;
use bevy::prelude::*;
use citysim::{tick_duration, CitySim, FIXED_TIMESTEP_HZ};

fn main() {
    let mut app = App::new();

    // Headless plugins (no rendering).
    // Run the main loop at the fixed tick rate so FixedUpdate fires once per frame.
    app.add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(tick_duration())));
    app.add_plugins(bevy::log::LogPlugin::default());
    app.insert_resource(Time::<Fixed>::from_hz(FIXED_TIMESTEP_HZ));

    app.init_resource::<autopilot::Autopilot>();
    app.init_resource::<systems::LastHud>();

    app.add_systems(Startup, world::setup_city);

    // Fixed tick: produce the avatar's intent, step the city, then report.
    app.add_systems(
        FixedUpdate,
        (
            autopilot::drive_avatar,
            systems::step_city,
            systems::report_hud_changes,
            systems::report_stats,
        )
            .chain()
            .run_if(resource_exists::<CitySim>),
    );

    info!("Starting city server at {} Hz", FIXED_TIMESTEP_HZ);
    app.run();
}
