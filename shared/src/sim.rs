//! The simulation core: one generated city plus every agent moving through it.

use std::time::Duration;

use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::city::{generate_city, CityLayout};
use crate::config::CityConfig;
use crate::locomotion::{apply_avatar_teleport, resolve_safe_spawn, respawn, spawn_avatar, step_avatar};
use crate::npc::{despawn_bot, spawn_bots, PatrolBot};
use crate::player::{Avatar, AvatarIntent, HudSignals, LocomotionState};
use crate::spatial::SolidRegistry;
use crate::traffic::{spawn_signals, TrafficSignal};
use crate::vehicle::{spawn_vehicles, VehicleFleet};

/// Simulation tick rate.
pub const FIXED_TIMESTEP_HZ: f64 = 60.0;

/// Agents draw from their own stream so tweaking them never reshuffles the layout.
const AGENT_SEED_SALT: u64 = 0x5eed_a6e7;

pub fn tick_duration() -> Duration {
    Duration::from_secs_f64(1.0 / FIXED_TIMESTEP_HZ)
}

/// Position and heading of one agent, for rendering or logging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentPose {
    pub position: Vec3,
    pub heading: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CitySnapshot {
    pub tick: u64,
    pub avatar: AgentPose,
    pub avatar_state: LocomotionState,
    pub bots: Vec<AgentPose>,
    pub vehicles: Vec<AgentPose>,
}

#[derive(Resource, Debug)]
pub struct CitySim {
    pub config: CityConfig,
    pub seed: u64,
    pub registry: SolidRegistry,
    pub layout: CityLayout,
    pub avatar: Avatar,
    pub bots: Vec<PatrolBot>,
    pub fleet: VehicleFleet,
    pub signals: Vec<TrafficSignal>,
    pub tick_count: u64,
    rng: StdRng,
}

impl CitySim {
    /// Generate the city and populate it. A config without a seed draws one from entropy.
    pub fn new(config: CityConfig) -> Self {
        let config = match config.validate() {
            Ok(()) => config,
            Err(e) => {
                warn!("{}; using default city config", e);
                CityConfig {
                    seed: config.seed,
                    ..default()
                }
            }
        };
        let seed = config.seed.unwrap_or_else(rand::random);
        if config.seed.is_none() {
            info!("No seed configured, using {}", seed);
        }

        let (mut registry, layout) = generate_city(&config, seed);
        let mut rng = StdRng::seed_from_u64(seed ^ AGENT_SEED_SALT);

        let signals = spawn_signals(&layout.intersections, &mut rng);
        let vehicles = spawn_vehicles(
            &mut registry,
            &layout.roads,
            &signals,
            config.vehicle_count as usize,
            &mut rng,
        );
        let bots = spawn_bots(&mut registry, &layout, config.bot_count as usize, &mut rng);
        let avatar = spawn_avatar(&registry, resolve_safe_spawn(&registry, Vec2::from(config.spawn_point)));

        info!(
            "City ready: {} signals, {} vehicles, {} bots, avatar at {:?}",
            signals.len(),
            vehicles.len(),
            bots.len(),
            avatar.position
        );

        Self {
            config,
            seed,
            registry,
            layout,
            avatar,
            bots,
            fleet: VehicleFleet::new(vehicles),
            signals,
            tick_count: 0,
            rng,
        }
    }

    /// Advance every agent by `dt` seconds: signals, vehicles, bots, avatar, then teleporters.
    pub fn tick(&mut self, dt: f32, intent: &AvatarIntent) -> HudSignals {
        let map_half = self.layout.map_half;

        for signal in &mut self.signals {
            signal.tick(dt);
        }
        self.fleet.tick(&self.signals, &mut self.registry, dt);

        for bot in &mut self.bots {
            bot.step(&mut self.registry, map_half, &mut self.rng, dt);
        }

        let hud = step_avatar(&mut self.avatar, intent, &self.registry, map_half, dt);

        apply_avatar_teleport(&mut self.avatar, &self.registry, &self.layout.teleporters, dt);
        for bot in &mut self.bots {
            bot.try_teleport(&mut self.registry, &self.layout.teleporters, map_half, &mut self.rng, dt);
        }

        self.tick_count += 1;
        hud
    }

    /// Remove a bot and its body. Returns false for an unknown index.
    pub fn kill_bot(&mut self, index: usize) -> bool {
        if index >= self.bots.len() {
            return false;
        }
        let bot = self.bots.remove(index);
        despawn_bot(&mut self.registry, &bot);
        info!("Bot {} removed, {} left", index, self.bots.len());
        true
    }

    pub fn respawn_avatar(&mut self) {
        respawn(&mut self.avatar, &self.registry);
        info!("Avatar respawned at {:?}", self.avatar.position);
    }

    pub fn snapshot(&self) -> CitySnapshot {
        CitySnapshot {
            tick: self.tick_count,
            avatar: AgentPose {
                position: self.avatar.position,
                heading: self.avatar.yaw,
            },
            avatar_state: self.avatar.state,
            bots: self
                .bots
                .iter()
                .map(|b| AgentPose {
                    position: b.position,
                    heading: b.heading,
                })
                .collect(),
            vehicles: self
                .fleet
                .vehicles
                .iter()
                .map(|v| AgentPose {
                    position: v.position,
                    heading: v.heading(),
                })
                .collect(),
        }
    }
}
