//! Patrol bots: reactive wanderers that share the avatar's sweep resolver.
//!
//! Each bot owns a solid body volume in the registry so the avatar (and other bots)
//! collide with it; the bot skips its own body when probing.

use std::f32::consts::{FRAC_PI_2, FRAC_PI_8, PI, TAU};

use bevy::prelude::*;
use rand::Rng;

use crate::city::CityLayout;
use crate::movement::{sweep_clear, SweepParams};
use crate::player::facing;
use crate::spatial::{SolidRegistry, VolumeId};
use crate::teleport::{self, TeleportCooldown, Teleporter, BOT_TELEPORT_JITTER};
use crate::volume::{xz, Volume, VolumeCategory, VolumeTraits};

// =============================================================================
// BOT GEOMETRY
// =============================================================================

pub const BOT_RADIUS: f32 = 1.1;

/// Height of the bot's probe point (body center) above the ground.
pub const BOT_CENTER_HEIGHT: f32 = 1.2;

/// Size of the registered body box.
pub const BOT_BODY_SIZE: Vec3 = Vec3::new(1.0, 2.4, 1.0);

pub const BOT_SWEEP: SweepParams = SweepParams {
    radius: BOT_RADIUS,
    max_step: 0.1,
    min_steps: 2,
};

// =============================================================================
// BOT STEERING
// =============================================================================

pub const BOT_MIN_SPEED: f32 = 2.0;
pub const BOT_MAX_SPEED: f32 = 5.0;

/// How long a heading persists before it is re-rolled.
pub const BOT_DWELL_MIN: f32 = 3.0;
pub const BOT_DWELL_MAX: f32 = 7.0;

/// Bots turn around instead of stepping closer than this to the map edge.
pub const BOT_EDGE_MARGIN: f32 = 20.0;

pub const BOT_WAYPOINT_COUNT: usize = 4;
pub const ROOFTOP_WAYPOINT_CHANCE: f64 = 0.25;
/// Chance, on dwell expiry, of heading for the current waypoint instead of a random heading.
pub const WAYPOINT_BIAS: f64 = 0.5;
pub const WAYPOINT_REACHED_DISTANCE: f32 = 4.0;

const SPAWN_ATTEMPTS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    pub position: Vec2,
    /// On a roof; ground bots skip these when steering.
    pub rooftop: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatrolBot {
    /// Body center.
    pub position: Vec3,
    /// Yaw in radians (0 looks down -Z).
    pub heading: f32,
    pub speed: f32,
    /// Time left on the current heading.
    pub dwell: f32,
    pub waypoints: Vec<Waypoint>,
    pub wp_index: usize,
    pub body: VolumeId,
    pub teleport: TeleportCooldown,
}

pub fn body_volume(center: Vec3) -> Volume {
    Volume::from_center_size(center, BOT_BODY_SIZE)
}

impl PatrolBot {
    /// The next waypoint on the ground, advancing past rooftop ones.
    pub fn current_ground_waypoint(&mut self) -> Option<Vec2> {
        for _ in 0..self.waypoints.len() {
            let wp = self.waypoints.get(self.wp_index)?;
            if !wp.rooftop {
                return Some(wp.position);
            }
            self.advance_waypoint();
        }
        None
    }

    fn advance_waypoint(&mut self) {
        if !self.waypoints.is_empty() {
            self.wp_index = (self.wp_index + 1) % self.waypoints.len();
        }
    }

    fn reroll(&mut self, rng: &mut impl Rng) {
        self.dwell = rng.gen_range(BOT_DWELL_MIN..BOT_DWELL_MAX);
        if rng.gen_bool(WAYPOINT_BIAS) {
            if let Some(target) = self.current_ground_waypoint() {
                let to = target - xz(self.position);
                if to.length() > 1e-3 {
                    self.heading = (-to.x).atan2(-to.y);
                    return;
                }
            }
        }
        self.heading = rng.gen_range(0.0..TAU);
    }

    /// Advance one tick. Writes the body volume back to the registry.
    pub fn step(&mut self, registry: &mut SolidRegistry, map_half: f32, rng: &mut impl Rng, dt: f32) {
        self.dwell -= dt;
        if self.dwell <= 0.0 {
            self.reroll(rng);
        }

        if let Some(target) = self.waypoints.get(self.wp_index) {
            if !target.rooftop && target.position.distance(xz(self.position)) < WAYPOINT_REACHED_DISTANCE {
                self.advance_waypoint();
            }
        }

        let delta = facing(self.heading) * self.speed * dt;
        let next = self.position + delta;
        let limit = map_half - BOT_EDGE_MARGIN;
        if next.x.abs() > limit || next.z.abs() > limit {
            self.heading = (self.heading + PI).rem_euclid(TAU);
            return;
        }

        if sweep_clear(registry, self.position, delta, &BOT_SWEEP, Some(self.body)) {
            self.position = next;
            registry.set_bounds(self.body, body_volume(self.position));
        } else {
            let side = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
            let turn = FRAC_PI_2 + rng.gen_range(-FRAC_PI_8..FRAC_PI_8);
            self.heading = (self.heading + side * turn).rem_euclid(TAU);
            trace!("Bot {:?} blocked, turning to {:.2}", self.body, self.heading);
        }
    }

    /// Take a pad the bot is standing on. Arrivals are jittered so bots do not stack.
    pub fn try_teleport(
        &mut self,
        registry: &mut SolidRegistry,
        teleporters: &[Teleporter],
        map_half: f32,
        rng: &mut impl Rng,
        dt: f32,
    ) -> bool {
        self.teleport.tick(dt);
        if !self.teleport.ready() {
            return false;
        }
        let Some(pad) = teleport::triggered(teleporters, xz(self.position)) else {
            return false;
        };

        let arrival = pad.clear_arrival(registry, BOT_CENTER_HEIGHT, BOT_RADIUS);
        let jitter = Vec2::new(
            rng.gen_range(-BOT_TELEPORT_JITTER..=BOT_TELEPORT_JITTER),
            rng.gen_range(-BOT_TELEPORT_JITTER..=BOT_TELEPORT_JITTER),
        );
        let limit = map_half - BOT_EDGE_MARGIN;
        let jittered = (arrival + jitter).clamp(Vec2::splat(-limit), Vec2::splat(limit));
        let landing = if registry.is_blocked_except(
            Vec3::new(jittered.x, BOT_CENTER_HEIGHT, jittered.y),
            BOT_RADIUS,
            Some(self.body),
        ) {
            arrival
        } else {
            jittered
        };

        self.position = Vec3::new(landing.x, BOT_CENTER_HEIGHT, landing.y);
        registry.set_bounds(self.body, body_volume(self.position));
        self.teleport.arm();
        debug!("Bot {:?} teleported to {:?}", self.body, landing);
        true
    }
}

fn random_waypoints(layout: &CityLayout, rng: &mut impl Rng) -> Vec<Waypoint> {
    (0..BOT_WAYPOINT_COUNT)
        .filter_map(|_| {
            if !layout.buildings.is_empty() && rng.gen_bool(ROOFTOP_WAYPOINT_CHANCE) {
                let b = &layout.buildings[rng.gen_range(0..layout.buildings.len())];
                Some(Waypoint {
                    position: b.center,
                    rooftop: true,
                })
            } else if !layout.spawn_points.is_empty() {
                let p = &layout.spawn_points[rng.gen_range(0..layout.spawn_points.len())];
                Some(Waypoint {
                    position: p.position,
                    rooftop: false,
                })
            } else {
                None
            }
        })
        .collect()
}

/// Spawn `count` bots on clear road spawn points and register their bodies.
pub fn spawn_bots(
    registry: &mut SolidRegistry,
    layout: &CityLayout,
    count: usize,
    rng: &mut impl Rng,
) -> Vec<PatrolBot> {
    let limit = layout.map_half - BOT_EDGE_MARGIN;
    let candidates: Vec<Vec2> = layout
        .spawn_points
        .iter()
        .map(|p| p.position)
        .filter(|p| p.x.abs() < limit && p.y.abs() < limit)
        .collect();
    if candidates.is_empty() {
        warn!("No spawn points inside the bot margin, skipping bots");
        return Vec::new();
    }

    let mut bots = Vec::with_capacity(count);
    for _ in 0..count {
        let spot = (0..SPAWN_ATTEMPTS)
            .map(|_| candidates[rng.gen_range(0..candidates.len())])
            .map(|p| Vec3::new(p.x, BOT_CENTER_HEIGHT, p.y))
            .find(|c| !registry.is_blocked(*c, BOT_RADIUS));
        let Some(position) = spot else {
            warn!("Could not find a clear spot for bot {}", bots.len());
            continue;
        };

        let body = registry.register(
            body_volume(position),
            VolumeTraits::SOLID,
            VolumeCategory::AgentBody,
            None,
        );
        bots.push(PatrolBot {
            position,
            heading: rng.gen_range(0.0..TAU),
            speed: rng.gen_range(BOT_MIN_SPEED..BOT_MAX_SPEED),
            dwell: rng.gen_range(BOT_DWELL_MIN..BOT_DWELL_MAX),
            waypoints: random_waypoints(layout, rng),
            wp_index: 0,
            body,
            teleport: TeleportCooldown::default(),
        });
    }

    debug!("Spawned {} patrol bots", bots.len());
    bots
}

/// Remove a bot's body from the registry.
pub fn despawn_bot(registry: &mut SolidRegistry, bot: &PatrolBot) {
    if registry.unregister(bot.body).is_none() {
        warn!("Bot body {:?} was already gone", bot.body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roads::SpawnPoint;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const DT: f32 = 1.0 / 60.0;

    fn open_layout(map_half: f32) -> CityLayout {
        CityLayout {
            map_half,
            spawn_points: vec![SpawnPoint {
                position: Vec2::ZERO,
                road: 0,
            }],
            ..default()
        }
    }

    #[test]
    fn test_bot_stays_inside_margin() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut registry = SolidRegistry::new();
        let layout = open_layout(40.0);
        let mut bots = spawn_bots(&mut registry, &layout, 1, &mut rng);
        let bot = &mut bots[0];
        bot.speed = BOT_MAX_SPEED;

        for _ in 0..6000 {
            bot.step(&mut registry, layout.map_half, &mut rng, DT);
            assert!(bot.position.x.abs() <= 20.0);
            assert!(bot.position.z.abs() <= 20.0);
        }
        let body = registry.get(bot.body).unwrap();
        assert!((body.volume.center() - bot.position).length() < 1e-4);
    }

    #[test]
    fn test_blocked_bot_turns_without_moving() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut registry = SolidRegistry::new();
        let layout = open_layout(600.0);
        let mut bots = spawn_bots(&mut registry, &layout, 1, &mut rng);
        let bot = &mut bots[0];
        bot.heading = 0.0;
        bot.dwell = 100.0;
        registry.register(
            Volume::new(Vec3::new(-5.0, 0.0, -1.15), Vec3::new(5.0, 4.0, -1.12)),
            VolumeTraits::SOLID,
            VolumeCategory::BuildingWall,
            None,
        );

        let before = bot.position;
        bot.step(&mut registry, 600.0, &mut rng, DT);
        assert_eq!(bot.position, before);
        let turned = (bot.heading - 0.0).rem_euclid(TAU);
        let off = turned.min(TAU - turned);
        assert!(off >= FRAC_PI_2 - FRAC_PI_8 - 1e-4 && off <= FRAC_PI_2 + FRAC_PI_8 + 1e-4);
    }

    #[test]
    fn test_bot_bodies_block_the_avatar_until_despawned() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut registry = SolidRegistry::new();
        let layout = open_layout(600.0);
        let bots = spawn_bots(&mut registry, &layout, 1, &mut rng);
        let probe = Vec3::new(0.0, 2.0, 1.5);
        assert!(registry.is_blocked(probe, 1.25));

        despawn_bot(&mut registry, &bots[0]);
        assert!(!registry.is_blocked(probe, 1.25));
        assert!(registry.get(bots[0].body).is_none());
    }

    #[test]
    fn test_bot_teleport_jitter() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut registry = SolidRegistry::new();
        let layout = open_layout(600.0);
        let mut bots = spawn_bots(&mut registry, &layout, 1, &mut rng);
        let bot = &mut bots[0];
        let pads = [Teleporter {
            pad: Vec2::ZERO,
            destination: Vec2::new(200.0, 0.0),
        }];

        assert!(bot.try_teleport(&mut registry, &pads, 600.0, &mut rng, DT));
        let landed = xz(bot.position);
        // Arrival offset of 3 toward the center, then up to 2 of jitter per axis.
        assert!((landed.x - 197.0).abs() <= BOT_TELEPORT_JITTER + 1e-4);
        assert!(landed.y.abs() <= BOT_TELEPORT_JITTER + 1e-4);
        assert!(!bot.try_teleport(&mut registry, &pads, 600.0, &mut rng, DT));
    }

    #[test]
    fn test_rooftop_waypoints_are_skipped() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut registry = SolidRegistry::new();
        let mut bots = spawn_bots(&mut registry, &open_layout(600.0), 1, &mut rng);
        let bot = &mut bots[0];
        bot.waypoints = vec![
            Waypoint {
                position: Vec2::new(50.0, 50.0),
                rooftop: true,
            },
            Waypoint {
                position: Vec2::new(-30.0, 10.0),
                rooftop: false,
            },
        ];
        bot.wp_index = 0;
        assert_eq!(bot.current_ground_waypoint(), Some(Vec2::new(-30.0, 10.0)));
        assert_eq!(bot.wp_index, 1);
    }
}
