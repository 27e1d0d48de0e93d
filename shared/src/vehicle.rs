//! Ambient road traffic.
//!
//! Vehicles shuttle back and forth along one axis-aligned road, pinned to its centerline.
//! Each one owns a solid body in the registry that blocks agents and rays; vehicles
//! themselves only avoid each other and obey the signal bound to their road. Updates run
//! at a fixed 15 Hz inside the 60 Hz simulation tick.

use bevy::prelude::*;
use rand::Rng;

use crate::roads::{RoadAxis, RoadSegment};
use crate::spatial::{SolidRegistry, VolumeId};
use crate::traffic::TrafficSignal;
use crate::volume::{xz, Volume, VolumeCategory, VolumeTraits};

// =============================================================================
// TRAFFIC TUNING
// =============================================================================

pub const VEHICLE_TICK_HZ: f32 = 15.0;
pub const VEHICLE_MIN_SPEED: f32 = 12.0;
pub const VEHICLE_MAX_SPEED: f32 = 20.0;
/// Height of a vehicle's reference point above the road.
pub const VEHICLE_RIDE_HEIGHT: f32 = 0.6;
/// Turnaround points sit this far inside each road end.
pub const VEHICLE_PATH_INSET: f32 = 2.0;
/// A vehicle turns around once this close to the end of its path.
pub const TURNAROUND_DISTANCE: f32 = 0.5;
/// Stop for a red signal this close ahead.
pub const SIGNAL_HOLD_DISTANCE: f32 = 6.0;
/// A signal binds to a road whose surface it lies within this tolerance of.
pub const SIGNAL_BIND_TOLERANCE: f32 = 4.0;
/// Hold when another vehicle is this close to the next position.
pub const FOLLOW_DISTANCE: f32 = 1.0;
/// Spawns closer than this to another vehicle get nudged along the road.
pub const SPAWN_SEPARATION: f32 = 1.5;
const SPAWN_NUDGE_ATTEMPTS: usize = 8;
/// A vehicle held by traffic this long gives up and turns around.
pub const HEAD_ON_REVERSE_SECS: f32 = 3.0;

/// Registered body box: length along the road, width across it, height above the road.
pub const VEHICLE_BODY_LENGTH: f32 = 4.0;
pub const VEHICLE_BODY_WIDTH: f32 = 2.2;
pub const VEHICLE_BODY_HEIGHT: f32 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Vehicle {
    pub position: Vec3,
    /// Index of the road in the city layout.
    pub road: usize,
    pub axis: RoadAxis,
    /// Coordinate of the centerline on the cross axis.
    pub centerline: f32,
    /// Turnaround points on the XZ plane.
    pub path: [Vec2; 2],
    /// Which end of `path` the vehicle is driving toward.
    pub target: usize,
    pub speed: f32,
    /// Index of the signal bound to this road, if any.
    pub signal: Option<usize>,
    /// Time spent held behind another vehicle.
    pub hold_timer: f32,
    pub body: VolumeId,
}

/// Body box of a vehicle at `position` driving along `axis`.
pub fn body_volume(position: Vec3, axis: RoadAxis) -> Volume {
    let (width, depth) = match axis {
        RoadAxis::AlongX => (VEHICLE_BODY_LENGTH, VEHICLE_BODY_WIDTH),
        _ => (VEHICLE_BODY_WIDTH, VEHICLE_BODY_LENGTH),
    };
    Volume::from_footprint(
        xz(position),
        width,
        depth,
        position.y - VEHICLE_RIDE_HEIGHT,
        VEHICLE_BODY_HEIGHT,
    )
}

impl Vehicle {
    /// Unit travel direction on the XZ plane.
    pub fn direction(&self) -> Vec2 {
        (self.path[self.target] - xz(self.position)).normalize_or(self.path[self.target] - self.path[1 - self.target])
    }

    /// Yaw in radians (0 looks down -Z).
    pub fn heading(&self) -> f32 {
        let dir = self.direction().normalize_or_zero();
        (-dir.x).atan2(-dir.y)
    }

    pub fn turn_around(&mut self) {
        self.target = 1 - self.target;
        self.hold_timer = 0.0;
    }

    fn snap_to_centerline(&mut self, point: Vec2) {
        let snapped = match self.axis {
            RoadAxis::AlongX => Vec2::new(point.x, self.centerline),
            _ => Vec2::new(self.centerline, point.y),
        };
        self.position = Vec3::new(snapped.x, VEHICLE_RIDE_HEIGHT, snapped.y);
    }

    /// Advance by one fixed traffic step. `others` holds every other vehicle's position.
    fn step(
        &mut self,
        signals: &[TrafficSignal],
        registry: &mut SolidRegistry,
        others: impl Iterator<Item = Vec2>,
        dt: f32,
    ) {
        let here = xz(self.position);
        let target = self.path[self.target];
        let remaining = here.distance(target);
        if remaining <= TURNAROUND_DISTANCE {
            self.turn_around();
            return;
        }

        let dir = (target - here) / remaining;

        if let Some(signal) = self.signal.and_then(|i| signals.get(i)) {
            let to_signal = signal.position - here;
            if signal.is_red_for(self.axis)
                && to_signal.length() < SIGNAL_HOLD_DISTANCE
                && to_signal.dot(dir) > 0.0
            {
                return;
            }
        }

        let next = here + dir * (self.speed * dt).min(remaining);
        if others.into_iter().any(|p| p.distance(next) < FOLLOW_DISTANCE) {
            self.hold_timer += dt;
            if self.hold_timer >= HEAD_ON_REVERSE_SECS {
                trace!("Vehicle on road {} reversing after a long hold", self.road);
                self.turn_around();
            }
            return;
        }

        self.hold_timer = 0.0;
        self.snap_to_centerline(next);
        registry.set_bounds(self.body, body_volume(self.position, self.axis));
        if next.distance(target) <= TURNAROUND_DISTANCE {
            self.turn_around();
        }
    }
}

/// All vehicles plus the fixed-rate accumulator that drives them.
#[derive(Debug, Clone, Default)]
pub struct VehicleFleet {
    pub vehicles: Vec<Vehicle>,
    pub accumulator: f32,
}

impl VehicleFleet {
    pub fn new(vehicles: Vec<Vehicle>) -> Self {
        Self {
            vehicles,
            accumulator: 0.0,
        }
    }

    /// Accumulate `dt` and run as many fixed traffic steps as it covers.
    pub fn tick(&mut self, signals: &[TrafficSignal], registry: &mut SolidRegistry, dt: f32) {
        let step = 1.0 / VEHICLE_TICK_HZ;
        self.accumulator += dt;
        while self.accumulator >= step {
            self.accumulator -= step;
            self.step_all(signals, registry, step);
        }
    }

    fn step_all(&mut self, signals: &[TrafficSignal], registry: &mut SolidRegistry, dt: f32) {
        let mut positions: Vec<Vec2> = self.vehicles.iter().map(|v| xz(v.position)).collect();
        for i in 0..self.vehicles.len() {
            let others = positions
                .iter()
                .enumerate()
                .filter(move |(j, _)| *j != i)
                .map(|(_, p)| *p);
            self.vehicles[i].step(signals, registry, others, dt);
            positions[i] = xz(self.vehicles[i].position);
        }
    }
}

/// Index of the signal closest to `road`'s center among those lying on it.
pub fn bind_signal(road: &RoadSegment, signals: &[TrafficSignal]) -> Option<usize> {
    signals
        .iter()
        .enumerate()
        .filter(|(_, s)| road.contains(s.position, SIGNAL_BIND_TOLERANCE))
        .min_by(|(_, a), (_, b)| {
            a.position
                .distance_squared(road.center)
                .total_cmp(&b.position.distance_squared(road.center))
        })
        .map(|(i, _)| i)
}

/// Drop `count` vehicles onto random axis-aligned roads and register their bodies.
pub fn spawn_vehicles(
    registry: &mut SolidRegistry,
    roads: &[RoadSegment],
    signals: &[TrafficSignal],
    count: usize,
    rng: &mut impl Rng,
) -> Vec<Vehicle> {
    let usable: Vec<usize> = roads
        .iter()
        .enumerate()
        .filter(|(_, r)| r.is_axis_aligned() && r.length > 2.0 * VEHICLE_PATH_INSET + 1.0)
        .map(|(i, _)| i)
        .collect();
    if usable.is_empty() {
        warn!("No drivable roads, skipping traffic");
        return Vec::new();
    }

    let mut vehicles: Vec<Vehicle> = Vec::with_capacity(count);
    for _ in 0..count {
        let index = usable[rng.gen_range(0..usable.len())];
        let road = &roads[index];
        let dir = road.direction();
        let (start, end) = road.endpoints();
        let path = [start + dir * VEHICLE_PATH_INSET, end - dir * VEHICLE_PATH_INSET];
        let span = path[0].distance(path[1]);

        let mut t = rng.gen_range(0.0..span);
        for _ in 0..SPAWN_NUDGE_ATTEMPTS {
            let candidate = path[0] + dir * t;
            if vehicles.iter().all(|v| xz(v.position).distance(candidate) >= SPAWN_SEPARATION) {
                break;
            }
            t = (t + SPAWN_SEPARATION) % span;
        }

        let mut vehicle = Vehicle {
            position: Vec3::ZERO,
            road: index,
            axis: road.axis,
            centerline: match road.axis {
                RoadAxis::AlongX => road.center.y,
                _ => road.center.x,
            },
            path,
            target: rng.gen_range(0..2),
            speed: rng.gen_range(VEHICLE_MIN_SPEED..=VEHICLE_MAX_SPEED),
            signal: bind_signal(road, signals),
            hold_timer: 0.0,
            body: VolumeId(0),
        };
        vehicle.snap_to_centerline(path[0] + dir * t);
        vehicle.body = registry.register(
            body_volume(vehicle.position, vehicle.axis),
            VolumeTraits::SOLID,
            VolumeCategory::AgentBody,
            None,
        );
        vehicles.push(vehicle);
    }

    debug!("Spawned {} vehicles on {} drivable roads", vehicles.len(), usable.len());
    vehicles
}
