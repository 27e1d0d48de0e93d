//! Structure placement passes: towers, mid-rises, landmarks, filler, the training
//! ground near the center, map border and street furniture.
//!
//! Landmark coordinates are authored for the default 1200-unit map and scaled by
//! [`CityConfig::layout_scale`] for other sizes.

use bevy::prelude::*;
use noise::{NoiseFn, Perlin};
use rand::Rng;

use crate::building::BuildingKind;
use crate::city::{CityBuilder, StructureKind};
use crate::config::CityConfig;
use crate::roads::{RoadAxis, RoadClass};
use crate::volume::{Volume, VolumeCategory, VolumeTraits};

// =============================================================================
// TUNING
// =============================================================================

pub const OFFICE_FLOOR_HEIGHT: f32 = 3.5;
pub const MEDIUM_FLOOR_HEIGHT: f32 = 3.2;

pub const MALL_SITES: [(f32, f32); 3] = [(-450.0, 200.0), (350.0, 300.0), (100.0, -400.0)];
pub const MALL_SIZE: (f32, f32, f32) = (120.0, 8.0, 80.0);

pub const FUEL_STATION_SITES: [(f32, f32); 4] =
    [(200.0, 150.0), (-250.0, -150.0), (400.0, -200.0), (-180.0, 320.0)];

/// Filler samples this close to a center line or the periodic grid are rejected.
pub const FILLER_ROAD_CLEARANCE: f32 = 20.0;

/// How strongly the skyline noise field scales filler floor counts.
pub const SKYLINE_AMPLITUDE: f32 = 0.35;
pub const SKYLINE_FREQUENCY: f64 = 0.004;

pub const COVER_HEIGHT: f32 = 2.2;
pub const PLATFORM_SIZE: f32 = 14.0;
pub const PLATFORM_TOP: f32 = 3.9;

/// Stepped runs (ramps, roof stairs).
pub const STEP_DEPTH: f32 = 0.9;
pub const STEP_TARGET_RISE: f32 = 0.55;
pub const STAIR_WIDTH: f32 = 3.0;

pub const BORDER_WALL_HEIGHT: f32 = 10.0;
pub const BORDER_WALL_THICKNESS: f32 = 1.0;

pub const SIGNAL_POLE_HEIGHT: f32 = 5.0;
pub const SIGN_POST_HEIGHT: f32 = 2.5;
pub const SPEED_SIGN_SPACING: f32 = 180.0;
pub const SPEED_SIGN_OFFSET: f32 = 4.0;

// =============================================================================
// HELPERS
// =============================================================================

fn scaled(config: &CityConfig, (x, z): (f32, f32)) -> Vec2 {
    Vec2::new(x, z) * config.layout_scale()
}

/// Step volumes for a straight run descending away from `edge` along `outward`.
///
/// The first step touches the edge with its top at `top`; each following step drops by
/// an equal rise until the last one sits one rise above the ground.
pub fn stepped_run(edge: Vec2, outward: Vec2, top: f32) -> Vec<Volume> {
    let count = ((top / STEP_TARGET_RISE).ceil() as usize).max(3);
    let rise = top / count as f32;
    let along_x = outward.x.abs() >= outward.y.abs();
    let (width, depth) = if along_x {
        (STEP_DEPTH, STAIR_WIDTH)
    } else {
        (STAIR_WIDTH, STEP_DEPTH)
    };

    (0..count)
        .map(|i| {
            let center = edge + outward * (i as f32 + 0.5) * STEP_DEPTH;
            let height = top - i as f32 * rise;
            Volume::from_footprint(center, width, depth, 0.0, height)
        })
        .collect()
}

fn post(center: Vec2, size: f32, height: f32) -> Volume {
    Volume::from_footprint(center, size, size, 0.0, height)
}

// =============================================================================
// PASSES
// =============================================================================

/// Four walls just outside the playable square.
pub fn place_border_walls(builder: &mut CityBuilder, config: &CityConfig) {
    let h = config.map_half();
    let t = BORDER_WALL_THICKNESS;
    let walls = [
        Volume::new(Vec3::new(-h - t, 0.0, h), Vec3::new(h + t, BORDER_WALL_HEIGHT, h + t)),
        Volume::new(Vec3::new(-h - t, 0.0, -h - t), Vec3::new(h + t, BORDER_WALL_HEIGHT, -h)),
        Volume::new(Vec3::new(h, 0.0, -h), Vec3::new(h + t, BORDER_WALL_HEIGHT, h)),
        Volume::new(Vec3::new(-h - t, 0.0, -h), Vec3::new(-h, BORDER_WALL_HEIGHT, h)),
    ];
    for wall in walls {
        let owner = builder.begin_structure(StructureKind::BorderWall, Vec2::new(wall.center().x, wall.center().z));
        builder.add_volume(owner, wall, VolumeTraits::SOLID, VolumeCategory::BorderWall);
    }
}

/// Tall office towers clustered in one quadrant.
pub fn place_offices(builder: &mut CityBuilder, config: &CityConfig, rng: &mut impl Rng) {
    let s = config.layout_scale();
    for _ in 0..config.office_count {
        let center = Vec2::new(rng.gen_range(-300.0..-100.0), rng.gen_range(-300.0..-100.0)) * s;
        let floors = rng.gen_range(15..=39);
        let width = rng.gen_range(25.0..40.0);
        let depth = rng.gen_range(25.0..40.0);
        builder.place_building(
            BuildingKind::Office,
            center,
            width,
            depth,
            floors as f32 * OFFICE_FLOOR_HEIGHT,
        );
    }
}

pub fn place_medium_buildings(builder: &mut CityBuilder, config: &CityConfig, rng: &mut impl Rng) {
    let s = config.layout_scale();
    for _ in 0..config.medium_building_count {
        let center = Vec2::new(rng.gen_range(100.0..500.0), rng.gen_range(-200.0..200.0)) * s;
        let floors = rng.gen_range(5..=12);
        let width = rng.gen_range(15.0..25.0);
        let depth = rng.gen_range(15.0..25.0);
        builder.place_building(
            BuildingKind::MidRise,
            center,
            width,
            depth,
            floors as f32 * MEDIUM_FLOOR_HEIGHT,
        );
    }
}

/// Malls, the container yard and fuel-station complexes.
pub fn place_landmarks(builder: &mut CityBuilder, config: &CityConfig, rng: &mut impl Rng) {
    for site in MALL_SITES {
        let center = scaled(config, site);
        let (w, h, d) = MALL_SIZE;
        let owner = builder.begin_structure(StructureKind::Building(BuildingKind::Mall), center);
        builder.add_building(owner, BuildingKind::Mall, center, w, d, h);

        // Entrance canopies along the front face.
        for dx in [-30.0, 0.0, 30.0] {
            let canopy = Volume::from_footprint(center + Vec2::new(dx, d * 0.5 + 3.0), 12.0, 6.0, 4.5, 0.4);
            builder.add_volume(owner, canopy, VolumeTraits::SOLID, VolumeCategory::Canopy);
        }
    }

    let s = config.layout_scale();
    for _ in 0..config.container_count {
        let center = Vec2::new(rng.gen_range(-500.0..-300.0), rng.gen_range(200.0..500.0)) * s;
        let width = rng.gen_range(20.0..35.0);
        let height = rng.gen_range(8.0..12.0);
        let owner = builder.begin_structure(StructureKind::Container, center);
        builder.add_volume(
            owner,
            Volume::from_footprint(center, width, 3.0, 0.0, height),
            VolumeTraits::CLIMBABLE_SOLID,
            VolumeCategory::Container,
        );
        builder.add_volume(
            owner,
            Volume::from_footprint(center, width + 0.2, 3.2, height, 0.1),
            VolumeTraits::CLIMBABLE_SOLID,
            VolumeCategory::ContainerCap,
        );
    }

    for site in FUEL_STATION_SITES {
        let center = scaled(config, site);
        let owner = builder.begin_structure(StructureKind::Building(BuildingKind::FuelStation), center);
        builder.add_building(owner, BuildingKind::FuelStation, center, 20.0, 15.0, 4.0);

        let canopy_center = center + Vec2::new(0.0, 20.0);
        builder.add_volume(
            owner,
            Volume::from_footprint(canopy_center, 40.0, 25.0, 4.5, 1.0),
            VolumeTraits::SOLID,
            VolumeCategory::Canopy,
        );
        for (px, pz) in [(-18.0, -10.5), (18.0, -10.5), (-18.0, 10.5), (18.0, 10.5)] {
            builder.add_volume(
                owner,
                post(canopy_center + Vec2::new(px, pz), 0.6, 4.5),
                VolumeTraits::SOLID,
                VolumeCategory::Canopy,
            );
        }
        for px in [-5.0, 5.0] {
            builder.add_volume(
                owner,
                Volume::from_footprint(canopy_center + Vec2::new(px, 0.0), 1.0, 0.6, 0.0, 1.8),
                VolumeTraits::SOLID,
                VolumeCategory::FuelPump,
            );
        }
    }
}

/// Randomly scattered buildings, modulated by a skyline noise field.
pub fn place_filler(builder: &mut CityBuilder, config: &CityConfig, rng: &mut impl Rng) {
    let skyline = Perlin::new((builder.layout.seed as u32).wrapping_add(9000));
    let extent = config.map_size * 0.4;
    let grid = config.map_size / 6.0;
    let mut placed = 0;

    for _ in 0..config.filler_attempts {
        let x = rng.gen_range(-extent..extent);
        let z = rng.gen_range(-extent..extent);
        if x.abs() < FILLER_ROAD_CLEARANCE || z.abs() < FILLER_ROAD_CLEARANCE {
            continue;
        }
        if (x % grid).abs() < FILLER_ROAD_CLEARANCE || (z % grid).abs() < FILLER_ROAD_CLEARANCE {
            continue;
        }

        let n = skyline.get([x as f64 * SKYLINE_FREQUENCY, z as f64 * SKYLINE_FREQUENCY]) as f32;
        let scale_floors = |floors: i32| ((floors as f32 * (1.0 + SKYLINE_AMPLITUDE * n)).round()).max(1.0);

        let center = Vec2::new(x, z);
        let roll: f32 = rng.gen();
        if roll < 0.4 {
            let floors = scale_floors(rng.gen_range(8..=19));
            let size = rng.gen_range(20.0..30.0);
            builder.place_building(BuildingKind::Office, center, size, size, floors * OFFICE_FLOOR_HEIGHT);
        } else if roll < 0.7 {
            let floors = scale_floors(rng.gen_range(3..=8));
            let width = rng.gen_range(12.0..20.0);
            let depth = rng.gen_range(12.0..20.0);
            builder.place_building(BuildingKind::MidRise, center, width, depth, floors * OFFICE_FLOOR_HEIGHT);
        } else {
            let width = rng.gen_range(25.0..40.0);
            let depth = rng.gen_range(15.0..25.0);
            let height = rng.gen_range(4.0..6.0);
            builder.place_building(BuildingKind::Warehouse, center, width, depth, height);
        }
        placed += 1;
    }

    debug!("Placed {} filler building(s) from {} attempts", placed, config.filler_attempts);
}

/// Low climbable cover blocks and raised platforms with ramps around the center.
pub fn place_training_ground(builder: &mut CityBuilder, config: &CityConfig, rng: &mut impl Rng) {
    let s = config.layout_scale();

    for _ in 0..config.cover_count {
        let center = Vec2::new(rng.gen_range(-80.0..80.0), rng.gen_range(-80.0..80.0)) * s;
        let width = rng.gen_range(2.4..7.2);
        let depth = rng.gen_range(2.4..7.2);
        let owner = builder.begin_structure(StructureKind::Cover, center);
        builder.add_volume(
            owner,
            Volume::from_footprint(center, width, depth, 0.0, COVER_HEIGHT),
            VolumeTraits::CLIMBABLE_SOLID,
            VolumeCategory::Cover,
        );
    }

    let platforms = rng.gen_range(2..=3);
    for _ in 0..platforms {
        let center = Vec2::new(rng.gen_range(-60.0..60.0), rng.gen_range(-60.0..60.0)) * s;
        let owner = builder.begin_structure(StructureKind::Platform, center);
        builder.add_volume(
            owner,
            Volume::from_footprint(center, PLATFORM_SIZE, PLATFORM_SIZE, 0.0, PLATFORM_TOP),
            VolumeTraits::CLIMBABLE_SOLID,
            VolumeCategory::Platform,
        );
        let edge = center - Vec2::new(PLATFORM_SIZE * 0.5, 0.0);
        for step in stepped_run(edge, Vec2::NEG_X, PLATFORM_TOP) {
            builder.add_volume(owner, step, VolumeTraits::CLIMBABLE_SOLID, VolumeCategory::Ramp);
        }
    }
}

/// Signal poles and stop-sign posts at intersections, speed signs along arterials.
pub fn place_street_furniture(builder: &mut CityBuilder, _config: &CityConfig) {
    let intersections = builder.layout.intersections.clone();
    for point in intersections {
        let clearance = builder
            .layout
            .roads
            .iter()
            .filter(|r| r.contains(point, 0.0))
            .map(|r| r.width)
            .fold(0.0, f32::max)
            * 0.5
            + 1.5;

        let owner = builder.begin_structure(StructureKind::StreetFurniture, point);
        builder.add_volume(
            owner,
            post(point + Vec2::splat(clearance), 0.3, SIGNAL_POLE_HEIGHT),
            VolumeTraits::SOLID,
            VolumeCategory::StreetFurniture,
        );
        builder.add_volume(
            owner,
            post(point - Vec2::splat(clearance), 0.15, SIGN_POST_HEIGHT),
            VolumeTraits::SOLID,
            VolumeCategory::StreetFurniture,
        );
    }

    let arterials: Vec<_> = builder
        .layout
        .roads
        .iter()
        .filter(|r| r.class == RoadClass::Arterial && r.is_axis_aligned())
        .copied()
        .collect();
    for road in arterials {
        let (start, _) = road.endpoints();
        let dir = road.direction();
        let side = match road.axis {
            RoadAxis::AlongX => Vec2::Y,
            _ => Vec2::X,
        } * (road.width * 0.5 + SPEED_SIGN_OFFSET);

        let count = (road.length / SPEED_SIGN_SPACING).floor() as usize;
        for i in 1..=count {
            let at = start + dir * (i as f32 * SPEED_SIGN_SPACING) + side;
            if at.distance(start) >= road.length {
                break;
            }
            let owner = builder.begin_structure(StructureKind::StreetFurniture, at);
            builder.add_volume(
                owner,
                post(at, 0.15, SIGN_POST_HEIGHT),
                VolumeTraits::SOLID,
                VolumeCategory::StreetFurniture,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stepped_run_descends_to_ground() {
        let steps = stepped_run(Vec2::ZERO, Vec2::X, 3.9);
        assert!(steps.len() >= 3);
        assert!((steps[0].top() - 3.9).abs() < 1e-5);
        for pair in steps.windows(2) {
            assert!(pair[1].top() < pair[0].top());
            assert!(pair[0].top() - pair[1].top() <= STEP_TARGET_RISE + 1e-4);
            assert!(pair[1].center().x > pair[0].center().x);
        }
        let last = steps.last().unwrap();
        assert!(last.top() <= STEP_TARGET_RISE + 1e-4);
    }

    #[test]
    fn test_border_walls_enclose_the_map() {
        let config = CityConfig::default();
        let mut builder = CityBuilder::new(config.map_half(), 0);
        place_border_walls(&mut builder, &config);
        let registry = &builder.registry;
        assert!(registry.is_blocked(Vec3::new(600.5, 1.0, 0.0), 0.1));
        assert!(registry.is_blocked(Vec3::new(0.0, 1.0, -600.5), 0.1));
        assert!(!registry.is_blocked(Vec3::new(598.0, 1.0, 598.0), 1.0));
    }
}
