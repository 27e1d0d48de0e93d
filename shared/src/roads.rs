//! Road network generation: arterials, per-block local stubs, angled roads and avenues.

use bevy::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::f32::consts::TAU;

use crate::config::CityConfig;
use crate::volume::Volume;

/// Arterials other than the two central ones sit this many blocks off center.
pub const ARTERIAL_OFFSET_BLOCKS: f32 = 2.5;

/// Fraction of the map an arterial spans.
pub const ARTERIAL_SPAN: f32 = 0.95;

/// Spacing between spawn points along a road.
pub const SPAWN_SPACING: f32 = 12.0;

/// Spawn points keep this far from a road's ends.
pub const SPAWN_END_MARGIN: f32 = 4.0;

/// Gap two perpendicular road surfaces may leave and still count as crossing.
pub const INTERSECTION_TOLERANCE: f32 = 1.0;

/// Road surfaces are registered as a thin slab just under the ground plane.
pub const ROAD_THICKNESS: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RoadAxis {
    AlongX,
    AlongZ,
    /// Direction angle in radians on the XZ plane (0 = +X).
    Angled(f32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoadClass {
    Arterial,
    Local,
    Diagonal,
    Avenue,
}

/// A straight road piece on the ground plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoadSegment {
    /// Center on the XZ plane.
    pub center: Vec2,
    pub width: f32,
    pub length: f32,
    pub axis: RoadAxis,
    pub class: RoadClass,
}

impl RoadSegment {
    pub fn along_x(center: Vec2, length: f32, width: f32, class: RoadClass) -> Self {
        Self {
            center,
            width,
            length,
            axis: RoadAxis::AlongX,
            class,
        }
    }

    pub fn along_z(center: Vec2, length: f32, width: f32, class: RoadClass) -> Self {
        Self {
            center,
            width,
            length,
            axis: RoadAxis::AlongZ,
            class,
        }
    }

    /// Unit travel direction on the XZ plane.
    pub fn direction(&self) -> Vec2 {
        match self.axis {
            RoadAxis::AlongX => Vec2::X,
            RoadAxis::AlongZ => Vec2::Y,
            RoadAxis::Angled(angle) => Vec2::new(angle.cos(), angle.sin()),
        }
    }

    pub fn is_axis_aligned(&self) -> bool {
        !matches!(self.axis, RoadAxis::Angled(_))
    }

    /// The two centerline end points.
    pub fn endpoints(&self) -> (Vec2, Vec2) {
        let half = self.direction() * self.length * 0.5;
        (self.center - half, self.center + half)
    }

    /// Axis-aligned footprint containing the (possibly rotated) road surface.
    pub fn footprint(&self) -> Rect {
        let dir = self.direction();
        let half_len = self.length * 0.5;
        let half_w = self.width * 0.5;
        let extent = Vec2::new(
            dir.x.abs() * half_len + dir.y.abs() * half_w,
            dir.y.abs() * half_len + dir.x.abs() * half_w,
        );
        Rect {
            min: self.center - extent,
            max: self.center + extent,
        }
    }

    pub fn volume(&self) -> Volume {
        let rect = self.footprint();
        Volume::new(
            Vec3::new(rect.min.x, -ROAD_THICKNESS, rect.min.y),
            Vec3::new(rect.max.x, 0.0, rect.max.y),
        )
    }

    /// Whether `point` lies on the road surface, grown by `tolerance`.
    pub fn contains(&self, point: Vec2, tolerance: f32) -> bool {
        let dir = self.direction();
        let local = point - self.center;
        let along = local.dot(dir);
        let across = local.perp_dot(dir);
        along.abs() <= self.length * 0.5 + tolerance && across.abs() <= self.width * 0.5 + tolerance
    }
}

/// A place agents can be dropped onto a road.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnPoint {
    pub position: Vec2,
    /// Index into the road list this point was derived from.
    pub road: usize,
}

/// Generate the full road network for one map.
pub fn generate_road_network(config: &CityConfig, rng: &mut impl Rng) -> Vec<RoadSegment> {
    let mut roads = Vec::new();
    let arterial_len = config.map_size * ARTERIAL_SPAN;
    let arterial_w = config.arterial_road_width;
    let block = config.block_size;

    // Central cross plus offset arterials.
    let offset = (block * ARTERIAL_OFFSET_BLOCKS).floor();
    roads.push(RoadSegment::along_x(Vec2::ZERO, arterial_len, arterial_w, RoadClass::Arterial));
    roads.push(RoadSegment::along_z(Vec2::ZERO, arterial_len, arterial_w, RoadClass::Arterial));
    for sign in [-1.0, 1.0] {
        roads.push(RoadSegment::along_x(
            Vec2::new(0.0, sign * offset),
            arterial_len,
            arterial_w,
            RoadClass::Arterial,
        ));
        roads.push(RoadSegment::along_z(
            Vec2::new(sign * offset, 0.0),
            arterial_len,
            arterial_w,
            RoadClass::Arterial,
        ));
    }

    let blocks = config.blocks_per_side;
    let origin = -(blocks as f32) * block * 0.5;
    let lateral = block * 0.25;

    for bx in 0..blocks {
        for bz in 0..blocks {
            let block_center = Vec2::new(
                origin + (bx as f32 + 0.5) * block,
                origin + (bz as f32 + 0.5) * block,
            );

            let stubs = rng.gen_range(1..=3);
            for _ in 0..stubs {
                let length = block * rng.gen_range(0.35..0.85);
                let shift = rng.gen_range(-lateral..lateral);
                let road = if rng.gen_bool(0.55) {
                    RoadSegment::along_z(
                        block_center + Vec2::new(shift, 0.0),
                        length,
                        config.local_road_width,
                        RoadClass::Local,
                    )
                } else {
                    RoadSegment::along_x(
                        block_center + Vec2::new(0.0, shift),
                        length,
                        config.local_road_width,
                        RoadClass::Local,
                    )
                };
                roads.push(road);
            }

            if rng.gen_bool(config.diagonal_road_chance.clamp(0.0, 1.0)) {
                let angle = rng.gen_range(0.0..TAU);
                let dir = Vec2::new(angle.cos(), angle.sin());
                roads.push(RoadSegment {
                    center: block_center + dir * block * 0.28,
                    width: config.local_road_width,
                    length: rng.gen_range(20.0..56.0),
                    axis: RoadAxis::Angled(angle),
                    class: RoadClass::Diagonal,
                });
            }
        }
    }

    if blocks >= 2 {
        for _ in 0..config.avenue_count {
            let span = rng.gen_range(2..=5u32).min(blocks);
            let start = rng.gen_range(0..=(blocks - span));
            let line = rng.gen_range(1..blocks);
            let along = origin + (start as f32 + span as f32 * 0.5) * block;
            let across = origin + line as f32 * block;
            let length = span as f32 * block;
            let avenue = if rng.gen_bool(0.5) {
                RoadSegment::along_x(Vec2::new(along, across), length, arterial_w, RoadClass::Avenue)
            } else {
                RoadSegment::along_z(Vec2::new(across, along), length, arterial_w, RoadClass::Avenue)
            };
            roads.push(avenue);
        }
    }

    roads
}

/// Spawn points every [`SPAWN_SPACING`] units along each road.
pub fn spawn_points(roads: &[RoadSegment]) -> Vec<SpawnPoint> {
    let mut points = Vec::new();
    for (index, road) in roads.iter().enumerate() {
        let usable = road.length - 2.0 * SPAWN_END_MARGIN;
        if usable < 0.0 {
            continue;
        }
        let (start, _) = road.endpoints();
        let dir = road.direction();
        let count = (usable / SPAWN_SPACING).floor() as usize;
        for i in 0..=count {
            let t = SPAWN_END_MARGIN + i as f32 * SPAWN_SPACING;
            points.push(SpawnPoint {
                position: start + dir * t,
                road: index,
            });
        }
    }
    points
}

/// Points where an along-X road's surface overlaps an along-Z road's, deduplicated on a
/// rounded key. The point is the center of the shared rectangle, so a stub that ends inside
/// a wide road still gets one.
pub fn intersections(roads: &[RoadSegment]) -> Vec<Vec2> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for x_road in roads.iter().filter(|r| r.axis == RoadAxis::AlongX) {
        let a = x_road.footprint();
        for z_road in roads.iter().filter(|r| r.axis == RoadAxis::AlongZ) {
            let b = z_road.footprint();
            let min = a.min.max(b.min);
            let max = a.max.min(b.max);
            if max.x < min.x - INTERSECTION_TOLERANCE || max.y < min.y - INTERSECTION_TOLERANCE {
                continue;
            }
            let crossing = (min + max) * 0.5;
            let key = (crossing.x.round() as i32, crossing.y.round() as i32);
            if seen.insert(key) {
                out.push(crossing);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_arterials_cross_the_center() {
        let mut rng = StdRng::seed_from_u64(11);
        let roads = generate_road_network(&CityConfig::default(), &mut rng);
        let through_center: Vec<_> = roads
            .iter()
            .filter(|r| r.class == RoadClass::Arterial && r.contains(Vec2::ZERO, 0.0))
            .collect();
        assert!(through_center.iter().any(|r| r.axis == RoadAxis::AlongX));
        assert!(through_center.iter().any(|r| r.axis == RoadAxis::AlongZ));
    }

    #[test]
    fn test_roads_stay_inside_the_map() {
        let config = CityConfig::default();
        let mut rng = StdRng::seed_from_u64(3);
        for road in generate_road_network(&config, &mut rng) {
            let rect = road.footprint();
            assert!(rect.min.x >= -config.map_half() && rect.max.x <= config.map_half());
            assert!(rect.min.y >= -config.map_half() && rect.max.y <= config.map_half());
        }
    }

    #[test]
    fn test_angled_footprint_contains_rotated_corners() {
        let road = RoadSegment {
            center: Vec2::new(5.0, -3.0),
            width: 8.0,
            length: 40.0,
            axis: RoadAxis::Angled(0.7),
            class: RoadClass::Diagonal,
        };
        let rect = road.footprint();
        let dir = road.direction();
        let perp = dir.perp();
        for (a, b) in [(1.0, 1.0), (1.0, -1.0), (-1.0, 1.0), (-1.0, -1.0)] {
            let corner = road.center + dir * 20.0 * a + perp * 4.0 * b;
            assert!(corner.x >= rect.min.x - 1e-3 && corner.x <= rect.max.x + 1e-3);
            assert!(corner.y >= rect.min.y - 1e-3 && corner.y <= rect.max.y + 1e-3);
        }
    }

    #[test]
    fn test_spawn_points_lie_on_their_road() {
        let roads = vec![
            RoadSegment::along_x(Vec2::new(0.0, 10.0), 100.0, 8.0, RoadClass::Local),
            RoadSegment::along_z(Vec2::new(-20.0, 0.0), 30.0, 8.0, RoadClass::Local),
        ];
        let points = spawn_points(&roads);
        assert!(!points.is_empty());
        for p in &points {
            assert!(roads[p.road].contains(p.position, 0.0));
        }
        // 100 long, 4 margin each side: 4, 16, ..., 88 -> 8 points.
        assert_eq!(points.iter().filter(|p| p.road == 0).count(), 8);
    }

    #[test]
    fn test_intersections_dedup() {
        let roads = vec![
            RoadSegment::along_x(Vec2::ZERO, 100.0, 8.0, RoadClass::Arterial),
            RoadSegment::along_x(Vec2::new(0.0, 0.2), 100.0, 8.0, RoadClass::Local),
            RoadSegment::along_z(Vec2::ZERO, 100.0, 8.0, RoadClass::Arterial),
            // Does not reach the X road.
            RoadSegment::along_z(Vec2::new(30.0, 40.0), 10.0, 8.0, RoadClass::Local),
        ];
        let found = intersections(&roads);
        assert_eq!(found.len(), 1);
        assert!(found[0].length() < 0.5);
    }

    #[test]
    fn test_stub_ending_inside_wide_road_is_an_intersection() {
        let roads = vec![
            RoadSegment::along_x(Vec2::ZERO, 200.0, 18.0, RoadClass::Arterial),
            // Runs z 5..25: stops short of the arterial's centerline at z = 0.
            RoadSegment::along_z(Vec2::new(30.0, 15.0), 20.0, 8.0, RoadClass::Local),
        ];
        let found = intersections(&roads);
        assert_eq!(found.len(), 1);
        assert!(roads[0].contains(found[0], 0.0));
        assert!(roads[1].contains(found[0], 0.0));
        assert_eq!(found[0], Vec2::new(30.0, 7.0));
    }
}
