//! Building records and their wall/floor/roof shell geometry.
//!
//! A building is a hollow box: a floor slab, four walls (the front one split around a
//! door), and a roof slab that overhangs the walls slightly. `top_height` is always the
//! world-space Y of the roof slab's top surface.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::volume::{StructureId, Volume, VolumeCategory, VolumeTraits};

pub const FLOOR_THICKNESS: f32 = 0.2;
pub const WALL_THICKNESS: f32 = 0.6;
pub const ROOF_THICKNESS: f32 = 0.2;
/// Roof slab extends this far past the walls on every side.
pub const ROOF_OVERHANG: f32 = 0.2;
pub const DOOR_WIDTH: f32 = 3.0;
/// Lintel bottom above the door; tall enough for the avatar to walk under.
pub const DOOR_HEIGHT: f32 = 3.6;

/// What a building was generated as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildingKind {
    Office,
    MidRise,
    Warehouse,
    Mall,
    FuelStation,
}

impl BuildingKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            BuildingKind::Office => "Office Tower",
            BuildingKind::MidRise => "Mid-rise",
            BuildingKind::Warehouse => "Warehouse",
            BuildingKind::Mall => "Mall",
            BuildingKind::FuelStation => "Fuel Station",
        }
    }
}

/// A placed building.
#[derive(Debug, Clone, PartialEq)]
pub struct Building {
    pub owner: StructureId,
    pub kind: BuildingKind,
    /// Footprint center on the XZ plane.
    pub center: Vec2,
    pub width: f32,
    pub depth: f32,
    pub wall_height: f32,
    pub top_height: f32,
}

impl Building {
    pub fn new(
        owner: StructureId,
        kind: BuildingKind,
        center: Vec2,
        width: f32,
        depth: f32,
        wall_height: f32,
    ) -> Self {
        Self {
            owner,
            kind,
            center,
            width,
            depth,
            wall_height,
            top_height: wall_height + ROOF_THICKNESS,
        }
    }

    pub fn half_extents(&self) -> Vec2 {
        Vec2::new(self.width * 0.5, self.depth * 0.5)
    }

    /// Wall footprint on the XZ plane.
    pub fn footprint(&self) -> Rect {
        Rect::from_center_half_size(self.center, self.half_extents())
    }

    /// Whether `point` is over the roof slab.
    pub fn roof_contains(&self, point: Vec2) -> bool {
        let local = (point - self.center).abs();
        let half = self.half_extents() + Vec2::splat(ROOF_OVERHANG);
        local.x <= half.x && local.y <= half.y
    }

    /// Distance from the center to the outer wall along `dir` (unit vector on XZ).
    pub fn edge_distance(&self, dir: Vec2) -> f32 {
        let half = self.half_extents();
        let tx = if dir.x.abs() > f32::EPSILON { half.x / dir.x.abs() } else { f32::INFINITY };
        let tz = if dir.y.abs() > f32::EPSILON { half.y / dir.y.abs() } else { f32::INFINITY };
        tx.min(tz)
    }

    /// Shell volumes: floor, walls (door in the +Z face) and roof.
    pub fn shell(&self) -> Vec<(Volume, VolumeTraits, VolumeCategory)> {
        let c = self.center;
        let (hw, hd) = (self.width * 0.5, self.depth * 0.5);
        let h = self.wall_height;
        let t = WALL_THICKNESS;
        let mut parts = Vec::with_capacity(8);

        parts.push((
            Volume::from_footprint(c, self.width, self.depth, 0.0, FLOOR_THICKNESS),
            VolumeTraits::SOLID,
            VolumeCategory::BuildingFloor,
        ));

        let wall = |min: Vec3, max: Vec3| (Volume::new(min, max), VolumeTraits::SOLID, VolumeCategory::BuildingWall);

        // Back (-Z), left (-X), right (+X).
        parts.push(wall(Vec3::new(c.x - hw, 0.0, c.y - hd), Vec3::new(c.x + hw, h, c.y - hd + t)));
        parts.push(wall(Vec3::new(c.x - hw, 0.0, c.y - hd), Vec3::new(c.x - hw + t, h, c.y + hd)));
        parts.push(wall(Vec3::new(c.x + hw - t, 0.0, c.y - hd), Vec3::new(c.x + hw, h, c.y + hd)));

        // Front (+Z) with a door gap when the face is wide enough.
        let front_min_z = c.y + hd - t;
        let front_max_z = c.y + hd;
        let half_door = DOOR_WIDTH * 0.5;
        if self.width > DOOR_WIDTH + 2.0 * t && h > DOOR_HEIGHT {
            parts.push(wall(
                Vec3::new(c.x - hw, 0.0, front_min_z),
                Vec3::new(c.x - half_door, h, front_max_z),
            ));
            parts.push(wall(
                Vec3::new(c.x + half_door, 0.0, front_min_z),
                Vec3::new(c.x + hw, h, front_max_z),
            ));
            parts.push(wall(
                Vec3::new(c.x - half_door, DOOR_HEIGHT, front_min_z),
                Vec3::new(c.x + half_door, h, front_max_z),
            ));
        } else {
            parts.push(wall(Vec3::new(c.x - hw, 0.0, front_min_z), Vec3::new(c.x + hw, h, front_max_z)));
        }

        parts.push((
            Volume::from_footprint(
                c,
                self.width + 2.0 * ROOF_OVERHANG,
                self.depth + 2.0 * ROOF_OVERHANG,
                h,
                ROOF_THICKNESS,
            ),
            VolumeTraits::CLIMBABLE_SOLID,
            VolumeCategory::Roof,
        ));

        parts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Building {
        Building::new(StructureId(1), BuildingKind::Office, Vec2::new(10.0, -5.0), 20.0, 16.0, 12.0)
    }

    #[test]
    fn test_top_height_matches_roof_surface() {
        let b = sample();
        let roof = b
            .shell()
            .into_iter()
            .find(|(_, _, cat)| *cat == VolumeCategory::Roof)
            .unwrap();
        assert!((roof.0.top() - b.top_height).abs() < 1e-5);
        assert!(roof.1.climbable && roof.1.solid);
    }

    #[test]
    fn test_door_gap_is_open() {
        let b = sample();
        let doorway = Vec3::new(b.center.x, 1.0, b.center.y + b.depth * 0.5 - 0.3);
        let blocked = b
            .shell()
            .iter()
            .filter(|(_, traits, _)| traits.solid)
            .any(|(v, _, _)| v.distance_squared(doorway) <= 0.0);
        assert!(!blocked);
    }

    #[test]
    fn test_edge_distance() {
        let b = sample();
        assert!((b.edge_distance(Vec2::X) - 10.0).abs() < 1e-5);
        assert!((b.edge_distance(Vec2::Y) - 8.0).abs() < 1e-5);
        let diag = Vec2::new(1.0, 1.0).normalize();
        assert!((b.edge_distance(diag) - 8.0 * std::f32::consts::SQRT_2).abs() < 1e-4);
    }

    #[test]
    fn test_shell_volumes_are_valid() {
        for (v, _, _) in sample().shell() {
            assert!(v.is_valid());
        }
    }
}
