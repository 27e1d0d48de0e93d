//! Axis-aligned solid volumes and the categorical traits attached to them.
//!
//! Every piece of static geometry the generator places (walls, roofs, containers,
//! ladder rungs, plank segments...) is a [`Volume`] plus a [`VolumeTraits`] flag set
//! and a [`VolumeCategory`] fixed at creation time.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Smallest horizontal extent a climbable top must have to be stood on.
/// Ladder rungs fall below this and never take part in step-up.
pub const MIN_STANDABLE_EXTENT: f32 = 0.3;

/// Identifier of the structure (building, container, staircase...) a volume belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StructureId(pub u32);

/// Drop the Y component.
#[inline]
pub fn xz(v: Vec3) -> Vec2 {
    Vec2::new(v.x, v.z)
}

/// An axis-aligned box in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Volume {
    pub min: Vec3,
    pub max: Vec3,
}

impl Volume {
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_center_size(center: Vec3, size: Vec3) -> Self {
        let half = size * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Box standing on `base_y` with the given footprint center and extents.
    pub fn from_footprint(center: Vec2, width: f32, depth: f32, base_y: f32, height: f32) -> Self {
        Self {
            min: Vec3::new(center.x - width * 0.5, base_y, center.y - depth * 0.5),
            max: Vec3::new(center.x + width * 0.5, base_y + height, center.y + depth * 0.5),
        }
    }

    /// Finite bounds with `min <= max` on every axis.
    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min.cmple(self.max).all()
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn top(&self) -> f32 {
        self.max.y
    }

    /// Closest point on (or in) the box to `point`.
    #[inline]
    pub fn closest_point(&self, point: Vec3) -> Vec3 {
        point.max(self.min).min(self.max)
    }

    #[inline]
    pub fn distance_squared(&self, point: Vec3) -> f32 {
        (point - self.closest_point(point)).length_squared()
    }

    pub fn translated(&self, offset: Vec3) -> Self {
        Self {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    /// 2D footprint on the XZ plane.
    pub fn footprint(&self) -> Rect {
        Rect {
            min: xz(self.min),
            max: xz(self.max),
        }
    }

    /// Whether the footprint contains `point`, grown by `margin` on every side.
    pub fn footprint_contains(&self, point: Vec2, margin: f32) -> bool {
        point.x >= self.min.x - margin
            && point.x <= self.max.x + margin
            && point.y >= self.min.z - margin
            && point.y <= self.max.z + margin
    }

    /// Whether the top surface is wide enough to stand on.
    pub fn is_standable(&self) -> bool {
        let size = self.size();
        size.x >= MIN_STANDABLE_EXTENT && size.z >= MIN_STANDABLE_EXTENT
    }
}

/// Per-axis overlap of two footprints, or `None` when they are separated by more than `epsilon`.
pub fn footprint_overlap(a: Rect, b: Rect, epsilon: f32) -> Option<Vec2> {
    let ox = a.max.x.min(b.max.x) - a.min.x.max(b.min.x);
    let oz = a.max.y.min(b.max.y) - a.min.y.max(b.min.y);
    if ox > epsilon && oz > epsilon {
        Some(Vec2::new(ox, oz))
    } else {
        None
    }
}

/// Vertical climb range carried by an invisible ladder marker.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LadderSpan {
    pub bottom_y: f32,
    pub top_y: f32,
    /// Where a climber is pinned on the XZ plane.
    pub column: Vec2,
    /// Where a climber steps off once the top is reached.
    pub dismount: Vec2,
}

/// Capability flags for a registered volume.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VolumeTraits {
    /// Blocks horizontal movement and supports standing.
    pub solid: bool,
    /// Top surface takes part in step-up assistance.
    pub climbable: bool,
    pub road: bool,
    pub ladder: Option<LadderSpan>,
}

impl VolumeTraits {
    pub const SOLID: Self = Self {
        solid: true,
        climbable: false,
        road: false,
        ladder: None,
    };

    pub const CLIMBABLE_SOLID: Self = Self {
        solid: true,
        climbable: true,
        road: false,
        ladder: None,
    };

    pub const CLIMBABLE: Self = Self {
        solid: false,
        climbable: true,
        road: false,
        ladder: None,
    };

    pub const ROAD: Self = Self {
        solid: true,
        climbable: false,
        road: true,
        ladder: None,
    };

    pub const MARKER: Self = Self {
        solid: false,
        climbable: false,
        road: false,
        ladder: None,
    };

    pub fn ladder(span: LadderSpan) -> Self {
        Self {
            ladder: Some(span),
            ..Self::MARKER
        }
    }
}

/// Generation category of a volume, set when it is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VolumeCategory {
    Road,
    BuildingFloor,
    BuildingWall,
    Roof,
    Container,
    ContainerCap,
    Canopy,
    FuelPump,
    Platform,
    Ramp,
    Cover,
    RoofStep,
    LadderRung,
    LadderMarker,
    Plank,
    BorderWall,
    StreetFurniture,
    TeleportPad,
    AgentBody,
}

impl VolumeCategory {
    /// Categories the overlap-correction pass may move away from roads.
    pub fn is_relocatable(self) -> bool {
        matches!(
            self,
            VolumeCategory::BuildingFloor
                | VolumeCategory::BuildingWall
                | VolumeCategory::Roof
                | VolumeCategory::Container
                | VolumeCategory::ContainerCap
                | VolumeCategory::Canopy
                | VolumeCategory::FuelPump
                | VolumeCategory::Platform
                | VolumeCategory::Ramp
                | VolumeCategory::Cover
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closest_point_inside_and_outside() {
        let v = Volume::new(Vec3::ZERO, Vec3::splat(2.0));
        assert_eq!(v.closest_point(Vec3::splat(1.0)), Vec3::splat(1.0));
        assert_eq!(v.closest_point(Vec3::new(5.0, 1.0, -3.0)), Vec3::new(2.0, 1.0, 0.0));
        assert_eq!(v.distance_squared(Vec3::new(5.0, 1.0, 1.0)), 9.0);
    }

    #[test]
    fn test_malformed_volume_detection() {
        assert!(Volume::new(Vec3::ZERO, Vec3::ONE).is_valid());
        assert!(!Volume::new(Vec3::ONE, Vec3::ZERO).is_valid());
        assert!(!Volume::new(Vec3::new(f32::NAN, 0.0, 0.0), Vec3::ONE).is_valid());
        assert!(!Volume::new(Vec3::ZERO, Vec3::new(1.0, f32::INFINITY, 1.0)).is_valid());
    }

    #[test]
    fn test_footprint_overlap() {
        let a = Rect::new(0.0, 0.0, 10.0, 4.0);
        let b = Rect::new(8.0, -2.0, 20.0, 2.0);
        let overlap = footprint_overlap(a, b, 0.01).unwrap();
        assert!((overlap.x - 2.0).abs() < 1e-5);
        assert!((overlap.y - 2.0).abs() < 1e-5);

        let far = Rect::new(30.0, 30.0, 40.0, 40.0);
        assert!(footprint_overlap(a, far, 0.01).is_none());
    }

    #[test]
    fn test_rungs_are_not_standable() {
        let rung = Volume::from_center_size(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.02, 0.02, 0.6));
        assert!(!rung.is_standable());
        let crate_top = Volume::from_footprint(Vec2::ZERO, 2.0, 2.0, 0.0, 1.0);
        assert!(crate_top.is_standable());
    }

    #[test]
    fn test_relocatable_categories() {
        assert!(VolumeCategory::BuildingWall.is_relocatable());
        assert!(VolumeCategory::Container.is_relocatable());
        assert!(!VolumeCategory::Road.is_relocatable());
        assert!(!VolumeCategory::LadderRung.is_relocatable());
        assert!(!VolumeCategory::LadderMarker.is_relocatable());
    }
}
