//! Solid registry: the single store of collidable volumes.
//!
//! All geometric queries are brute-force scans over the registered set. With a few
//! thousand volumes that is cheap enough for a fixed 60 Hz tick; a bucket grid could be
//! slotted in behind the same API if the volume count grows by orders of magnitude.
//!
//! Entries live in a `BTreeMap` keyed by [`VolumeId`] so iteration order (and therefore
//! every query result) is deterministic for a given generation seed.

use bevy::prelude::*;
use std::collections::BTreeMap;

use crate::volume::{StructureId, Volume, VolumeCategory, VolumeTraits};

/// Handle to a registered volume.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VolumeId(pub u32);

/// A single registered volume.
#[derive(Clone, Debug)]
pub struct SolidEntry {
    pub volume: Volume,
    pub traits: VolumeTraits,
    pub category: VolumeCategory,
    pub owner: Option<StructureId>,
    valid: bool,
}

impl SolidEntry {
    /// Malformed volumes stay registered but never match a query.
    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

/// Registry of every static and agent-owned volume in the world.
#[derive(Resource, Default, Debug)]
pub struct SolidRegistry {
    entries: BTreeMap<VolumeId, SolidEntry>,
    next_id: u32,
    /// Version number - incremented whenever the registered set changes.
    pub version: u64,
}

impl SolidRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a volume and return its handle.
    pub fn register(
        &mut self,
        volume: Volume,
        traits: VolumeTraits,
        category: VolumeCategory,
        owner: Option<StructureId>,
    ) -> VolumeId {
        let id = VolumeId(self.next_id);
        self.next_id += 1;

        let valid = volume.is_valid();
        if !valid {
            warn!(
                "Registered malformed {:?} volume {:?} (min {:?}, max {:?}); it will be ignored by queries",
                category, id, volume.min, volume.max
            );
        }

        self.entries.insert(
            id,
            SolidEntry {
                volume,
                traits,
                category,
                owner,
                valid,
            },
        );
        self.version += 1;
        id
    }

    pub fn unregister(&mut self, id: VolumeId) -> Option<SolidEntry> {
        let removed = self.entries.remove(&id);
        if removed.is_some() {
            self.version += 1;
        }
        removed
    }

    pub fn get(&self, id: VolumeId) -> Option<&SolidEntry> {
        self.entries.get(&id)
    }

    /// All entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (VolumeId, &SolidEntry)> {
        self.entries.iter().map(|(id, entry)| (*id, entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace the bounds of a registered volume (agent bodies, relocation).
    pub fn set_bounds(&mut self, id: VolumeId, volume: Volume) -> bool {
        let Some(entry) = self.entries.get_mut(&id) else {
            return false;
        };
        entry.valid = volume.is_valid();
        entry.volume = volume;
        self.version += 1;
        true
    }

    pub fn translate(&mut self, id: VolumeId, offset: Vec3) -> bool {
        let Some(volume) = self.entries.get(&id).map(|e| e.volume) else {
            return false;
        };
        self.set_bounds(id, volume.translated(offset))
    }

    #[inline]
    fn valid_entries(&self) -> impl Iterator<Item = (VolumeId, &SolidEntry)> {
        self.iter().filter(|(_, e)| e.valid)
    }

    /// Every valid volume whose closest point lies within `radius` of `point`.
    pub fn query_near(&self, point: Vec3, radius: f32) -> Vec<VolumeId> {
        let r2 = radius * radius;
        self.valid_entries()
            .filter(|(_, e)| e.volume.distance_squared(point) <= r2)
            .map(|(id, _)| id)
            .collect()
    }

    /// True when any solid volume lies within `radius` of `point` (distance == radius blocks).
    #[inline]
    pub fn is_blocked(&self, point: Vec3, radius: f32) -> bool {
        self.is_blocked_except(point, radius, None)
    }

    /// Same as [`Self::is_blocked`] but ignoring one volume (an agent's own body).
    pub fn is_blocked_except(&self, point: Vec3, radius: f32, skip: Option<VolumeId>) -> bool {
        let r2 = radius * radius;
        self.valid_entries().any(|(id, e)| {
            e.traits.solid && Some(id) != skip && e.volume.distance_squared(point) <= r2
        })
    }

    /// Highest standing surface under `point` (XZ) that is no more than `max_rise` above `feet_y`.
    ///
    /// Considers solid volumes whose footprint is within `foot_radius` of the point.
    /// The ground plane at y = 0 is always a candidate.
    pub fn support_height(&self, point: Vec2, feet_y: f32, foot_radius: f32, max_rise: f32) -> f32 {
        let ceiling = feet_y + max_rise;
        self.valid_entries()
            .filter(|(_, e)| e.traits.solid && e.category != VolumeCategory::AgentBody)
            .filter(|(_, e)| e.volume.top() <= ceiling && e.volume.footprint_contains(point, foot_radius))
            .map(|(_, e)| e.volume.top())
            .fold(0.0, f32::max)
    }

    /// The first ladder marker whose base is within reach of a climber.
    pub fn ladder_near(&self, point: Vec2, feet_y: f32, reach: f32) -> Option<VolumeId> {
        self.valid_entries()
            .find(|(_, e)| {
                e.traits.ladder.is_some_and(|span| {
                    span.column.distance(point) < reach && (feet_y - span.bottom_y).abs() < reach
                })
            })
            .map(|(id, _)| id)
    }

    /// March a ray and return the first sample point that is blocked within `radius`.
    ///
    /// Uses the same query as movement so hit-testing and collision never disagree.
    pub fn ray_hit(&self, origin: Vec3, direction: Vec3, max_distance: f32, radius: f32) -> Option<Vec3> {
        let dir = direction.normalize_or_zero();
        if dir == Vec3::ZERO || max_distance <= 0.0 {
            return None;
        }
        let step = radius.max(0.05);
        let steps = (max_distance / step).ceil() as usize;
        (1..=steps)
            .map(|i| origin + dir * (i as f32 * step).min(max_distance))
            .find(|p| self.is_blocked(*p, radius))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box(registry: &mut SolidRegistry) -> VolumeId {
        registry.register(
            Volume::new(Vec3::ZERO, Vec3::ONE),
            VolumeTraits::SOLID,
            VolumeCategory::Cover,
            None,
        )
    }

    #[test]
    fn test_blocked_boundary_is_inclusive() {
        let mut registry = SolidRegistry::new();
        unit_box(&mut registry);

        // Exactly `radius` away from the +X face.
        assert!(registry.is_blocked(Vec3::new(3.0, 0.5, 0.5), 2.0));
        assert!(!registry.is_blocked(Vec3::new(3.01, 0.5, 0.5), 2.0));
        // Inside the box.
        assert!(registry.is_blocked(Vec3::splat(0.5), 0.0));
    }

    #[test]
    fn test_non_solid_does_not_block_but_is_queried() {
        let mut registry = SolidRegistry::new();
        let id = registry.register(
            Volume::new(Vec3::ZERO, Vec3::ONE),
            VolumeTraits::CLIMBABLE,
            VolumeCategory::LadderRung,
            None,
        );
        assert!(!registry.is_blocked(Vec3::splat(0.5), 1.0));
        assert_eq!(registry.query_near(Vec3::splat(0.5), 1.0), vec![id]);
    }

    #[test]
    fn test_malformed_volume_excluded() {
        let mut registry = SolidRegistry::new();
        registry.register(
            Volume::new(Vec3::ONE, Vec3::ZERO),
            VolumeTraits::SOLID,
            VolumeCategory::Cover,
            None,
        );
        registry.register(
            Volume::new(Vec3::new(f32::NAN, 0.0, 0.0), Vec3::ONE),
            VolumeTraits::SOLID,
            VolumeCategory::Cover,
            None,
        );
        assert_eq!(registry.len(), 2);
        assert!(!registry.is_blocked(Vec3::splat(0.5), 5.0));
        assert!(registry.query_near(Vec3::splat(0.5), 5.0).is_empty());
    }

    #[test]
    fn test_unregister_and_skip() {
        let mut registry = SolidRegistry::new();
        let id = unit_box(&mut registry);
        let version = registry.version;

        assert!(!registry.is_blocked_except(Vec3::splat(0.5), 0.1, Some(id)));
        assert!(registry.unregister(id).is_some());
        assert!(registry.version > version);
        assert!(!registry.is_blocked(Vec3::splat(0.5), 0.1));
        assert!(registry.unregister(id).is_none());
    }

    #[test]
    fn test_support_height_respects_max_rise() {
        let mut registry = SolidRegistry::new();
        registry.register(
            Volume::from_footprint(Vec2::ZERO, 4.0, 4.0, 0.0, 0.2),
            VolumeTraits::SOLID,
            VolumeCategory::BuildingFloor,
            None,
        );
        registry.register(
            Volume::from_footprint(Vec2::ZERO, 4.0, 4.0, 5.0, 0.2),
            VolumeTraits::SOLID,
            VolumeCategory::Roof,
            None,
        );

        assert!((registry.support_height(Vec2::ZERO, 0.0, 0.5, 0.3) - 0.2).abs() < 1e-6);
        assert!((registry.support_height(Vec2::ZERO, 5.2, 0.5, 0.3) - 5.2).abs() < 1e-6);
        assert_eq!(registry.support_height(Vec2::new(10.0, 10.0), 5.2, 0.5, 0.3), 0.0);
    }

    #[test]
    fn test_ray_hit_stops_at_wall() {
        let mut registry = SolidRegistry::new();
        registry.register(
            Volume::new(Vec3::new(10.0, 0.0, -5.0), Vec3::new(10.5, 5.0, 5.0)),
            VolumeTraits::SOLID,
            VolumeCategory::BuildingWall,
            None,
        );

        let hit = registry
            .ray_hit(Vec3::new(0.0, 1.0, 0.0), Vec3::X, 50.0, 0.1)
            .expect("ray should hit the wall");
        assert!(hit.x >= 9.8 && hit.x <= 10.2);
        assert!(registry.ray_hit(Vec3::new(0.0, 1.0, 0.0), -Vec3::X, 50.0, 0.1).is_none());
    }
}
