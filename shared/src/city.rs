//! City generation pipeline.
//!
//! Stages run in a fixed order: border, roads, structures, road-overlap correction,
//! rooftop connectors, street furniture, spawn points, teleporters. Everything placed
//! is registered in the [`SolidRegistry`] as it is created; the returned [`CityLayout`]
//! keeps the higher-level records (roads, buildings, connectors) that later passes and
//! the simulation read.

use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::building::{Building, BuildingKind};
use crate::config::CityConfig;
use crate::roads::{self, RoadSegment, SpawnPoint};
use crate::rooftops::{self, Ladder, Plank, Staircase};
use crate::spatial::{SolidRegistry, VolumeId};
use crate::structures;
use crate::teleport::{self, Teleporter};
use crate::volume::{footprint_overlap, StructureId, Volume, VolumeCategory, VolumeTraits};

/// Extra clearance added when pushing a structure off a road.
pub const OVERLAP_MARGIN: f32 = 2.0;

/// Footprint overlaps below this are ignored.
pub const OVERLAP_EPSILON: f32 = 0.01;

/// Relocation never pushes a structure's anchor closer than this to the map edge.
pub const RELOCATION_EDGE_MARGIN: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StructureKind {
    Building(BuildingKind),
    Container,
    Cover,
    Platform,
    BorderWall,
    StreetFurniture,
    Ladder,
    Staircase,
    PlankBridge,
    TeleportPad,
}

/// A group of volumes that moves as one rigid unit.
#[derive(Debug, Clone)]
pub struct Structure {
    pub id: StructureId,
    pub kind: StructureKind,
    /// Reference point on the XZ plane (footprint center for most kinds).
    pub anchor: Vec2,
    pub volumes: Vec<VolumeId>,
    /// Index into [`CityLayout::buildings`] when the structure contains one.
    pub building: Option<usize>,
}

/// Everything generation produced besides the registered volumes.
#[derive(Debug, Clone, Default)]
pub struct CityLayout {
    pub seed: u64,
    pub map_half: f32,
    pub roads: Vec<RoadSegment>,
    pub structures: Vec<Structure>,
    pub buildings: Vec<Building>,
    pub ladders: Vec<Ladder>,
    pub stairs: Vec<Staircase>,
    pub planks: Vec<Plank>,
    pub intersections: Vec<Vec2>,
    pub spawn_points: Vec<SpawnPoint>,
    pub teleporters: Vec<Teleporter>,
    /// Structures still overlapping a road after correction.
    pub residual_overlaps: usize,
}

impl CityLayout {
    pub fn structure(&self, id: StructureId) -> Option<&Structure> {
        self.structures.get(id.0 as usize)
    }

    /// Index of the building with the highest roof.
    pub fn tallest_building(&self) -> Option<usize> {
        self.buildings
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.top_height.total_cmp(&b.top_height))
            .map(|(i, _)| i)
    }

    /// Buildings whose roof can be reached from the ground without bridges.
    pub fn ground_accessible_roofs(&self) -> BTreeSet<usize> {
        self.ladders
            .iter()
            .map(|l| l.building)
            .chain(self.stairs.iter().map(|s| s.building))
            .collect()
    }
}

/// Mutable generation state shared by every placement pass.
#[derive(Debug, Default)]
pub struct CityBuilder {
    pub registry: SolidRegistry,
    pub layout: CityLayout,
}

impl CityBuilder {
    pub fn new(map_half: f32, seed: u64) -> Self {
        Self {
            registry: SolidRegistry::new(),
            layout: CityLayout {
                seed,
                map_half,
                ..default()
            },
        }
    }

    pub fn begin_structure(&mut self, kind: StructureKind, anchor: Vec2) -> StructureId {
        let id = StructureId(self.layout.structures.len() as u32);
        self.layout.structures.push(Structure {
            id,
            kind,
            anchor,
            volumes: Vec::new(),
            building: None,
        });
        id
    }

    /// Register a volume owned by `owner`.
    pub fn add_volume(
        &mut self,
        owner: StructureId,
        volume: Volume,
        traits: VolumeTraits,
        category: VolumeCategory,
    ) -> VolumeId {
        let id = self.registry.register(volume, traits, category, Some(owner));
        if let Some(structure) = self.layout.structures.get_mut(owner.0 as usize) {
            structure.volumes.push(id);
        }
        id
    }

    /// Register a building's shell under `owner` and record it.
    pub fn add_building(
        &mut self,
        owner: StructureId,
        kind: BuildingKind,
        center: Vec2,
        width: f32,
        depth: f32,
        wall_height: f32,
    ) -> usize {
        let building = Building::new(owner, kind, center, width, depth, wall_height);
        for (volume, traits, category) in building.shell() {
            self.add_volume(owner, volume, traits, category);
        }
        let index = self.layout.buildings.len();
        self.layout.buildings.push(building);
        if let Some(structure) = self.layout.structures.get_mut(owner.0 as usize) {
            structure.building = Some(index);
        }
        index
    }

    /// Convenience for the common one-building structure.
    pub fn place_building(
        &mut self,
        kind: BuildingKind,
        center: Vec2,
        width: f32,
        depth: f32,
        wall_height: f32,
    ) -> usize {
        let owner = self.begin_structure(StructureKind::Building(kind), center);
        self.add_building(owner, kind, center, width, depth, wall_height)
    }

    /// Move every volume of a structure (and its building record) by `offset`.
    pub fn translate_structure(&mut self, id: StructureId, offset: Vec2) {
        let Some(structure) = self.layout.structures.get_mut(id.0 as usize) else {
            return;
        };
        structure.anchor += offset;
        let offset3 = Vec3::new(offset.x, 0.0, offset.y);
        for volume in &structure.volumes {
            self.registry.translate(*volume, offset3);
        }
        if let Some(b) = structure.building {
            if let Some(building) = self.layout.buildings.get_mut(b) {
                building.center += offset;
            }
        }
    }

    /// Unregister every volume of a structure and drop its building record.
    pub fn remove_structure(&mut self, id: StructureId) {
        let Some(structure) = self.layout.structures.get_mut(id.0 as usize) else {
            return;
        };
        let volumes = std::mem::take(&mut structure.volumes);
        let building = structure.building.take();
        for volume in volumes {
            self.registry.unregister(volume);
        }

        let Some(index) = building.filter(|i| *i < self.layout.buildings.len()) else {
            return;
        };
        self.layout.buildings.remove(index);
        for other in &mut self.layout.structures {
            if let Some(b) = other.building.as_mut() {
                if *b > index {
                    *b -= 1;
                }
            }
        }
    }

    pub fn finish(self) -> (SolidRegistry, CityLayout) {
        (self.registry, self.layout)
    }
}

/// Register road surfaces as solid slabs just under the ground plane and record them.
pub fn register_roads(builder: &mut CityBuilder, roads: Vec<RoadSegment>) {
    for road in &roads {
        builder
            .registry
            .register(road.volume(), VolumeTraits::ROAD, VolumeCategory::Road, None);
    }
    builder.layout.roads.extend(roads);
}

/// Generate a full city from `config` with an explicit seed.
pub fn generate_city(config: &CityConfig, seed: u64) -> (SolidRegistry, CityLayout) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut builder = CityBuilder::new(config.map_half(), seed);

    structures::place_border_walls(&mut builder, config);

    let roads = roads::generate_road_network(config, &mut rng);
    register_roads(&mut builder, roads);

    structures::place_offices(&mut builder, config, &mut rng);
    structures::place_medium_buildings(&mut builder, config, &mut rng);
    structures::place_landmarks(&mut builder, config, &mut rng);
    structures::place_filler(&mut builder, config, &mut rng);
    structures::place_training_ground(&mut builder, config, &mut rng);

    let residual = correct_road_overlaps(&mut builder, config.correction_rounds);
    builder.layout.residual_overlaps = residual;
    if residual > 0 {
        warn!(
            "{} structure(s) still overlap a road after {} correction round(s)",
            residual, config.correction_rounds
        );
    }

    rooftops::synthesize(&mut builder, config, &mut rng);

    builder.layout.intersections = roads::intersections(&builder.layout.roads);
    structures::place_street_furniture(&mut builder, config);
    builder.layout.spawn_points = roads::spawn_points(&builder.layout.roads);
    teleport::place_teleporters(&mut builder, config);

    let layout = &builder.layout;
    info!(
        "Generated city (seed {}): {} roads, {} buildings, {} intersections, {} ladders, {} staircases, {} planks, {} volumes",
        seed,
        layout.roads.len(),
        layout.buildings.len(),
        layout.intersections.len(),
        layout.ladders.len(),
        layout.stairs.len(),
        layout.planks.len(),
        builder.registry.len()
    );

    builder.finish()
}

/// Directions a structure may be pushed off a road, tried in this order.
const PUSH_DIRECTIONS: [Vec2; 4] = [Vec2::X, Vec2::NEG_X, Vec2::Y, Vec2::NEG_Y];

/// Roads one push may chain through before that direction is given up.
pub const MAX_CHAINED_PUSHES: usize = 8;

fn shifted(rect: Rect, offset: Vec2) -> Rect {
    Rect {
        min: rect.min + offset,
        max: rect.max + offset,
    }
}

/// How far `rect` has to travel along `dir` (a unit world axis) to leave `road`.
fn push_depth(rect: Rect, road: Rect, dir: Vec2) -> f32 {
    if dir.x > 0.0 {
        road.max.x - rect.min.x
    } else if dir.x < 0.0 {
        rect.max.x - road.min.x
    } else if dir.y > 0.0 {
        road.max.y - rect.min.y
    } else {
        rect.max.y - road.min.y
    }
}

/// Footprints of the solid relocatable volumes a structure owns.
fn structure_footprints(builder: &CityBuilder, owner: StructureId) -> Vec<Rect> {
    let Some(structure) = builder.layout.structure(owner) else {
        return Vec::new();
    };
    structure
        .volumes
        .iter()
        .filter_map(|id| builder.registry.get(*id))
        .filter(|e| e.is_valid() && e.traits.solid && e.category.is_relocatable())
        .map(|e| e.volume.footprint())
        .collect()
}

/// Smallest push along `dir` after which no footprint touches any road. A push that lands
/// on another road keeps going past it. `None` when the result would leave `limit`.
fn clearing_push(footprints: &[Rect], roads: &[Rect], dir: Vec2, limit: f32) -> Option<Vec2> {
    let mut offset = Vec2::ZERO;
    for _ in 0..=MAX_CHAINED_PUSHES {
        let mut depth = 0.0_f32;
        for footprint in footprints {
            let moved = shifted(*footprint, offset);
            for road in roads {
                if footprint_overlap(moved, *road, OVERLAP_EPSILON).is_some() {
                    depth = depth.max(push_depth(moved, *road, dir));
                }
            }
        }

        if depth <= 0.0 {
            let inside = footprints.iter().all(|fp| {
                let moved = shifted(*fp, offset);
                moved.min.cmpge(Vec2::splat(-limit)).all() && moved.max.cmple(Vec2::splat(limit)).all()
            });
            return (offset != Vec2::ZERO && inside).then_some(offset);
        }
        offset += dir * (depth + OVERLAP_MARGIN);
    }
    None
}

/// Number of other structures' solid volumes the moved footprints would land on.
fn crowding(builder: &CityBuilder, owner: StructureId, footprints: &[Rect], offset: Vec2) -> usize {
    builder
        .registry
        .iter()
        .filter(|(_, e)| {
            e.is_valid() && e.traits.solid && e.category.is_relocatable() && e.owner != Some(owner)
        })
        .filter(|(_, e)| {
            let other = e.volume.footprint();
            footprints
                .iter()
                .any(|fp| footprint_overlap(shifted(*fp, offset), other, OVERLAP_EPSILON).is_some())
        })
        .count()
}

/// Structures that currently overlap at least one road.
pub fn overlapping_structures(builder: &CityBuilder) -> BTreeSet<StructureId> {
    let mut out = BTreeSet::new();
    for road in &builder.layout.roads {
        let road_rect = road.footprint();
        for (_, entry) in builder.registry.iter() {
            if !entry.is_valid() || !entry.traits.solid || !entry.category.is_relocatable() {
                continue;
            }
            if footprint_overlap(entry.volume.footprint(), road_rect, OVERLAP_EPSILON).is_some() {
                if let Some(owner) = entry.owner {
                    out.insert(owner);
                }
            }
        }
    }
    out
}

/// Move relocatable structures off roads. Returns the number still overlapping afterwards.
///
/// Each overlapping structure is pushed along whichever world axis clears every road with
/// the least travel, preferring spots not already taken by another structure. A structure
/// with no road-free spot inside the map is removed.
pub fn correct_road_overlaps(builder: &mut CityBuilder, rounds: u32) -> usize {
    let limit = builder.layout.map_half - RELOCATION_EDGE_MARGIN;
    let roads: Vec<Rect> = builder.layout.roads.iter().map(RoadSegment::footprint).collect();

    for round in 0..rounds {
        let overlapping = overlapping_structures(builder);
        if overlapping.is_empty() {
            break;
        }

        let (mut moved, mut removed) = (0, 0);
        for owner in overlapping {
            let footprints = structure_footprints(builder, owner);
            let best = PUSH_DIRECTIONS
                .iter()
                .filter_map(|dir| clearing_push(&footprints, &roads, *dir, limit))
                .map(|offset| (crowding(builder, owner, &footprints, offset), offset))
                .min_by(|a, b| {
                    a.0.cmp(&b.0)
                        .then(a.1.length_squared().total_cmp(&b.1.length_squared()))
                })
                .map(|(_, offset)| offset);

            match best {
                Some(offset) => {
                    trace!("Moving {:?} off the road by {:?}", owner, offset);
                    builder.translate_structure(owner, offset);
                    moved += 1;
                }
                None => {
                    debug!("No road-free spot for {:?}, removing it", owner);
                    builder.remove_structure(owner);
                    removed += 1;
                }
            }
        }

        debug!(
            "Overlap correction round {}: moved {}, removed {}",
            round + 1,
            moved,
            removed
        );
    }

    overlapping_structures(builder).len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::npc::{BOT_CENTER_HEIGHT, BOT_RADIUS};
    use crate::player::{AVATAR_EYE_HEIGHT, AVATAR_RADIUS};
    use crate::roads::RoadClass;

    #[test]
    fn test_overlap_correction_clears_hand_built_layout() {
        let mut builder = CityBuilder::new(600.0, 1);
        builder.layout.roads.push(RoadSegment::along_x(
            Vec2::new(0.0, 0.0),
            200.0,
            8.0,
            RoadClass::Arterial,
        ));
        // 20x20 building whose south wall sits 6 units into the road.
        let b = builder.place_building(BuildingKind::MidRise, Vec2::new(10.0, 12.0), 20.0, 20.0, 9.0);
        assert_eq!(overlapping_structures(&builder).len(), 1);

        let residual = correct_road_overlaps(&mut builder, 4);
        assert_eq!(residual, 0);

        let building = &builder.layout.buildings[b];
        // Roof overhang reaches z = 1.8, road max z is 4: moved +z by 2.2 + margin.
        assert!((building.center.y - 16.2).abs() < 1e-4);
        assert_eq!(building.center.x, 10.0);
    }

    #[test]
    fn test_push_skips_past_neighbouring_road() {
        let mut builder = CityBuilder::new(600.0, 1);
        builder
            .layout
            .roads
            .push(RoadSegment::along_x(Vec2::ZERO, 100.0, 8.0, RoadClass::Local));
        builder.layout.roads.push(RoadSegment::along_x(
            Vec2::new(0.0, 10.0),
            100.0,
            8.0,
            RoadClass::Local,
        ));
        // Roof spans z -1.2..5.2: the short push north lands on the second road.
        let b = builder.place_building(BuildingKind::Warehouse, Vec2::new(0.0, 2.0), 6.0, 6.0, 4.0);

        assert_eq!(correct_road_overlaps(&mut builder, 4), 0);
        let building = &builder.layout.buildings[b];
        assert!((building.center.y - (2.0 - 11.2)).abs() < 1e-4);
        assert!(overlapping_structures(&builder).is_empty());
    }

    #[test]
    fn test_structure_without_free_spot_is_removed() {
        let mut builder = CityBuilder::new(30.0, 1);
        builder
            .layout
            .roads
            .push(RoadSegment::along_x(Vec2::ZERO, 100.0, 30.0, RoadClass::Arterial));
        builder.place_building(BuildingKind::Warehouse, Vec2::ZERO, 10.0, 10.0, 4.0);
        let kept = builder.place_building(BuildingKind::Warehouse, Vec2::new(0.0, 22.0), 4.0, 4.0, 4.0);
        assert_eq!(kept, 1);
        let dropped_id = StructureId(0);
        let dropped_volumes = builder.layout.structures[0].volumes.clone();

        assert_eq!(correct_road_overlaps(&mut builder, 4), 0);
        assert!(builder.layout.structure(dropped_id).unwrap().volumes.is_empty());
        assert!(dropped_volumes.iter().all(|v| builder.registry.get(*v).is_none()));
        assert_eq!(builder.layout.buildings.len(), 1);
        assert_eq!(builder.layout.buildings[0].center, Vec2::new(0.0, 22.0));
        assert_eq!(builder.layout.structure(StructureId(1)).unwrap().building, Some(0));
    }

    #[test]
    fn test_roads_are_solid_under_the_ground_plane() {
        let mut builder = CityBuilder::new(600.0, 1);
        register_roads(
            &mut builder,
            vec![RoadSegment::along_x(Vec2::ZERO, 100.0, 8.0, RoadClass::Local)],
        );
        let (registry, _) = builder.finish();

        let hit = registry
            .ray_hit(Vec3::new(5.0, 10.0, 0.0), Vec3::NEG_Y, 20.0, 0.1)
            .expect("downward ray should hit the road");
        assert!(hit.y <= 0.1 + 1e-3 && hit.y > -0.1);

        // Agents standing on the road are clear of it.
        assert!(!registry.is_blocked(Vec3::new(5.0, AVATAR_EYE_HEIGHT, 0.0), AVATAR_RADIUS));
        assert!(!registry.is_blocked(Vec3::new(5.0, BOT_CENTER_HEIGHT, 0.0), BOT_RADIUS));
    }

    #[test]
    fn test_structures_move_rigidly() {
        let mut builder = CityBuilder::new(600.0, 1);
        builder.layout.roads.push(RoadSegment::along_z(Vec2::ZERO, 100.0, 8.0, RoadClass::Local));
        let owner = builder.begin_structure(StructureKind::Container, Vec2::new(3.0, 0.0));
        let body = builder.add_volume(
            owner,
            Volume::from_footprint(Vec2::new(3.0, 0.0), 4.0, 2.0, 0.0, 3.0),
            VolumeTraits::CLIMBABLE_SOLID,
            VolumeCategory::Container,
        );
        let cap = builder.add_volume(
            owner,
            Volume::from_footprint(Vec2::new(3.0, 0.0), 4.0, 2.0, 3.0, 0.1),
            VolumeTraits::CLIMBABLE_SOLID,
            VolumeCategory::ContainerCap,
        );

        correct_road_overlaps(&mut builder, 2);

        let body_v = builder.registry.get(body).unwrap().volume;
        let cap_v = builder.registry.get(cap).unwrap().volume;
        assert!(body_v.min.x >= 4.0);
        assert_eq!(body_v.min.x, cap_v.min.x);
        assert_eq!(body_v.min.z, cap_v.min.z);
    }

    #[test]
    fn test_generated_cities_keep_structures_off_roads() {
        for seed in [1, 2, 3, 42, 1200, 1234] {
            let (registry, layout) = generate_city(&CityConfig::default(), seed);
            assert_eq!(layout.residual_overlaps, 0, "seed {}", seed);

            for road in &layout.roads {
                let road_rect = road.footprint();
                for (_, entry) in registry.iter() {
                    if !entry.traits.solid || !entry.category.is_relocatable() {
                        continue;
                    }
                    assert!(
                        footprint_overlap(entry.volume.footprint(), road_rect, OVERLAP_EPSILON).is_none(),
                        "seed {}: {:?} {:?} sits on a road",
                        seed,
                        entry.owner,
                        entry.category
                    );
                }
            }
        }
    }

    #[test]
    fn test_generation_is_reproducible() {
        let config = CityConfig::default();
        let (reg_a, layout_a) = generate_city(&config, 99);
        let (reg_b, layout_b) = generate_city(&config, 99);
        assert_eq!(reg_a.len(), reg_b.len());
        assert_eq!(layout_a.roads, layout_b.roads);
        assert_eq!(layout_a.buildings, layout_b.buildings);
    }

    #[test]
    fn test_tallest_building_gets_a_ladder() {
        let (_, layout) = generate_city(&CityConfig::default(), 5);
        let tallest = layout.tallest_building().unwrap();
        assert!(layout.ladders.iter().any(|l| l.building == tallest));
    }
}
