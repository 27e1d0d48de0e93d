//! Rooftop connectivity: a ladder on the tallest building, exterior staircases, and
//! plank bridges between neighbouring roofs of similar height.
//!
//! Bridges only ever extend existing rooftop access. A candidate bridge is kept only if
//! the group of roofs it joins contains at least one roof reachable from the ground.

use bevy::prelude::*;
use rand::Rng;
use std::collections::BTreeSet;

use crate::building::{Building, ROOF_OVERHANG};
use crate::city::{CityBuilder, StructureKind};
use crate::config::CityConfig;
use crate::spatial::VolumeId;
use crate::structures::stepped_run;
use crate::volume::{LadderSpan, Volume, VolumeCategory, VolumeTraits};

// =============================================================================
// TUNING
// =============================================================================

pub const RUNG_SPACING: f32 = 0.28;
pub const RUNG_START_Y: f32 = 0.5;
pub const RUNG_MIN_COUNT: usize = 6;
pub const RUNG_SIZE: Vec3 = Vec3::new(0.02, 0.02, 0.6);
/// Rungs sit this far outside the wall.
pub const LADDER_WALL_OFFSET: f32 = 0.5;
/// Climbers are pinned this far outside the wall (clear of it for the avatar radius).
pub const LADDER_COLUMN_OFFSET: f32 = 1.3;
/// Climbers step off this far inside the wall once on top.
pub const LADDER_DISMOUNT_INSET: f32 = 1.5;

/// Staircases are only added to roofs up to this height.
pub const STAIR_MAX_ROOF: f32 = 45.0;

pub const PLANK_NEIGHBORS: usize = 2;
pub const PLANK_MAX_SPAN: f32 = 220.0;
pub const PLANK_MAX_HEIGHT_DIFF: f32 = 3.0;
/// Plank ends start this far inside each roof edge.
pub const PLANK_EDGE_INSET: f32 = 0.6;
pub const PLANK_MIN_SPAN: f32 = 1.0;
pub const PLANK_SEGMENT_LENGTH: f32 = 2.0;
pub const PLANK_THICKNESS: f32 = 0.2;

// =============================================================================
// RECORDS
// =============================================================================

#[derive(Debug, Clone)]
pub struct Ladder {
    pub building: usize,
    pub marker: VolumeId,
    pub rungs: Vec<VolumeId>,
    pub span: LadderSpan,
}

#[derive(Debug, Clone)]
pub struct Staircase {
    pub building: usize,
    /// Outward direction of the run.
    pub side: Vec2,
    pub steps: Vec<VolumeId>,
}

/// A bridge between two roofs. Rendering uses yaw/pitch/length; collision uses the
/// chain of axis-aligned segments.
#[derive(Debug, Clone)]
pub struct Plank {
    pub from: usize,
    pub to: usize,
    pub start: Vec3,
    pub end: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub width: f32,
    pub length: f32,
    pub segments: Vec<VolumeId>,
}

// =============================================================================
// CONNECTORS
// =============================================================================

/// Run every rooftop pass over the placed buildings.
pub fn synthesize(builder: &mut CityBuilder, config: &CityConfig, rng: &mut impl Rng) {
    if let Some(tallest) = builder.layout.tallest_building() {
        let ladder = attach_ladder(builder, tallest);
        builder.layout.ladders.push(ladder);
    }

    const SIDES: [Vec2; 4] = [Vec2::X, Vec2::NEG_X, Vec2::Y, Vec2::NEG_Y];
    for index in 0..builder.layout.buildings.len() {
        if builder.layout.buildings[index].top_height > STAIR_MAX_ROOF {
            continue;
        }
        if !rng.gen_bool(config.stair_chance.clamp(0.0, 1.0)) {
            continue;
        }
        let side = SIDES[rng.gen_range(0..SIDES.len())];
        let stairs = attach_stairs(builder, index, side);
        builder.layout.stairs.push(stairs);
    }

    let candidates = bridge_candidates(&builder.layout.buildings);
    let accessible = builder.layout.ground_accessible_roofs();
    let kept = reachable_bridges(builder.layout.buildings.len(), &candidates, &accessible);
    debug!(
        "Rooftop bridges: {} candidate(s), {} reachable from the ground",
        candidates.len(),
        kept.len()
    );
    for (a, b) in kept {
        if let Some(plank) = build_plank(builder, a, b) {
            builder.layout.planks.push(plank);
        }
    }
}

/// Rungs up the +X face of a building plus the invisible marker the climb state reads.
pub fn attach_ladder(builder: &mut CityBuilder, building: usize) -> Ladder {
    let b = builder.layout.buildings[building].clone();
    let wall_x = b.center.x + b.width * 0.5;
    let top = b.top_height;
    let ladder_top = top - 0.1;

    let owner = builder.begin_structure(StructureKind::Ladder, Vec2::new(wall_x, b.center.y));

    let count = (((ladder_top - RUNG_START_Y) / RUNG_SPACING).floor() as usize + 1).max(RUNG_MIN_COUNT);
    let spacing = (ladder_top - RUNG_START_Y) / (count - 1) as f32;
    let rungs = (0..count)
        .map(|i| {
            let center = Vec3::new(
                wall_x + LADDER_WALL_OFFSET,
                RUNG_START_Y + i as f32 * spacing,
                b.center.y,
            );
            builder.add_volume(
                owner,
                Volume::from_center_size(center, RUNG_SIZE),
                VolumeTraits::CLIMBABLE,
                VolumeCategory::LadderRung,
            )
        })
        .collect();

    let column = Vec2::new(wall_x + LADDER_COLUMN_OFFSET, b.center.y);
    let span = LadderSpan {
        bottom_y: 0.0,
        top_y: top,
        column,
        dismount: Vec2::new(wall_x - LADDER_DISMOUNT_INSET, b.center.y),
    };
    let marker = builder.add_volume(
        owner,
        Volume::from_footprint(column, 1.0, 1.0, span.bottom_y, top - span.bottom_y),
        VolumeTraits::ladder(span),
        VolumeCategory::LadderMarker,
    );

    trace!("Ladder on building {} (top {:.1}) with {} rungs", building, top, count);

    Ladder {
        building,
        marker,
        rungs,
        span,
    }
}

/// Exterior staircase running straight out from one side of the roof.
pub fn attach_stairs(builder: &mut CityBuilder, building: usize, side: Vec2) -> Staircase {
    let b = builder.layout.buildings[building].clone();
    let edge = b.center + side * (b.edge_distance(side) + ROOF_OVERHANG);
    let owner = builder.begin_structure(StructureKind::Staircase, edge);

    let steps = stepped_run(edge, side, b.top_height)
        .into_iter()
        .map(|step| builder.add_volume(owner, step, VolumeTraits::CLIMBABLE_SOLID, VolumeCategory::RoofStep))
        .collect();

    Staircase {
        building,
        side,
        steps,
    }
}

/// Undirected pairs (a < b) between each building and its nearest neighbours that are
/// close enough and of similar roof height.
pub fn bridge_candidates(buildings: &[Building]) -> Vec<(usize, usize)> {
    let mut pairs = BTreeSet::new();

    for (i, a) in buildings.iter().enumerate() {
        let mut neighbours: Vec<(usize, f32)> = buildings
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(j, b)| (j, a.center.distance(b.center)))
            .collect();
        neighbours.sort_by(|x, y| x.1.total_cmp(&y.1));

        for (j, dist) in neighbours.into_iter().take(PLANK_NEIGHBORS) {
            let b = &buildings[j];
            if dist <= PLANK_MAX_SPAN && (a.top_height - b.top_height).abs() <= PLANK_MAX_HEIGHT_DIFF {
                pairs.insert((i.min(j), i.max(j)));
            }
        }
    }

    pairs.into_iter().collect()
}

/// Keep the candidate bridges whose connected roof group contains an accessible roof.
pub fn reachable_bridges(
    building_count: usize,
    candidates: &[(usize, usize)],
    accessible: &BTreeSet<usize>,
) -> Vec<(usize, usize)> {
    let mut parent: Vec<usize> = (0..building_count).collect();

    fn find(parent: &mut [usize], mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }

    for &(a, b) in candidates {
        let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
        if ra != rb {
            parent[ra] = rb;
        }
    }

    let grounded: BTreeSet<usize> = accessible
        .iter()
        .filter(|&&i| i < building_count)
        .map(|&i| find(&mut parent, i))
        .collect();

    candidates
        .iter()
        .copied()
        .filter(|&(a, _)| grounded.contains(&find(&mut parent, a)))
        .collect()
}

/// Plank between the facing roof edges of two buildings.
pub fn build_plank(builder: &mut CityBuilder, from: usize, to: usize) -> Option<Plank> {
    let a = builder.layout.buildings[from].clone();
    let b = builder.layout.buildings[to].clone();

    let dir = (b.center - a.center).normalize_or_zero();
    if dir == Vec2::ZERO {
        return None;
    }
    let start_xz = a.center + dir * (a.edge_distance(dir) + ROOF_OVERHANG - PLANK_EDGE_INSET);
    let end_xz = b.center - dir * (b.edge_distance(-dir) + ROOF_OVERHANG - PLANK_EDGE_INSET);
    let horiz = (end_xz - start_xz).dot(dir);
    if horiz < PLANK_MIN_SPAN {
        return None;
    }

    let start = Vec3::new(start_xz.x, a.top_height, start_xz.y);
    let end = Vec3::new(end_xz.x, b.top_height, end_xz.y);
    let delta = end - start;
    let width = (horiz * 0.08).clamp(0.6, 2.0);

    let owner = builder.begin_structure(StructureKind::PlankBridge, (start_xz + end_xz) * 0.5);
    let count = ((horiz / PLANK_SEGMENT_LENGTH).ceil() as usize).max(1);
    let seg_len = horiz / count as f32;
    let half = Vec2::new(
        dir.x.abs() * seg_len * 0.5 + dir.y.abs() * width * 0.5,
        dir.y.abs() * seg_len * 0.5 + dir.x.abs() * width * 0.5,
    );

    let segments = (0..count)
        .map(|k| {
            let p0 = start + delta * (k as f32 / count as f32);
            let p1 = start + delta * ((k + 1) as f32 / count as f32);
            let mid = (p0 + p1) * 0.5;
            let top = p0.y.max(p1.y);
            let bottom = p0.y.min(p1.y) - PLANK_THICKNESS;
            let volume = Volume::new(
                Vec3::new(mid.x - half.x, bottom, mid.z - half.y),
                Vec3::new(mid.x + half.x, top, mid.z + half.y),
            );
            builder.add_volume(owner, volume, VolumeTraits::CLIMBABLE_SOLID, VolumeCategory::Plank)
        })
        .collect();

    Some(Plank {
        from,
        to,
        start,
        end,
        yaw: delta.x.atan2(delta.z),
        pitch: delta.y.atan2(horiz),
        width,
        length: delta.length(),
        segments,
    })
}
