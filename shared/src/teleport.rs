//! Teleporter pads: stepping onto a pad moves an agent to its paired destination.

use bevy::prelude::*;

use crate::city::{CityBuilder, StructureKind};
use crate::config::CityConfig;
use crate::spatial::SolidRegistry;
use crate::volume::{Volume, VolumeCategory, VolumeTraits};

pub const TELEPORT_PAD_RADIUS: f32 = 1.2;
/// Horizontal distance from a pad center that triggers it.
pub const TELEPORT_TRIGGER_RADIUS: f32 = 1.3;
pub const TELEPORT_COOLDOWN_SECS: f32 = 0.8;
/// Arrivals land this far from the destination point, toward the map center, so an
/// agent never lands on a pad that would send it straight back.
pub const TELEPORT_ARRIVAL_OFFSET: f32 = 3.0;
pub const BOT_TELEPORT_JITTER: f32 = 2.0;

/// Pad -> destination pairs authored for the default 1200-unit map.
pub const TELEPORT_ROUTES: [((f32, f32), (f32, f32)); 3] = [
    ((-400.0, 400.0), (400.0, -400.0)),
    ((400.0, -400.0), (-400.0, 400.0)),
    ((0.0, 500.0), (0.0, -500.0)),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Teleporter {
    pub pad: Vec2,
    pub destination: Vec2,
}

impl Teleporter {
    pub fn triggers(&self, point: Vec2) -> bool {
        self.pad.distance(point) < TELEPORT_TRIGGER_RADIUS
    }

    /// Candidate landing points around the destination, preferred first.
    pub fn arrival_candidates(&self) -> impl Iterator<Item = Vec2> + '_ {
        let inward = (-self.destination).normalize_or(Vec2::X);
        (0..8).map(move |i| {
            let angle = i as f32 * std::f32::consts::FRAC_PI_4;
            self.destination + Vec2::from_angle(angle).rotate(inward) * TELEPORT_ARRIVAL_OFFSET
        })
    }

    /// First landing point whose probe (at `height` above the ground) is clear of solids.
    pub fn clear_arrival(&self, registry: &SolidRegistry, height: f32, radius: f32) -> Vec2 {
        self.arrival_candidates()
            .find(|p| !registry.is_blocked(Vec3::new(p.x, height, p.y), radius))
            .unwrap_or_else(|| self.arrival_candidates().next().unwrap_or(self.destination))
    }
}

/// The first pad triggered by `point`.
pub fn triggered(teleporters: &[Teleporter], point: Vec2) -> Option<&Teleporter> {
    teleporters.iter().find(|t| t.triggers(point))
}

/// Re-trigger guard shared by every agent that can teleport.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TeleportCooldown {
    pub remaining: f32,
}

impl TeleportCooldown {
    pub fn tick(&mut self, dt: f32) {
        self.remaining = (self.remaining - dt).max(0.0);
    }

    pub fn ready(&self) -> bool {
        self.remaining <= 0.0
    }

    pub fn arm(&mut self) {
        self.remaining = TELEPORT_COOLDOWN_SECS;
    }
}

/// Register pad volumes and record the routes.
pub fn place_teleporters(builder: &mut CityBuilder, config: &CityConfig) {
    let s = config.layout_scale();
    for ((px, pz), (dx, dz)) in TELEPORT_ROUTES {
        let teleporter = Teleporter {
            pad: Vec2::new(px, pz) * s,
            destination: Vec2::new(dx, dz) * s,
        };
        let owner = builder.begin_structure(StructureKind::TeleportPad, teleporter.pad);
        builder.add_volume(
            owner,
            Volume::from_footprint(teleporter.pad, TELEPORT_PAD_RADIUS * 2.0, TELEPORT_PAD_RADIUS * 2.0, 0.0, 0.1),
            VolumeTraits::MARKER,
            VolumeCategory::TeleportPad,
        );
        builder.layout.teleporters.push(teleporter);
    }
}
