//! Vertical integration: gravity, jumping and landing on the highest supporting surface.
//!
//! Horizontal motion is resolved separately (see `movement.rs`); this only moves an
//! agent's feet along Y and reports whether it ended the tick supported.

use bevy::prelude::*;

use crate::spatial::SolidRegistry;

/// Gravity in m/s^2 (negative Y).
pub const GRAVITY: f32 = -30.0;

/// Jump velocity in m/s (upward). Apex is v^2 / 2g, about 1.67 m.
pub const JUMP_VELOCITY: f32 = 10.0;

/// Surfaces up to this far above the feet are walked onto without a step-up probe
/// (floor slabs, thresholds).
pub const MAX_AUTO_STEP: f32 = 0.3;

/// How close to the support we "snap" when falling (prevents tiny hovering).
pub const GROUND_SNAP_DISTANCE: f32 = 0.05;

/// Radius around the feet used to find supporting surfaces.
pub const FOOT_RADIUS: f32 = 0.5;

/// Vertical state of one agent.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VerticalBody {
    pub feet_y: f32,
    pub velocity_y: f32,
    pub grounded: bool,
}

impl VerticalBody {
    pub fn standing_at(feet_y: f32) -> Self {
        Self {
            feet_y,
            velocity_y: 0.0,
            grounded: true,
        }
    }

    /// Start a jump if standing. Returns whether it happened.
    pub fn try_jump(&mut self) -> bool {
        if self.grounded {
            self.velocity_y = JUMP_VELOCITY;
            self.grounded = false;
            true
        } else {
            false
        }
    }

    /// Advance one tick at horizontal position `xz`.
    ///
    /// The support is sampled before integrating so a fast fall cannot skip through a
    /// thin roof slab between ticks.
    pub fn step(&mut self, registry: &SolidRegistry, xz: Vec2, dt: f32) {
        let support = registry.support_height(xz, self.feet_y, FOOT_RADIUS, MAX_AUTO_STEP);

        self.velocity_y += GRAVITY * dt;
        self.feet_y += self.velocity_y * dt;

        if self.feet_y <= support {
            self.feet_y = support;
            if self.velocity_y < 0.0 {
                self.velocity_y = 0.0;
            }
            self.grounded = true;
        } else if self.velocity_y <= 0.0 && self.feet_y - support < GROUND_SNAP_DISTANCE {
            self.feet_y = support;
            self.velocity_y = 0.0;
            self.grounded = true;
        } else {
            self.grounded = false;
        }
    }

    /// Place the feet on a surface directly (step-up, teleport, ladder exits).
    pub fn land_on(&mut self, feet_y: f32) {
        self.feet_y = feet_y;
        self.velocity_y = 0.0;
        self.grounded = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::{Volume, VolumeCategory, VolumeTraits};

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn test_falls_to_ground_plane() {
        let registry = SolidRegistry::new();
        let mut body = VerticalBody {
            feet_y: 5.0,
            velocity_y: 0.0,
            grounded: false,
        };
        for _ in 0..120 {
            body.step(&registry, Vec2::ZERO, DT);
        }
        assert_eq!(body.feet_y, 0.0);
        assert!(body.grounded);
    }

    #[test]
    fn test_jump_leaves_and_returns() {
        let registry = SolidRegistry::new();
        let mut body = VerticalBody::standing_at(0.0);
        assert!(body.try_jump());
        assert!(!body.try_jump());

        body.step(&registry, Vec2::ZERO, DT);
        assert!(!body.grounded);
        assert!(body.feet_y > 0.0);

        let mut apex: f32 = 0.0;
        for _ in 0..120 {
            body.step(&registry, Vec2::ZERO, DT);
            apex = apex.max(body.feet_y);
        }
        assert!(body.grounded);
        assert!(apex > 1.4 && apex < 1.8);
    }

    #[test]
    fn test_lands_on_roof_instead_of_falling_through() {
        let mut registry = SolidRegistry::new();
        registry.register(
            Volume::from_footprint(Vec2::ZERO, 10.0, 10.0, 9.8, 0.2),
            VolumeTraits::CLIMBABLE_SOLID,
            VolumeCategory::Roof,
            None,
        );
        let mut body = VerticalBody {
            feet_y: 30.0,
            velocity_y: -20.0,
            grounded: false,
        };
        for _ in 0..240 {
            body.step(&registry, Vec2::ZERO, DT);
        }
        assert!((body.feet_y - 10.0).abs() < 1e-4);
        assert!(body.grounded);
    }
}
