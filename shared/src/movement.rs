//! Swept horizontal movement against the solid registry.
//!
//! Shared by the avatar and patrol bots: a displacement is walked in small sub-steps so
//! thin walls cannot be tunnelled through; a blocked move is retried on each world axis
//! alone, which gives wall sliding without a contact-normal solve.

use bevy::prelude::*;

use crate::spatial::{SolidRegistry, VolumeId};
use crate::volume::xz;

/// How far ahead of the agent the step-up probe looks.
pub const STEP_UP_PROBE_DISTANCE: f32 = 0.8;
pub const STEP_UP_PROBE_RADIUS: f32 = 0.9;
/// Height of the probe point above the feet.
pub const STEP_UP_PROBE_HEIGHT: f32 = 0.6;
/// Tops less than this above the feet are already handled by ground support.
pub const STEP_UP_MIN: f32 = 0.05;
pub const STEP_UP_MAX: f32 = 1.2;

/// Sampling parameters for one kind of agent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepParams {
    pub radius: f32,
    /// Longest allowed distance between two samples.
    pub max_step: f32,
    /// Minimum number of samples regardless of distance.
    pub min_steps: usize,
}

impl SweepParams {
    pub fn steps_for(&self, distance: f32) -> usize {
        ((distance / self.max_step).ceil() as usize).max(self.min_steps)
    }
}

/// Which candidate move was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    Full,
    XOnly,
    ZOnly,
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepResult {
    pub position: Vec3,
    pub outcome: SweepOutcome,
}

/// Whether every sample from `from` to `from + delta` (excluding the start) is clear.
pub fn sweep_clear(
    registry: &SolidRegistry,
    from: Vec3,
    delta: Vec3,
    params: &SweepParams,
    skip: Option<VolumeId>,
) -> bool {
    let steps = params.steps_for(delta.length());
    (1..=steps).all(|i| {
        let sample = from + delta * (i as f32 / steps as f32);
        !registry.is_blocked_except(sample, params.radius, skip)
    })
}

/// Resolve one horizontal displacement: full move, then X-only, then Z-only.
///
/// `from` is the agent's probe point (eye for the avatar, body center for bots).
pub fn resolve_horizontal(
    registry: &SolidRegistry,
    from: Vec3,
    delta: Vec3,
    params: &SweepParams,
    skip: Option<VolumeId>,
) -> SweepResult {
    let delta = Vec3::new(delta.x, 0.0, delta.z);
    if delta == Vec3::ZERO {
        return SweepResult {
            position: from,
            outcome: SweepOutcome::Full,
        };
    }

    let candidates = [
        (delta, SweepOutcome::Full),
        (Vec3::new(delta.x, 0.0, 0.0), SweepOutcome::XOnly),
        (Vec3::new(0.0, 0.0, delta.z), SweepOutcome::ZOnly),
    ];

    for (candidate, outcome) in candidates {
        if candidate == Vec3::ZERO {
            continue;
        }
        if sweep_clear(registry, from, candidate, params, skip) {
            return SweepResult {
                position: from + candidate,
                outcome,
            };
        }
    }

    SweepResult {
        position: from,
        outcome: SweepOutcome::Blocked,
    }
}

/// Probe ahead of the agent for a climbable top it can be lifted onto.
///
/// Returns the new feet height when a standable climbable surface lies between
/// [`STEP_UP_MIN`] and [`STEP_UP_MAX`] above `feet_y`. Ladder rungs are too thin to
/// qualify.
pub fn step_up_target(registry: &SolidRegistry, position: Vec3, feet_y: f32, direction: Vec3) -> Option<f32> {
    let dir = Vec3::new(direction.x, 0.0, direction.z).normalize_or_zero();
    if dir == Vec3::ZERO {
        return None;
    }
    let ahead = xz(position) + xz(dir) * STEP_UP_PROBE_DISTANCE;
    let probe = Vec3::new(ahead.x, feet_y + STEP_UP_PROBE_HEIGHT, ahead.y);

    registry
        .query_near(probe, STEP_UP_PROBE_RADIUS)
        .into_iter()
        .filter_map(|id| registry.get(id))
        .filter(|e| e.traits.climbable && e.volume.is_standable())
        .map(|e| e.volume.top())
        .filter(|top| {
            let rise = top - feet_y;
            rise > STEP_UP_MIN && rise <= STEP_UP_MAX
        })
        .fold(None, |best: Option<f32>, top| Some(best.map_or(top, |b| b.max(top))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::{Volume, VolumeCategory, VolumeTraits};

    const PARAMS: SweepParams = SweepParams {
        radius: 1.25,
        max_step: 0.05,
        min_steps: 4,
    };

    fn wall_at_x(registry: &mut SolidRegistry, x: f32, thickness: f32) {
        registry.register(
            Volume::new(Vec3::new(x, 0.0, -50.0), Vec3::new(x + thickness, 10.0, 50.0)),
            VolumeTraits::SOLID,
            VolumeCategory::BuildingWall,
            None,
        );
    }

    #[test]
    fn test_no_tunneling_through_thin_wall() {
        let mut registry = SolidRegistry::new();
        wall_at_x(&mut registry, 10.0, 0.1);
        let from = Vec3::new(0.0, 2.0, 0.0);

        let result = resolve_horizontal(&registry, from, Vec3::new(40.0, 0.0, 0.0), &PARAMS, None);
        assert_eq!(result.outcome, SweepOutcome::Blocked);
        assert_eq!(result.position, from);
        assert!(!registry.is_blocked(result.position, PARAMS.radius));
    }

    #[test]
    fn test_diagonal_slides_along_wall() {
        let mut registry = SolidRegistry::new();
        wall_at_x(&mut registry, 5.0, 0.5);
        // 1.5 from the wall face, moving diagonally into it.
        let from = Vec3::new(3.5, 2.0, 0.0);

        let result = resolve_horizontal(&registry, from, Vec3::new(0.5, 0.0, 0.5), &PARAMS, None);
        assert_eq!(result.outcome, SweepOutcome::ZOnly);
        assert_eq!(result.position.x, from.x);
        assert!(result.position.z > from.z);
        assert!(!registry.is_blocked(result.position, PARAMS.radius));
    }

    #[test]
    fn test_accepted_moves_are_never_blocked() {
        let mut registry = SolidRegistry::new();
        registry.register(
            Volume::from_footprint(Vec2::new(6.0, 6.0), 3.0, 3.0, 0.0, 5.0),
            VolumeTraits::SOLID,
            VolumeCategory::Cover,
            None,
        );
        for i in 0..16 {
            let angle = i as f32 * std::f32::consts::TAU / 16.0;
            let delta = Vec3::new(angle.cos(), 0.0, angle.sin()) * 12.0;
            let result = resolve_horizontal(&registry, Vec3::new(0.0, 2.0, 0.0), delta, &PARAMS, None);
            assert!(!registry.is_blocked(result.position, PARAMS.radius));
        }
    }

    #[test]
    fn test_step_up_onto_crate_but_not_rung() {
        let mut registry = SolidRegistry::new();
        registry.register(
            Volume::from_footprint(Vec2::new(1.5, 0.0), 2.0, 2.0, 0.0, 0.8),
            VolumeTraits::CLIMBABLE_SOLID,
            VolumeCategory::Cover,
            None,
        );
        registry.register(
            Volume::from_center_size(Vec3::new(-1.0, 0.9, 0.0), Vec3::new(0.02, 0.02, 0.6)),
            VolumeTraits::CLIMBABLE,
            VolumeCategory::LadderRung,
            None,
        );

        let at = Vec3::new(0.0, 2.0, 0.0);
        let up = step_up_target(&registry, at, 0.0, Vec3::X).unwrap();
        assert!((up - 0.8).abs() < 1e-5);
        assert!(step_up_target(&registry, at, 0.0, Vec3::NEG_X).is_none());
        // Too tall from the ground.
        assert!(step_up_target(&registry, at, -1.0, Vec3::X).is_none());
    }
}
